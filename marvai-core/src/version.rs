//! Semantic version parsing and ordering for update checks
//!
//! Parsing is lenient (`v` prefix, partial versions, negative numbers) and
//! comparison never fails: unparseable input falls back to comparing the raw
//! strings.

use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;

static SEMVER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+)\.(\d+)\.(\d+)(?:-([a-zA-Z0-9\-\.]+))?(?:\+([a-zA-Z0-9\-\.]+))?$")
        .expect("semver pattern is a valid regex")
});

/// A parsed version; build metadata is dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemVer {
    pub major: i64,
    pub minor: i64,
    pub patch: i64,
    /// Empty for a final release
    pub pre_release: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionError(String);

impl fmt::Display for VersionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for VersionError {}

fn number(part: &str, which: &str) -> Result<i64, VersionError> {
    part.parse::<i64>()
        .map_err(|_| VersionError(format!("invalid {which} version: {part}")))
}

pub fn parse_version(input: &str) -> Result<SemVer, VersionError> {
    if input.is_empty() {
        return Err(VersionError("empty version string".to_string()));
    }
    let version = input.strip_prefix('v').unwrap_or(input);

    if let Some(caps) = SEMVER_RE.captures(version) {
        return Ok(SemVer {
            major: number(&caps[1], "major")?,
            minor: number(&caps[2], "minor")?,
            patch: number(&caps[3], "patch")?,
            pre_release: caps
                .get(4)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
        });
    }

    // Partial forms such as "1", "1.2" or "1.2.3-rc"
    let parts: Vec<&str> = version.split('.').collect();
    let major = number(parts[0], "major")?;
    let minor = match parts.get(1) {
        Some(p) => number(p, "minor")?,
        None => 0,
    };
    let (patch, pre_release) = match parts.get(2) {
        Some(p) => match p.split_once('-') {
            Some((num, pre)) => (number(num, "patch")?, pre.to_string()),
            None => (number(p, "patch")?, String::new()),
        },
        None => (0, String::new()),
    };

    Ok(SemVer {
        major,
        minor,
        patch,
        pre_release,
    })
}

impl SemVer {
    /// Precedence: numeric triple, then release above pre-release, then
    /// byte-wise pre-release order
    pub fn precedence(&self, other: &SemVer) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| {
                match (self.pre_release.is_empty(), other.pre_release.is_empty()) {
                    (true, true) => Ordering::Equal,
                    (true, false) => Ordering::Greater,
                    (false, true) => Ordering::Less,
                    (false, false) => self.pre_release.cmp(&other.pre_release),
                }
            })
    }
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if !self.pre_release.is_empty() {
            write!(f, "-{}", self.pre_release)?;
        }
        Ok(())
    }
}

pub fn compare_versions(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    match (parse_version(a), parse_version(b)) {
        (Ok(va), Ok(vb)) => va.precedence(&vb),
        _ => a.cmp(b),
    }
}

/// True when `local` is at least as new as `remote`
pub fn is_up_to_date(local: &str, remote: &str) -> bool {
    compare_versions(local, remote) != Ordering::Less
}
