//! Fetching raw artifact bytes
//!
//! [`ContentSource`] is the port; [`SourceFetcher`] reads local files through
//! [`Storage`] and remote ones over HTTPS, [`MemorySource`] serves canned
//! bytes in tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::MarvaiConfig;
use crate::error::{MarvaiError, Result};
use crate::registry::RegistryManifest;
use crate::security::{MAX_CONTENT_SIZE, MAX_MANIFEST_SIZE};
use crate::storage::Storage;

/// What to fetch
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    Local(PathBuf),
    Url(String),
    /// A file inside a registry repository
    Registry { repo: String, file: String },
    /// The `PROMPTS` manifest of a registry repository
    Manifest { repo: String },
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Local(path) => write!(f, "{}", path.display()),
            Locator::Url(url) => f.write_str(url),
            Locator::Registry { repo, file } => write!(f, "{repo}/{file}"),
            Locator::Manifest { repo } => write!(f, "{repo}/PROMPTS"),
        }
    }
}

impl Locator {
    fn limit(&self) -> usize {
        match self {
            Locator::Manifest { .. } => MAX_MANIFEST_SIZE,
            _ => MAX_CONTENT_SIZE,
        }
    }
}

#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Raw bytes for `locator`; `NotFound` or `Transport` on failure
    async fn fetch(&self, locator: &Locator) -> Result<Vec<u8>>;

    /// Fetch and parse a repository manifest
    async fn fetch_manifest(&self, repo: &str) -> Result<RegistryManifest> {
        let bytes = self
            .fetch(&Locator::Manifest {
                repo: repo.to_string(),
            })
            .await?;
        Ok(RegistryManifest::parse(&String::from_utf8_lossy(&bytes)))
    }
}

fn too_large(locator: &Locator, size: usize) -> MarvaiError {
    MarvaiError::Transport(format!(
        "{locator} too large ({size} bytes), maximum allowed is {} bytes",
        locator.limit()
    ))
}

/// Local files through [`Storage`], remote files over HTTPS
pub struct SourceFetcher {
    storage: Arc<dyn Storage>,
    client: reqwest::Client,
    config: MarvaiConfig,
}

impl SourceFetcher {
    pub fn new(storage: Arc<dyn Storage>, config: MarvaiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("marvai/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| MarvaiError::Transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            storage,
            client,
            config,
        })
    }

    fn read_local(&self, locator: &Locator, path: &Path) -> Result<Vec<u8>> {
        let bytes = self.storage.read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MarvaiError::NotFound(format!("file {}", path.display()))
            } else {
                MarvaiError::storage("read", path, e)
            }
        })?;
        if bytes.len() > locator.limit() {
            return Err(too_large(locator, bytes.len()));
        }
        Ok(bytes)
    }

    async fn download(&self, locator: &Locator, url: &str) -> Result<Vec<u8>> {
        if !url.starts_with("https://") {
            return Err(MarvaiError::InvalidSource {
                source_ref: url.to_string(),
                reason: "only HTTPS URLs are allowed".to_string(),
            });
        }

        tracing::info!("Downloading {}", url);
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MarvaiError::Transport(format!("error downloading {url}: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(MarvaiError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(MarvaiError::Transport(format!(
                "HTTP error {} when downloading {}",
                status.as_u16(),
                url
            )));
        }

        if let Some(content_type) = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            let expected = content_type.starts_with("text/")
                || content_type.contains("yaml")
                || content_type.starts_with("application/octet-stream");
            if !expected {
                tracing::warn!("Unexpected content type '{}' for {}", content_type, url);
            }
        }

        let limit = locator.limit();
        if let Some(len) = response.content_length() {
            if len as usize > limit {
                return Err(too_large(locator, len as usize));
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| MarvaiError::Transport(format!("error reading {url}: {e}")))?
        {
            body.extend_from_slice(&chunk);
            if body.len() > limit {
                return Err(too_large(locator, body.len()));
            }
        }

        tracing::debug!("Downloaded {} bytes from {}", body.len(), url);
        Ok(body)
    }
}

#[async_trait]
impl ContentSource for SourceFetcher {
    async fn fetch(&self, locator: &Locator) -> Result<Vec<u8>> {
        match locator {
            Locator::Local(path) => self.read_local(locator, path),
            Locator::Url(url) => self.download(locator, url).await,
            Locator::Registry { repo, file } => {
                let url = self.config.artifact_url(repo, file);
                self.download(locator, &url).await
            }
            Locator::Manifest { repo } => {
                let url = self.config.manifest_url(repo);
                self.download(locator, &url).await.map_err(|e| match e {
                    MarvaiError::NotFound(_) => {
                        MarvaiError::NotFound(format!("repository '{repo}' ({url})"))
                    }
                    other => other,
                })
            }
        }
    }
}

/// Serves canned bytes keyed by locator; unknown locators are `NotFound`
#[derive(Debug, Default)]
pub struct MemorySource {
    files: Mutex<HashMap<Locator, Vec<u8>>>,
    requests: Mutex<Vec<Locator>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, locator: Locator, data: impl Into<Vec<u8>>) {
        self.files
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(locator, data.into());
    }

    pub fn remove(&self, locator: &Locator) {
        self.files
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(locator);
    }

    /// Every locator asked for, in order
    pub fn requests(&self) -> Vec<Locator> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl ContentSource for MemorySource {
    async fn fetch(&self, locator: &Locator) -> Result<Vec<u8>> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(locator.clone());

        let data = self
            .files
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(locator)
            .cloned()
            .ok_or_else(|| MarvaiError::NotFound(locator.to_string()))?;

        if data.len() > locator.limit() {
            return Err(too_large(locator, data.len()));
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[tokio::test]
    async fn test_local_files_through_storage() {
        let storage = Arc::new(MemoryStorage::new());
        storage.insert("prompts/a.mprompt", "name: a\n");
        let fetcher = SourceFetcher::new(storage, MarvaiConfig::default()).unwrap();

        let bytes = fetcher
            .fetch(&Locator::Local(PathBuf::from("prompts/a.mprompt")))
            .await
            .unwrap();
        assert_eq!(bytes, b"name: a\n");

        let err = fetcher
            .fetch(&Locator::Local(PathBuf::from("prompts/missing.mprompt")))
            .await
            .unwrap_err();
        assert!(matches!(err, MarvaiError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_plain_http_rejected() {
        let fetcher =
            SourceFetcher::new(Arc::new(MemoryStorage::new()), MarvaiConfig::default()).unwrap();
        let err = fetcher
            .fetch(&Locator::Url("http://example.com/a.mprompt".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, MarvaiError::InvalidSource { .. }));
    }

    #[tokio::test]
    async fn test_memory_source_manifest_limit() {
        let source = MemorySource::new();
        let repo = Locator::Manifest {
            repo: "marvai".to_string(),
        };
        source.insert(repo.clone(), vec![b'#'; MAX_MANIFEST_SIZE + 1]);
        assert!(matches!(
            source.fetch_manifest("marvai").await,
            Err(MarvaiError::Transport(_))
        ));

        source.insert(repo.clone(), "name: a\nfile: a.mprompt\n");
        let manifest = source.fetch_manifest("marvai").await.unwrap();
        assert_eq!(manifest.entries.len(), 1);
        assert_eq!(source.requests(), vec![repo.clone(), repo]);
    }
}
