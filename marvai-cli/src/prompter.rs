//! Terminal implementation of the wizard's [`Prompter`]

use std::io::{self, BufRead, BufReader, Stdin, Stdout, Write};

use marvai_core::{MarvaiError, Prompter};

/// Questions on one stream, answers line by line from another
pub struct StdioPrompter<R, W> {
    input: R,
    output: W,
}

impl StdioPrompter<BufReader<Stdin>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R: BufRead, W: Write> StdioPrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// One line without its terminator; `None` at end of input
    fn read_line(&mut self) -> marvai_core::Result<Option<String>> {
        let mut line = String::new();
        let read = self.input.read_line(&mut line).map_err(MarvaiError::Input)?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    fn show(&mut self, text: &str) -> marvai_core::Result<()> {
        write!(self.output, "{text}").map_err(MarvaiError::Input)?;
        self.output.flush().map_err(MarvaiError::Input)
    }
}

impl<R: BufRead + Send, W: Write + Send> Prompter for StdioPrompter<R, W> {
    fn ask(
        &mut self,
        prompt: &str,
        required: bool,
        default: Option<&str>,
    ) -> marvai_core::Result<Option<String>> {
        let marker = if required { " (required)" } else { "" };
        let text = match default {
            Some(default) => format!("{prompt}{marker} [{default}]: "),
            None => format!("{prompt}{marker}: "),
        };
        self.show(&text)?;
        self.read_line()
    }

    fn confirm(&mut self, question: &str) -> marvai_core::Result<bool> {
        self.show(&format!("{question} (yes/no) "))?;
        let answer = self.read_line()?.unwrap_or_default();
        Ok(matches!(
            answer.trim().to_lowercase().as_str(),
            "yes" | "y"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    #[test]
    fn test_ask_shows_default_and_reads_line() {
        let mut out = Vec::new();
        let mut prompter = StdioPrompter::new(Cursor::new("rust\r\n"), &mut out);

        let answer = prompter.ask("Which language?", true, Some("go")).unwrap();
        assert_eq!(answer.as_deref(), Some("rust"));
        assert_eq!(
            prompter.ask("Anything else?", false, None).unwrap(),
            None
        );
        drop(prompter);

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Which language? (required) [go]: Anything else?: "
        );
    }

    #[test]
    fn test_confirm() {
        for (input, expected) in [("yes\n", true), ("Y\n", true), (" y \n", true), ("no\n", false), ("", false), ("yep\n", false)] {
            let mut prompter = StdioPrompter::new(Cursor::new(input), Vec::new());
            assert_eq!(prompter.confirm("Update?").unwrap(), expected, "{input:?}");
        }
    }
}
