//! Interactive collection of variable values

use std::collections::VecDeque;

use crate::artifact::VariableSpec;
use crate::error::{MarvaiError, Result};
use crate::values::ResolvedValues;

/// Source of user answers
pub trait Prompter: Send {
    /// Ask one question; `Ok(None)` means input is exhausted
    fn ask(&mut self, prompt: &str, required: bool, default: Option<&str>)
        -> Result<Option<String>>;

    /// Yes/no question
    fn confirm(&mut self, question: &str) -> Result<bool>;
}

/// Ask every variable in declaration order
///
/// With `prefill`, stored answers become defaults that empty input accepts.
pub fn run_wizard(
    specs: &[VariableSpec],
    prompter: &mut dyn Prompter,
    prefill: Option<&ResolvedValues>,
) -> Result<ResolvedValues> {
    let mut values = ResolvedValues::new();

    for spec in specs {
        let default = prefill
            .and_then(|p| p.get(&spec.id))
            .filter(|v| !v.is_empty());
        let prompt = if spec.description.is_empty() {
            spec.id.as_str()
        } else {
            spec.description.as_str()
        };

        let answer = prompter
            .ask(prompt, spec.required, default)?
            .map(|a| a.trim().to_string())
            .unwrap_or_default();

        let value = match (answer.is_empty(), default) {
            (false, _) => answer,
            (true, Some(default)) => default.to_string(),
            (true, None) if spec.required => {
                return Err(MarvaiError::VariableRequired {
                    id: spec.id.clone(),
                })
            }
            (true, None) => String::new(),
        };

        tracing::debug!("Collected value for variable '{}'", spec.id);
        values.insert(spec.id.clone(), value);
    }

    Ok(values)
}

/// Replays canned answers; runs out into end-of-input and "no"
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    confirmations: VecDeque<bool>,
    asked: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_confirmations(mut self, confirmations: impl IntoIterator<Item = bool>) -> Self {
        self.confirmations = confirmations.into_iter().collect();
        self
    }

    /// Every prompt and confirmation question seen so far
    pub fn asked(&self) -> &[String] {
        &self.asked
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(
        &mut self,
        prompt: &str,
        _required: bool,
        _default: Option<&str>,
    ) -> Result<Option<String>> {
        self.asked.push(prompt.to_string());
        Ok(self.answers.pop_front())
    }

    fn confirm(&mut self, question: &str) -> Result<bool> {
        self.asked.push(question.to_string());
        Ok(self.confirmations.pop_front().unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn spec(id: &str, required: bool) -> VariableSpec {
        VariableSpec {
            id: id.to_string(),
            description: format!("{id}?"),
            kind: None,
            required,
        }
    }

    #[test]
    fn test_answers_in_order_and_trimmed() {
        let mut prompter = ScriptedPrompter::new(["  rust  ", "tests"]);
        let values = run_wizard(
            &[spec("lang", true), spec("focus", false)],
            &mut prompter,
            None,
        )
        .unwrap();

        assert_eq!(values.get("lang"), Some("rust"));
        assert_eq!(values.get("focus"), Some("tests"));
        assert_eq!(prompter.asked(), &["lang?".to_string(), "focus?".to_string()]);
    }

    #[test]
    fn test_end_of_input() {
        let mut prompter = ScriptedPrompter::new(Vec::<String>::new());
        let values = run_wizard(&[spec("opt", false)], &mut prompter, None).unwrap();
        assert_eq!(values.get("opt"), Some(""));

        let mut prompter = ScriptedPrompter::new(Vec::<String>::new());
        let err = run_wizard(&[spec("req", true)], &mut prompter, None).unwrap_err();
        assert!(matches!(err, MarvaiError::VariableRequired { id } if id == "req"));
    }

    #[test]
    fn test_prefill_defaults() {
        let mut existing = ResolvedValues::new();
        existing.insert("lang", "go");
        existing.insert("focus", "perf");

        let mut prompter = ScriptedPrompter::new(["", "security"]);
        let values = run_wizard(
            &[spec("lang", true), spec("focus", true), spec("new", false)],
            &mut prompter,
            Some(&existing),
        )
        .unwrap();

        assert_eq!(values.get("lang"), Some("go"));
        assert_eq!(values.get("focus"), Some("security"));
        assert_eq!(values.get("new"), Some(""));
    }
}
