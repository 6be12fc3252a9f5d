//! Template rendering with Handlebars

use handlebars::{handlebars_helper, Handlebars};
use serde_json::{Map, Value};

use crate::error::{MarvaiError, Result};
use crate::security::validate_variable_id;
use crate::values::ResolvedValues;

// {{#each (split langs ",")}} iterates the trimmed, non-empty parts
handlebars_helper!(split: |s: str, sep: str| {
    let parts: Vec<&str> = if sep.is_empty() { vec![s] } else { s.split(sep).collect() };
    parts
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect::<Vec<String>>()
});

/// Plain-text renderer: no HTML escaping, unknown variables render empty
pub struct PromptRenderer {
    registry: Handlebars<'static>,
}

impl Default for PromptRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptRenderer {
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(false);
        registry.register_escape_fn(handlebars::no_escape);
        registry.register_helper("split", Box::new(split));
        Self { registry }
    }

    pub fn render(&self, template: &str, values: &ResolvedValues) -> Result<String> {
        let mut context = Map::new();
        for (id, value) in values.iter() {
            if !validate_variable_id(id) {
                tracing::warn!("Skipping invalid variable name in template values: {}", id);
                continue;
            }
            context.insert(id.to_string(), Value::String(value.to_string()));
        }

        self.registry
            .render_template(template, &Value::Object(context))
            .map_err(|e| MarvaiError::Render(e.to_string()))
    }
}
