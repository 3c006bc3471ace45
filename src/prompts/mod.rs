pub mod templates;

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::warn;

use crate::error::{StoryError, StoryResult};

pub use templates::{
    chapter_image_prompt, profile_image_prompt, story_prompt, CHAPTER_IMAGE_TEMPLATE,
    PROFILE_IMAGE_TEMPLATE, STORY_TEMPLATE,
};

pub type PromptParameters = BTreeMap<String, String>;

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$(?:\{(\w+)\}|(\w+))").expect("placeholder pattern is valid"));

fn placeholder_name<'a>(caps: &Captures<'a>) -> &'a str {
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str())
        .unwrap_or_default()
}

/// A prompt with `${name}` or `$name` placeholders. Templates are plain data:
/// substitution is a single literal pass, values are never expanded again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    name: &'static str,
    source: &'static str,
}

impl Template {
    pub const fn new(name: &'static str, source: &'static str) -> Self {
        Template { name, source }
    }

    pub fn required_keys(&self) -> BTreeSet<String> {
        PLACEHOLDER_RE
            .captures_iter(self.source)
            .map(|caps| placeholder_name(&caps).to_string())
            .collect()
    }

    pub fn missing_keys(&self, parameters: &PromptParameters) -> Vec<String> {
        self.required_keys()
            .into_iter()
            .filter(|key| !parameters.contains_key(key))
            .collect()
    }

    pub fn render(&self, parameters: &PromptParameters) -> StoryResult<String> {
        let missing = self.missing_keys(parameters);
        if !missing.is_empty() {
            warn!(
                "Prompt template '{}' is missing placeholders: {}",
                self.name,
                missing.join(", ")
            );
            return Err(StoryError::MissingParameters(missing));
        }

        let rendered = PLACEHOLDER_RE.replace_all(self.source, |caps: &Captures<'_>| {
            let key = placeholder_name(caps);
            parameters.get(key).cloned().unwrap_or_default()
        });
        Ok(rendered.into_owned())
    }
}
