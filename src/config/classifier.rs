//! Specialization classifier configuration

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Keyword signals per capability tag.
///
/// A tag's score for a request is the fraction of its keywords found in the
/// request's content digest, boosted when the request's kind hint names the
/// tag directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Tag → keyword list
    pub tags: HashMap<String, Vec<String>>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        let mut tags = HashMap::new();
        tags.insert(
            "coding".to_string(),
            ["code", "function", "bug", "compile", "refactor", "stack trace"]
                .map(String::from)
                .to_vec(),
        );
        tags.insert(
            "chat".to_string(),
            ["chat", "conversation", "hello", "talk", "reply"]
                .map(String::from)
                .to_vec(),
        );
        tags.insert(
            "general".to_string(),
            ["summarize", "explain", "translate", "write"]
                .map(String::from)
                .to_vec(),
        );
        Self { tags }
    }
}
