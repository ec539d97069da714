//! System prompt loading

use std::path::Path;

use crate::core::{FerretError, Result};

/// Prompt compiled into the binary
pub const DEFAULT_SYSTEM_PROMPT: &str = include_str!("../../prompts/system_prompt.txt");

/// Load the system prompt, preferring `path` when one is configured
pub fn load_system_prompt(path: Option<&Path>) -> Result<String> {
    let Some(path) = path else {
        return Ok(DEFAULT_SYSTEM_PROMPT.to_string());
    };

    let prompt = std::fs::read_to_string(path).map_err(|e| {
        FerretError::config(format!(
            "Cannot read system prompt {}: {}",
            path.display(),
            e
        ))
    })?;

    if prompt.trim().is_empty() {
        return Err(FerretError::config(format!(
            "System prompt {} is empty",
            path.display()
        )));
    }

    Ok(prompt)
}
