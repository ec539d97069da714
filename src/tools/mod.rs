//! Tools module - tool implementations for the agent
//!
//! Every tool is a stateless `Tool` implementation registered in the
//! `ToolRegistry` under its `ToolKind`. Tools never abort a conversation:
//! `Tool::run` turns any failure into text the model can read.

pub mod audio;
pub mod files;
pub mod http;
pub mod image;
pub mod python;
pub mod registry;
pub mod search;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::{FerretError, Result, ToolDefinition, ToolKind};

pub use registry::ToolRegistry;

/// A callable tool
#[async_trait]
pub trait Tool: Send + Sync {
    /// Which tool this is
    fn kind(&self) -> ToolKind;

    /// Description shown to the model
    fn description(&self) -> &str;

    /// JSON Schema of the arguments
    fn parameters_schema(&self) -> Value;

    /// Run the tool
    async fn invoke(&self, args: &Value) -> Result<String>;

    /// Text reported to the model when `invoke` fails
    fn failure_message(&self, err: &FerretError) -> String {
        format!("Error running {}: {}", self.kind(), err.detail())
    }

    /// Run the tool, reporting failures as text
    async fn run(&self, args: &Value) -> String {
        match self.invoke(args).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(tool = %self.kind(), "Tool failed: {}", e);
                self.failure_message(&e)
            }
        }
    }

    /// Definition bound to the model
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            self.kind().as_str(),
            self.description(),
            self.parameters_schema(),
        )
    }
}

/// Read a required string argument
pub(crate) fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| FerretError::tool(format!("Missing '{}' argument", key)))
}

/// A retrieved document with its provenance
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Where the content came from (usually a URL)
    pub source: String,
    /// Page or section within the source, if any
    pub page: Option<String>,
    pub content: String,
}

impl Document {
    pub fn new(source: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            page: None,
            content: content.into(),
        }
    }

    /// Keep at most `max_chars` characters of content
    pub fn truncated(mut self, max_chars: usize) -> Self {
        if let Some((idx, _)) = self.content.char_indices().nth(max_chars) {
            self.content.truncate(idx);
        }
        self
    }

    fn render(&self) -> String {
        format!(
            "<Document source=\"{}\" page=\"{}\"/>\n{}\n</Document>",
            self.source,
            self.page.as_deref().unwrap_or(""),
            self.content
        )
    }
}

/// Render search documents in the layout the system prompt expects
pub fn format_documents(query: &str, docs: &[Document]) -> String {
    if docs.is_empty() {
        return format!("No results found for: {}", query);
    }

    docs.iter()
        .map(Document::render)
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}
