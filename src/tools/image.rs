//! Image analysis through the vision model.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, instrument};

use super::http::{extension_from_url, HttpFetcher};
use super::{required_str, Tool};
use crate::core::{FerretError, Message, Result, ToolKind};
use crate::llm::LLMProvider;

/// MIME type implied by the URL's extension, PNG when unknown
pub fn mime_from_url(url: &str) -> &'static str {
    match extension_from_url(url).as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        _ => "image/png",
    }
}

/// MIME type of a downloaded image: the declared `image/*` type, else the URL's.
///
/// Ollama receives raw base64, so the type is only checked and logged. A
/// text response (an error or login page) is not an image.
pub fn image_mime(url: &str, content_type: Option<&str>) -> Result<String> {
    let declared = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase());

    match declared {
        Some(ct) if ct.starts_with("image/") => Ok(ct),
        Some(ct) if ct.starts_with("text/") => Err(FerretError::tool(format!(
            "{} returned {} instead of an image",
            url, ct
        ))),
        _ => Ok(mime_from_url(url).to_string()),
    }
}

fn vision_prompt(question: &str) -> String {
    format!(
        "Describe this image in detail, including any text it contains. \
         Then answer the following question about it.\n\nQuestion: {}",
        question
    )
}

/// Describe an image and answer a question about it.
pub struct AnalyzeImage {
    http: HttpFetcher,
    llm: Arc<dyn LLMProvider>,
    model: String,
}

impl AnalyzeImage {
    pub fn new(http: HttpFetcher, llm: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            http,
            llm,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Tool for AnalyzeImage {
    fn kind(&self) -> ToolKind {
        ToolKind::AnalyzeImage
    }

    fn description(&self) -> &str {
        "Download an image, describe it (including any visible text) and answer a question about it."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "URL of the image"
                },
                "question": {
                    "type": "string",
                    "description": "What to find out about the image"
                }
            },
            "required": ["url", "question"]
        })
    }

    #[instrument(skip_all, fields(tool = "analyze_image"))]
    async fn invoke(&self, args: &Value) -> Result<String> {
        let url = required_str(args, "url")?;
        let question = args
            .get("question")
            .and_then(|v| v.as_str())
            .unwrap_or("What does this image show?");

        let fetched = self.http.get(url).await?;
        let mime = image_mime(url, fetched.content_type.as_deref())?;
        let encoded = STANDARD.encode(&fetched.bytes);
        debug!(url, %mime, bytes = fetched.bytes.len(), "Sending image to vision model");

        let message = Message::user(vision_prompt(question)).with_images(vec![encoded]);
        let response = self.llm.chat(&self.model, &[message]).await?;

        if response.content.trim().is_empty() {
            return Err(FerretError::model("Vision model returned an empty response"));
        }

        Ok(response.content)
    }

    fn failure_message(&self, err: &FerretError) -> String {
        format!("Error extracting text: {}", err.detail())
    }
}
