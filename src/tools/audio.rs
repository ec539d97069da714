//! Audio tools: transcribe an audio file or the audio track of a YouTube video.
//!
//! Speech-to-text runs against an OpenAI-compatible transcription server
//! (for example a local faster-whisper server).

use async_openai::config::OpenAIConfig;
use async_openai::types::{AudioInput, AudioResponseFormat, CreateTranscriptionRequestArgs};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info, instrument};

use super::http::{file_name_from_url, HttpFetcher};
use super::{required_str, Tool};
use crate::core::config::TranscriptionConfig;
use crate::core::{FerretError, Result, ToolKind};

/// Speech-to-text backend
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe raw audio bytes into ordered segment texts
    async fn transcribe(&self, file_name: &str, audio: Vec<u8>) -> Result<Vec<String>>;
}

/// Join segment texts into one transcript
pub fn join_segments(segments: &[String]) -> String {
    segments
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whisper-style transcriber speaking the OpenAI transcription API.
pub struct WhisperTranscriber {
    client: async_openai::Client<OpenAIConfig>,
    model: String,
}

impl WhisperTranscriber {
    pub fn from_config(config: &TranscriptionConfig) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_base(config.base_url.trim_end_matches('/'))
            .with_api_key(config.api_key.clone().unwrap_or_else(|| "none".to_string()));

        Self {
            client: async_openai::Client::with_config(openai_config),
            model: config.model.clone(),
        }
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    #[instrument(skip(self, audio), fields(bytes = audio.len()))]
    async fn transcribe(&self, file_name: &str, audio: Vec<u8>) -> Result<Vec<String>> {
        let request = CreateTranscriptionRequestArgs::default()
            .file(AudioInput::from_vec_u8(file_name.to_string(), audio))
            .model(&self.model)
            .response_format(AudioResponseFormat::VerboseJson)
            .build()
            .map_err(|e| FerretError::tool(format!("Failed to build request: {}", e)))?;

        let response = self
            .client
            .audio()
            .transcribe_verbose_json(request)
            .await
            .map_err(|e| FerretError::tool(format!("Transcription API error: {}", e)))?;

        let segments = match response.segments {
            Some(segments) if !segments.is_empty() => {
                segments.into_iter().map(|s| s.text).collect()
            }
            _ => vec![response.text],
        };

        debug!(segments = segments.len(), "Transcribed");
        Ok(segments)
    }
}

/// Transcribe an audio file fetched by URL.
pub struct AnalyzeAudio {
    http: HttpFetcher,
    transcriber: Arc<dyn Transcriber>,
}

impl AnalyzeAudio {
    pub fn new(http: HttpFetcher, transcriber: Arc<dyn Transcriber>) -> Self {
        Self { http, transcriber }
    }
}

#[async_trait]
impl Tool for AnalyzeAudio {
    fn kind(&self) -> ToolKind {
        ToolKind::AnalyzeAudio
    }

    fn description(&self) -> &str {
        "Download an audio file (mp3, wav, m4a...) and return its transcript."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "URL of the audio file"
                }
            },
            "required": ["url"]
        })
    }

    #[instrument(skip_all, fields(tool = "analyze_audio"))]
    async fn invoke(&self, args: &Value) -> Result<String> {
        let url = required_str(args, "url")?;
        let fetched = self.http.get(url).await?;
        let file_name = file_name_from_url(url, "audio.mp3");

        let segments = self.transcriber.transcribe(&file_name, fetched.bytes).await?;
        Ok(join_segments(&segments))
    }

    fn failure_message(&self, err: &FerretError) -> String {
        format!("Error transcribing audio: {}", err.detail())
    }
}

/// Download a video's audio track with yt-dlp and transcribe it.
pub struct AnalyzeYoutubeAudio {
    yt_dlp_bin: String,
    transcriber: Arc<dyn Transcriber>,
}

impl AnalyzeYoutubeAudio {
    pub fn new(yt_dlp_bin: impl Into<String>, transcriber: Arc<dyn Transcriber>) -> Self {
        Self {
            yt_dlp_bin: yt_dlp_bin.into(),
            transcriber,
        }
    }

    /// Download the audio track into `dir` and return the file path.
    #[instrument(skip(self, dir))]
    async fn download_audio(&self, url: &str, dir: &Path) -> Result<PathBuf> {
        info!("Downloading audio from {}", url);

        let template = dir.join("audio.%(ext)s");
        let result = Command::new(&self.yt_dlp_bin)
            .arg("--extract-audio")
            .arg("--audio-format")
            .arg("mp3")
            .arg("--output")
            .arg(&template)
            .arg("--no-playlist")
            .arg("--quiet")
            .arg("--no-warnings")
            .arg(url)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await;

        let output = match result {
            Ok(o) => o,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FerretError::tool(format!(
                    "{} not found. Please install it and ensure it's in your PATH.",
                    self.yt_dlp_bin
                )));
            }
            Err(e) => {
                return Err(FerretError::tool(format!("yt-dlp execution failed: {}", e)));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FerretError::tool(format!("yt-dlp failed: {}", stderr.trim())));
        }

        find_audio_file(dir)
    }
}

/// Locate the file yt-dlp produced; the extension depends on the source.
fn find_audio_file(dir: &Path) -> Result<PathBuf> {
    let preferred = dir.join("audio.mp3");
    if preferred.exists() {
        return Ok(preferred);
    }

    std::fs::read_dir(dir)?
        .flatten()
        .map(|entry| entry.path())
        .find(|path| {
            path.file_stem()
                .map(|stem| stem == "audio")
                .unwrap_or(false)
        })
        .ok_or_else(|| FerretError::tool("Audio file not found after download"))
}

#[async_trait]
impl Tool for AnalyzeYoutubeAudio {
    fn kind(&self) -> ToolKind {
        ToolKind::AnalyzeYoutubeAudio
    }

    fn description(&self) -> &str {
        "Download the audio track of a YouTube video and return its transcript."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "URL of the YouTube video"
                }
            },
            "required": ["url"]
        })
    }

    #[instrument(skip_all, fields(tool = "analyze_youtube_audio"))]
    async fn invoke(&self, args: &Value) -> Result<String> {
        let url = required_str(args, "url")?;

        // Removed when dropped, after transcription
        let temp_dir = tempfile::tempdir()?;
        let audio_path = self.download_audio(url, temp_dir.path()).await?;

        let file_name = audio_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.mp3")
            .to_string();
        let audio = tokio::fs::read(&audio_path).await?;

        let segments = self.transcriber.transcribe(&file_name, audio).await?;
        Ok(join_segments(&segments))
    }

    fn failure_message(&self, err: &FerretError) -> String {
        format!("Error transcribing YouTube audio: {}", err.detail())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedTranscriber(Vec<&'static str>);

    #[async_trait]
    impl Transcriber for FixedTranscriber {
        async fn transcribe(&self, _file_name: &str, _audio: Vec<u8>) -> Result<Vec<String>> {
            Ok(self.0.iter().map(|s| s.to_string()).collect())
        }
    }

    #[test]
    fn test_join_segments() {
        let segments = vec![" Hello ".to_string(), "".to_string(), "world.".to_string()];
        assert_eq!(join_segments(&segments), "Hello world.");
    }

    #[test]
    fn test_find_audio_file_prefers_mp3() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("audio.webm"), b"x").unwrap();
        assert_eq!(find_audio_file(dir.path()).unwrap(), dir.path().join("audio.webm"));

        std::fs::write(dir.path().join("audio.mp3"), b"x").unwrap();
        assert_eq!(find_audio_file(dir.path()).unwrap(), dir.path().join("audio.mp3"));
    }

    #[tokio::test]
    async fn test_missing_yt_dlp_is_reported_as_text() {
        let tool = AnalyzeYoutubeAudio::new(
            "yt-dlp-binary-that-does-not-exist",
            Arc::new(FixedTranscriber(vec!["unused"])),
        );
        let text = tool
            .run(&json!({"url": "https://www.youtube.com/watch?v=1htKBjuUWec"}))
            .await;
        assert!(text.starts_with("Error transcribing YouTube audio:"));
        assert!(text.contains("not found"));
    }
}
