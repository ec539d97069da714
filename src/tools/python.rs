//! Python code execution in a throwaway working directory.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, instrument};

use super::{required_str, Tool};
use crate::core::{FerretError, Result, ToolKind};

/// Run a Python snippet and capture what it prints.
pub struct PythonRepl {
    python_bin: String,
    timeout_secs: u64,
}

impl PythonRepl {
    pub fn new(python_bin: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            python_bin: python_bin.into(),
            timeout_secs,
        }
    }
}

/// Combine captured streams into the text returned to the model
fn render_output(stdout: &str, stderr: &str) -> String {
    let stdout = stdout.trim_end();
    let stderr = stderr.trim_end();

    match (stdout.is_empty(), stderr.is_empty()) {
        (true, true) => "(no output)".to_string(),
        (false, true) => stdout.to_string(),
        (true, false) => format!("--- stderr ---\n{}", stderr),
        (false, false) => format!("{}\n--- stderr ---\n{}", stdout, stderr),
    }
}

#[async_trait]
impl Tool for PythonRepl {
    fn kind(&self) -> ToolKind {
        ToolKind::PythonRepl
    }

    fn description(&self) -> &str {
        "Execute Python code and return what it prints. Use print() to see results; state does not persist between calls."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "code": {
                    "type": "string",
                    "description": "Python source code to execute"
                }
            },
            "required": ["code"]
        })
    }

    #[instrument(skip_all, fields(tool = "python_repl"))]
    async fn invoke(&self, args: &Value) -> Result<String> {
        let code = required_str(args, "code")?;
        info!(chars = code.len(), "Executing Python snippet");

        let workdir = tempfile::tempdir()?;
        let mut command = Command::new(&self.python_bin);
        command
            .arg("-c")
            .arg(code)
            .current_dir(workdir.path())
            .env_clear()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Ok(path) = std::env::var("PATH") {
            command.env("PATH", path);
        }

        let result = tokio::time::timeout(Duration::from_secs(self.timeout_secs), command.output())
            .await
            .map_err(|_| FerretError::timeout("Python execution", self.timeout_secs))?;

        let output = match result {
            Ok(o) => o,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FerretError::tool(format!(
                    "{} not found. Please install Python or set tools.python_bin.",
                    self.python_bin
                )));
            }
            Err(e) => return Err(FerretError::tool(format!("Failed to start Python: {}", e))),
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!(status = ?output.status.code(), "Python finished");

        if !output.status.success() && stdout.trim().is_empty() {
            return Err(FerretError::tool(format!(
                "exit code {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        Ok(render_output(&stdout, &stderr))
    }

    fn failure_message(&self, err: &FerretError) -> String {
        format!("Error executing code: {}", err.detail())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_output() {
        assert_eq!(render_output("", ""), "(no output)");
        assert_eq!(render_output("4\n", ""), "4");
        assert_eq!(
            render_output("4\n", "warning\n"),
            "4\n--- stderr ---\nwarning"
        );
    }

    #[tokio::test]
    async fn test_missing_interpreter_is_reported() {
        let tool = PythonRepl::new("python-interpreter-that-does-not-exist", 5);
        let text = tool.run(&json!({"code": "print(1)"})).await;
        assert!(text.starts_with("Error executing code:"));
        assert!(text.contains("not found"));
    }

    // `sh -c` accepts the same invocation shape as `python -c`
    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_stdout() {
        let tool = PythonRepl::new("sh", 5);
        let text = tool.run(&json!({"code": "echo 4"})).await;
        assert_eq!(text, "4");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_snippet_reports_stderr() {
        let tool = PythonRepl::new("sh", 5);
        let text = tool.run(&json!({"code": "echo boom >&2; exit 3"})).await;
        assert_eq!(text, "Error executing code: exit code 3: boom");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout() {
        let tool = PythonRepl::new("sh", 1);
        let text = tool.run(&json!({"code": "sleep 5"})).await;
        assert_eq!(text, "Error executing code: Python execution timed out after 1s");
    }
}
