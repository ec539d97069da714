//! File ingestion tools: spreadsheets and source files fetched by URL.

use async_trait::async_trait;
use calamine::{open_workbook_auto_from_rs, Reader};
use serde_json::{json, Value};
use std::io::Cursor;
use tracing::{debug, instrument};

use super::http::{extension_from_url, HttpFetcher};
use super::{required_str, Tool};
use crate::core::{FerretError, Result, ToolKind};

fn url_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "url": {
                "type": "string",
                "description": description
            }
        },
        "required": ["url"]
    })
}

/// Render every sheet of a workbook as CSV, each under a `Sheet: <name>` header.
pub fn workbook_to_csv(bytes: Vec<u8>) -> Result<String> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| FerretError::tool(format!("Cannot open workbook: {}", e)))?;

    let mut sections = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| FerretError::tool(format!("Cannot read sheet '{}': {}", name, e)))?;

        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(Vec::new());
        for row in range.rows() {
            writer
                .write_record(row.iter().map(|cell| cell.to_string()))
                .map_err(|e| FerretError::tool(format!("CSV error: {}", e)))?;
        }
        let csv_bytes = writer
            .into_inner()
            .map_err(|e| FerretError::tool(format!("CSV error: {}", e)))?;

        sections.push(format!(
            "Sheet: {}\n{}",
            name,
            String::from_utf8_lossy(&csv_bytes)
        ));
    }

    if sections.is_empty() {
        return Err(FerretError::tool("Workbook contains no sheets"));
    }

    Ok(sections.join("\n"))
}

/// Whether a download is plain CSV, by declared type or by extension
fn is_csv(url: &str, content_type: Option<&str>) -> bool {
    let declared_csv = content_type
        .map(|ct| ct.trim_start().to_ascii_lowercase().starts_with("text/csv"))
        .unwrap_or(false);
    declared_csv || extension_from_url(url).as_deref() == Some("csv")
}

/// Read an Excel (or ODS/CSV) file and return its sheets as CSV text.
pub struct AnalyzeExcel {
    http: HttpFetcher,
}

impl AnalyzeExcel {
    pub fn new(http: HttpFetcher) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Tool for AnalyzeExcel {
    fn kind(&self) -> ToolKind {
        ToolKind::AnalyzeExcel
    }

    fn description(&self) -> &str {
        "Download a spreadsheet (xlsx, xls, ods or csv) and return every sheet as CSV."
    }

    fn parameters_schema(&self) -> Value {
        url_schema("URL of the spreadsheet file")
    }

    #[instrument(skip_all, fields(tool = "analyze_excel"))]
    async fn invoke(&self, args: &Value) -> Result<String> {
        let url = required_str(args, "url")?;
        let fetched = self.http.get(url).await?;

        if is_csv(url, fetched.content_type.as_deref()) {
            return Ok(format!(
                "Sheet: csv\n{}",
                String::from_utf8_lossy(&fetched.bytes)
            ));
        }

        // Workbook parsing is CPU-bound
        let csv = tokio::task::spawn_blocking(move || workbook_to_csv(fetched.bytes))
            .await
            .map_err(|e| FerretError::tool(format!("Workbook task failed: {}", e)))??;
        debug!(url, chars = csv.len(), "Workbook converted");

        Ok(csv)
    }

    fn failure_message(&self, err: &FerretError) -> String {
        format!("Error analyzing Excel file: {}", err.detail())
    }
}

/// Fetch a source file and return its raw text.
pub struct AnalyzeCodeFile {
    http: HttpFetcher,
}

impl AnalyzeCodeFile {
    pub fn new(http: HttpFetcher) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Tool for AnalyzeCodeFile {
    fn kind(&self) -> ToolKind {
        ToolKind::AnalyzeCodeFile
    }

    fn description(&self) -> &str {
        "Download a code or text file and return its contents verbatim."
    }

    fn parameters_schema(&self) -> Value {
        url_schema("URL of the code file")
    }

    #[instrument(skip_all, fields(tool = "analyze_code_file"))]
    async fn invoke(&self, args: &Value) -> Result<String> {
        let url = required_str(args, "url")?;
        let text = self.http.get_text(url).await?;

        if text.trim().is_empty() {
            return Ok(format!("The file at {} is empty.", url));
        }

        Ok(text)
    }

    fn failure_message(&self, err: &FerretError) -> String {
        format!("Error reading code file: {}", err.detail())
    }
}
