//! Search tools: web, Wikipedia and Arxiv.
//!
//! Each returns its hits as `Document`s rendered by `format_documents`.

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::OnceLock;
use tracing::{debug, instrument};

use super::http::{check_status, HttpFetcher};
use super::{format_documents, required_str, Document, Tool};
use crate::core::{FerretError, Result, ToolKind};

const DUCKDUCKGO_URL: &str = "https://html.duckduckgo.com/html/";
const WIKIPEDIA_API_URL: &str = "https://en.wikipedia.org/w/api.php";
const ARXIV_API_URL: &str = "http://export.arxiv.org/api/query";

/// Characters kept from each Wikipedia page
const WIKI_MAX_CHARS: usize = 4000;

fn query_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": description
            }
        },
        "required": ["query"]
    })
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("bad pattern {pattern}: {e}"))
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| compile(pattern))
}

/// Strip tags, decode entities and collapse whitespace
fn clean_html(fragment: &str) -> String {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    let text = regex(&TAGS, r"<[^>]+>").replace_all(fragment, "");
    html_decode(&text)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Basic HTML/XML entity decoding.
fn html_decode(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Search the web through DuckDuckGo's HTML endpoint (no API key needed).
pub struct WebSearch {
    http: HttpFetcher,
    endpoint: String,
    max_results: usize,
}

impl WebSearch {
    pub fn new(http: HttpFetcher, max_results: usize) -> Self {
        Self::with_endpoint(http, DUCKDUCKGO_URL, max_results)
    }

    /// Use a different results endpoint
    pub fn with_endpoint(http: HttpFetcher, endpoint: impl Into<String>, max_results: usize) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            max_results,
        }
    }

    /// Extract search results from DuckDuckGo HTML.
    fn parse_results(&self, html: &str) -> Vec<Document> {
        static LINK: OnceLock<Regex> = OnceLock::new();
        static SNIPPET: OnceLock<Regex> = OnceLock::new();
        let link = regex(
            &LINK,
            r#"(?s)class="result__a"[^>]*?href="([^"]+)"[^>]*>(.*?)</a>"#,
        );
        let snippet = regex(&SNIPPET, r#"(?s)class="result__snippet"[^>]*>(.*?)</a>"#);

        html.split("result__body\"")
            .skip(1)
            .filter_map(|chunk| {
                let caps = link.captures(chunk)?;
                let title = clean_html(&caps[2]);
                if title.is_empty() {
                    return None;
                }
                let body = snippet
                    .captures(chunk)
                    .map(|c| clean_html(&c[1]))
                    .unwrap_or_default();

                Some(Document::new(
                    resolve_redirect(&html_decode(&caps[1])),
                    format!("{}\n{}", title, body),
                ))
            })
            .take(self.max_results)
            .collect()
    }
}

/// DuckDuckGo wraps result links as `/l/?uddg=<encoded target>`
fn resolve_redirect(href: &str) -> String {
    href.split_once("uddg=")
        .map(|(_, rest)| rest.split('&').next().unwrap_or(rest))
        .and_then(|encoded| urlencoding::decode(encoded).ok())
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|| href.to_string())
}

#[async_trait]
impl Tool for WebSearch {
    fn kind(&self) -> ToolKind {
        ToolKind::WebSearch
    }

    fn description(&self) -> &str {
        "Search the web for current information. Returns the top results with their URLs."
    }

    fn parameters_schema(&self) -> Value {
        query_schema("The search query")
    }

    #[instrument(skip_all, fields(tool = "web_search"))]
    async fn invoke(&self, args: &Value) -> Result<String> {
        let query = required_str(args, "query")?;
        let url = format!("{}?q={}", self.endpoint, urlencoding::encode(query));

        let html = self.http.get_text(&url).await?;
        let docs = self.parse_results(&html);
        debug!(query, results = docs.len(), "Web search finished");

        Ok(format_documents(query, &docs))
    }

    fn failure_message(&self, err: &FerretError) -> String {
        format!("Error performing web search: {}", err.detail())
    }
}

#[derive(Debug, Deserialize)]
struct WikiSearchResponse {
    #[serde(default)]
    query: WikiSearchQuery,
}

#[derive(Debug, Default, Deserialize)]
struct WikiSearchQuery {
    #[serde(default)]
    search: Vec<WikiSearchHit>,
}

#[derive(Debug, Deserialize)]
struct WikiSearchHit {
    title: String,
}

#[derive(Debug, Deserialize)]
struct WikiPagesResponse {
    #[serde(default)]
    query: WikiPagesQuery,
}

#[derive(Debug, Default, Deserialize)]
struct WikiPagesQuery {
    #[serde(default)]
    pages: Vec<WikiPage>,
}

#[derive(Debug, Deserialize)]
struct WikiPage {
    title: String,
    #[serde(default)]
    extract: String,
    #[serde(default)]
    fullurl: Option<String>,
}

/// Look up Wikipedia articles through the MediaWiki API.
pub struct WikiSearch {
    http: HttpFetcher,
    endpoint: String,
    max_docs: usize,
}

impl WikiSearch {
    pub fn new(http: HttpFetcher, max_docs: usize) -> Self {
        Self::with_endpoint(http, WIKIPEDIA_API_URL, max_docs)
    }

    pub fn with_endpoint(http: HttpFetcher, endpoint: impl Into<String>, max_docs: usize) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            max_docs,
        }
    }

    async fn api_get<T: serde::de::DeserializeOwned>(&self, params: &[(&str, &str)]) -> Result<T> {
        let response = self
            .http
            .client()
            .get(&self.endpoint)
            .query(params)
            .send()
            .await
            .map_err(|e| FerretError::tool(format!("Wikipedia request failed: {}", e)))?;
        check_status(&self.endpoint, &response)?;
        Ok(response.json().await?)
    }

    async fn search_titles(&self, query: &str) -> Result<Vec<String>> {
        let limit = self.max_docs.to_string();
        let response: WikiSearchResponse = self
            .api_get(&[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", query),
                ("srlimit", limit.as_str()),
                ("format", "json"),
                ("formatversion", "2"),
            ])
            .await?;

        Ok(response.query.search.into_iter().map(|hit| hit.title).collect())
    }

    async fn fetch_page(&self, title: &str) -> Result<Option<Document>> {
        let response: WikiPagesResponse = self
            .api_get(&[
                ("action", "query"),
                ("prop", "extracts|info"),
                ("inprop", "url"),
                ("explaintext", "1"),
                ("redirects", "1"),
                ("titles", title),
                ("format", "json"),
                ("formatversion", "2"),
            ])
            .await?;

        let page = response
            .query
            .pages
            .into_iter()
            .find(|page| !page.extract.trim().is_empty());

        Ok(page.map(|page| {
            let source = page.fullurl.unwrap_or_else(|| {
                format!("https://en.wikipedia.org/wiki/{}", page.title.replace(' ', "_"))
            });
            Document::new(source, page.extract).truncated(WIKI_MAX_CHARS)
        }))
    }
}

#[async_trait]
impl Tool for WikiSearch {
    fn kind(&self) -> ToolKind {
        ToolKind::WikiSearch
    }

    fn description(&self) -> &str {
        "Search Wikipedia and return the text of the best matching articles."
    }

    fn parameters_schema(&self) -> Value {
        query_schema("Article title or keywords")
    }

    #[instrument(skip_all, fields(tool = "wiki_search"))]
    async fn invoke(&self, args: &Value) -> Result<String> {
        let query = required_str(args, "query")?;

        let mut docs = Vec::new();
        for title in self.search_titles(query).await? {
            if let Some(doc) = self.fetch_page(&title).await? {
                docs.push(doc);
            }
        }
        debug!(query, results = docs.len(), "Wikipedia search finished");

        Ok(format_documents(query, &docs))
    }

    fn failure_message(&self, err: &FerretError) -> String {
        format!("Error searching Wikipedia: {}", err.detail())
    }
}

/// Search Arxiv through its Atom API.
pub struct ArxivSearch {
    http: HttpFetcher,
    endpoint: String,
    max_docs: usize,
    max_chars: usize,
}

impl ArxivSearch {
    pub fn new(http: HttpFetcher, max_docs: usize, max_chars: usize) -> Self {
        Self::with_endpoint(http, ARXIV_API_URL, max_docs, max_chars)
    }

    pub fn with_endpoint(
        http: HttpFetcher,
        endpoint: impl Into<String>,
        max_docs: usize,
        max_chars: usize,
    ) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            max_docs,
            max_chars,
        }
    }

    fn parse_feed(&self, xml: &str) -> Vec<Document> {
        static ENTRY: OnceLock<Regex> = OnceLock::new();
        let entry = regex(&ENTRY, r"(?s)<entry>(.*?)</entry>");

        entry
            .captures_iter(xml)
            .take(self.max_docs)
            .map(|caps| {
                let body = &caps[1];
                let title = xml_field(body, "title").unwrap_or_default();
                let published = xml_field(body, "published").unwrap_or_default();
                let summary = xml_field(body, "summary").unwrap_or_default();
                let authors = xml_authors(body).join(", ");
                let source = xml_field(body, "id").unwrap_or_default();

                let content = format!(
                    "Title: {}\nAuthors: {}\nPublished: {}\n\n{}",
                    title, authors, published, summary
                );
                Document::new(source, content).truncated(self.max_chars)
            })
            .collect()
    }
}

/// Atom entry elements read by `xml_field`
const ENTRY_FIELDS: [&str; 4] = ["id", "title", "published", "summary"];

fn xml_field(body: &str, tag: &str) -> Option<String> {
    static FIELDS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    let fields = FIELDS.get_or_init(|| {
        ENTRY_FIELDS
            .iter()
            .map(|tag| (*tag, compile(&format!(r"(?s)<{tag}[^>]*>(.*?)</{tag}>"))))
            .collect()
    });

    let (_, re) = fields.iter().find(|(name, _)| *name == tag)?;
    re.captures(body).map(|c| clean_html(&c[1]))
}

fn xml_authors(body: &str) -> Vec<String> {
    static NAME: OnceLock<Regex> = OnceLock::new();
    regex(&NAME, r"(?s)<author>\s*<name>(.*?)</name>")
        .captures_iter(body)
        .map(|c| clean_html(&c[1]))
        .collect()
}

#[async_trait]
impl Tool for ArxivSearch {
    fn kind(&self) -> ToolKind {
        ToolKind::ArxivSearch
    }

    fn description(&self) -> &str {
        "Search Arxiv for scientific papers. Returns title, authors, date and abstract."
    }

    fn parameters_schema(&self) -> Value {
        query_schema("Paper title, topic or author")
    }

    #[instrument(skip_all, fields(tool = "arxiv_search"))]
    async fn invoke(&self, args: &Value) -> Result<String> {
        let query = required_str(args, "query")?;
        let url = format!(
            "{}?search_query=all:{}&start=0&max_results={}",
            self.endpoint,
            urlencoding::encode(query),
            self.max_docs
        );

        let xml = self.http.get_text(&url).await?;
        let docs = self.parse_feed(&xml);
        debug!(query, results = docs.len(), "Arxiv search finished");

        Ok(format_documents(query, &docs))
    }

    fn failure_message(&self, err: &FerretError) -> String {
        format!("Error searching Arxiv: {}", err.detail())
    }
}
