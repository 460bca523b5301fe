use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Value};
use tracing::debug;

use notion_sync_core::config::SyncConfig;
use notion_sync_core::error::{SyncError, SyncResult};
use notion_sync_core::remote::{RemoteClient, RemoteDocument, RemoteMeta};

use crate::rate_limit::RateLimiter;
use crate::retry::RetryPolicy;

const NOTION_BASE_URL: &str = "https://api.notion.com/v1";
const NOTION_VERSION: &str = "2022-06-28";
/// Notion rejects rich-text fragments longer than 2000 characters
const BLOCK_TEXT_LIMIT: usize = 2000;
const CHILDREN_PAGE_SIZE: u32 = 100;

/// Notion API client.
///
/// Every request passes through the shared rate limiter and the retry policy,
/// so callers (the reconciliation engine) never see 429s for well-behaved
/// workloads and transient failures are absorbed up to the configured attempt
/// count.
pub struct NotionClient {
    client: Client,
    base_url: String,
    token: String,
    parent_page_id: Option<String>,
    limiter: RateLimiter,
    retry: RetryPolicy,
}

// Helper function to convert reqwest errors to SyncError
fn handle_reqwest_error(err: reqwest::Error) -> SyncError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        SyncError::transient(err.to_string())
    } else {
        SyncError::remote(err.to_string())
    }
}

fn classify_status(status: StatusCode, detail: &str) -> SyncError {
    match status.as_u16() {
        401 | 403 => SyncError::auth(format!("Notion rejected credentials ({status}): {detail}")),
        429 => SyncError::transient(format!("Rate limited by Notion: {detail}")),
        500..=599 => SyncError::transient(format!("Notion server error ({status}): {detail}")),
        _ => SyncError::remote(format!("Notion request failed ({status}): {detail}")),
    }
}

impl NotionClient {
    /// Create a client using the configured rate limit and retry policy
    pub fn new(token: impl Into<String>, config: &SyncConfig) -> SyncResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(handle_reqwest_error)?;

        Ok(Self {
            client,
            base_url: NOTION_BASE_URL.to_string(),
            token: token.into(),
            parent_page_id: None,
            limiter: RateLimiter::new(config.rate_limit),
            retry: RetryPolicy::new(config.retry_attempts, config.retry_delay()),
        })
    }

    /// Parent page under which `create` places new pages
    pub fn with_parent_page(mut self, page_id: impl Into<String>) -> Self {
        self.parent_page_id = Some(page_id.into());
        self
    }

    /// Override the API base URL (integration tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the retry policy (integration tests)
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Issue one rate-limited request. Returns `Ok(None)` on 404 so callers
    /// can distinguish "page gone" from a failure.
    async fn send_once(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> SyncResult<Option<Value>> {
        self.limiter.acquire().await;

        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "notion api request");

        let mut request = self
            .client
            .request(method, &url)
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(handle_reqwest_error)?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let detail = response
                .json::<Value>()
                .await
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
                .unwrap_or_default();
            return Err(classify_status(status, &detail));
        }

        let value = response
            .json()
            .await
            .map_err(|e| SyncError::Serialization(format!("Invalid Notion response: {e}")))?;
        Ok(Some(value))
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> SyncResult<Option<Value>> {
        self.retry
            .run(path, || self.send_once(method.clone(), path, body.as_ref()))
            .await
    }

    async fn child_block_ids(&self, remote_id: &str) -> SyncResult<Vec<String>> {
        let mut ids = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let chunk = self.children_page(remote_id, cursor.as_deref()).await?;
            if let Some(results) = chunk["results"].as_array() {
                for block in results {
                    if let Some(id) = block["id"].as_str() {
                        ids.push(id.to_string());
                    }
                }
            }
            if chunk["has_more"].as_bool().unwrap_or(false) {
                cursor = chunk["next_cursor"].as_str().map(String::from);
                if cursor.is_none() {
                    break;
                }
            } else {
                break;
            }
        }
        Ok(ids)
    }

    async fn children_page(
        &self,
        remote_id: &str,
        cursor: Option<&str>,
    ) -> SyncResult<Value> {
        let mut path =
            format!("/blocks/{remote_id}/children?page_size={CHILDREN_PAGE_SIZE}");
        if let Some(cursor) = cursor {
            path.push_str(&format!("&start_cursor={cursor}"));
        }
        let chunk = self.request(Method::GET, &path, None).await?;
        require(chunk, "block children")
    }

    fn title_property(title: &str) -> Value {
        json!({
            "title": {
                "title": [{ "type": "text", "text": { "content": title } }]
            }
        })
    }
}

fn require(value: Option<Value>, what: &str) -> SyncResult<Value> {
    value.ok_or_else(|| SyncError::remote(format!("{what} not found")))
}

fn parse_meta(page: &Value) -> SyncResult<RemoteMeta> {
    let id = page["id"]
        .as_str()
        .ok_or_else(|| SyncError::remote("Page response missing id"))?
        .to_string();
    let etag = page["last_edited_time"]
        .as_str()
        .ok_or_else(|| SyncError::remote("Page response missing last_edited_time"))?
        .to_string();
    let last_edited = DateTime::parse_from_rfc3339(&etag)
        .map_err(|e| SyncError::remote(format!("Invalid last_edited_time: {e}")))?
        .with_timezone(&Utc);
    Ok(RemoteMeta { id, etag, last_edited })
}

fn page_title(page: &Value) -> String {
    page["properties"]["title"]["title"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p["plain_text"].as_str())
                .collect::<Vec<_>>()
                .join("")
        })
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Untitled".to_string())
}

fn block_text(block: &Value) -> Option<String> {
    let rich_text = block["paragraph"]["rich_text"].as_array()?;
    let text: String = rich_text
        .iter()
        .filter_map(|rt| {
            rt["plain_text"]
                .as_str()
                .or_else(|| rt["text"]["content"].as_str())
        })
        .collect();
    Some(text)
}

fn paragraph_blocks(body: &str) -> Vec<Value> {
    body.lines()
        .flat_map(chunk_line)
        .map(|text| {
            json!({
                "object": "block",
                "type": "paragraph",
                "paragraph": {
                    "rich_text": [{ "type": "text", "text": { "content": text } }]
                }
            })
        })
        .collect()
}

/// Split one line into fragments within Notion's rich-text length limit,
/// respecting character boundaries
fn chunk_line(line: &str) -> Vec<String> {
    if line.len() <= BLOCK_TEXT_LIMIT {
        return vec![line.to_string()];
    }
    let mut chunks = Vec::new();
    let mut current = String::new();
    for ch in line.chars() {
        if current.len() + ch.len_utf8() > BLOCK_TEXT_LIMIT {
            chunks.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[async_trait]
impl RemoteClient for NotionClient {
    async fn fetch_meta(&self, remote_id: &str) -> SyncResult<Option<RemoteMeta>> {
        let page = self
            .request(Method::GET, &format!("/pages/{remote_id}"), None)
            .await?;
        match page {
            None => Ok(None),
            Some(page) if page["archived"].as_bool().unwrap_or(false) => Ok(None),
            Some(page) => parse_meta(&page).map(Some),
        }
    }

    async fn download(&self, remote_id: &str) -> SyncResult<RemoteDocument> {
        let page = require(
            self.request(Method::GET, &format!("/pages/{remote_id}"), None)
                .await?,
            "page",
        )?;
        let title = page_title(&page);

        let mut lines = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let chunk = self.children_page(remote_id, cursor.as_deref()).await?;
            if let Some(results) = chunk["results"].as_array() {
                for block in results {
                    if let Some(text) = block_text(block) {
                        lines.push(text);
                    }
                }
            }
            if chunk["has_more"].as_bool().unwrap_or(false) {
                cursor = chunk["next_cursor"].as_str().map(String::from);
                if cursor.is_none() {
                    break;
                }
            } else {
                break;
            }
        }

        Ok(RemoteDocument { title, body: lines.join("\n") })
    }

    async fn create(&self, doc: &RemoteDocument) -> SyncResult<RemoteMeta> {
        let parent = self.parent_page_id.as_ref().ok_or_else(|| {
            SyncError::config("No parent page configured for remote page creation")
        })?;
        let body = json!({
            "parent": { "page_id": parent },
            "properties": Self::title_property(&doc.title),
            "children": paragraph_blocks(&doc.body),
        });
        let page = require(
            self.request(Method::POST, "/pages", Some(body)).await?,
            "created page",
        )?;
        parse_meta(&page)
    }

    async fn update(&self, remote_id: &str, doc: &RemoteDocument) -> SyncResult<RemoteMeta> {
        let patch = json!({ "properties": Self::title_property(&doc.title) });
        require(
            self.request(Method::PATCH, &format!("/pages/{remote_id}"), Some(patch))
                .await?,
            "page",
        )?;

        // Content update replaces the page body wholesale: remove existing
        // blocks, then append the new ones.
        for child_id in self.child_block_ids(remote_id).await? {
            self.request(Method::DELETE, &format!("/blocks/{child_id}"), None)
                .await?;
        }
        let append = json!({ "children": paragraph_blocks(&doc.body) });
        require(
            self.request(
                Method::PATCH,
                &format!("/blocks/{remote_id}/children"),
                Some(append),
            )
            .await?,
            "appended blocks",
        )?;

        let page = require(
            self.request(Method::GET, &format!("/pages/{remote_id}"), None)
                .await?,
            "page",
        )?;
        parse_meta(&page)
    }

    async fn delete(&self, remote_id: &str) -> SyncResult<()> {
        let archived = json!({ "archived": true });
        // A 404 here means the page is already gone; treat as success.
        self.request(Method::PATCH, &format!("/pages/{remote_id}"), Some(archived))
            .await?;
        Ok(())
    }
}
