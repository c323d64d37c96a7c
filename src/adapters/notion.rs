use crate::config::toml_config::NotionSettings;
use crate::domain::model::{FormattedProperties, QueriedResults, RawRow, Record};
use crate::domain::ports::NotionApi;
use crate::utils::error::{Result, RollupError};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct QueryResponse {
    results: Vec<RawRow>,
    #[serde(default)]
    has_more: bool,
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// Notion REST API 的精簡客戶端，只涵蓋查詢資料庫與更新 page
#[derive(Debug, Clone)]
pub struct NotionClient {
    client: Client,
    base_url: String,
    database_id: String,
    token: String,
    version: String,
    page_size: u32,
}

impl NotionClient {
    pub fn new(settings: &NotionSettings) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = settings.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(timeout));
        }

        let client = builder.build().map_err(|e| {
            tracing::error!("Failed to initialize the Notion client: {}", e);
            RollupError::ApiError(e)
        })?;

        Ok(Self {
            client,
            base_url: settings.base_url().to_string(),
            database_id: settings.database_id.clone(),
            token: settings.token.clone(),
            version: settings.version().to_string(),
            page_size: settings.page_size(),
        })
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Notion-Version", &self.version)
    }

    async fn send_json(&self, request: RequestBuilder, operation: &str) -> Result<Value> {
        let response = request.send().await.map_err(|e| {
            tracing::error!("{} failed: {}", operation, e);
            RollupError::ApiError(e)
        })?;

        let status = response.status();
        tracing::debug!("{} responded with {}", operation, status);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let (code, message) = match serde_json::from_str::<ErrorBody>(&body) {
                Ok(error) => (error.code, error.message),
                Err(_) => ("unknown".to_string(), body),
            };
            tracing::error!("{} failed with {} ({}): {}", operation, status, code, message);
            return Err(RollupError::RemoteError {
                status: status.as_u16(),
                code,
                message,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl NotionApi for NotionClient {
    async fn query_rows(&self, filter: Option<&Value>) -> Result<Vec<RawRow>> {
        let url = format!("{}/databases/{}/query", self.base_url, self.database_id);
        let mut rows = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut body = json!({ "page_size": self.page_size });
            if let Some(filter) = filter {
                body["filter"] = filter.clone();
            }
            if let Some(cursor) = &cursor {
                body["start_cursor"] = json!(cursor);
            }

            let response = self
                .send_json(self.request(Method::POST, &url).json(&body), "Query database")
                .await?;
            let page: QueryResponse = serde_json::from_value(response)?;
            rows.extend(page.results);

            match (page.has_more, page.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        tracing::debug!("Queried {} pages from database {}", rows.len(), self.database_id);
        Ok(rows)
    }

    async fn update_page(&self, page_id: &str, properties: &FormattedProperties) -> Result<()> {
        let url = format!("{}/pages/{}", self.base_url, page_id);
        let body = json!({ "properties": properties });

        self.send_json(
            self.request(Method::PATCH, &url).json(&body),
            &format!("Update page {}", page_id),
        )
        .await?;
        Ok(())
    }
}

/// 取出每列指定欄位的值，拆掉 `{type, <type>: value}` 外層
pub fn extract_properties(rows: &[RawRow], names: &[String]) -> Result<QueriedResults> {
    let mut queried_results = QueriedResults::new();

    for row in rows {
        let mut record = Record::new();

        for prop in names {
            let envelope = row
                .properties
                .get(prop)
                .ok_or_else(|| RollupError::SchemaError {
                    property: prop.clone(),
                })?;

            let prop_type = envelope
                .get("type")
                .and_then(Value::as_str)
                .ok_or_else(|| RollupError::ProcessingError {
                    message: format!("Property {} of page {} has no type tag", prop, row.id),
                })?;

            let value = envelope
                .get(prop_type)
                .cloned()
                .ok_or_else(|| RollupError::ProcessingError {
                    message: format!(
                        "Property {} of page {} has no '{}' value",
                        prop, row.id, prop_type
                    ),
                })?;

            record.insert(prop.clone(), value);
        }

        queried_results.insert(row.id.clone(), record);
    }

    Ok(queried_results)
}

pub fn fetch_ids(rows: &[RawRow]) -> Result<Vec<String>> {
    if rows.is_empty() {
        return Err(RollupError::EmptyResultError {
            message: "The target page is not found.".to_string(),
        });
    }
    Ok(rows.iter().map(|row| row.id.clone()).collect())
}
