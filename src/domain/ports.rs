use crate::domain::model::{FormattedProperties, RawRow};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait NotionApi: Send + Sync {
    /// 回傳符合 filter 的所有 page (分頁已攤平)
    async fn query_rows(&self, filter: Option<&Value>) -> Result<Vec<RawRow>>;

    async fn update_page(&self, page_id: &str, properties: &FormattedProperties) -> Result<()>;

    /// 同一份 payload 依序寫入每個 page，任何一筆失敗就中止
    async fn update_rows(
        &self,
        properties: &FormattedProperties,
        page_ids: &[String],
    ) -> Result<()> {
        for (index, page_id) in page_ids.iter().enumerate() {
            tracing::debug!("Updating page {}/{}: {}", index + 1, page_ids.len(), page_id);
            if let Err(e) = self.update_page(page_id, properties).await {
                tracing::error!(
                    "Failed to update page {} ({} of {}): {}",
                    page_id,
                    index + 1,
                    page_ids.len(),
                    e
                );
                return Err(e);
            }
        }
        Ok(())
    }
}
