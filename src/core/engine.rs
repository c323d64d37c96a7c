use crate::adapters::notion::{extract_properties, fetch_ids};
use crate::config::toml_config::RunConfig;
use crate::core::handler::HandlerFactory;
use crate::domain::model::FormattedProperties;
use crate::domain::ports::NotionApi;
use crate::utils::error::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub source_rows: usize,
    pub target_page_ids: Vec<String>,
    pub properties: FormattedProperties,
    pub dry_run: bool,
}

/// 一次完整的執行：讀來源列、聚合、讀目標列、寫回。寫入永遠是最後一步。
pub struct RollupEngine<A: NotionApi> {
    api: A,
    config: RunConfig,
    dry_run: bool,
}

impl<A: NotionApi> RollupEngine<A> {
    pub fn new(api: A, config: RunConfig) -> Self {
        Self {
            api,
            config,
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub async fn run(&self) -> Result<RunSummary> {
        // 先建 handler，設定錯誤不會觸發任何 API 呼叫
        let handler = HandlerFactory::from_run_config(&self.config)?;
        let query_props = self.config.query_properties(&handler.target_properties());

        tracing::info!("Querying source rows...");
        let source_rows = self.api.query_rows(self.config.filter.all.as_ref()).await?;
        tracing::info!("Fetched {} source rows", source_rows.len());

        let queried_results = extract_properties(&source_rows, &query_props)?;
        let properties = handler.process_data(&queried_results)?;
        tracing::info!("Calculated properties: {}", serde_json::to_string(&properties)?);

        tracing::info!("Querying target rows...");
        let target_rows = self
            .api
            .query_rows(self.config.filter.target.as_ref())
            .await?;
        let target_page_ids = fetch_ids(&target_rows)?;

        if self.dry_run {
            tracing::info!(
                "Dry run, skipping update of {} pages",
                target_page_ids.len()
            );
        } else {
            tracing::info!("Updating {} target pages...", target_page_ids.len());
            self.api.update_rows(&properties, &target_page_ids).await?;
        }

        Ok(RunSummary {
            source_rows: source_rows.len(),
            target_page_ids,
            properties,
            dry_run: self.dry_run,
        })
    }
}
