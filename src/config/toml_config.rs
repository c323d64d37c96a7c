use crate::core::handler::{HandlerFactory, ProcessorConfigSpec};
use crate::utils::error::{Result, RollupError};
use crate::utils::validation::{
    validate_non_empty_string, validate_range, validate_resolved, validate_url, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

pub const DEFAULT_BASE_URL: &str = "https://api.notion.com/v1";
pub const DEFAULT_NOTION_VERSION: &str = "2022-06-28";
pub const DEFAULT_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub notion: NotionSettings,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub target_props: Vec<String>,
    pub handler_type: Option<String>,
    pub processor_config: Option<ProcessorConfigSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotionSettings {
    pub token: String,
    pub database_id: String,
    pub base_url: Option<String>,
    pub version: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub page_size: Option<u32>,
}

/// Notion filter 物件，原樣放進 query body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    pub all: Option<Value>,
    pub target: Option<Value>,
}

impl NotionSettings {
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }

    pub fn version(&self) -> &str {
        self.version.as_deref().unwrap_or(DEFAULT_NOTION_VERSION)
    }

    pub fn page_size(&self) -> u32 {
        self.page_size.unwrap_or(DEFAULT_PAGE_SIZE)
    }
}

impl RunConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(RollupError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| RollupError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${NOTION_TOKEN})，未設定的保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| RollupError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validate_non_empty_string("notion.token", &self.notion.token)?;
        validate_resolved("notion.token", &self.notion.token)?;
        validate_non_empty_string("notion.database_id", &self.notion.database_id)?;
        validate_resolved("notion.database_id", &self.notion.database_id)?;
        validate_url("notion.base_url", self.notion.base_url())?;
        validate_range("notion.page_size", self.notion.page_size(), 1, 100)?;

        if let Some(timeout) = self.notion.timeout_seconds {
            validate_range("notion.timeout_seconds", timeout, 1, 600)?;
        }

        // 沒有目標 filter 會更新整個資料庫
        if self.filter.target.is_none() {
            return Err(RollupError::MissingConfigError {
                field: "filter.target".to_string(),
            });
        }

        for (field, filter) in [("filter.all", &self.filter.all), ("filter.target", &self.filter.target)] {
            if let Some(filter) = filter {
                if !filter.is_object() {
                    return Err(RollupError::InvalidConfigValueError {
                        field: field.to_string(),
                        value: filter.to_string(),
                        reason: "Filter must be a table".to_string(),
                    });
                }
            }
        }

        // 建一次 handler，讓處理器設定錯誤在任何網路呼叫前就出現
        HandlerFactory::from_run_config(self)?;

        Ok(())
    }

    /// 查詢來源列時需要的欄位：target_props 加上 handler 用到的欄位
    pub fn query_properties(&self, handler_props: &[String]) -> Vec<String> {
        let mut props = self.target_props.clone();
        for prop in handler_props {
            if !props.contains(prop) {
                props.push(prop.clone());
            }
        }
        props
    }
}

impl Validate for RunConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
