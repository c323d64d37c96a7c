use crate::config::toml_config::RunConfig;
use crate::core::processor::{ProcessorFactory, ProcessorOptions, PropertyProcessor};
use crate::domain::model::{FormattedProperties, QueriedResults};
use crate::utils::error::{Result, RollupError};
use crate::utils::validation::{validate_non_empty_list, validate_non_empty_string, Validate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 單一處理器的設定，例如
/// `{ type = "concat", properties = ["authors"], options = { separator = "; " } }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    #[serde(rename = "type")]
    pub processor_type: String,
    pub properties: Vec<String>,
    #[serde(default, skip_serializing_if = "ProcessorOptions::is_empty")]
    pub options: ProcessorOptions,
}

impl ProcessorConfig {
    pub fn new<S: AsRef<str>>(processor_type: &str, properties: &[S]) -> Self {
        Self {
            processor_type: processor_type.to_string(),
            properties: properties.iter().map(|p| p.as_ref().to_string()).collect(),
            options: ProcessorOptions::new(),
        }
    }

    pub fn with_option(mut self, key: &str, value: Value) -> Self {
        self.options.insert(key.to_string(), value);
        self
    }
}

impl Validate for ProcessorConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("processor_config.type", &self.processor_type)?;
        validate_non_empty_list("processor_config.properties", &self.properties)
    }
}

/// `processor_config` 可以是單一設定或設定清單
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProcessorConfigSpec {
    Many(Vec<ProcessorConfig>),
    Single(ProcessorConfig),
}

pub trait PropertyHandler: Send + Sync + std::fmt::Debug {
    fn process_data(&self, queried_results: &QueriedResults) -> Result<FormattedProperties>;

    /// 處理時需要查詢的欄位
    fn target_properties(&self) -> Vec<String>;
}

#[derive(Debug)]
pub struct DatabaseHandler {
    target_properties: Vec<String>,
    processor: Box<dyn PropertyProcessor>,
}

impl DatabaseHandler {
    pub fn new(config: &ProcessorConfig) -> Result<Self> {
        config.validate()?;
        let processor = ProcessorFactory::create_processor(&config.processor_type, &config.options)?;

        Ok(Self {
            target_properties: config.properties.clone(),
            processor,
        })
    }

    pub fn processor_type(&self) -> &'static str {
        self.processor.processor_type()
    }
}

impl PropertyHandler for DatabaseHandler {
    fn process_data(&self, queried_results: &QueriedResults) -> Result<FormattedProperties> {
        let calculated = self
            .processor
            .calculate_properties(queried_results, &self.target_properties)?;
        tracing::debug!(
            "{} calculated over {} rows: {:?}",
            self.processor_type(),
            queried_results.len(),
            calculated
        );
        self.processor.format_for_notion(&calculated)
    }

    fn target_properties(&self) -> Vec<String> {
        self.target_properties.clone()
    }
}

/// 依序執行多個處理器並合併結果，同名欄位以後面的為準
#[derive(Debug)]
pub struct MultiProcessorHandler {
    handlers: Vec<DatabaseHandler>,
}

impl MultiProcessorHandler {
    pub fn new(configs: &[ProcessorConfig]) -> Result<Self> {
        if configs.is_empty() {
            return Err(RollupError::ConfigError {
                message: "processor_config list is empty".to_string(),
            });
        }

        let handlers = configs
            .iter()
            .map(DatabaseHandler::new)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { handlers })
    }
}

impl PropertyHandler for MultiProcessorHandler {
    fn process_data(&self, queried_results: &QueriedResults) -> Result<FormattedProperties> {
        let mut merged = FormattedProperties::new();

        for handler in &self.handlers {
            let results = handler.process_data(queried_results)?;
            for (prop_name, value) in results {
                if merged.insert(prop_name.clone(), value).is_some() {
                    tracing::debug!(
                        "'{}' overwritten by {} processor",
                        prop_name,
                        handler.processor_type()
                    );
                }
            }
        }

        Ok(merged)
    }

    fn target_properties(&self) -> Vec<String> {
        let mut props: Vec<String> = Vec::new();
        for prop in self.handlers.iter().flat_map(|h| h.target_properties.iter()) {
            if !props.contains(prop) {
                props.push(prop.clone());
            }
        }
        props
    }
}

struct Preset {
    name: &'static str,
    processor_type: &'static str,
    properties: &'static [&'static str],
    separator: Option<&'static str>,
}

const PRESETS: &[Preset] = &[
    // 電腦組裝清單：價格與預算分配加總
    Preset {
        name: "pc_build",
        processor_type: "sum",
        properties: &["价格", "预算分配"],
        separator: None,
    },
    Preset {
        name: "inventory",
        processor_type: "sum",
        properties: &["quantity", "total_value"],
        separator: None,
    },
    Preset {
        name: "project",
        processor_type: "count",
        properties: &["tasks", "completed_tasks"],
        separator: None,
    },
    Preset {
        name: "research",
        processor_type: "concat",
        properties: &["authors"],
        separator: Some("; "),
    },
];

impl Preset {
    fn to_config(&self) -> ProcessorConfig {
        let config = ProcessorConfig::new(self.processor_type, self.properties);
        match self.separator {
            Some(separator) => config.with_option("separator", Value::from(separator)),
            None => config,
        }
    }
}

pub struct HandlerFactory;

impl HandlerFactory {
    /// 具名預設 handler
    pub fn preset_config(handler_type: &str) -> Result<ProcessorConfig> {
        PRESETS
            .iter()
            .find(|preset| preset.name == handler_type)
            .map(Preset::to_config)
            .ok_or_else(|| RollupError::UnknownHandlerError {
                handler_type: handler_type.to_string(),
            })
    }

    pub fn create_handler(handler_type: &str) -> Result<DatabaseHandler> {
        DatabaseHandler::new(&Self::preset_config(handler_type)?)
    }

    pub fn create_custom_handler(config: &ProcessorConfig) -> Result<DatabaseHandler> {
        DatabaseHandler::new(config)
    }

    pub fn create_multi_handler(configs: &[ProcessorConfig]) -> Result<MultiProcessorHandler> {
        MultiProcessorHandler::new(configs)
    }

    pub fn available_handlers() -> Vec<&'static str> {
        PRESETS.iter().map(|preset| preset.name).collect()
    }

    /// 依優先順序擇一：具名 handler、設定清單、單一設定、對 target_props 加總
    pub fn resolve(
        handler_type: Option<&str>,
        processor_config: Option<&ProcessorConfigSpec>,
        target_props: &[String],
    ) -> Result<Box<dyn PropertyHandler>> {
        if let Some(handler_type) = handler_type {
            if processor_config.is_some() {
                tracing::warn!(
                    "handler_type '{}' is set, processor_config is ignored",
                    handler_type
                );
            }
            tracing::info!("Using named handler '{}'", handler_type);
            return Ok(Box::new(Self::create_handler(handler_type)?));
        }

        match processor_config {
            Some(ProcessorConfigSpec::Many(configs)) => {
                tracing::info!("Using {} chained processors", configs.len());
                Ok(Box::new(Self::create_multi_handler(configs)?))
            }
            Some(ProcessorConfigSpec::Single(config)) => {
                tracing::info!("Using '{}' processor", config.processor_type);
                Ok(Box::new(Self::create_custom_handler(config)?))
            }
            None => {
                tracing::info!("No handler configured, summing target_props");
                let config = ProcessorConfig::new("sum", target_props);
                Ok(Box::new(Self::create_custom_handler(&config)?))
            }
        }
    }

    pub fn from_run_config(config: &RunConfig) -> Result<Box<dyn PropertyHandler>> {
        Self::resolve(
            config.handler_type.as_deref(),
            config.processor_config.as_ref(),
            &config.target_props,
        )
    }
}
