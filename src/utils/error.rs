use thiserror::Error;

#[derive(Error, Debug)]
pub enum RollupError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("Notion API returned {status} ({code}): {message}")]
    RemoteError {
        status: u16,
        code: String,
        message: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unknown processor type: {processor_type}")]
    UnknownProcessorError { processor_type: String },

    #[error("Unknown handler type: {handler_type}")]
    UnknownHandlerError { handler_type: String },

    #[error("Property {property} not found in the database.")]
    SchemaError { property: String },

    #[error("Missing key: {key}")]
    MissingKeyError { key: String },

    #[error("Empty result: {message}")]
    EmptyResultError { message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

pub type Result<T> = std::result::Result<T, RollupError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Schema,
    EmptyResult,
    Remote,
    Processing,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// 對應的行程結束碼，失敗一律非零
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

impl RollupError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            RollupError::ConfigError { .. }
            | RollupError::MissingConfigError { .. }
            | RollupError::InvalidConfigValueError { .. }
            | RollupError::UnknownProcessorError { .. }
            | RollupError::UnknownHandlerError { .. } => ErrorCategory::Configuration,
            RollupError::SchemaError { .. } | RollupError::MissingKeyError { .. } => {
                ErrorCategory::Schema
            }
            RollupError::EmptyResultError { .. } => ErrorCategory::EmptyResult,
            RollupError::ApiError(_) | RollupError::RemoteError { .. } => ErrorCategory::Remote,
            RollupError::ProcessingError { .. } | RollupError::SerializationError(_) => {
                ErrorCategory::Processing
            }
            RollupError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Remote => ErrorSeverity::Medium,
            ErrorCategory::System => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            RollupError::ApiError(_) => {
                "Check the network connection and the Notion API base URL".to_string()
            }
            RollupError::RemoteError { status: 401, .. } => {
                "Check that the integration token is valid".to_string()
            }
            RollupError::RemoteError { status: 404, .. } => {
                "Check the database id and that the database is shared with the integration"
                    .to_string()
            }
            RollupError::RemoteError { status: 429, .. } => {
                "Rate limited by Notion, wait a moment and run again".to_string()
            }
            RollupError::RemoteError { .. } => {
                "Inspect the Notion error message and the request payload".to_string()
            }
            RollupError::UnknownProcessorError { .. } => format!(
                "Use one of the registered processor types: {}",
                crate::core::processor::ProcessorFactory::available_processors().join(", ")
            ),
            RollupError::UnknownHandlerError { .. } => format!(
                "Use one of the named handlers: {}",
                crate::core::handler::HandlerFactory::available_handlers().join(", ")
            ),
            RollupError::ConfigError { .. }
            | RollupError::MissingConfigError { .. }
            | RollupError::InvalidConfigValueError { .. } => {
                "Fix the configuration file and run again".to_string()
            }
            RollupError::SchemaError { property } => format!(
                "Make sure the column '{}' exists in the database (names are case sensitive)",
                property
            ),
            RollupError::MissingKeyError { key } => {
                format!("Make sure '{}' is part of the queried properties", key)
            }
            RollupError::EmptyResultError { .. } => {
                "Check filter.target, it must match at least one page".to_string()
            }
            RollupError::ProcessingError { .. } | RollupError::SerializationError(_) => {
                "Check that the column values match the processor type".to_string()
            }
            RollupError::IoError(_) => "Check file paths and permissions".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Invalid configuration: {}", self),
            ErrorCategory::Schema => format!("Database schema mismatch: {}", self),
            ErrorCategory::EmptyResult => "The target page is not found.".to_string(),
            ErrorCategory::Remote => format!("Notion API call failed: {}", self),
            ErrorCategory::Processing => format!("Could not aggregate the rows: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }
}
