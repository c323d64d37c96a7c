pub mod engine;
pub mod handler;
pub mod processor;

pub use crate::domain::model::{
    AggregateValue, CalculatedProperties, FormattedProperties, QueriedResults, RawRow, Record,
};
pub use crate::domain::ports::NotionApi;
pub use crate::utils::error::Result;
