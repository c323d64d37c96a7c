use crate::domain::model::{
    display_value, is_truthy, AggregateValue, CalculatedProperties, FormattedProperties,
    QueriedResults,
};
use crate::utils::error::{Result, RollupError};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::str::FromStr;

/// 各處理器可接受的額外設定 (目前只有 concat 的 `separator`)
pub type ProcessorOptions = Map<String, Value>;

/// 聚合策略：先把多列的欄位值算成單一值，再轉成 Notion 的屬性格式。
pub trait PropertyProcessor: Send + Sync + std::fmt::Debug {
    fn processor_type(&self) -> &'static str;

    fn calculate_properties(
        &self,
        queried_results: &QueriedResults,
        target_props: &[String],
    ) -> Result<CalculatedProperties>;

    fn format_for_notion(&self, calculated: &CalculatedProperties) -> Result<FormattedProperties>;
}

#[derive(Debug, Clone, Default)]
pub struct NumericSumProcessor;

impl NumericSumProcessor {
    fn from_options(options: &ProcessorOptions) -> Result<Box<dyn PropertyProcessor>> {
        reject_options("sum", options)?;
        Ok(Box::new(Self))
    }
}

impl PropertyProcessor for NumericSumProcessor {
    fn processor_type(&self) -> &'static str {
        "sum"
    }

    fn calculate_properties(
        &self,
        queried_results: &QueriedResults,
        target_props: &[String],
    ) -> Result<CalculatedProperties> {
        let mut calculated = CalculatedProperties::new();

        for prop_name in target_props {
            let (total, _) = decimal_total(queried_results, prop_name)?;
            calculated.insert(prop_name.clone(), AggregateValue::Number(total));
        }

        Ok(calculated)
    }

    fn format_for_notion(&self, calculated: &CalculatedProperties) -> Result<FormattedProperties> {
        format_numbers(self.processor_type(), calculated)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NumericAverageProcessor;

impl NumericAverageProcessor {
    fn from_options(options: &ProcessorOptions) -> Result<Box<dyn PropertyProcessor>> {
        reject_options("average", options)?;
        Ok(Box::new(Self))
    }
}

impl PropertyProcessor for NumericAverageProcessor {
    fn processor_type(&self) -> &'static str {
        "average"
    }

    fn calculate_properties(
        &self,
        queried_results: &QueriedResults,
        target_props: &[String],
    ) -> Result<CalculatedProperties> {
        let mut calculated = CalculatedProperties::new();

        for prop_name in target_props {
            let (total, count) = decimal_total(queried_results, prop_name)?;
            let average = if count > 0 {
                total
                    .checked_div(Decimal::from(count))
                    .ok_or_else(|| RollupError::ProcessingError {
                        message: format!("Cannot average '{}': division overflow", prop_name),
                    })?
            } else {
                Decimal::ZERO
            };
            calculated.insert(prop_name.clone(), AggregateValue::Number(average));
        }

        Ok(calculated)
    }

    fn format_for_notion(&self, calculated: &CalculatedProperties) -> Result<FormattedProperties> {
        format_numbers(self.processor_type(), calculated)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CountProcessor;

impl CountProcessor {
    fn from_options(options: &ProcessorOptions) -> Result<Box<dyn PropertyProcessor>> {
        reject_options("count", options)?;
        Ok(Box::new(Self))
    }
}

impl PropertyProcessor for CountProcessor {
    fn processor_type(&self) -> &'static str {
        "count"
    }

    fn calculate_properties(
        &self,
        queried_results: &QueriedResults,
        target_props: &[String],
    ) -> Result<CalculatedProperties> {
        let mut calculated = CalculatedProperties::new();

        for prop_name in target_props {
            let mut count = 0u64;
            for record in queried_results.records() {
                // 0 與 false 仍算一筆
                match record.get(prop_name)? {
                    Value::Null => {}
                    Value::String(s) if s.is_empty() => {}
                    _ => count += 1,
                }
            }
            calculated.insert(prop_name.clone(), AggregateValue::Count(count));
        }

        Ok(calculated)
    }

    fn format_for_notion(&self, calculated: &CalculatedProperties) -> Result<FormattedProperties> {
        let mut formatted = FormattedProperties::new();
        for (prop_name, value) in calculated {
            let count = match value {
                AggregateValue::Count(count) => *count,
                other => return Err(mismatch(self.processor_type(), prop_name, other)),
            };
            formatted.insert(prop_name.clone(), json!({ "number": count }));
        }
        Ok(formatted)
    }
}

#[derive(Debug, Clone)]
pub struct TextConcatenationProcessor {
    separator: String,
}

impl TextConcatenationProcessor {
    pub const DEFAULT_SEPARATOR: &'static str = ", ";

    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
        }
    }

    fn from_options(options: &ProcessorOptions) -> Result<Box<dyn PropertyProcessor>> {
        let mut processor = Self::default();
        for (key, value) in options {
            match (key.as_str(), value) {
                ("separator", Value::String(separator)) => processor.separator = separator.clone(),
                ("separator", other) => {
                    return Err(RollupError::InvalidConfigValueError {
                        field: "options.separator".to_string(),
                        value: other.to_string(),
                        reason: "separator must be a string".to_string(),
                    })
                }
                (unknown, _) => {
                    return Err(RollupError::ConfigError {
                        message: format!("Processor 'concat' does not accept option '{}'", unknown),
                    })
                }
            }
        }
        Ok(Box::new(processor))
    }
}

impl Default for TextConcatenationProcessor {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SEPARATOR)
    }
}

impl PropertyProcessor for TextConcatenationProcessor {
    fn processor_type(&self) -> &'static str {
        "concat"
    }

    fn calculate_properties(
        &self,
        queried_results: &QueriedResults,
        target_props: &[String],
    ) -> Result<CalculatedProperties> {
        let mut calculated = CalculatedProperties::new();

        for prop_name in target_props {
            let mut texts = Vec::new();
            for record in queried_results.records() {
                let value = record.get(prop_name)?;
                if !is_truthy(value) {
                    continue;
                }
                // 清單值整個轉成文字，不會攤平
                let text = display_value(value);
                if !text.trim().is_empty() {
                    texts.push(text);
                }
            }
            calculated.insert(
                prop_name.clone(),
                AggregateValue::Text(texts.join(&self.separator)),
            );
        }

        Ok(calculated)
    }

    fn format_for_notion(&self, calculated: &CalculatedProperties) -> Result<FormattedProperties> {
        let mut formatted = FormattedProperties::new();
        for (prop_name, value) in calculated {
            let text = match value {
                AggregateValue::Text(text) => text,
                other => return Err(mismatch(self.processor_type(), prop_name, other)),
            };
            formatted.insert(
                prop_name.clone(),
                json!({ "rich_text": [{ "text": { "content": text } }] }),
            );
        }
        Ok(formatted)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SelectCollectionProcessor;

impl SelectCollectionProcessor {
    fn from_options(options: &ProcessorOptions) -> Result<Box<dyn PropertyProcessor>> {
        reject_options("collect", options)?;
        Ok(Box::new(Self))
    }
}

impl PropertyProcessor for SelectCollectionProcessor {
    fn processor_type(&self) -> &'static str {
        "collect"
    }

    fn calculate_properties(
        &self,
        queried_results: &QueriedResults,
        target_props: &[String],
    ) -> Result<CalculatedProperties> {
        let mut calculated = CalculatedProperties::new();

        for prop_name in target_props {
            let mut seen = HashSet::new();
            let mut names = Vec::new();
            let mut add = |name: String| {
                if seen.insert(name.clone()) {
                    names.push(name);
                }
            };

            for record in queried_results.records() {
                let value = record.get(prop_name)?;
                if !is_truthy(value) {
                    continue;
                }
                // 名稱一律以文字收集，非字串的 name (例如 7) 會變成 "7"
                match value {
                    // multi_select
                    Value::Array(items) => {
                        for item in items {
                            match item.get("name") {
                                Some(name) => add(display_value(name)),
                                None => add(display_value(item)),
                            }
                        }
                    }
                    // select
                    Value::Object(map) if map.contains_key("name") => {
                        add(display_value(&map["name"]))
                    }
                    other => add(display_value(other)),
                }
            }

            calculated.insert(prop_name.clone(), AggregateValue::Names(names));
        }

        Ok(calculated)
    }

    fn format_for_notion(&self, calculated: &CalculatedProperties) -> Result<FormattedProperties> {
        let mut formatted = FormattedProperties::new();
        for (prop_name, value) in calculated {
            let names = match value {
                AggregateValue::Names(names) => names,
                other => return Err(mismatch(self.processor_type(), prop_name, other)),
            };
            let options: Vec<Value> = names.iter().map(|name| json!({ "name": name })).collect();
            formatted.insert(prop_name.clone(), json!({ "multi_select": options }));
        }
        Ok(formatted)
    }
}

type Constructor = fn(&ProcessorOptions) -> Result<Box<dyn PropertyProcessor>>;

const PROCESSORS: &[(&str, Constructor)] = &[
    ("sum", NumericSumProcessor::from_options),
    ("average", NumericAverageProcessor::from_options),
    ("count", CountProcessor::from_options),
    ("concat", TextConcatenationProcessor::from_options),
    ("collect", SelectCollectionProcessor::from_options),
];

pub struct ProcessorFactory;

impl ProcessorFactory {
    pub fn create_processor(
        processor_type: &str,
        options: &ProcessorOptions,
    ) -> Result<Box<dyn PropertyProcessor>> {
        let (_, constructor) = PROCESSORS
            .iter()
            .find(|(tag, _)| *tag == processor_type)
            .ok_or_else(|| RollupError::UnknownProcessorError {
                processor_type: processor_type.to_string(),
            })?;
        constructor(options)
    }

    pub fn available_processors() -> Vec<&'static str> {
        PROCESSORS.iter().map(|(tag, _)| *tag).collect()
    }
}

fn reject_options(processor_type: &str, options: &ProcessorOptions) -> Result<()> {
    if options.is_empty() {
        return Ok(());
    }
    let keys: Vec<&str> = options.keys().map(String::as_str).collect();
    Err(RollupError::ConfigError {
        message: format!(
            "Processor '{}' does not accept options: {}",
            processor_type,
            keys.join(", ")
        ),
    })
}

/// 非 null 值的十進位總和與筆數
fn decimal_total(queried_results: &QueriedResults, prop_name: &str) -> Result<(Decimal, u64)> {
    let mut total = Decimal::ZERO;
    let mut count = 0u64;

    for record in queried_results.records() {
        let value = record.get(prop_name)?;
        if value.is_null() {
            continue;
        }
        total = total
            .checked_add(to_decimal(prop_name, value)?)
            .ok_or_else(|| RollupError::ProcessingError {
                message: format!("Sum of '{}' overflows", prop_name),
            })?;
        count += 1;
    }

    Ok((total, count))
}

/// 經由文字解析成 Decimal，避免二進位浮點誤差
fn to_decimal(prop_name: &str, value: &Value) -> Result<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        other => {
            return Err(RollupError::ProcessingError {
                message: format!("'{}' value {} is not numeric", prop_name, other),
            })
        }
    };

    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|e| RollupError::ProcessingError {
            message: format!("'{}' value {} is not a decimal: {}", prop_name, text, e),
        })
}

// Decimal -> f64 會損失精度，Notion 的 number 欄位本來就是浮點數
fn format_numbers(
    processor_type: &str,
    calculated: &CalculatedProperties,
) -> Result<FormattedProperties> {
    let mut formatted = FormattedProperties::new();
    for (prop_name, value) in calculated {
        let number = match value {
            AggregateValue::Number(number) => number,
            other => return Err(mismatch(processor_type, prop_name, other)),
        };
        let float = number.to_f64().ok_or_else(|| RollupError::ProcessingError {
            message: format!("'{}' value {} does not fit in a float", prop_name, number),
        })?;
        formatted.insert(prop_name.clone(), json!({ "number": float }));
    }
    Ok(formatted)
}

fn mismatch(processor_type: &str, prop_name: &str, value: &AggregateValue) -> RollupError {
    RollupError::ProcessingError {
        message: format!(
            "Processor '{}' cannot format {} value for '{}'",
            processor_type,
            value.kind(),
            prop_name
        ),
    }
}
