use crate::utils::error::{Result, RollupError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

/// 以字串為 key 的動態屬性集合。
///
/// 讀取不存在的 key 一律回傳 [`RollupError::MissingKeyError`]，不會補預設值；
/// 需要自動補值時請改用 [`DefaultRecord`]。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    data: HashMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Result<&Value> {
        self.data.get(key).ok_or_else(|| RollupError::MissingKeyError {
            key: key.to_string(),
        })
    }

    /// 巢狀物件以 `Record` 形式取出
    pub fn get_record(&self, key: &str) -> Result<Record> {
        match self.get(key)? {
            Value::Object(map) => Ok(Record::from(map.clone())),
            other => Err(RollupError::ProcessingError {
                message: format!("'{}' is not a mapping: {}", key, other),
            }),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.data.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Result<Value> {
        self.data.remove(key).ok_or_else(|| RollupError::MissingKeyError {
            key: key.to_string(),
        })
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self {
            data: map.into_iter().collect(),
        }
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            data: iter.into_iter().collect(),
        }
    }
}

/// 第一次讀取缺少的 key 時，會先寫入預設值再回傳。
#[derive(Debug, Clone)]
pub struct DefaultRecord {
    record: Record,
    default: fn() -> Value,
}

impl DefaultRecord {
    pub fn new(default: fn() -> Value) -> Self {
        Self {
            record: Record::new(),
            default,
        }
    }

    pub fn get_or_insert(&mut self, key: &str) -> &mut Value {
        let default = self.default;
        self.record
            .data
            .entry(key.to_string())
            .or_insert_with(default)
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn into_record(self) -> Record {
        self.record
    }
}

/// 查詢結果：page id -> 該列被選取的欄位值，保留查詢時的順序。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueriedResults {
    rows: Vec<(String, Record)>,
}

impl QueriedResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// 相同 id 會覆蓋原本的資料，但保留原位置
    pub fn insert(&mut self, id: impl Into<String>, record: Record) {
        let id = id.into();
        match self.rows.iter_mut().find(|(existing, _)| *existing == id) {
            Some((_, slot)) => *slot = record,
            None => self.rows.push((id, record)),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.rows
            .iter()
            .find(|(existing, _)| existing == id)
            .map(|(_, record)| record)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Record)> {
        self.rows.iter().map(|(id, record)| (id.as_str(), record))
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.rows.iter().map(|(_, record)| record)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Record)> for QueriedResults {
    fn from_iter<I: IntoIterator<Item = (K, Record)>>(iter: I) -> Self {
        let mut results = QueriedResults::new();
        for (id, record) in iter {
            results.insert(id, record);
        }
        results
    }
}

/// Notion 回傳的 page，屬性仍是 `{type, <type>: value}` 的包裝格式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    pub id: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AggregateValue {
    Number(Decimal),
    Count(u64),
    Text(String),
    Names(Vec<String>),
}

impl AggregateValue {
    pub fn kind(&self) -> &'static str {
        match self {
            AggregateValue::Number(_) => "number",
            AggregateValue::Count(_) => "count",
            AggregateValue::Text(_) => "text",
            AggregateValue::Names(_) => "names",
        }
    }
}

pub type CalculatedProperties = BTreeMap<String, AggregateValue>;

/// 直接送往 Notion 的 `properties` payload
pub type FormattedProperties = Map<String, Value>;

/// 沿用舊版的真假值判斷：null、false、0、空字串、空陣列、空物件皆為假
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// 欄位值的文字形式。字串原樣輸出，清單與物件使用舊版部署的呈現方式
/// (`['A', 'B']`、`{'name': 'Foo'}`)，以維持輸出一致。
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => repr_value(other),
    }
}

fn repr_value(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() => repr_float(f),
            _ => n.to_string(),
        },
        Value::String(s) => quote(s),
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(repr_value).collect();
            format!("[{}]", inner.join(", "))
        }
        Value::Object(map) => {
            let inner: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", quote(k), repr_value(v)))
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
    }
}

/// 浮點數的舊版呈現：指數介於 -4 與 15 之間用小數點形式並至少保留 `.0`，
/// 其餘用帶正負號、至少兩位數的指數 (`1e+16`、`1.5e-07`)
fn repr_float(f: f64) -> String {
    let scientific = format!("{:e}", f);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<i32>().unwrap_or(0)),
        None => return scientific,
    };

    if (-4..16).contains(&exponent) {
        let mut fixed = f.to_string();
        if !fixed.contains('.') {
            fixed.push_str(".0");
        }
        return fixed;
    }

    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{}e{}{:02}", mantissa, sign, exponent.abs())
}

fn quote(s: &str) -> String {
    if s.contains('\'') && !s.contains('"') {
        return format!("\"{}\"", s.replace('\\', "\\\\"));
    }
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_missing_key_is_an_error() {
        let mut record = Record::new();
        record.insert("price", json!(10));

        assert_eq!(record.get("price").unwrap(), &json!(10));
        assert!(matches!(
            record.get("quantity"),
            Err(RollupError::MissingKeyError { key }) if key == "quantity"
        ));
        assert!(record.remove("quantity").is_err());
        assert_eq!(record.remove("price").unwrap(), json!(10));
        assert!(record.is_empty());
    }

    #[test]
    fn test_record_nested_mapping() {
        let record: Record = [(
            "status".to_string(),
            json!({"type": "select", "select": {"name": "Foo"}}),
        )]
        .into_iter()
        .collect();

        let status = record.get_record("status").unwrap();
        assert_eq!(status.get("type").unwrap(), &json!("select"));
        assert_eq!(
            status.get_record("select").unwrap().get("name").unwrap(),
            &json!("Foo")
        );
        assert!(status.get_record("type").is_err());
    }

    #[test]
    fn test_default_record_inserts_on_first_miss() {
        let mut record = DefaultRecord::new(|| json!([]));
        assert!(!record.record().contains_key("tags"));

        if let Value::Array(items) = record.get_or_insert("tags") {
            items.push(json!("a"));
        }
        assert_eq!(record.get_or_insert("tags"), &json!(["a"]));
        assert_eq!(record.into_record().len(), 1);
    }

    #[test]
    fn test_queried_results_keep_insertion_order() {
        let mut results = QueriedResults::new();
        results.insert("c", Record::new());
        results.insert("a", Record::new());
        results.insert("b", Record::new());

        let mut replacement = Record::new();
        replacement.insert("x", json!(1));
        results.insert("a", replacement);

        let ids: Vec<&str> = results.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
        assert_eq!(results.get("a").unwrap().get("x").unwrap(), &json!(1));
    }

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(0.0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!([])));
        assert!(!is_truthy(&json!({})));
        assert!(is_truthy(&json!(" ")));
        assert!(is_truthy(&json!(-1)));
        assert!(is_truthy(&json!([null])));
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(&json!("plain")), "plain");
        assert_eq!(display_value(&json!(3)), "3");
        assert_eq!(display_value(&json!(2.5)), "2.5");
        assert_eq!(display_value(&json!(true)), "True");
        assert_eq!(display_value(&json!(["A", "B"])), "['A', 'B']");
        assert_eq!(display_value(&json!([1, null, false])), "[1, None, False]");
        assert_eq!(display_value(&json!({"name": "Foo"})), "{'name': 'Foo'}");
        assert_eq!(display_value(&json!(["it's"])), "[\"it's\"]");
    }

    #[test]
    fn test_display_value_keeps_wire_key_order() {
        let row: RawRow = serde_json::from_value(json!({
            "id": "p",
            "properties": {
                "s": {"type": "select", "select": {"id": "x", "name": "Foo", "color": "red"}}
            }
        }))
        .unwrap();

        assert_eq!(
            display_value(&row.properties["s"]["select"]),
            "{'id': 'x', 'name': 'Foo', 'color': 'red'}"
        );
    }

    #[test]
    fn test_display_value_float_forms() {
        assert_eq!(display_value(&json!(1e16)), "1e+16");
        assert_eq!(display_value(&json!(1e20)), "1e+20");
        assert_eq!(display_value(&json!(1.5e-7)), "1.5e-07");
        assert_eq!(display_value(&json!(0.00001)), "1e-05");
        assert_eq!(display_value(&json!(0.0001)), "0.0001");
        assert_eq!(display_value(&json!(1e15)), "1000000000000000.0");
        assert_eq!(display_value(&json!(123.0)), "123.0");
        assert_eq!(display_value(&json!(-0.5)), "-0.5");
        assert_eq!(display_value(&json!([1e16, 7])), "[1e+16, 7]");
    }
}
