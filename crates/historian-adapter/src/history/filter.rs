/*
[INPUT]:  Filter predicates over raw history rows (path, value, quality, timestamp)
[OUTPUT]: Serializable filter expression tree with local evaluation
[POS]:    History layer - server-side filter definition and client-side re-check
[UPDATE]: When adding filter fields or operators
*/

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::RawHistoricalDataItemValue;
use crate::types::models::serde_helpers::{format_timestamp, millis_to_timestamp};
use crate::types::models::{DisplayValue, value_as_f64};

/// Row attribute a filter can look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Path,
    /// The value converted to a double.
    Value,
    Quality,
    QualityText,
    Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
        }
    }
}

/// Boolean expression over raw history rows.
///
/// Sent to the server as a JSON tree (`{"op": "or", "args": [...]}`) and
/// evaluated locally with [`FilterExpr::matches`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FilterExpr {
    And { args: Vec<FilterExpr> },
    Or { args: Vec<FilterExpr> },
    Not { arg: Box<FilterExpr> },
    Compare { field: Field, cmp: CompareOp, value: Value },
    StartsWith { field: Field, value: String },
    EndsWith { field: Field, value: String },
}

impl Field {
    pub fn compare(self, cmp: CompareOp, operand: impl Into<Operand>) -> FilterExpr {
        FilterExpr::Compare {
            field: self,
            cmp,
            value: operand.into().0,
        }
    }

    pub fn is(self, operand: impl Into<Operand>) -> FilterExpr {
        self.compare(CompareOp::Eq, operand)
    }

    pub fn is_not(self, operand: impl Into<Operand>) -> FilterExpr {
        self.compare(CompareOp::Ne, operand)
    }

    pub fn gt(self, operand: impl Into<Operand>) -> FilterExpr {
        self.compare(CompareOp::Gt, operand)
    }

    pub fn ge(self, operand: impl Into<Operand>) -> FilterExpr {
        self.compare(CompareOp::Ge, operand)
    }

    pub fn lt(self, operand: impl Into<Operand>) -> FilterExpr {
        self.compare(CompareOp::Lt, operand)
    }

    pub fn le(self, operand: impl Into<Operand>) -> FilterExpr {
        self.compare(CompareOp::Le, operand)
    }

    /// Exclusive range: `low < field < high`.
    pub fn between(self, low: impl Into<Operand>, high: impl Into<Operand>) -> FilterExpr {
        self.gt(low).and(self.lt(high))
    }

    pub fn starts_with(self, prefix: impl Into<String>) -> FilterExpr {
        FilterExpr::StartsWith {
            field: self,
            value: prefix.into(),
        }
    }

    pub fn ends_with(self, suffix: impl Into<String>) -> FilterExpr {
        FilterExpr::EndsWith {
            field: self,
            value: suffix.into(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Field::Path => "path",
            Field::Value => "value",
            Field::Quality => "quality",
            Field::QualityText => "quality_text",
            Field::Timestamp => "timestamp",
        }
    }
}

/// Right-hand side of a comparison, kept as the JSON it is sent as.
#[derive(Debug, Clone, PartialEq)]
pub struct Operand(Value);

impl From<f64> for Operand {
    fn from(value: f64) -> Self {
        Operand(Value::from(value))
    }
}

impl From<i64> for Operand {
    fn from(value: i64) -> Self {
        Operand(Value::from(value))
    }
}

impl From<i32> for Operand {
    fn from(value: i32) -> Self {
        Operand(Value::from(value))
    }
}

impl From<u32> for Operand {
    fn from(value: u32) -> Self {
        Operand(Value::from(value))
    }
}

impl From<&str> for Operand {
    fn from(value: &str) -> Self {
        Operand(Value::from(value))
    }
}

impl From<String> for Operand {
    fn from(value: String) -> Self {
        Operand(Value::from(value))
    }
}

impl From<DateTime<Utc>> for Operand {
    fn from(value: DateTime<Utc>) -> Self {
        Operand(Value::from(format_timestamp(&value)))
    }
}

impl FilterExpr {
    pub fn and(self, other: FilterExpr) -> FilterExpr {
        match self {
            FilterExpr::And { mut args } => {
                args.push(other);
                FilterExpr::And { args }
            }
            expr => FilterExpr::And {
                args: vec![expr, other],
            },
        }
    }

    pub fn or(self, other: FilterExpr) -> FilterExpr {
        match self {
            FilterExpr::Or { mut args } => {
                args.push(other);
                FilterExpr::Or { args }
            }
            expr => FilterExpr::Or {
                args: vec![expr, other],
            },
        }
    }

    pub fn negate(self) -> FilterExpr {
        FilterExpr::Not {
            arg: Box::new(self),
        }
    }

    /// Evaluate the expression against one row.
    pub fn matches(&self, row: &RawHistoricalDataItemValue<'_>) -> bool {
        match self {
            FilterExpr::And { args } => args.iter().all(|arg| arg.matches(row)),
            FilterExpr::Or { args } => args.iter().any(|arg| arg.matches(row)),
            FilterExpr::Not { arg } => !arg.matches(row),
            FilterExpr::Compare { field, cmp, value } => compare_field(row, *field, value)
                .is_some_and(|ordering| cmp.accepts(ordering)),
            FilterExpr::StartsWith { field, value } => {
                text_field(row, *field).is_some_and(|text| text.starts_with(value.as_str()))
            }
            FilterExpr::EndsWith { field, value } => {
                text_field(row, *field).is_some_and(|text| text.ends_with(value.as_str()))
            }
        }
    }
}

impl std::ops::Not for FilterExpr {
    type Output = FilterExpr;

    fn not(self) -> Self::Output {
        self.negate()
    }
}

fn text_field(row: &RawHistoricalDataItemValue<'_>, field: Field) -> Option<String> {
    match field {
        Field::Path => Some(row.path.to_string()),
        Field::QualityText => Some(row.quality_text().to_string()),
        Field::Value => Some(DisplayValue(row.value).to_string()),
        Field::Quality => Some(row.quality.0.to_string()),
        Field::Timestamp => Some(format_timestamp(&row.timestamp)),
    }
}

/// `None` when the row and operand cannot be compared; such rows never match.
fn compare_field(
    row: &RawHistoricalDataItemValue<'_>,
    field: Field,
    operand: &Value,
) -> Option<Ordering> {
    match field {
        Field::Path | Field::QualityText => {
            let text = text_field(row, field)?;
            Some(text.as_str().cmp(operand.as_str()?))
        }
        Field::Value => match (row.value_as_f64(), value_as_f64(operand)) {
            (Some(lhs), Some(rhs)) => lhs.partial_cmp(&rhs),
            _ => {
                let rhs = operand.as_str()?;
                Some(DisplayValue(row.value).to_string().as_str().cmp(rhs))
            }
        },
        Field::Quality => {
            let rhs = operand.as_u64()?;
            Some(u64::from(row.quality.0).cmp(&rhs))
        }
        Field::Timestamp => {
            let rhs = operand_timestamp(operand)?;
            Some(row.timestamp.cmp(&rhs))
        }
    }
}

fn operand_timestamp(operand: &Value) -> Option<DateTime<Utc>> {
    if let Some(raw) = operand.as_str() {
        return DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|parsed| parsed.with_timezone(&Utc));
    }
    millis_to_timestamp(operand.as_i64()?)
}

impl fmt::Display for FilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterExpr::And { args } => write_joined(f, args, " && "),
            FilterExpr::Or { args } => write_joined(f, args, " || "),
            FilterExpr::Not { arg } => write!(f, "!({arg})"),
            FilterExpr::Compare { field, cmp, value } => {
                write!(f, "{} {} {}", field.name(), cmp.symbol(), value)
            }
            FilterExpr::StartsWith { field, value } => {
                write!(f, "{}.starts_with({:?})", field.name(), value)
            }
            FilterExpr::EndsWith { field, value } => {
                write!(f, "{}.ends_with({:?})", field.name(), value)
            }
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, args: &[FilterExpr], separator: &str) -> fmt::Result {
    f.write_str("(")?;
    for (index, arg) in args.iter().enumerate() {
        if index > 0 {
            f.write_str(separator)?;
        }
        write!(f, "{arg}")?;
    }
    f.write_str(")")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Quality;
    use chrono::TimeZone;
    use rstest::rstest;
    use serde_json::json;

    fn row<'a>(path: &'a str, value: &'a Value, quality: Quality, second: u32) -> RawHistoricalDataItemValue<'a> {
        RawHistoricalDataItemValue {
            path,
            value,
            quality,
            timestamp: Utc.with_ymd_and_hms(2018, 1, 1, 0, 0, second).unwrap(),
            duration_ms: None,
        }
    }

    fn demo_filter() -> FilterExpr {
        let start = Utc.with_ymd_and_hms(2018, 1, 1, 0, 0, 0).unwrap();
        Field::Path
            .ends_with("Item100")
            .and(Field::Value.between(10, 41))
            .or(Field::Path.is("/Demo/DC666").and(Field::Value.between(40, 61)))
            .or(Field::QualityText.is("Bad"))
            .or(Field::Timestamp.is(start))
    }

    #[rstest]
    #[case("/Demo/Item100", json!(20), Quality::GOOD, 3, true)]
    #[case("/Demo/Item100", json!(10), Quality::GOOD, 3, false)]
    #[case("/Demo/Item100", json!(41), Quality::GOOD, 3, false)]
    #[case("/Demo/DC666", json!(50), Quality::GOOD, 5, true)]
    #[case("/Demo/DC666", json!(30), Quality::GOOD, 3, false)]
    #[case("/Demo/DC4711", json!(50), Quality::GOOD, 5, false)]
    #[case("/Demo/DC4711", json!(50), Quality::BAD, 5, true)]
    #[case("/Demo/DC4711", json!(0), Quality::GOOD, 0, true)]
    #[case("/Demo/DC4711", json!("n/a"), Quality::GOOD, 4, false)]
    fn demo_filter_cases(
        #[case] path: &str,
        #[case] value: Value,
        #[case] quality: Quality,
        #[case] second: u32,
        #[case] expected: bool,
    ) {
        let filter = demo_filter();
        assert_eq!(filter.matches(&row(path, &value, quality, second)), expected);
    }

    #[test]
    fn chained_or_stays_flat() {
        match demo_filter() {
            FilterExpr::Or { args } => assert_eq!(args.len(), 4),
            other => panic!("expected flat or, got {other:?}"),
        }
    }

    #[test]
    fn serializes_to_tagged_tree() {
        let filter = Field::Value.gt(10).and(!Field::Path.starts_with("/tmp"));
        assert_eq!(
            serde_json::to_value(&filter).unwrap(),
            json!({
                "op": "and",
                "args": [
                    {"op": "compare", "field": "value", "cmp": "gt", "value": 10},
                    {"op": "not", "arg": {"op": "starts_with", "field": "path", "value": "/tmp"}}
                ]
            })
        );

        let back: FilterExpr = serde_json::from_value(serde_json::to_value(&filter).unwrap()).unwrap();
        assert_eq!(back, filter);
    }

    #[test]
    fn display_is_readable() {
        let filter = Field::Value.between(10, 41).or(Field::QualityText.is("Bad"));
        assert_eq!(
            filter.to_string(),
            "((value > 10 && value < 41) || quality_text == \"Bad\")"
        );
    }

    #[test]
    fn string_value_compares_as_text_when_not_numeric() {
        let value = json!("open");
        let current = row("/a", &value, Quality::GOOD, 1);
        assert!(Field::Value.is("open").matches(&current));
        assert!(!Field::Value.gt(1).matches(&current));
    }

    #[test]
    fn quality_code_comparison() {
        let value = json!(1);
        let current = row("/a", &value, Quality::UNCERTAIN, 1);
        assert!(Field::Quality.ge(0x4000_0000u32).matches(&current));
        assert!(Field::QualityText.is("Uncertain").matches(&current));
    }
}
