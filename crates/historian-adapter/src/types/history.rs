/*
[INPUT]:  Columnar raw history payloads (p / v / q / t arrays per item)
[OUTPUT]: Raw historical data model with lazy row iterators
[POS]:    Data layer - raw history result types
[UPDATE]: When the raw history payload layout or iteration semantics change
*/

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::models::serde_helpers::{self, format_timestamp, millis_to_timestamp};
use super::models::{DisplayValue, ItemValue, Quality, value_as_f64};

/// Result of a raw history read: one entry per query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawHistoricalData {
    #[serde(default)]
    pub query_data: Vec<RawHistoricalDataQueryData>,
}

impl RawHistoricalData {
    pub fn query_data_iter(&self) -> std::slice::Iter<'_, RawHistoricalDataQueryData> {
        self.query_data.iter()
    }

    /// All rows of all items of all queries, in payload order.
    pub fn item_values(&self) -> impl Iterator<Item = RawHistoricalDataItemValue<'_>> + '_ {
        self.query_data
            .iter()
            .flat_map(RawHistoricalDataQueryData::items_iter)
            .flat_map(RawHistoricalDataItemData::item_value_iter)
    }

    pub fn value_count(&self) -> usize {
        self.query_data
            .iter()
            .flat_map(RawHistoricalDataQueryData::items_iter)
            .map(RawHistoricalDataItemData::row_count)
            .sum()
    }

    /// Summed duration over every item with the given path across all queries.
    pub fn summarize_duration_for(&self, path: &str) -> Option<i64> {
        self.query_data
            .iter()
            .flat_map(RawHistoricalDataQueryData::items_iter)
            .filter(|item| item.path == path)
            .filter_map(RawHistoricalDataItemData::summarize_duration)
            .reduce(i64::saturating_add)
    }

    pub fn retain_values<F>(&mut self, mut keep: F)
    where
        F: FnMut(&RawHistoricalDataItemValue<'_>) -> bool,
    {
        for query in &mut self.query_data {
            for item in &mut query.items {
                item.retain(&mut keep);
            }
        }
    }
}

/// Items returned for one queried time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawHistoricalDataQueryData {
    #[serde(with = "serde_helpers::timestamp")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "serde_helpers::timestamp")]
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub items: Vec<RawHistoricalDataItemData>,
}

impl RawHistoricalDataQueryData {
    pub fn items_iter(&self) -> std::slice::Iter<'_, RawHistoricalDataItemData> {
        self.items.iter()
    }
}

/// Columnar values of one item. Rows are only materialized on iteration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawHistoricalDataItemData {
    #[serde(rename = "p")]
    pub path: String,
    #[serde(rename = "v", default)]
    pub values: Vec<Value>,
    #[serde(rename = "q", default, skip_serializing_if = "Vec::is_empty")]
    pub qualities: Vec<Quality>,
    /// Epoch milliseconds.
    #[serde(rename = "t", default)]
    pub timestamps: Vec<i64>,
}

impl RawHistoricalDataItemData {
    /// Number of complete rows. A missing quality column means all-good.
    pub fn row_count(&self) -> usize {
        let rows = self.values.len().min(self.timestamps.len());
        if self.qualities.is_empty() {
            rows
        } else {
            rows.min(self.qualities.len())
        }
    }

    pub fn item_value_iter(&self) -> ItemValueIter<'_> {
        ItemValueIter {
            item: self,
            index: 0,
            rows: self.row_count(),
        }
    }

    /// Sum of the gaps between consecutive timestamps, in milliseconds.
    pub fn summarize_duration(&self) -> Option<i64> {
        if self.row_count() == 0 {
            return None;
        }
        Some(
            self.item_value_iter()
                .filter_map(|value| value.duration_ms)
                .fold(0, i64::saturating_add),
        )
    }

    fn retain<F>(&mut self, keep: &mut F)
    where
        F: FnMut(&RawHistoricalDataItemValue<'_>) -> bool,
    {
        let mask: Vec<bool> = (0..self.row_count())
            .map(|index| self.row(index).map(|value| keep(&value)).unwrap_or(false))
            .collect();

        let has_qualities = !self.qualities.is_empty();
        let mut kept = RawHistoricalDataItemData {
            path: std::mem::take(&mut self.path),
            ..Default::default()
        };
        for (index, keep_row) in mask.into_iter().enumerate() {
            if !keep_row {
                continue;
            }
            kept.values.push(self.values[index].clone());
            kept.timestamps.push(self.timestamps[index]);
            if has_qualities {
                kept.qualities.push(self.qualities[index]);
            }
        }
        *self = kept;
    }

    fn row(&self, index: usize) -> Option<RawHistoricalDataItemValue<'_>> {
        if index >= self.row_count() {
            return None;
        }
        let millis = self.timestamps[index];
        let timestamp = millis_to_timestamp(millis)?;
        let duration_ms = (index + 1 < self.row_count())
            .then(|| self.timestamps[index + 1])
            .filter(|next| millis_to_timestamp(*next).is_some())
            .and_then(|next| next.checked_sub(millis));

        Some(RawHistoricalDataItemValue {
            path: &self.path,
            value: &self.values[index],
            quality: self.qualities.get(index).copied().unwrap_or(Quality::GOOD),
            timestamp,
            duration_ms,
        })
    }
}

/// Lazy row iterator over the columns of one item.
#[derive(Debug, Clone)]
pub struct ItemValueIter<'a> {
    item: &'a RawHistoricalDataItemData,
    index: usize,
    rows: usize,
}

impl<'a> Iterator for ItemValueIter<'a> {
    type Item = RawHistoricalDataItemValue<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.index < self.rows {
            let index = self.index;
            self.index += 1;
            if let Some(row) = self.item.row(index) {
                return Some(row);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.rows - self.index))
    }
}

/// One row of raw history, borrowed from its item.
#[derive(Debug, Clone, PartialEq)]
pub struct RawHistoricalDataItemValue<'a> {
    pub path: &'a str,
    pub value: &'a Value,
    pub quality: Quality,
    pub timestamp: DateTime<Utc>,
    /// Milliseconds until the next row of the same item.
    pub duration_ms: Option<i64>,
}

impl RawHistoricalDataItemValue<'_> {
    pub fn value_as_f64(&self) -> Option<f64> {
        value_as_f64(self.value)
    }

    pub fn quality_text(&self) -> &'static str {
        self.quality.text()
    }

    pub fn to_item_value(&self) -> ItemValue {
        ItemValue::new(self.path, self.value.clone(), self.quality, self.timestamp)
    }
}

impl fmt::Display for RawHistoricalDataItemValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} V:{} Q:{} T:{}",
            self.path,
            DisplayValue(self.value),
            self.quality,
            format_timestamp(&self.timestamp)
        )
    }
}
