/*
[INPUT]:  Filter expression, historian API handle, identities and time window
[OUTPUT]: Raw history response with the filter applied
[POS]:    History layer - filtered raw history reads
[UPDATE]: When changing how filters are sent or re-applied
*/

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::api::HistoricalDataApi;
use crate::history::FilterExpr;
use crate::types::{
    Identity, RawHistoricalDataResponse, ReadRawHistoricalDataOptions,
};
use crate::ws::Result;

/// Holds a filter and issues raw history reads with it.
///
/// The filter travels with the request so the server can apply it; the
/// returned rows are checked again locally, which keeps the result correct
/// against endpoints that do not support filtering.
#[derive(Debug, Clone, Default)]
pub struct RawHistoryContext {
    pending: Option<FilterExpr>,
    filter: Option<FilterExpr>,
}

impl RawHistoryContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition. Repeated calls are combined with `and`.
    pub fn where_(&mut self, expr: FilterExpr) -> &mut Self {
        self.pending = Some(match self.pending.take() {
            Some(existing) => existing.and(expr),
            None => expr,
        });
        self
    }

    /// Activate the conditions collected by [`RawHistoryContext::where_`].
    pub fn set_filter(&mut self) -> &mut Self {
        if let Some(pending) = self.pending.take() {
            self.filter = Some(pending);
        }
        self
    }

    pub fn filter(&self) -> Option<&FilterExpr> {
        self.filter.as_ref()
    }

    pub fn clear_filter(&mut self) {
        self.pending = None;
        self.filter = None;
    }

    /// Read raw history with the active filter.
    ///
    /// A filter already present in `options` is combined with the active one.
    pub async fn read_raw_historical_data<A>(
        &self,
        api: &A,
        items: &[Identity],
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        mut options: ReadRawHistoricalDataOptions,
    ) -> Result<RawHistoricalDataResponse>
    where
        A: HistoricalDataApi + ?Sized,
    {
        if let Some(filter) = &self.filter {
            options.filter = Some(match options.filter.take() {
                Some(existing) => existing.and(filter.clone()),
                None => filter.clone(),
            });
        }
        let effective = options.filter.clone();

        let mut response = api
            .read_raw_historical_data(items, start_time, end_time, options)
            .await?;

        if let (Some(filter), Some(data)) = (effective, response.data.as_mut()) {
            let before = data.value_count();
            data.retain_values(|row| filter.matches(row));
            debug!(
                before,
                after = data.value_count(),
                "raw history filter re-applied"
            );
        }

        Ok(response)
    }
}
