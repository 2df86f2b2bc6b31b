/*
[INPUT]:  Write batches and raw history queries
[OUTPUT]: Typed API responses from any historian backend
[POS]:    API abstraction - seam between callers and the WebSocket client
[UPDATE]: When adding operations callers depend on
*/

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::history::RawHistoryContext;
use crate::types::{
    ApiResponse, Identity, ItemValue, RawHistoricalDataResponse, ReadRawHistoricalDataOptions,
    ReadRawHistoricalDataRequest, WriteResponse,
};
use crate::ws::Result;

/// Operations of a historical data API.
///
/// Implemented by [`crate::HistorianClient`]; implement it for a test double to
/// drive callers without a server.
#[async_trait]
pub trait HistoricalDataApi: Send + Sync {
    /// Write all values in a single request.
    async fn write(&self, items: &[ItemValue]) -> Result<WriteResponse>;

    /// Read unaggregated values of `items` in `[start_time, end_time]`.
    async fn read_raw_historical_data(
        &self,
        items: &[Identity],
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        options: ReadRawHistoricalDataOptions,
    ) -> Result<RawHistoricalDataResponse>;

    /// Read raw history through a filter context.
    async fn read_raw_historical_data_filtered(
        &self,
        context: &RawHistoryContext,
        items: &[Identity],
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        options: ReadRawHistoricalDataOptions,
    ) -> Result<RawHistoricalDataResponse> {
        context
            .read_raw_historical_data(self, items, start_time, end_time, options)
            .await
    }

    /// Close the session.
    async fn disconnect(&self) -> Result<()>;
}

/// In-memory API for testing.
///
/// Writes are echoed back unless a write response is configured. Raw
/// responses are served in order; the last one keeps being returned.
#[derive(Debug, Default)]
pub struct MockHistoricalDataApi {
    writes: Mutex<Vec<Vec<ItemValue>>>,
    raw_reads: Mutex<Vec<ReadRawHistoricalDataRequest>>,
    write_response: Mutex<Option<WriteResponse>>,
    raw_responses: Mutex<VecDeque<RawHistoricalDataResponse>>,
    disconnected: AtomicBool,
}

impl MockHistoricalDataApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_write_response(&self, response: WriteResponse) {
        *self.write_response.lock().unwrap() = Some(response);
    }

    /// Replace the queued raw responses with a single one.
    pub fn set_raw_response(&self, response: RawHistoricalDataResponse) {
        let mut queue = self.raw_responses.lock().unwrap();
        queue.clear();
        queue.push_back(response);
    }

    pub fn push_raw_response(&self, response: RawHistoricalDataResponse) {
        self.raw_responses.lock().unwrap().push_back(response);
    }

    pub fn writes(&self) -> Vec<Vec<ItemValue>> {
        self.writes.lock().unwrap().clone()
    }

    pub fn raw_reads(&self) -> Vec<ReadRawHistoricalDataRequest> {
        self.raw_reads.lock().unwrap().clone()
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HistoricalDataApi for MockHistoricalDataApi {
    async fn write(&self, items: &[ItemValue]) -> Result<WriteResponse> {
        self.writes.lock().unwrap().push(items.to_vec());
        let configured = self.write_response.lock().unwrap().clone();
        Ok(configured.unwrap_or_else(|| ApiResponse {
            data: Some(items.to_vec()),
            error: None,
        }))
    }

    async fn read_raw_historical_data(
        &self,
        items: &[Identity],
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        options: ReadRawHistoricalDataOptions,
    ) -> Result<RawHistoricalDataResponse> {
        self.raw_reads
            .lock()
            .unwrap()
            .push(ReadRawHistoricalDataRequest::new(items, start_time, end_time, &options));

        let mut queue = self.raw_responses.lock().unwrap();
        let response = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        Ok(response.unwrap_or_default())
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnected.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ApiError, Quality};
    use chrono::TimeZone;

    #[tokio::test]
    async fn mock_echoes_writes() {
        let api = MockHistoricalDataApi::new();
        let timestamp = Utc.with_ymd_and_hms(2018, 1, 1, 0, 0, 0).unwrap();
        let items = vec![ItemValue::new("/a", 10, Quality::GOOD, timestamp)];

        let response = api.write(&items).await.unwrap();
        assert_eq!(response.data, Some(items.clone()));
        assert_eq!(api.writes(), vec![items]);
    }

    #[tokio::test]
    async fn mock_serves_queued_raw_responses_then_repeats_last() {
        let api = MockHistoricalDataApi::new();
        api.push_raw_response(RawHistoricalDataResponse {
            error: Some(vec![ApiError {
                code: 1,
                message: "first".to_string(),
            }]),
            ..Default::default()
        });
        api.push_raw_response(RawHistoricalDataResponse::default());

        let start = Utc.with_ymd_and_hms(2018, 1, 1, 0, 0, 0).unwrap();
        let items = [Identity::new("/a")];
        let options = ReadRawHistoricalDataOptions::default;

        let first = api
            .read_raw_historical_data(&items, start, start, options())
            .await
            .unwrap();
        assert_eq!(first.first_error_message(), Some("first"));

        for _ in 0..2 {
            let next = api
                .read_raw_historical_data(&items, start, start, options())
                .await
                .unwrap();
            assert!(next.error.is_none());
        }
        assert_eq!(api.raw_reads().len(), 3);
    }

    #[tokio::test]
    async fn mock_records_disconnect() {
        let api = MockHistoricalDataApi::new();
        assert!(!api.is_disconnected());
        api.disconnect().await.unwrap();
        assert!(api.is_disconnected());
    }
}
