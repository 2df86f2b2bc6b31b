/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public historian adapter crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod api;
pub mod auth;
pub mod history;
pub mod types;
pub mod ws;

// Re-export the API seam
pub use api::{HistoricalDataApi, MockHistoricalDataApi};

// Re-export commonly used types from auth
pub use auth::{ConnectOptions, Credentials, SessionData, SessionManager};

// Re-export commonly used types from history
pub use history::{CompareOp, Field, FilterExpr, Operand, RawHistoryContext};

// Re-export all types
pub use types::*;

// Re-export commonly used types from ws
pub use ws::{ClientConfig, ClientEvent, HistorianClient, HistorianError, Result};
