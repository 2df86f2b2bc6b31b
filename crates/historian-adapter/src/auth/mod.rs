/*
[INPUT]:  Username/password credentials and connect options
[OUTPUT]: Authenticated session state and per-request credentials
[POS]:    Auth layer - handles historian session authentication
[UPDATE]: When auth flow or credential handling changes
*/

pub mod credentials;
pub mod session;

pub use credentials::{ConnectOptions, Credentials};
pub use session::{SessionData, SessionManager};
