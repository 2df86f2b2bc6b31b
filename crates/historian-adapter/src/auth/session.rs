/*
[INPUT]:  Authentication results and credentials kept for per-request auth
[OUTPUT]: Session lookup and authentication status
[POS]:    Auth layer - session lifecycle management
[UPDATE]: When adding session refresh or changing storage strategy
*/

use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock};

use super::Credentials;

/// Stored session data with metadata
#[derive(Debug, Clone)]
pub struct SessionData {
    pub username: String,
    pub session_id: Option<String>,
    pub authenticated_at: DateTime<Utc>,
}

/// Thread-safe session manager shared between the client and its IO task
#[derive(Debug, Clone, Default)]
pub struct SessionManager {
    data: Arc<RwLock<Option<SessionData>>>,
    request_credentials: Arc<RwLock<Option<Credentials>>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful authentication
    pub fn set_session(&self, username: String, session_id: Option<String>) {
        let session = SessionData {
            username,
            session_id,
            authenticated_at: Utc::now(),
        };

        let mut guard = self.data.write().unwrap();
        *guard = Some(session);
    }

    pub fn session(&self) -> Option<SessionData> {
        let guard = self.data.read().unwrap();
        guard.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        let guard = self.data.read().unwrap();
        guard.is_some()
    }

    /// Credentials attached to each request when the session is not authenticated
    pub fn set_request_credentials(&self, credentials: Option<Credentials>) {
        let mut guard = self.request_credentials.write().unwrap();
        *guard = credentials;
    }

    pub fn request_credentials(&self) -> Option<Credentials> {
        if self.is_authenticated() {
            return None;
        }
        let guard = self.request_credentials.read().unwrap();
        guard.clone()
    }

    /// Forget the session and any stored credentials
    pub fn clear(&self) {
        *self.data.write().unwrap() = None;
        *self.request_credentials.write().unwrap() = None;
    }
}
