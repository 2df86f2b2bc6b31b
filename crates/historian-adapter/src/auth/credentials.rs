/*
[INPUT]:  Username and password supplied by the caller
[OUTPUT]: Credentials and connect options for `connect_ws`
[POS]:    Auth layer - credential types
[UPDATE]: When adding authentication methods
*/

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::AuthenticateRequest;

/// Username/password pair. The password never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.username.is_empty()
    }

    pub(crate) fn to_request(&self) -> AuthenticateRequest {
        AuthenticateRequest {
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Options for [`crate::HistorianClient::connect_ws`].
///
/// With `authenticate` set, the credentials are used once to authenticate the
/// session and are not sent again. Without it, they are attached to every
/// request instead.
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    pub credentials: Option<Credentials>,
    pub authenticate: bool,
}

impl ConnectOptions {
    pub fn new(username: impl Into<String>, password: impl Into<String>, authenticate: bool) -> Self {
        let credentials = Credentials::new(username, password);
        Self {
            credentials: (!credentials.is_empty()).then_some(credentials),
            authenticate,
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}
