// Copyright Rouven Bauer
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::error::Error as StdError;
use std::fmt::{Display, Formatter};
use std::io;

use thiserror::Error;

use crate::driver::io::bolt::BoltMeta;
use crate::ValueReceive;

pub(crate) type BoxError = Box<dyn StdError + Send + Sync>;

/// The error type of this crate.
///
/// Every error carries a stable machine-readable code (see
/// [`Neo4jError::code`] / [`ServerError::classification`]), a human-readable
/// message, and — for retried operations — the chain of errors observed
/// along the way (see [`crate::retry`]).
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Neo4jError {
    /// A connectivity error: not able to connect, a broken socket, or
    /// failure to fetch routing information.
    #[error("connection failed: {message}")]
    Disconnect {
        message: String,
        source: Option<io::Error>,
        /// Set when the failure happened while committing an auto-commit
        /// transaction: the caller cannot safely assume the write didn't
        /// happen, so this must never be silently rewritten into a
        /// retryable timeout.
        during_commit: bool,
    },
    /// Invalid driver/session/transaction configuration, or an attempt to
    /// send a value the negotiated protocol version cannot carry.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },
    /// The server replied with a Bolt `FAILURE`.
    #[error("{0}")]
    ServerError(ServerError),
    /// A protocol violation: a message or PackStream structure that
    /// doesn't match the negotiated protocol version. Fatal to the
    /// connection it occurred on.
    #[error(
        "the driver encountered a protocol violation, \
        this is likely a bug in the driver or the server: {message}"
    )]
    ProtocolError { message: String },
    /// An operation did not complete within its configured timeout
    /// (acquisition timeout, connection receive timeout).
    #[error("{message}")]
    Timeout { message: String },
    /// A user-supplied callback (address resolver, bookmark manager,
    /// auth manager) returned an error.
    #[error("user callback failed: {error}")]
    UserCallback { error: UserCallbackError },
}

impl Neo4jError {
    /// Stable machine-readable classification, matching the taxonomy kinds
    /// used for retry/routing decisions: `protocol_error`, `authentication`,
    /// `authorization_expired`, `token_expired`, `security`,
    /// `service_unavailable`, `session_expired`, `transient`,
    /// `not_a_leader`, `forbidden_on_readonly`, `routing_failure`,
    /// `acquisition_timeout`, `client_error`.
    pub fn code(&self) -> &str {
        match self {
            Neo4jError::Disconnect { .. } => "service_unavailable",
            Neo4jError::InvalidConfig { .. } => "client_error",
            Neo4jError::ProtocolError { .. } => "protocol_error",
            Neo4jError::Timeout { .. } => "acquisition_timeout",
            Neo4jError::UserCallback { .. } => "client_error",
            Neo4jError::ServerError(err) => err.classification_code(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Neo4jError::ServerError(err) => err.is_retryable(),
            Neo4jError::Disconnect { .. } => true,
            Neo4jError::Timeout { .. } => false,
            Neo4jError::InvalidConfig { .. } => false,
            Neo4jError::ProtocolError { .. } => false,
            Neo4jError::UserCallback { .. } => false,
        }
    }

    /// A transport-level failure while talking to a routing candidate
    /// should not be treated as fatal to the whole rediscovery attempt —
    /// the caller moves on to the next candidate. Anything else (protocol
    /// violation, non-retryable server error) aborts rediscovery outright.
    pub(crate) fn fatal_during_discovery(&self) -> bool {
        !matches!(
            self,
            Neo4jError::Disconnect { .. } | Neo4jError::Timeout { .. }
        )
    }

    /// True for errors that mean the server at `addr` should be dropped
    /// from the routing table's readers and writers (but kept as a
    /// router candidate).
    pub(crate) fn deactivates_server(&self) -> bool {
        match self {
            Neo4jError::Disconnect { .. } => true,
            Neo4jError::ServerError(err) => err.deactivates_server(),
            _ => false,
        }
    }

    /// True for errors that mean the address acted on should be dropped
    /// from the routing table's writers only.
    pub(crate) fn invalidates_writer(&self) -> bool {
        match self {
            Neo4jError::ServerError(err) => err.invalidates_writer(),
            _ => false,
        }
    }

    pub(crate) fn is_security_error(&self) -> bool {
        matches!(self, Neo4jError::ServerError(err) if err.is_security_error())
    }

    pub(crate) fn protocol_error(message: impl Into<String>) -> Self {
        Self::ProtocolError {
            message: message.into(),
        }
    }

    pub(crate) fn connection_acquisition_timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    pub(crate) fn read_err(err: io::Error) -> Self {
        Self::Disconnect {
            message: format!("failed to read: {err}"),
            source: Some(err),
            during_commit: false,
        }
    }

    pub(crate) fn wrap_read<T>(res: io::Result<T>) -> Result<T> {
        res.map_err(Self::read_err)
    }

    pub(crate) fn write_error(err: io::Error) -> Neo4jError {
        Self::Disconnect {
            message: format!("failed to write: {err}"),
            source: Some(err),
            during_commit: false,
        }
    }

    pub(crate) fn wrap_write<T>(res: io::Result<T>) -> Result<T> {
        res.map_err(Self::write_error)
    }

    pub(crate) fn connect_error(err: io::Error) -> Neo4jError {
        Self::Disconnect {
            message: format!("failed to open connection: {err}"),
            source: Some(err),
            during_commit: false,
        }
    }

    pub(crate) fn wrap_connect<T>(res: io::Result<T>) -> Result<T> {
        res.map_err(Self::connect_error)
    }

    pub(crate) fn disconnect<S: Into<String>>(message: S) -> Self {
        Self::Disconnect {
            message: message.into(),
            source: None,
            during_commit: false,
        }
    }

    /// Marks a [`Neo4jError::Disconnect`] as having happened while an
    /// auto-commit transaction's implicit commit was in flight: the outcome
    /// is unknown, so it must not be blindly retried.
    pub(crate) fn failed_commit(mut self) -> Self {
        if let Self::Disconnect { during_commit, .. } = &mut self {
            *during_commit = true;
        }
        self
    }

    pub(crate) fn wrap_commit<T>(res: Result<T>) -> Result<T> {
        res.map_err(Self::failed_commit)
    }
}

/// The server's own Bolt `FAILURE{code, message}`.
#[derive(Debug, Clone)]
pub struct ServerError {
    code: String,
    message: String,
    retryable_override: Option<bool>,
}

const UNKNOWN_CODE: &str = "Neo.DatabaseError.General.UnknownError";
const UNKNOWN_MESSAGE: &str = "An unknown error occurred.";

impl ServerError {
    pub fn new(code: String, message: String) -> Self {
        Self {
            code,
            message,
            retryable_override: None,
        }
    }

    pub fn from_meta(mut meta: BoltMeta) -> Self {
        let code = match meta.remove("code") {
            Some(ValueReceive::String(code)) => code,
            _ => UNKNOWN_CODE.into(),
        };
        let message = match meta.remove("message") {
            Some(ValueReceive::String(message)) => message,
            _ => UNKNOWN_MESSAGE.into(),
        };
        Self {
            code,
            message,
            retryable_override: None,
        }
    }

    /// True for errors that mean every pooled connection authenticated with
    /// the token that produced this error must be considered unauthenticated
    /// (its auth token has to be refreshed before the connection is reused).
    pub(crate) fn unauthenticates_all_connections(&self) -> bool {
        matches!(
            self.classification_code(),
            "authorization_expired" | "token_expired"
        )
    }

    /// True for errors that mean the server at the offending address should
    /// be dropped from the routing table's readers and writers.
    pub(crate) fn deactivates_server(&self) -> bool {
        self.code == "Neo.TransientError.General.DatabaseUnavailable"
    }

    /// True for errors that mean the address acted on should be dropped from
    /// the routing table's writers only.
    pub(crate) fn invalidates_writer(&self) -> bool {
        matches!(
            self.classification_code(),
            "not_a_leader" | "forbidden_on_readonly"
        )
    }

    pub(crate) fn is_security_error(&self) -> bool {
        self.classification() == "security"
            || matches!(
                self.classification_code(),
                "authorization_expired" | "token_expired" | "authentication"
            )
    }

    /// Called once a user-supplied auth manager has handled a security error
    /// by rotating the auth token: the operation that originally failed
    /// because of the stale token is now safe to retry.
    pub(crate) fn overwrite_retryable(&mut self) {
        self.retryable_override = Some(true);
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The `<classification>` segment of `Neo.<classification>.<category>.<title>`,
    /// lower-cased and normalized to this crate's taxonomy strings, e.g.
    /// `"ClientError"` → `"client_error"`, `"TransientError"` → `"transient"`.
    pub fn classification(&self) -> &'static str {
        let raw = self.code.split('.').nth(1).unwrap_or("");
        match raw {
            "ClientError" => match self.category() {
                "Security" => "security",
                _ => "client_error",
            },
            "TransientError" => "transient",
            "DatabaseError" => "service_unavailable",
            _ => "client_error",
        }
    }

    fn classification_code(&self) -> &'static str {
        if self.code == "Neo.ClientError.Security.AuthorizationExpired" {
            return "authorization_expired";
        }
        if self.code == "Neo.ClientError.Security.TokenExpired" {
            return "token_expired";
        }
        if self.category() == "Security" {
            return "security";
        }
        if self.title() == "NotALeader" {
            return "not_a_leader";
        }
        if self.title() == "ForbiddenOnReadOnlyDatabase" {
            return "forbidden_on_readonly";
        }
        if self.code == "Neo.ClientError.Security.Unauthorized" {
            return "authentication";
        }
        self.classification()
    }

    /// The `<category>` segment, e.g. `"Security"`, `"Transaction"`.
    pub fn category(&self) -> &str {
        self.code.split('.').nth(2).unwrap_or("")
    }

    /// The `<title>` segment, e.g. `"NotALeader"`.
    pub fn title(&self) -> &str {
        self.code.split('.').nth(3).unwrap_or("")
    }

    fn is_retryable(&self) -> bool {
        if let Some(retryable) = self.retryable_override {
            return retryable;
        }
        if self.classification_code() == "authorization_expired"
            || self.title() == "NotALeader"
            || self.title() == "ForbiddenOnReadOnlyDatabase"
        {
            return true;
        }
        if self.classification() != "transient" {
            return false;
        }
        // these two transient codes are not retryable: retrying them can
        // never succeed because the transaction itself has been torn down.
        !matches!(
            self.code.as_str(),
            "Neo.TransientError.Transaction.Terminated"
                | "Neo.TransientError.Transaction.LockClientStopped"
        )
    }
}

impl Display for ServerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "server error {}: {}", self.code, self.message)
    }
}

pub type Result<T> = std::result::Result<T, Neo4jError>;

impl From<ServerError> for Neo4jError {
    fn from(err: ServerError) -> Self {
        Neo4jError::ServerError(err)
    }
}

/// Errors surfaced from a user-supplied callback, wrapped so the caller can
/// tell "my callback failed" apart from a driver/server-originated error.
#[derive(Debug, Error)]
pub enum UserCallbackError {
    #[error("address resolver failed: {0}")]
    ResolverError(BoxError),
    #[error("bookmark manager's get_bookmarks callback failed: {0}")]
    BookmarkManagerGet(BoxError),
    #[error("bookmark manager's update_bookmarks callback failed: {0}")]
    BookmarkManagerUpdate(BoxError),
    #[error("auth manager failed to provide a token: {0}")]
    AuthManagerError(BoxError),
}
