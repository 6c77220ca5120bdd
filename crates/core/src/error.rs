use serde::{Deserialize, Serialize};
use std::fmt;

/// The category of a bridge failure. Callers branch on this alone;
/// `reason` and `detail` are for composing a display message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Cannot reach or authenticate to the broker gateway.
    Connection,
    /// Instrument not found, or canonical identity mismatch.
    Resolution,
    /// Historical request malformed or rejected by the broker.
    Data,
    /// Invalid order shape, or the broker rejected placement.
    Order,
    /// Ledger storage unreadable or unwritable.
    Ledger,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connection => "connection",
            Self::Resolution => "resolution",
            Self::Data => "data",
            Self::Order => "order",
            Self::Ledger => "ledger",
        };
        f.write_str(s)
    }
}

/// Structured error carried by every failing bridge operation.
///
/// Three fields, always populated: the machine-facing `kind` and `reason`,
/// and a human-readable `detail`. Display composes them into the single
/// string callers render.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("error in {kind}: {reason}. {detail}")]
pub struct BridgeError {
    pub kind: ErrorKind,
    pub reason: String,
    pub detail: String,
}

impl BridgeError {
    pub fn new(kind: ErrorKind, reason: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
            detail: detail.into(),
        }
    }

    pub fn connection(reason: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connection, reason, detail)
    }

    pub fn resolution(reason: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Resolution, reason, detail)
    }

    pub fn data(reason: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Data, reason, detail)
    }

    pub fn order(reason: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Order, reason, detail)
    }

    pub fn ledger(reason: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Ledger, reason, detail)
    }

    /// A broker round trip exceeded the bridge's deadline.
    pub fn timeout(kind: ErrorKind) -> Self {
        Self::new(
            kind,
            "timeout",
            "the broker gateway did not respond within the allotted time",
        )
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}
