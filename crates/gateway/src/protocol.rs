use chrono::{DateTime, Utc};
use ibridge_core::{Action, Bar, ContractDetails, OrderType, SecType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages sent from the bridge TO the gateway.
///
/// Every request carries a correlation id; the matching response echoes it
/// back so replies can be picked out of the callback-style message stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Opens the session after the TCP connect.
    #[serde(rename = "hello")]
    Hello { req_id: Uuid, client_id: i64 },
    /// List the accounts this session manages.
    #[serde(rename = "managed_accounts")]
    ManagedAccounts { req_id: Uuid },
    /// Query the contract directory.
    #[serde(rename = "contract_details")]
    ContractDetails {
        req_id: Uuid,
        symbol: String,
        sec_type: SecType,
        currency: String,
        exchange: String,
        primary_exchange: Option<String>,
    },
    /// Request a historical bar series.
    #[serde(rename = "historical_bars")]
    HistoricalBars {
        req_id: Uuid,
        contract_id: i64,
        end_date_time: String,
        duration: String,
        bar_size: String,
        what_to_show: String,
        use_rth: bool,
    },
    /// Place an order.
    #[serde(rename = "place_order")]
    PlaceOrder {
        req_id: Uuid,
        contract_id: i64,
        action: Action,
        order_type: OrderType,
        quantity: Decimal,
        limit_price: Option<Decimal>,
    },
    /// Ask for the broker's clock.
    #[serde(rename = "current_time")]
    CurrentTime { req_id: Uuid },
    /// Session teardown. No reply is expected.
    #[serde(rename = "goodbye")]
    Goodbye { req_id: Uuid },
}

impl Request {
    pub fn req_id(&self) -> Uuid {
        match self {
            Self::Hello { req_id, .. }
            | Self::ManagedAccounts { req_id }
            | Self::ContractDetails { req_id, .. }
            | Self::HistoricalBars { req_id, .. }
            | Self::PlaceOrder { req_id, .. }
            | Self::CurrentTime { req_id }
            | Self::Goodbye { req_id } => *req_id,
        }
    }
}

/// Messages received FROM the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    /// Session accepted.
    #[serde(rename = "connected")]
    Connected { req_id: Uuid, server_version: String },
    #[serde(rename = "managed_accounts")]
    ManagedAccounts { req_id: Uuid, accounts: Vec<String> },
    #[serde(rename = "contract_details")]
    ContractDetails {
        req_id: Uuid,
        matches: Vec<ContractDetails>,
    },
    #[serde(rename = "historical_bars")]
    HistoricalBars { req_id: Uuid, bars: Vec<Bar> },
    /// Order accepted, with the broker-assigned identifiers.
    #[serde(rename = "order_placed")]
    OrderPlaced {
        req_id: Uuid,
        order_id: i64,
        perm_id: i64,
        client_id: i64,
    },
    #[serde(rename = "current_time")]
    CurrentTime {
        req_id: Uuid,
        time: DateTime<Utc>,
    },
    /// The gateway rejected the correlated request.
    #[serde(rename = "error")]
    Error {
        req_id: Uuid,
        reason: String,
        detail: String,
    },
    /// Unsolicited keepalive. Not correlated to any request.
    #[serde(rename = "heartbeat")]
    Heartbeat { timestamp: DateTime<Utc> },
    /// Unsolicited informational message from the gateway.
    #[serde(rename = "notice")]
    Notice { message: String },
}

impl Response {
    /// The correlation id this response answers, if it answers one.
    pub fn req_id(&self) -> Option<Uuid> {
        match self {
            Self::Connected { req_id, .. }
            | Self::ManagedAccounts { req_id, .. }
            | Self::ContractDetails { req_id, .. }
            | Self::HistoricalBars { req_id, .. }
            | Self::OrderPlaced { req_id, .. }
            | Self::CurrentTime { req_id, .. }
            | Self::Error { req_id, .. } => Some(*req_id),
            Self::Heartbeat { .. } | Self::Notice { .. } => None,
        }
    }
}

/// Frame a message with a 4-byte length prefix (big-endian).
pub fn frame_message(msg: &[u8]) -> Vec<u8> {
    let len = msg.len() as u32;
    let mut framed = Vec::with_capacity(4 + msg.len());
    framed.extend_from_slice(&len.to_be_bytes());
    framed.extend_from_slice(msg);
    framed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_prepends_big_endian_length() {
        let framed = frame_message(b"{}");
        assert_eq!(&framed[..4], &[0, 0, 0, 2]);
        assert_eq!(&framed[4..], b"{}");
    }

    #[test]
    fn unsolicited_messages_have_no_correlation_id() {
        let hb = Response::Heartbeat {
            timestamp: Utc::now(),
        };
        assert!(hb.req_id().is_none());
    }

    #[test]
    fn request_round_trips_through_json() {
        let req = Request::HistoricalBars {
            req_id: Uuid::new_v4(),
            contract_id: 42,
            end_date_time: String::new(),
            duration: "30 D".to_string(),
            bar_size: "1 hour".to_string(),
            what_to_show: "MIDPOINT".to_string(),
            use_rth: false,
        };
        let json = serde_json::to_vec(&req).unwrap();
        let back: Request = serde_json::from_slice(&json).unwrap();
        assert_eq!(back.req_id(), req.req_id());
    }
}
