use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BridgeError;

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// Identifies one logical link to the broker gateway. Immutable per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub client_id: i64,
}

impl ConnectionParams {
    pub fn new(host: impl Into<String>, port: u16, client_id: i64) -> Self {
        Self {
            host: host.into(),
            port,
            client_id,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ---------------------------------------------------------------------------
// Instruments & contracts
// ---------------------------------------------------------------------------

/// Security type of an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SecType {
    Stk,
    Cash,
    Crypto,
    Bond,
    Fund,
}

impl fmt::Display for SecType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Stk => "STK",
            Self::Cash => "CASH",
            Self::Crypto => "CRYPTO",
            Self::Bond => "BOND",
            Self::Fund => "FUND",
        };
        f.write_str(s)
    }
}

impl FromStr for SecType {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "STK" => Ok(Self::Stk),
            "CASH" => Ok(Self::Cash),
            "CRYPTO" => Ok(Self::Crypto),
            "BOND" => Ok(Self::Bond),
            "FUND" => Ok(Self::Fund),
            other => Err(BridgeError::resolution(
                "unknown security type",
                format!("'{}' is not a supported secType", other),
            )),
        }
    }
}

/// A caller-supplied, partially specified instrument. Used as a query
/// against the broker's contract directory, never treated as a fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentDescriptor {
    pub symbol: String,
    pub sec_type: SecType,
    pub currency: String,
    pub exchange: String,
    pub primary_exchange: Option<String>,
}

impl InstrumentDescriptor {
    /// Build an FX descriptor from a "SYMBOL.CURRENCY" pair token,
    /// routed to the currency exchange.
    pub fn fx_pair(token: &str) -> Result<Self, BridgeError> {
        let mut parts = token.splitn(2, '.');
        let symbol = parts.next().unwrap_or_default();
        let currency = parts.next().unwrap_or_default();
        if symbol.is_empty() || currency.is_empty() {
            return Err(BridgeError::resolution(
                "invalid pair token",
                format!("'{}' is not of the form SYMBOL.CURRENCY", token),
            ));
        }
        Ok(Self {
            symbol: symbol.to_string(),
            sec_type: SecType::Cash,
            currency: currency.to_string(),
            exchange: "IDEALPRO".to_string(),
            primary_exchange: None,
        })
    }

    /// The requested symbol/currency pair as a single token.
    pub fn pair(&self) -> String {
        format!("{}.{}", self.symbol, self.currency)
    }
}

/// One entry from the broker's contract directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractDetails {
    pub contract_id: i64,
    pub symbol: String,
    pub currency: String,
    pub sec_type: SecType,
    pub exchange: String,
}

/// A descriptor the broker has confirmed, carrying its assigned identity.
/// Created per resolution call and never cached across calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedContract {
    pub descriptor: InstrumentDescriptor,
    pub contract_id: i64,
    pub canonical_symbol: String,
    pub canonical_currency: String,
}

impl ResolvedContract {
    /// The broker's canonical symbol/currency pair as a single token.
    pub fn canonical_pair(&self) -> String {
        format!("{}.{}", self.canonical_symbol, self.canonical_currency)
    }
}

// ---------------------------------------------------------------------------
// Historical data
// ---------------------------------------------------------------------------

/// Duration unit accepted by the broker. The broker is the authority on
/// valid amount/unit combinations; the bridge passes them through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DurationUnit {
    S,
    D,
    W,
    M,
    Y,
}

impl fmt::Display for DurationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::S => "S",
            Self::D => "D",
            Self::W => "W",
            Self::M => "M",
            Self::Y => "Y",
        };
        f.write_str(s)
    }
}

impl FromStr for DurationUnit {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "S" => Ok(Self::S),
            "D" => Ok(Self::D),
            "W" => Ok(Self::W),
            "M" => Ok(Self::M),
            "Y" => Ok(Self::Y),
            other => Err(BridgeError::data(
                "unknown duration unit",
                format!("'{}' is not one of S, D, W, M, Y", other),
            )),
        }
    }
}

/// Lookback window for a historical request, rendered as "<amount> <unit>".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Duration {
    pub amount: u32,
    pub unit: DurationUnit,
}

impl Duration {
    pub fn new(amount: u32, unit: DurationUnit) -> Self {
        Self { amount, unit }
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.unit)
    }
}

/// End-of-window timestamp for a historical request, assembled from
/// independently optional parts.
///
/// All four parts present composes "YYYYMMDD HH:MM:SS"; any missing part
/// forces the empty "now" sentinel for the whole field. A partially
/// filled timestamp is never produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EndDateTime {
    pub date: Option<NaiveDate>,
    pub hour: Option<u32>,
    pub minute: Option<u32>,
    pub second: Option<u32>,
}

impl EndDateTime {
    /// The "now" sentinel: every part unset.
    pub fn now() -> Self {
        Self::default()
    }

    pub fn render(&self) -> String {
        match (self.date, self.hour, self.minute, self.second) {
            (Some(date), Some(hour), Some(minute), Some(second)) => format!(
                "{} {:02}:{:02}:{:02}",
                date.format("%Y%m%d"),
                hour,
                minute,
                second
            ),
            _ => String::new(),
        }
    }
}

/// A historical bar request, short of the resolved contract it targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalRequest {
    pub end: EndDateTime,
    pub duration: Duration,
    pub bar_size: String,
    pub what_to_show: String,
    pub use_rth: bool,
}

/// A single OHLC bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

/// The payload of a successful historical fetch: the confirmed contract
/// and its bars in ascending timestamp order. An empty series is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarSeries {
    pub contract: ResolvedContract,
    pub what_to_show: String,
    pub bars: Vec<Bar>,
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => f.write_str("BUY"),
            Self::Sell => f.write_str("SELL"),
        }
    }
}

impl FromStr for Action {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BUY" => Ok(Self::Buy),
            "SELL" => Ok(Self::Sell),
            other => Err(BridgeError::order(
                "unknown action",
                format!("'{}' is not BUY or SELL", other),
            )),
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Mkt,
    Lmt,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mkt => f.write_str("MKT"),
            Self::Lmt => f.write_str("LMT"),
        }
    }
}

impl FromStr for OrderType {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MKT" => Ok(Self::Mkt),
            "LMT" => Ok(Self::Lmt),
            other => Err(BridgeError::order(
                "unknown order type",
                format!("'{}' is not MKT or LMT", other),
            )),
        }
    }
}

/// A trade intent: the instrument to trade and the order to place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSpec {
    pub descriptor: InstrumentDescriptor,
    pub action: Action,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub limit_price: Option<Decimal>,
}

impl OrderSpec {
    /// Shape checks that must pass before the broker is contacted.
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.quantity <= Decimal::ZERO {
            return Err(BridgeError::order(
                "invalid quantity",
                format!("quantity must be positive, got {}", self.quantity),
            ));
        }
        if self.order_type == OrderType::Lmt && self.limit_price.is_none() {
            return Err(BridgeError::order(
                "invalid limit price",
                "a limit order requires a limit price",
            ));
        }
        Ok(())
    }
}

/// Broker acknowledgment of a placed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: i64,
    pub perm_id: i64,
    pub client_id: i64,
}

/// One row of the trade ledger. Created once on acknowledgment, appended,
/// and never mutated or deleted. The full tuple is the composite key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    /// Broker-reported clock at acknowledgment, not local wall-clock.
    pub timestamp: DateTime<Utc>,
    pub order_id: i64,
    pub client_id: i64,
    pub perm_id: i64,
    pub contract_id: i64,
    pub symbol: String,
    pub action: Action,
    pub size: Decimal,
    pub order_type: OrderType,
    pub limit_price: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn fx_pair_splits_symbol_and_currency() {
        let d = InstrumentDescriptor::fx_pair("AUD.CAD").unwrap();
        assert_eq!(d.symbol, "AUD");
        assert_eq!(d.currency, "CAD");
        assert_eq!(d.sec_type, SecType::Cash);
        assert_eq!(d.exchange, "IDEALPRO");
        assert_eq!(d.pair(), "AUD.CAD");
    }

    #[test]
    fn fx_pair_rejects_malformed_tokens() {
        for token in ["AUDCAD", "AUD.", ".CAD", ""] {
            let err = InstrumentDescriptor::fx_pair(token).unwrap_err();
            assert_eq!(err.kind(), crate::ErrorKind::Resolution);
        }
    }

    #[test]
    fn end_date_time_composes_when_fully_specified() {
        let end = EndDateTime {
            date: NaiveDate::from_ymd_opt(2022, 3, 7),
            hour: Some(9),
            minute: Some(5),
            second: Some(30),
        };
        assert_eq!(end.render(), "20220307 09:05:30");
    }

    #[test]
    fn end_date_time_missing_any_part_is_now() {
        let full = EndDateTime {
            date: NaiveDate::from_ymd_opt(2022, 3, 7),
            hour: Some(9),
            minute: Some(5),
            second: Some(30),
        };
        let variants = [
            EndDateTime { date: None, ..full },
            EndDateTime { hour: None, ..full },
            EndDateTime {
                minute: None,
                ..full
            },
            EndDateTime {
                second: None,
                ..full
            },
            EndDateTime::now(),
        ];
        for end in variants {
            assert_eq!(end.render(), "");
        }
    }

    #[test]
    fn duration_renders_amount_and_unit() {
        assert_eq!(Duration::new(30, DurationUnit::D).to_string(), "30 D");
        assert_eq!(Duration::new(90, DurationUnit::S).to_string(), "90 S");
    }

    #[test]
    fn limit_order_without_price_is_invalid() {
        let spec = OrderSpec {
            descriptor: InstrumentDescriptor::fx_pair("EUR.USD").unwrap(),
            action: Action::Buy,
            order_type: OrderType::Lmt,
            quantity: dec!(100),
            limit_price: None,
        };
        let err = spec.validate().unwrap_err();
        assert_eq!(err.reason, "invalid limit price");
    }

    #[test]
    fn non_positive_quantity_is_invalid() {
        let spec = OrderSpec {
            descriptor: InstrumentDescriptor::fx_pair("EUR.USD").unwrap(),
            action: Action::Sell,
            order_type: OrderType::Mkt,
            quantity: dec!(0),
            limit_price: None,
        };
        assert!(spec.validate().is_err());
    }
}
