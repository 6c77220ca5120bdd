use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::BridgeError;
use crate::models::*;

/// One exclusively-owned logical connection to the broker gateway.
///
/// Every method is a single request/response round trip. The transport
/// underneath is callback-driven; implementations are responsible for
/// correlating the reply so callers see exactly one final value or one
/// failure, never an intermediate state.
#[async_trait]
pub trait GatewayLink: Send {
    /// Accounts the authenticated session manages.
    async fn managed_accounts(&mut self) -> Result<Vec<String>, BridgeError>;

    /// Look up the broker's contract directory for a descriptor.
    /// Zero matches is a valid (empty) reply, not a transport error.
    async fn contract_details(
        &mut self,
        query: &InstrumentDescriptor,
    ) -> Result<Vec<ContractDetails>, BridgeError>;

    /// Request historical bars. `end_date_time` is either "YYYYMMDD HH:MM:SS"
    /// or the empty "now" sentinel; `duration` is "<amount> <unit>". The
    /// broker is the authority on valid combinations.
    async fn historical_bars(
        &mut self,
        contract: &ResolvedContract,
        end_date_time: &str,
        duration: &str,
        bar_size: &str,
        what_to_show: &str,
        use_rth: bool,
    ) -> Result<Vec<Bar>, BridgeError>;

    /// Place an order and wait for the broker to acknowledge it with
    /// assigned identifiers.
    async fn place_order(
        &mut self,
        contract: &ResolvedContract,
        spec: &OrderSpec,
    ) -> Result<OrderAck, BridgeError>;

    /// The broker's clock. Used as the single source of truth for
    /// trade-time in ledger records.
    async fn current_time(&mut self) -> Result<DateTime<Utc>, BridgeError>;

    /// Release the underlying connection. Best-effort; must not fail.
    async fn close(&mut self);
}

/// Acquires scoped gateway links. One dial yields one link; callers own it
/// exclusively and must close it on every exit path.
#[async_trait]
pub trait GatewayDialer: Send + Sync {
    type Link: GatewayLink;

    async fn dial(&self, params: &ConnectionParams) -> Result<Self::Link, BridgeError>;
}
