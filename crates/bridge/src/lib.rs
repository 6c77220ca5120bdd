//! Synchronous bridge over a callback-driven broker gateway.
//!
//! The gateway transport is asynchronous; every public operation here is a
//! single blocking call that either returns the final value or a structured
//! [`BridgeError`], never an intermediate state. The bridge owns a private
//! tokio runtime, so operations are callable from any worker thread.

pub mod history;
pub mod orders;
pub mod resolver;

use ibridge_core::*;
use ibridge_ledger::TradeLedger;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::{info, warn};

/// Bridge-wide settings.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Upper bound on each broker round trip (dial, resolve, bars, place,
    /// clock). A breach converts to the in-flight operation's error kind.
    pub round_trip_timeout: std::time::Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            round_trip_timeout: std::time::Duration::from_secs(15),
        }
    }
}

/// Await `fut` under the bridge's round-trip deadline.
pub(crate) async fn bounded<T>(
    limit: std::time::Duration,
    kind: ErrorKind,
    fut: impl Future<Output = Result<T, BridgeError>>,
) -> Result<T, BridgeError> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(BridgeError::timeout(kind)),
    }
}

/// The synchronous broker-gateway bridge.
///
/// Holds the dialer, the shared trade ledger, and the session-verified
/// flag. Each operation dials its own scoped link and releases it on every
/// exit path; nothing is cached across calls.
pub struct Bridge<D: GatewayDialer> {
    dialer: D,
    config: BridgeConfig,
    runtime: Runtime,
    ledger: Arc<TradeLedger>,
    session_verified: AtomicBool,
}

impl<D: GatewayDialer> Bridge<D> {
    pub fn new(dialer: D, ledger: Arc<TradeLedger>) -> Result<Self, BridgeError> {
        Self::with_config(dialer, ledger, BridgeConfig::default())
    }

    pub fn with_config(
        dialer: D,
        ledger: Arc<TradeLedger>,
        config: BridgeConfig,
    ) -> Result<Self, BridgeError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                BridgeError::connection("runtime unavailable", format!("tokio runtime: {}", e))
            })?;
        Ok(Self {
            dialer,
            config,
            runtime,
            ledger,
            session_verified: AtomicBool::new(false),
        })
    }

    /// Whether the last connection probe succeeded. Set only by a
    /// successful [`Self::test_connection`], cleared by any transport
    /// failure; never implicitly resurrected.
    pub fn session_verified(&self) -> bool {
        self.session_verified.load(Ordering::SeqCst)
    }

    pub fn ledger(&self) -> &TradeLedger {
        &self.ledger
    }

    /// Probe the gateway: connect, list managed accounts, release the
    /// connection. Safe to call repeatedly; each probe acquires and
    /// releases its own scoped link on success and failure alike.
    pub fn test_connection(&self, params: &ConnectionParams) -> Result<Vec<String>, BridgeError> {
        let limit = self.config.round_trip_timeout;
        let result = self.runtime.block_on(async {
            let mut link = bounded(limit, ErrorKind::Connection, self.dialer.dial(params)).await?;
            let accounts = bounded(limit, ErrorKind::Connection, link.managed_accounts()).await;
            link.close().await;
            accounts
        });

        match &result {
            Ok(accounts) => {
                self.session_verified.store(true, Ordering::SeqCst);
                info!(addr = %params.addr(), accounts = accounts.len(), "connection probe succeeded");
            }
            Err(e) => {
                self.session_verified.store(false, Ordering::SeqCst);
                warn!(addr = %params.addr(), error = %e, "connection probe failed");
            }
        }
        result
    }

    /// Resolve a "SYMBOL.CURRENCY" pair and fetch its historical bars.
    ///
    /// Refuses immediately unless a prior probe succeeded; this is a
    /// cooperative precondition, not enforced by the transport. An empty
    /// bar series is a valid result.
    pub fn fetch_chart(
        &self,
        pair_token: &str,
        request: &HistoricalRequest,
        params: &ConnectionParams,
    ) -> Result<BarSeries, BridgeError> {
        if !self.session_verified() {
            return Err(BridgeError::data(
                "session not verified",
                "run a successful connection test before fetching historical data",
            ));
        }

        let descriptor = InstrumentDescriptor::fx_pair(pair_token)?;
        let limit = self.config.round_trip_timeout;
        let result = self.runtime.block_on(async {
            let mut link = bounded(limit, ErrorKind::Connection, self.dialer.dial(params)).await?;
            let out = async {
                let resolved = bounded(
                    limit,
                    ErrorKind::Resolution,
                    resolver::resolve(&mut link, &descriptor),
                )
                .await?;
                let bars = bounded(
                    limit,
                    ErrorKind::Data,
                    history::fetch(&mut link, &resolved, request),
                )
                .await?;
                Ok(BarSeries {
                    contract: resolved,
                    what_to_show: request.what_to_show.clone(),
                    bars,
                })
            }
            .await;
            link.close().await;
            out
        });

        self.invalidate_on_transport_failure(&result);
        result
    }

    /// Submit a trade and append its outcome to the ledger.
    ///
    /// Order shape is validated before any broker contact. The descriptor
    /// is re-resolved on this call's own link, the order placed, and the
    /// record stamped with the broker clock. Submission is complete only
    /// once the ledger write succeeds; a ledger failure surfaces under its
    /// own kind because the trade may already be live at the broker.
    pub fn submit_trade(
        &self,
        spec: &OrderSpec,
        params: &ConnectionParams,
    ) -> Result<OrderRecord, BridgeError> {
        spec.validate()?;

        let limit = self.config.round_trip_timeout;
        let result = self.runtime.block_on(async {
            let mut link = bounded(limit, ErrorKind::Connection, self.dialer.dial(params)).await?;
            let out = orders::submit(&mut link, spec, limit).await;
            link.close().await;
            out
        });
        self.invalidate_on_transport_failure(&result);
        let record = result?;

        self.ledger.append(&record)?;
        info!(
            order_id = record.order_id,
            symbol = %record.symbol,
            "trade submitted and recorded"
        );
        Ok(record)
    }

    fn invalidate_on_transport_failure<T>(&self, result: &Result<T, BridgeError>) {
        if let Err(e) = result {
            if e.kind() == ErrorKind::Connection {
                self.session_verified.store(false, Ordering::SeqCst);
                warn!(error = %e, "transport failure, session no longer verified");
            }
        }
    }
}
