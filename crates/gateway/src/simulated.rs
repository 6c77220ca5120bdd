use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use ibridge_core::*;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

/// Scripted behavior for the simulated gateway. Shared behind a lock so a
/// test can change broker behavior between calls on a live gateway.
#[derive(Debug, Clone)]
pub struct GatewayScript {
    pub accounts: Vec<String>,
    /// Contract directory; lookups match on symbol and security type.
    pub contracts: Vec<ContractDetails>,
    /// Bars returned by every historical request, as scripted (the bridge
    /// owns the ordering guarantee).
    pub bars: Vec<Bar>,
    /// Fixed broker clock.
    pub clock: DateTime<Utc>,
    /// Refuse all dials with this reason/detail.
    pub refuse_dial: Option<(String, String)>,
    /// Fail every in-flight link method with a Connection-kind error, as a
    /// dead socket would.
    pub sever_link: Option<(String, String)>,
    /// Reject historical requests with this reason/detail.
    pub reject_historical: Option<(String, String)>,
    /// Reject order placement with this reason/detail.
    pub reject_orders: Option<(String, String)>,
    /// Delay applied before every reply, for deadline tests.
    pub reply_delay: Option<std::time::Duration>,
}

impl Default for GatewayScript {
    fn default() -> Self {
        Self {
            accounts: vec!["DU1234567".to_string()],
            contracts: Vec::new(),
            bars: Vec::new(),
            clock: Utc.with_ymd_and_hms(2022, 3, 7, 15, 30, 0).unwrap(),
            refuse_dial: None,
            sever_link: None,
            reject_historical: None,
            reject_orders: None,
            reply_delay: None,
        }
    }
}

/// Per-method call counters, shared across all links of one gateway.
/// Tests use these to assert "no broker contact" and "no leaked link".
#[derive(Debug, Default)]
pub struct GatewayCounters {
    pub dials: AtomicUsize,
    pub open_links: AtomicUsize,
    pub contract_lookups: AtomicUsize,
    pub historical_requests: AtomicUsize,
    pub orders_placed: AtomicUsize,
    pub clock_reads: AtomicUsize,
}

/// An in-memory gateway. Plays the broker's role from a script so the
/// bridge can be exercised without a live connection.
pub struct SimulatedGateway {
    script: Arc<RwLock<GatewayScript>>,
    counters: Arc<GatewayCounters>,
    next_order_id: Arc<AtomicI64>,
}

impl SimulatedGateway {
    pub fn new(script: GatewayScript) -> Self {
        Self {
            script: Arc::new(RwLock::new(script)),
            counters: Arc::new(GatewayCounters::default()),
            next_order_id: Arc::new(AtomicI64::new(1001)),
        }
    }

    pub fn counters(&self) -> Arc<GatewayCounters> {
        Arc::clone(&self.counters)
    }

    /// Handle for rescripting the gateway mid-test.
    pub fn script(&self) -> Arc<RwLock<GatewayScript>> {
        Arc::clone(&self.script)
    }
}

async fn pause(delay: Option<std::time::Duration>) {
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

#[async_trait]
impl GatewayDialer for SimulatedGateway {
    type Link = SimulatedLink;

    async fn dial(&self, params: &ConnectionParams) -> Result<SimulatedLink, BridgeError> {
        let (delay, refusal) = {
            let script = self.script.read().expect("script lock poisoned");
            (script.reply_delay, script.refuse_dial.clone())
        };
        pause(delay).await;
        if let Some((reason, detail)) = refusal {
            return Err(BridgeError::connection(reason, detail));
        }
        self.counters.dials.fetch_add(1, Ordering::SeqCst);
        self.counters.open_links.fetch_add(1, Ordering::SeqCst);
        Ok(SimulatedLink {
            script: Arc::clone(&self.script),
            counters: Arc::clone(&self.counters),
            next_order_id: Arc::clone(&self.next_order_id),
            client_id: params.client_id,
            closed: false,
        })
    }
}

pub struct SimulatedLink {
    script: Arc<RwLock<GatewayScript>>,
    counters: Arc<GatewayCounters>,
    next_order_id: Arc<AtomicI64>,
    client_id: i64,
    closed: bool,
}

impl SimulatedLink {
    fn snapshot(&self) -> GatewayScript {
        self.script.read().expect("script lock poisoned").clone()
    }
}

fn severed(script: &GatewayScript) -> Result<(), BridgeError> {
    match &script.sever_link {
        Some((reason, detail)) => Err(BridgeError::connection(reason.clone(), detail.clone())),
        None => Ok(()),
    }
}

#[async_trait]
impl GatewayLink for SimulatedLink {
    async fn managed_accounts(&mut self) -> Result<Vec<String>, BridgeError> {
        let script = self.snapshot();
        pause(script.reply_delay).await;
        severed(&script)?;
        Ok(script.accounts)
    }

    async fn contract_details(
        &mut self,
        query: &InstrumentDescriptor,
    ) -> Result<Vec<ContractDetails>, BridgeError> {
        let script = self.snapshot();
        pause(script.reply_delay).await;
        severed(&script)?;
        self.counters.contract_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(script
            .contracts
            .into_iter()
            .filter(|c| c.symbol == query.symbol && c.sec_type == query.sec_type)
            .collect())
    }

    async fn historical_bars(
        &mut self,
        _contract: &ResolvedContract,
        _end_date_time: &str,
        _duration: &str,
        _bar_size: &str,
        _what_to_show: &str,
        _use_rth: bool,
    ) -> Result<Vec<Bar>, BridgeError> {
        let script = self.snapshot();
        pause(script.reply_delay).await;
        severed(&script)?;
        self.counters
            .historical_requests
            .fetch_add(1, Ordering::SeqCst);
        if let Some((reason, detail)) = script.reject_historical {
            return Err(BridgeError::data(reason, detail));
        }
        Ok(script.bars)
    }

    async fn place_order(
        &mut self,
        _contract: &ResolvedContract,
        _spec: &OrderSpec,
    ) -> Result<OrderAck, BridgeError> {
        let script = self.snapshot();
        pause(script.reply_delay).await;
        severed(&script)?;
        self.counters.orders_placed.fetch_add(1, Ordering::SeqCst);
        if let Some((reason, detail)) = script.reject_orders {
            return Err(BridgeError::order(reason, detail));
        }
        let order_id = self.next_order_id.fetch_add(1, Ordering::SeqCst);
        Ok(OrderAck {
            order_id,
            perm_id: 1_000_000 + order_id,
            client_id: self.client_id,
        })
    }

    async fn current_time(&mut self) -> Result<DateTime<Utc>, BridgeError> {
        let script = self.snapshot();
        pause(script.reply_delay).await;
        severed(&script)?;
        self.counters.clock_reads.fetch_add(1, Ordering::SeqCst);
        Ok(script.clock)
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.counters.open_links.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
