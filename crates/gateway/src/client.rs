use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ibridge_core::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::protocol::*;

/// Dialer for a broker gateway reachable over TCP.
///
/// The wire format is length-prefixed JSON. The gateway pushes a mixed
/// stream of replies and unsolicited messages; [`TcpLink`] correlates
/// replies by request id so each trait method behaves as one round trip.
#[derive(Debug, Clone, Default)]
pub struct TcpGateway;

impl TcpGateway {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl GatewayDialer for TcpGateway {
    type Link = TcpLink;

    async fn dial(&self, params: &ConnectionParams) -> Result<TcpLink, BridgeError> {
        let addr = params.addr();
        debug!(%addr, client_id = params.client_id, "dialing broker gateway");

        let stream = TcpStream::connect(&addr).await.map_err(|e| {
            BridgeError::connection("unreachable", format!("TCP connect to {} failed: {}", addr, e))
        })?;

        let mut link = TcpLink {
            stream: Some(stream),
        };

        // Handshake: the gateway must accept the client identity before
        // any other request is honored.
        let req_id = Uuid::new_v4();
        let resp = link
            .call(
                ErrorKind::Connection,
                Request::Hello {
                    req_id,
                    client_id: params.client_id,
                },
            )
            .await;
        match resp {
            Ok(Response::Connected { server_version, .. }) => {
                info!(%addr, %server_version, "broker gateway session established");
                Ok(link)
            }
            Ok(other) => {
                link.close().await;
                Err(BridgeError::connection(
                    "handshake failed",
                    format!("unexpected reply to hello: {:?}", other),
                ))
            }
            Err(e) => {
                link.close().await;
                Err(e)
            }
        }
    }
}

/// One live gateway connection, exclusively owned by its holder.
#[derive(Debug)]
pub struct TcpLink {
    stream: Option<TcpStream>,
}

impl TcpLink {
    async fn send(&mut self, req: &Request) -> Result<(), BridgeError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| BridgeError::connection("not connected", "link already closed"))?;

        let json = serde_json::to_vec(req).map_err(|e| {
            BridgeError::connection("encode failure", format!("request serialization: {}", e))
        })?;
        let framed = frame_message(&json);

        stream.write_all(&framed).await.map_err(|e| {
            BridgeError::connection("transport failure", format!("write error: {}", e))
        })
    }

    async fn recv(&mut self) -> Result<Response, BridgeError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| BridgeError::connection("not connected", "link already closed"))?;

        let mut len_buf = [0u8; 4];
        stream.read_exact(&mut len_buf).await.map_err(|e| {
            BridgeError::connection("transport failure", format!("read error: {}", e))
        })?;
        let len = u32::from_be_bytes(len_buf) as usize;

        let mut body = vec![0u8; len];
        stream.read_exact(&mut body).await.map_err(|e| {
            BridgeError::connection("transport failure", format!("read error: {}", e))
        })?;

        serde_json::from_slice(&body).map_err(|e| {
            BridgeError::connection("decode failure", format!("response deserialization: {}", e))
        })
    }

    /// Send one request and wait for its correlated reply, skipping
    /// unsolicited stream messages. Gateway-side rejections surface under
    /// the calling operation's error kind; socket-level send/recv failures
    /// keep Connection kind, since a dead socket invalidates the session
    /// regardless of which operation was in flight.
    async fn call(&mut self, kind: ErrorKind, req: Request) -> Result<Response, BridgeError> {
        let want = req.req_id();
        self.send(&req).await?;

        loop {
            let resp = self.recv().await?;
            match resp.req_id() {
                Some(id) if id == want => {
                    if let Response::Error { reason, detail, .. } = resp {
                        return Err(BridgeError::new(kind, reason, detail));
                    }
                    return Ok(resp);
                }
                Some(stale) => {
                    warn!(%stale, "discarding reply to an abandoned request");
                }
                None => {
                    trace!("skipping unsolicited gateway message");
                }
            }
        }
    }

    fn unexpected(kind: ErrorKind, resp: Response) -> BridgeError {
        BridgeError::new(
            kind,
            "protocol violation",
            format!("unexpected gateway reply: {:?}", resp),
        )
    }
}

#[async_trait]
impl GatewayLink for TcpLink {
    async fn managed_accounts(&mut self) -> Result<Vec<String>, BridgeError> {
        let req_id = Uuid::new_v4();
        match self
            .call(ErrorKind::Connection, Request::ManagedAccounts { req_id })
            .await?
        {
            Response::ManagedAccounts { accounts, .. } => Ok(accounts),
            other => Err(Self::unexpected(ErrorKind::Connection, other)),
        }
    }

    async fn contract_details(
        &mut self,
        query: &InstrumentDescriptor,
    ) -> Result<Vec<ContractDetails>, BridgeError> {
        let req = Request::ContractDetails {
            req_id: Uuid::new_v4(),
            symbol: query.symbol.clone(),
            sec_type: query.sec_type,
            currency: query.currency.clone(),
            exchange: query.exchange.clone(),
            primary_exchange: query.primary_exchange.clone(),
        };
        match self.call(ErrorKind::Resolution, req).await? {
            Response::ContractDetails { matches, .. } => Ok(matches),
            other => Err(Self::unexpected(ErrorKind::Resolution, other)),
        }
    }

    async fn historical_bars(
        &mut self,
        contract: &ResolvedContract,
        end_date_time: &str,
        duration: &str,
        bar_size: &str,
        what_to_show: &str,
        use_rth: bool,
    ) -> Result<Vec<Bar>, BridgeError> {
        let req = Request::HistoricalBars {
            req_id: Uuid::new_v4(),
            contract_id: contract.contract_id,
            end_date_time: end_date_time.to_string(),
            duration: duration.to_string(),
            bar_size: bar_size.to_string(),
            what_to_show: what_to_show.to_string(),
            use_rth,
        };
        match self.call(ErrorKind::Data, req).await? {
            Response::HistoricalBars { bars, .. } => Ok(bars),
            other => Err(Self::unexpected(ErrorKind::Data, other)),
        }
    }

    async fn place_order(
        &mut self,
        contract: &ResolvedContract,
        spec: &OrderSpec,
    ) -> Result<OrderAck, BridgeError> {
        let req = Request::PlaceOrder {
            req_id: Uuid::new_v4(),
            contract_id: contract.contract_id,
            action: spec.action,
            order_type: spec.order_type,
            quantity: spec.quantity,
            limit_price: spec.limit_price,
        };
        match self.call(ErrorKind::Order, req).await? {
            Response::OrderPlaced {
                order_id,
                perm_id,
                client_id,
                ..
            } => Ok(OrderAck {
                order_id,
                perm_id,
                client_id,
            }),
            other => Err(Self::unexpected(ErrorKind::Order, other)),
        }
    }

    async fn current_time(&mut self) -> Result<DateTime<Utc>, BridgeError> {
        let req_id = Uuid::new_v4();
        match self
            .call(ErrorKind::Order, Request::CurrentTime { req_id })
            .await?
        {
            Response::CurrentTime { time, .. } => Ok(time),
            other => Err(Self::unexpected(ErrorKind::Order, other)),
        }
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let goodbye = Request::Goodbye {
                req_id: Uuid::new_v4(),
            };
            if let Ok(json) = serde_json::to_vec(&goodbye) {
                let _ = stream.write_all(&frame_message(&json)).await;
            }
            let _ = stream.shutdown().await;
            debug!("gateway link released");
        }
    }
}
