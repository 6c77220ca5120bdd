//! Order submission: re-validate instrument identity, place the order,
//! and stamp the outcome with the broker's clock.

use ibridge_core::*;
use tracing::info;

use crate::{bounded, resolver};

/// Submit a validated order over one scoped link.
///
/// Submission never trusts a stale resolution: the descriptor is resolved
/// again on this link before the order goes out. The record timestamp is
/// the broker-reported clock, the single source of truth for trade-time.
pub async fn submit<L: GatewayLink>(
    link: &mut L,
    spec: &OrderSpec,
    limit: std::time::Duration,
) -> Result<OrderRecord, BridgeError> {
    let resolved = bounded(
        limit,
        ErrorKind::Resolution,
        resolver::resolve(link, &spec.descriptor),
    )
    .await?;

    let ack = bounded(limit, ErrorKind::Order, link.place_order(&resolved, spec)).await?;

    let timestamp = bounded(limit, ErrorKind::Order, link.current_time())
        .await
        .map_err(|e| {
            // The order is live at the broker; say so instead of losing it
            // behind a generic clock failure.
            BridgeError::order(
                "clock unavailable",
                format!(
                    "order {} (perm {}) was placed but the broker clock could not be read: {}. {}",
                    ack.order_id, ack.perm_id, e.reason, e.detail
                ),
            )
        })?;

    info!(
        order_id = ack.order_id,
        perm_id = ack.perm_id,
        pair = %resolved.canonical_pair(),
        action = %spec.action,
        quantity = %spec.quantity,
        order_type = %spec.order_type,
        "order acknowledged"
    );

    Ok(OrderRecord {
        timestamp,
        order_id: ack.order_id,
        client_id: ack.client_id,
        perm_id: ack.perm_id,
        contract_id: resolved.contract_id,
        symbol: resolved.canonical_symbol,
        action: spec.action,
        size: spec.quantity,
        order_type: spec.order_type,
        limit_price: spec.limit_price,
    })
}
