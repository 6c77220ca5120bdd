//! Historical bar fetch against a resolved contract.
//!
//! Window composition happens here: the duration renders as
//! "<amount> <unit>" and the end timestamp either composes fully or falls
//! back to the empty "now" sentinel. Amount/unit combinations are not
//! validated client-side; the broker is the authority and rejections
//! surface as data errors at request time.

use ibridge_core::{Bar, BridgeError, GatewayLink, HistoricalRequest, ResolvedContract};
use tracing::debug;

pub async fn fetch<L: GatewayLink>(
    link: &mut L,
    contract: &ResolvedContract,
    request: &HistoricalRequest,
) -> Result<Vec<Bar>, BridgeError> {
    let end_date_time = request.end.render();
    let duration = request.duration.to_string();

    debug!(
        pair = %contract.canonical_pair(),
        %duration,
        end = %if end_date_time.is_empty() { "now" } else { end_date_time.as_str() },
        bar_size = %request.bar_size,
        what_to_show = %request.what_to_show,
        use_rth = request.use_rth,
        "requesting historical bars"
    );

    let mut bars = link
        .historical_bars(
            contract,
            &end_date_time,
            &duration,
            &request.bar_size,
            &request.what_to_show,
            request.use_rth,
        )
        .await?;

    // Ascending timestamp order regardless of how the gateway replied.
    // An empty series is a valid result, not a failure.
    bars.sort_by_key(|b| b.timestamp);
    Ok(bars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use ibridge_core::*;
    use ibridge_gateway::{GatewayScript, SimulatedGateway};
    use rust_decimal_macros::dec;

    fn resolved() -> ResolvedContract {
        ResolvedContract {
            descriptor: InstrumentDescriptor::fx_pair("AUD.CAD").unwrap(),
            contract_id: 140,
            canonical_symbol: "AUD".to_string(),
            canonical_currency: "CAD".to_string(),
        }
    }

    fn request() -> HistoricalRequest {
        HistoricalRequest {
            end: EndDateTime::now(),
            duration: Duration::new(30, DurationUnit::D),
            bar_size: "1 hour".to_string(),
            what_to_show: "MIDPOINT".to_string(),
            use_rth: false,
        }
    }

    fn bar(hour: u32, close: rust_decimal::Decimal) -> Bar {
        Bar {
            timestamp: Utc.with_ymd_and_hms(2022, 3, 7, hour, 0, 0).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
        }
    }

    async fn link_with(bars: Vec<Bar>) -> ibridge_gateway::SimulatedLink {
        let gateway = SimulatedGateway::new(GatewayScript {
            bars,
            ..Default::default()
        });
        gateway
            .dial(&ConnectionParams::new("127.0.0.1", 7497, 10645))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn bars_come_back_in_ascending_order() {
        let scripted = vec![bar(12, dec!(0.95)), bar(9, dec!(0.94)), bar(15, dec!(0.96))];
        let mut link = link_with(scripted).await;

        let bars = fetch(&mut link, &resolved(), &request()).await.unwrap();
        assert_eq!(bars.len(), 3);
        assert!(bars.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[tokio::test]
    async fn empty_series_is_success() {
        let mut link = link_with(Vec::new()).await;
        let bars = fetch(&mut link, &resolved(), &request()).await.unwrap();
        assert!(bars.is_empty());
    }

    #[tokio::test]
    async fn broker_rejection_surfaces_as_data_error() {
        let gateway = SimulatedGateway::new(GatewayScript {
            reject_historical: Some((
                "invalid duration".to_string(),
                "the broker refused 7 Y at 1 secs".to_string(),
            )),
            ..Default::default()
        });
        let mut link = gateway
            .dial(&ConnectionParams::new("127.0.0.1", 7497, 10645))
            .await
            .unwrap();

        let err = fetch(&mut link, &resolved(), &request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Data);
        assert_eq!(err.reason, "invalid duration");
    }
}
