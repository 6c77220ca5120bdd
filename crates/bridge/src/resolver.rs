//! Turns a partial instrument descriptor into a broker-confirmed contract.
//!
//! The descriptor is a query, not a fact: the broker's reply is validated
//! against the caller's requested symbol/currency pair and a mismatch is
//! rejected rather than silently substituted.

use ibridge_core::{BridgeError, GatewayLink, InstrumentDescriptor, ResolvedContract};
use tracing::debug;

pub async fn resolve<L: GatewayLink>(
    link: &mut L,
    descriptor: &InstrumentDescriptor,
) -> Result<ResolvedContract, BridgeError> {
    let matches = link.contract_details(descriptor).await?;

    let details = match matches.as_slice() {
        [] => {
            return Err(BridgeError::resolution(
                "no contract found",
                format!("no contract found for {}", descriptor.pair()),
            ))
        }
        [only] => only,
        many => {
            return Err(BridgeError::resolution(
                "ambiguous contract",
                format!(
                    "{} candidates returned for {}",
                    many.len(),
                    descriptor.pair()
                ),
            ))
        }
    };

    let resolved = ResolvedContract {
        descriptor: descriptor.clone(),
        contract_id: details.contract_id,
        canonical_symbol: details.symbol.clone(),
        canonical_currency: details.currency.clone(),
    };

    if resolved.canonical_pair() != descriptor.pair() {
        return Err(BridgeError::resolution(
            "contract identity mismatch",
            format!(
                "requested {} but received {}",
                descriptor.pair(),
                resolved.canonical_pair()
            ),
        ));
    }

    debug!(
        pair = %resolved.canonical_pair(),
        contract_id = resolved.contract_id,
        "contract resolved"
    );
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ibridge_core::{ConnectionParams, ContractDetails, ErrorKind, GatewayDialer, SecType};
    use ibridge_gateway::{GatewayScript, SimulatedGateway};

    fn contract(contract_id: i64, symbol: &str, currency: &str) -> ContractDetails {
        ContractDetails {
            contract_id,
            symbol: symbol.to_string(),
            currency: currency.to_string(),
            sec_type: SecType::Cash,
            exchange: "IDEALPRO".to_string(),
        }
    }

    async fn link_with(contracts: Vec<ContractDetails>) -> ibridge_gateway::SimulatedLink {
        let gateway = SimulatedGateway::new(GatewayScript {
            contracts,
            ..Default::default()
        });
        gateway
            .dial(&ConnectionParams::new("127.0.0.1", 7497, 10645))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn resolves_when_canonical_pair_matches() {
        let mut link = link_with(vec![contract(140, "AUD", "CAD")]).await;
        let descriptor = InstrumentDescriptor::fx_pair("AUD.CAD").unwrap();

        let resolved = resolve(&mut link, &descriptor).await.unwrap();
        assert_eq!(resolved.contract_id, 140);
        assert_eq!(resolved.canonical_symbol, "AUD");
        assert_eq!(resolved.canonical_currency, "CAD");
    }

    #[tokio::test]
    async fn zero_matches_is_not_found() {
        let mut link = link_with(Vec::new()).await;
        let descriptor = InstrumentDescriptor::fx_pair("AUD.CAD").unwrap();

        let err = resolve(&mut link, &descriptor).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resolution);
        assert!(err.detail.contains("no contract found for AUD.CAD"));
    }

    #[tokio::test]
    async fn canonical_mismatch_is_rejected_not_substituted() {
        // The directory knows AUD, but quoted against a different currency.
        let mut link = link_with(vec![contract(141, "AUD", "USD")]).await;
        let descriptor = InstrumentDescriptor::fx_pair("AUD.CAD").unwrap();

        let err = resolve(&mut link, &descriptor).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resolution);
        assert_eq!(err.reason, "contract identity mismatch");
        assert!(err.detail.contains("requested AUD.CAD but received AUD.USD"));
    }

    #[tokio::test]
    async fn ambiguous_directory_reply_is_rejected() {
        let mut link =
            link_with(vec![contract(140, "AUD", "CAD"), contract(141, "AUD", "USD")]).await;
        let descriptor = InstrumentDescriptor::fx_pair("AUD.CAD").unwrap();

        let err = resolve(&mut link, &descriptor).await.unwrap_err();
        assert_eq!(err.reason, "ambiguous contract");
    }
}
