//! [`Ledger`] implementation over Ethereum JSON-RPC.

use std::time::Duration;

use alloy_primitives::{Address, TxHash};
use alloy_provider::{Provider, RootProvider};
use alloy_rpc_client::RpcClient;
use alloy_rpc_types_eth::{Filter, Log};
use alloy_sol_types::SolEvent;
use turnstile::config::GateConfig;
use turnstile::error::LedgerError;
use turnstile::ledger::{BoxFuture, Ledger, TransferEvent, TxReceipt};
use url::Url;

use crate::contract::Transfer;
use crate::networks::default_rpc_url;
use crate::provider::{ProviderError, rpc_client};

/// Default time allowed for a single ledger query.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Ledger backed by an Ethereum JSON-RPC node.
///
/// Every query is bounded by a timeout; an expired timeout is reported as
/// [`LedgerError::Timeout`].
#[derive(Debug, Clone)]
pub struct RpcLedger<P = RootProvider> {
    provider: P,
    timeout: Duration,
}

impl<P> RpcLedger<P> {
    /// Wraps an existing provider.
    #[must_use]
    pub const fn new(provider: P) -> Self {
        Self {
            provider,
            timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Sets the time allowed for a single ledger query.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the underlying provider.
    #[must_use]
    pub const fn provider(&self) -> &P {
        &self.provider
    }
}

impl RpcLedger<RootProvider> {
    /// Connects to a single HTTP endpoint.
    #[must_use]
    pub fn from_url(url: Url) -> Self {
        Self::new(RootProvider::new(RpcClient::new_http(url)))
    }

    /// Connects to several HTTP endpoints with optional per-endpoint rate limits.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::NoEndpoints`] if none of the endpoints is usable.
    pub fn http(endpoints: &[(Url, Option<u32>)]) -> Result<Self, ProviderError> {
        Ok(Self::new(RootProvider::new(rpc_client(endpoints)?)))
    }

    /// Connects to the ledger endpoint of a gate configuration, or to the public
    /// endpoint of its settlement network when none is configured.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::NoEndpoints`] if neither is available.
    pub fn for_config(config: &GateConfig) -> Result<Self, ProviderError> {
        let url = config
            .ledger_url()
            .cloned()
            .or_else(|| default_rpc_url(config.asset()))
            .ok_or(ProviderError::NoEndpoints)?;
        Self::http(&[(url, None)])
    }
}

impl<P: Provider> RpcLedger<P> {
    async fn bounded<T, E, F>(&self, fut: F) -> Result<T, LedgerError>
    where
        F: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                #[cfg(feature = "telemetry")]
                tracing::warn!(error = %err, "Ledger query failed");
                Err(LedgerError::Transport(err.to_string()))
            }
            Err(_) => {
                #[cfg(feature = "telemetry")]
                tracing::warn!(timeout = ?self.timeout, "Ledger query timed out");
                Err(LedgerError::Timeout(self.timeout))
            }
        }
    }
}

impl<P: Provider> Ledger for RpcLedger<P> {
    fn receipt<'a>(
        &'a self,
        tx_hash: &'a TxHash,
    ) -> BoxFuture<'a, Result<Option<TxReceipt>, LedgerError>> {
        Box::pin(async move {
            let receipt = self
                .bounded(self.provider.get_transaction_receipt(*tx_hash).into_future())
                .await?;
            Ok(receipt.map(|receipt| TxReceipt {
                tx_hash: receipt.transaction_hash,
                block_number: receipt.block_number,
                success: receipt.status(),
            }))
        })
    }

    fn transfers(
        &self,
        token: Address,
        from_block: u64,
        to_block: u64,
    ) -> BoxFuture<'_, Result<Vec<TransferEvent>, LedgerError>> {
        Box::pin(async move {
            let filter = Filter::new()
                .address(token)
                .event_signature(Transfer::SIGNATURE_HASH)
                .from_block(from_block)
                .to_block(to_block);
            let logs = self.bounded(self.provider.get_logs(&filter)).await?;
            logs.iter().map(decode_transfer).collect()
        })
    }
}

/// Decodes a raw log into a [`TransferEvent`].
fn decode_transfer(log: &Log) -> Result<TransferEvent, LedgerError> {
    let tx_hash = log
        .transaction_hash
        .ok_or_else(|| LedgerError::Decode("log without transaction hash".to_owned()))?;
    let decoded = log
        .log_decode::<Transfer>()
        .map_err(|e| LedgerError::Decode(e.to_string()))?;
    let Transfer { from, to, value } = decoded.inner.data;
    Ok(TransferEvent {
        tx_hash,
        from,
        to,
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{U256, address, b256};
    use serde_json::{Value, json};
    use turnstile::Decimal;
    use turnstile::asset::SettlementAsset;
    use turnstile::verify::{PaymentVerifier, VerificationError};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    const TX: TxHash = b256!("0x8f3d1c6b4b4e7a2f0a9e2d1c3b5a79685746352413021f0e0d0c0b0a09080706");
    const PAYER: Address = address!("1111111111111111111111111111111111111111");
    const RECIPIENT: Address = address!("5569A8d923f114455DeF7ae9731E26B9B8EA1D36");
    const BLOCK_HASH: &str = "0x2222222222222222222222222222222222222222222222222222222222222222";

    /// Answers JSON-RPC calls by method name, echoing the request id.
    struct JsonRpc {
        receipt: Value,
        logs: Value,
    }

    impl Respond for JsonRpc {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            let body: Value = serde_json::from_slice(&request.body).unwrap();
            let result = match body["method"].as_str().unwrap() {
                "eth_getTransactionReceipt" => self.receipt.clone(),
                "eth_getLogs" => self.logs.clone(),
                other => panic!("unexpected method {other}"),
            };
            ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": body["id"],
                "result": result,
            }))
        }
    }

    fn padded(addr: Address) -> String {
        format!("0x{:0>64}", alloy_primitives::hex::encode(addr))
    }

    fn receipt_json(status: bool) -> Value {
        json!({
            "type": "0x2",
            "status": if status { "0x1" } else { "0x0" },
            "cumulativeGasUsed": "0x5208",
            "logs": [],
            "logsBloom": format!("0x{}", "00".repeat(256)),
            "transactionHash": TX,
            "transactionIndex": "0x0",
            "blockHash": BLOCK_HASH,
            "blockNumber": "0x10",
            "gasUsed": "0x5208",
            "effectiveGasPrice": "0x3b9aca00",
            "from": PAYER,
            "to": SettlementAsset::USDC_ON_BASE.address,
            "contractAddress": null,
        })
    }

    fn transfer_log_json(to: Address, value: u64) -> Value {
        json!({
            "address": SettlementAsset::USDC_ON_BASE.address,
            "topics": [Transfer::SIGNATURE_HASH, padded(PAYER), padded(to)],
            "data": format!("0x{:064x}", value),
            "blockNumber": "0x10",
            "blockHash": BLOCK_HASH,
            "transactionHash": TX,
            "transactionIndex": "0x0",
            "logIndex": "0x0",
            "removed": false,
        })
    }

    async fn serve(receipt: Value, logs: Value) -> (MockServer, RpcLedger) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(JsonRpc { receipt, logs })
            .mount(&server)
            .await;
        let ledger = RpcLedger::from_url(server.uri().parse().unwrap());
        (server, ledger)
    }

    #[tokio::test]
    async fn test_receipt_decodes_status_and_block() {
        let (_server, ledger) = serve(receipt_json(true), json!([])).await;
        let receipt = ledger.receipt(&TX).await.unwrap().unwrap();
        assert_eq!(receipt.tx_hash, TX);
        assert_eq!(receipt.block_number, Some(16));
        assert!(receipt.success);
    }

    #[tokio::test]
    async fn test_unknown_transaction_has_no_receipt() {
        let (_server, ledger) = serve(Value::Null, json!([])).await;
        assert!(ledger.receipt(&TX).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_transfers_decode_transfer_logs() {
        let (_server, ledger) =
            serve(Value::Null, json!([transfer_log_json(RECIPIENT, 10_000)])).await;
        let transfers = ledger
            .transfers(SettlementAsset::USDC_ON_BASE.address, 16, 16)
            .await
            .unwrap();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].tx_hash, TX);
        assert_eq!(transfers[0].from, PAYER);
        assert_eq!(transfers[0].to, RECIPIENT);
        assert_eq!(transfers[0].value, U256::from(10_000u64));
    }

    #[tokio::test]
    async fn test_server_error_is_transport_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let ledger = RpcLedger::from_url(server.uri().parse().unwrap());

        let err = ledger.receipt(&TX).await.unwrap_err();
        assert!(matches!(err, LedgerError::Transport(_)));
    }

    #[tokio::test]
    async fn test_slow_node_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;
        let ledger = RpcLedger::from_url(server.uri().parse().unwrap())
            .with_timeout(Duration::from_millis(100));

        let err = ledger.receipt(&TX).await.unwrap_err();
        assert!(matches!(err, LedgerError::Timeout(t) if t == Duration::from_millis(100)));
    }

    #[tokio::test]
    async fn test_verifier_accepts_payment_seen_over_rpc() {
        let (_server, ledger) =
            serve(receipt_json(true), json!([transfer_log_json(RECIPIENT, 10_000)])).await;
        let verifier = PaymentVerifier::new(ledger, SettlementAsset::USDC_ON_BASE);

        let payment = verifier
            .verify(&TX, RECIPIENT, Decimal::new(1, 2))
            .await
            .unwrap();
        assert_eq!(payment.payer, PAYER);
        assert_eq!(payment.value, U256::from(10_000u64));
    }

    #[tokio::test]
    async fn test_verifier_rejects_reverted_transaction() {
        let (_server, ledger) =
            serve(receipt_json(false), json!([transfer_log_json(RECIPIENT, 10_000)])).await;
        let verifier = PaymentVerifier::new(ledger, SettlementAsset::USDC_ON_BASE);

        let err = verifier
            .verify(&TX, RECIPIENT, Decimal::new(1, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, VerificationError::TxFailed { .. }));
    }

    #[tokio::test]
    async fn test_config_without_ledger_url_uses_network_default() {
        let config = GateConfig::new(
            "0x5569A8d923f114455DeF7ae9731E26B9B8EA1D36",
            Decimal::new(1, 2),
            "secret",
        )
        .unwrap();
        assert!(RpcLedger::for_config(&config).is_ok());
    }
}
