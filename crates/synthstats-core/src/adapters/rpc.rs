use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::adapters::execute;
use crate::data_source::{
    BalanceRequest, CapabilitySet, ContractCall, DataSource, Endpoint, HealthStatus,
    HoldersRequest, PriceSeriesRequest, QuoteRequest, SourceError, SourceFuture, TokenRef,
    DEFAULT_TOKEN_DECIMALS,
};
use crate::config::ADDRESS_RESOLVER;
use crate::http_client::{HttpClient, HttpRequest};
use crate::{
    Address, HolderBalance, MarketQuote, NetworkConfig, NetworkTotals, PricePoint, ProviderId,
};

/// ERC-20 `balanceOf(address)`.
const BALANCE_OF_SELECTOR: &str = "70a08231";

/// AddressResolver `getAddress(bytes32)`.
const GET_ADDRESS_SELECTOR: &str = "21f8a721";

/// Ethereum JSON-RPC source for contract reads and balances.
///
/// Contract names resolve through the config's registry first, then through
/// the on-chain AddressResolver; resolved addresses are cached for the
/// adapter's lifetime. View methods resolve through the selector table and
/// take either no argument or one `bytes32` key.
#[derive(Clone)]
pub struct RpcAdapter {
    http_client: Arc<dyn HttpClient>,
    rpc_url: String,
    config: Arc<NetworkConfig>,
    next_id: Arc<AtomicU64>,
    resolved: Arc<Mutex<HashMap<String, Address>>>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<String>,
    error: Option<RpcErrorPayload>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorPayload {
    code: i64,
    message: String,
}

impl RpcAdapter {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        rpc_url: impl Into<String>,
        config: Arc<NetworkConfig>,
    ) -> Self {
        Self {
            http_client,
            rpc_url: rpc_url.into(),
            config,
            next_id: Arc::new(AtomicU64::new(1)),
            resolved: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn resolve(&self, name: &str) -> Result<Address, SourceError> {
        if let Some(address) = self.config.contract_address(name) {
            return Ok(address.clone());
        }
        let cached = self.cache().get(name).cloned();
        if let Some(address) = cached {
            return Ok(address);
        }

        let resolver = self.config.contract_address(ADDRESS_RESOLVER).ok_or_else(|| {
            SourceError::invalid_request(format!("contract '{name}' has no configured address"))
        })?;
        let word = self
            .eth_call_word(resolver, call_data(GET_ADDRESS_SELECTOR, Some(name)))
            .await?;
        let address = word_to_address(&word)?.ok_or_else(|| {
            SourceError::invalid_request(format!(
                "contract '{name}' is not registered with the address resolver"
            ))
        })?;

        debug!(contract = name, address = %address, "resolved contract address");
        self.cache().insert(name.to_owned(), address.clone());
        Ok(address)
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, HashMap<String, Address>> {
        self.resolved.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn call(&self, method: &str, params: Value) -> Result<String, SourceError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let request =
            HttpRequest::post_json(&self.rpc_url, &body).with_timeout_ms(self.config.timeout_ms);

        let raw = execute(self.http_client.as_ref(), "rpc", request).await?;
        let response: RpcResponse = serde_json::from_str(&raw).map_err(|error| {
            SourceError::malformed_response(format!("rpc response is not JSON-RPC: {error}"))
        })?;

        if let Some(error) = response.error {
            return Err(SourceError::unavailable(format!(
                "rpc error {}: {}",
                error.code, error.message
            )));
        }

        response
            .result
            .ok_or_else(|| SourceError::malformed_response("rpc response has no result"))
    }

    async fn eth_call_word(&self, to: &Address, data: String) -> Result<String, SourceError> {
        self.call(
            "eth_call",
            json!([{ "to": to.as_str(), "data": data }, "latest"]),
        )
        .await
    }

    async fn eth_call(&self, to: &Address, data: String) -> Result<f64, SourceError> {
        let result = self.eth_call_word(to, data).await?;
        quantity_to_f64(&result)
    }
}

impl DataSource for RpcAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Rpc
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::none()
            .with(Endpoint::ContractRead)
            .with(Endpoint::TokenBalance)
    }

    fn contract_read<'a>(&'a self, call: ContractCall) -> SourceFuture<'a, f64> {
        Box::pin(async move {
            let selector = self.config.selector(&call.method).ok_or_else(|| {
                SourceError::invalid_request(format!(
                    "method '{}' has no configured selector",
                    call.method
                ))
            })?;
            let address = self.resolve(&call.contract).await?;

            let data = call_data(selector.hex_digits(), call.key.as_deref());
            let raw = self.eth_call(&address, data).await?;
            Ok(scale(raw, DEFAULT_TOKEN_DECIMALS))
        })
    }

    fn token_balance<'a>(&'a self, req: BalanceRequest) -> SourceFuture<'a, f64> {
        Box::pin(async move {
            let holder = self.resolve(&req.holder).await?;

            let raw = match &req.token {
                TokenRef::Native => {
                    let result = self
                        .call("eth_getBalance", json!([holder.as_str(), "latest"]))
                        .await?;
                    quantity_to_f64(&result)?
                }
                TokenRef::Contract(token) => {
                    let token = self.resolve(token).await?;
                    self.eth_call(&token, balance_of_call_data(&holder)).await?
                }
            };

            Ok(scale(raw, req.decimals))
        })
    }

    fn market_quote<'a>(&'a self, req: QuoteRequest) -> SourceFuture<'a, MarketQuote> {
        Box::pin(async move {
            let _ = req;
            Err(SourceError::unsupported_endpoint(Endpoint::MarketQuote))
        })
    }

    fn price_series<'a>(&'a self, req: PriceSeriesRequest) -> SourceFuture<'a, Vec<PricePoint>> {
        Box::pin(async move {
            let _ = req;
            Err(SourceError::unsupported_endpoint(Endpoint::PriceSeries))
        })
    }

    fn holders<'a>(&'a self, req: HoldersRequest) -> SourceFuture<'a, Vec<HolderBalance>> {
        Box::pin(async move {
            let _ = req;
            Err(SourceError::unsupported_endpoint(Endpoint::Holders))
        })
    }

    fn network_totals<'a>(&'a self) -> SourceFuture<'a, NetworkTotals> {
        Box::pin(async move { Err(SourceError::unsupported_endpoint(Endpoint::NetworkTotals)) })
    }

    fn health<'a>(&'a self) -> Pin<Box<dyn Future<Output = HealthStatus> + Send + 'a>> {
        Box::pin(async move { HealthStatus::healthy(90) })
    }
}

/// Selector followed by the key as a left-aligned, zero-padded `bytes32` word.
fn call_data(selector: &str, key: Option<&str>) -> String {
    match key {
        Some(key) => {
            let hex: String = key.bytes().map(|byte| format!("{byte:02x}")).collect();
            format!("0x{selector}{hex:0<64}")
        }
        None => format!("0x{selector}"),
    }
}

/// Address in the low 20 bytes of a returned word; `None` for the zero address.
fn word_to_address(word: &str) -> Result<Option<Address>, SourceError> {
    let digits = word.strip_prefix("0x").unwrap_or(word);
    let tail = digits
        .len()
        .checked_sub(40)
        .map(|start| &digits[start..])
        .ok_or_else(|| {
            SourceError::malformed_response(format!("'{word}' does not hold an address"))
        })?;
    if tail.bytes().all(|byte| byte == b'0') {
        return Ok(None);
    }
    Address::parse(&format!("0x{tail}"))
        .map(Some)
        .map_err(|error| SourceError::malformed_response(error.to_string()))
}

/// `balanceOf(holder)` call data: selector plus the address left-padded to 32 bytes.
fn balance_of_call_data(holder: &Address) -> String {
    format!("0x{BALANCE_OF_SELECTOR}{:0>64}", holder.hex_digits())
}

/// Parses a hex quantity or 32-byte word into a float.
///
/// Precision loss past 2^53 is acceptable for display figures.
fn quantity_to_f64(raw: &str) -> Result<f64, SourceError> {
    let digits = raw
        .strip_prefix("0x")
        .ok_or_else(|| SourceError::malformed_response(format!("'{raw}' is not a hex quantity")))?;
    if digits.is_empty() {
        return Err(SourceError::malformed_response(
            "call returned no data; the contract may not implement the method",
        ));
    }

    digits.chars().try_fold(0.0_f64, |acc, ch| {
        ch.to_digit(16)
            .map(|digit| acc * 16.0 + f64::from(digit))
            .ok_or_else(|| {
                SourceError::malformed_response(format!("'{raw}' is not a hex quantity"))
            })
    })
}

fn scale(raw: f64, decimals: u8) -> f64 {
    raw / 10_f64.powi(i32::from(decimals))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_balance_of_with_padded_holder() {
        let holder = Address::parse("0x57ab1ec28d129707052df4df418d58a2d46d5f51").expect("valid");
        let data = balance_of_call_data(&holder);

        assert_eq!(data.len(), 2 + 8 + 64);
        assert!(data.starts_with("0x70a08231000000000000000000000000"));
        assert!(data.ends_with("57ab1ec28d129707052df4df418d58a2d46d5f51"));
    }

    #[test]
    fn encodes_bytes32_keys_left_aligned() {
        let data = call_data("83d625d4", Some("sUSD"));

        assert_eq!(data.len(), 2 + 8 + 64);
        assert_eq!(&data[..18], "0x83d625d473555344");
        assert!(data[18..].bytes().all(|byte| byte == b'0'));
        assert_eq!(call_data("18160ddd", None), "0x18160ddd");
    }

    #[test]
    fn reads_addresses_from_returned_words() {
        let word = format!("0x{:0>64}", "57ab1ec28d129707052df4df418d58a2d46d5f51");
        let address = word_to_address(&word).expect("valid").expect("non-zero");
        assert_eq!(address.as_str(), "0x57ab1ec28d129707052df4df418d58a2d46d5f51");

        assert_eq!(word_to_address(&format!("0x{}", "0".repeat(64))).expect("valid"), None);
        assert!(word_to_address("0x1234").is_err());
    }

    #[test]
    fn parses_quantities_and_words() {
        assert_eq!(quantity_to_f64("0x0").expect("valid"), 0.0);
        assert_eq!(quantity_to_f64("0xde0b6b3a7640000").expect("valid"), 1e18);
        let word = format!("0x{:0>64}", "de0b6b3a7640000");
        assert_eq!(quantity_to_f64(&word).expect("valid"), 1e18);
    }

    #[test]
    fn empty_call_result_is_malformed() {
        let err = quantity_to_f64("0x").expect_err("must fail");
        assert_eq!(err.code(), "source.malformed_response");
    }

    #[test]
    fn scales_by_token_decimals() {
        assert_eq!(scale(1e18, 18), 1.0);
        assert_eq!(scale(4_212_500_000.0, 8), 42.125);
    }
}
