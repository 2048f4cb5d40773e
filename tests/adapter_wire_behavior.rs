//! Behavior-driven tests for adapter wire formats
//!
//! These tests script the HTTP transport and verify how each live adapter
//! encodes its requests, parses upstream payloads and maps HTTP failures
//! to source errors.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use synthstats_core::{
    Address, AssetSymbol, BalanceRequest, ChartPeriod, CoinMarketCapAdapter, ContractCall,
    DataSource, HoldersRequest, HttpClient, HttpError, HttpFuture, HttpMethod, HttpRequest,
    HttpResponse, NetworkConfig, PriceSeriesRequest, ProviderId, QuoteRequest, RatePolicy,
    RpcAdapter, SourceErrorKind, SourceRouter, SourceStrategy, SubgraphAdapter, TokenRef,
};

/// Replays canned responses in order and records every request.
#[derive(Default)]
struct ScriptedHttpClient {
    responses: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttpClient {
    fn replying(responses: impl IntoIterator<Item = Result<HttpResponse, HttpError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn json(body: &str) -> Arc<Self> {
        Self::replying([Ok(HttpResponse::ok_json(body))])
    }

    fn status(status: u16) -> Arc<Self> {
        Self::replying([Ok(HttpResponse {
            status,
            body: String::from("{}"),
        })])
    }

    fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    fn only_body(&self) -> String {
        let requests = self.requests();
        assert_eq!(requests.len(), 1, "expected exactly one request");
        requests[0].body.clone().expect("request has a body")
    }
}

impl HttpClient for ScriptedHttpClient {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a> {
        Box::pin(async move {
            self.requests.lock().expect("requests lock").push(request);
            self.responses
                .lock()
                .expect("responses lock")
                .pop_front()
                .unwrap_or_else(|| Err(HttpError::non_retryable("script exhausted")))
        })
    }
}

fn rpc_config() -> Arc<NetworkConfig> {
    let mut config = NetworkConfig::default();
    for (name, address) in [
        ("EtherCollateral", "0x00000000000000000000000000000000000000e1"),
        ("CollateralErc20", "0x00000000000000000000000000000000000000b7"),
    ] {
        config
            .contracts
            .insert(name.to_owned(), Address::parse(address).expect("valid address"));
    }
    Arc::new(config)
}

fn rpc_result(result: &str) -> String {
    format!(r#"{{"jsonrpc":"2.0","id":1,"result":"{result}"}}"#)
}

fn hex_ascii(key: &str) -> String {
    key.bytes().map(|byte| format!("{byte:02x}")).collect()
}

// =============================================================================
// JSON-RPC Adapter
// =============================================================================

#[tokio::test]
async fn rpc_contract_read_posts_eth_call_and_scales_by_18_decimals() {
    // Given: a node answering 2e18
    let http = ScriptedHttpClient::json(&rpc_result("0x1bc16d674ec80000"));
    let adapter = RpcAdapter::new(http.clone(), "https://rpc.test", rpc_config());

    // When: the total supply is read
    let value = adapter
        .contract_read(ContractCall::new("Synthetix", "totalSupply").expect("valid call"))
        .await
        .expect("read succeeds");

    // Then: the value is scaled and the call is a JSON-RPC eth_call
    assert_eq!(value, 2.0);
    let requests = http.requests();
    let request = &requests[0];
    assert_eq!(request.method, HttpMethod::Post);
    assert_eq!(request.url, "https://rpc.test");
    let body: serde_json::Value =
        serde_json::from_str(request.body.as_deref().expect("body")).expect("json body");
    assert_eq!(body["jsonrpc"], "2.0");
    assert_eq!(body["method"], "eth_call");
    assert_eq!(body["params"][0]["data"], "0x18160ddd");
    assert_eq!(body["params"][0]["to"], "0xc011a73ee8576fb46f5e1c5751ca3b9fe0af2a6f");
    assert_eq!(body["params"][1], "latest");
}

#[tokio::test]
async fn rpc_native_balance_uses_eth_get_balance() {
    let http = ScriptedHttpClient::json(&rpc_result("0xde0b6b3a7640000"));
    let adapter = RpcAdapter::new(http.clone(), "https://rpc.test", rpc_config());

    let balance = adapter
        .token_balance(
            BalanceRequest::new(TokenRef::Native, "EtherCollateral").expect("valid request"),
        )
        .await
        .expect("balance succeeds");

    assert_eq!(balance, 1.0);
    let body = http.only_body();
    assert!(body.contains("eth_getBalance"));
    assert!(body.contains("0x00000000000000000000000000000000000000e1"));
}

#[tokio::test]
async fn rpc_token_balance_encodes_balance_of_and_honours_decimals() {
    // 42.125 renBTC at 8 decimals
    let word = format!("0x{:0>64}", "fb15a620");
    let http = ScriptedHttpClient::json(&rpc_result(&word));
    let adapter = RpcAdapter::new(http.clone(), "https://rpc.test", rpc_config());

    let token = TokenRef::Contract(String::from("renBTC"));
    let request = BalanceRequest::new(token, "CollateralErc20")
        .expect("valid request")
        .with_decimals(8);
    let balance = adapter.token_balance(request).await.expect("balance succeeds");

    assert_eq!(balance, 42.125);
    let body = http.only_body();
    assert!(body.contains("0x70a08231"));
    assert!(body.contains("00000000000000000000000000000000000000b7"));
    assert!(body.contains("0xeb4c2781e4eba804ce9a9803c67d0893436bb27d"));
}

#[tokio::test]
async fn rpc_error_payload_is_reported_as_unavailable() {
    let http = ScriptedHttpClient::json(
        r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"execution reverted"}}"#,
    );
    let adapter = RpcAdapter::new(http, "https://rpc.test", rpc_config());

    let error = adapter
        .contract_read(ContractCall::new("Synthetix", "totalSupply").expect("valid call"))
        .await
        .expect_err("rpc error");

    assert_eq!(error.kind(), SourceErrorKind::Unavailable);
    assert!(error.message().contains("execution reverted"));
}

#[tokio::test]
async fn rpc_total_issued_synths_passes_the_currency_key_as_bytes32() {
    let http = ScriptedHttpClient::json(&rpc_result("0x1bc16d674ec80000"));
    let adapter = RpcAdapter::new(http.clone(), "https://rpc.test", rpc_config());

    let call = ContractCall::new("Synthetix", "totalIssuedSynths")
        .and_then(|call| call.with_key("sUSD"))
        .expect("valid call");
    let value = adapter.contract_read(call).await.expect("read succeeds");

    assert_eq!(value, 2.0);
    let body: serde_json::Value = serde_json::from_str(&http.only_body()).expect("json body");
    let expected = format!("0x83d625d4{:0<64}", "73555344");
    assert_eq!(body["params"][0]["data"], expected.as_str());
}

#[tokio::test]
async fn rpc_unlisted_contracts_resolve_through_the_address_resolver_once() {
    // Given: SystemSettings is not in the registry and the resolver knows it
    let settings = "00000000000000000000000000000000000000c5";
    let http = ScriptedHttpClient::replying([
        Ok(HttpResponse::ok_json(rpc_result(&format!("0x{settings:0>64}")))),
        Ok(HttpResponse::ok_json(rpc_result("0x1bc16d674ec80000"))),
        Ok(HttpResponse::ok_json(rpc_result("0x1bc16d674ec80000"))),
    ]);
    let adapter = RpcAdapter::new(http.clone(), "https://rpc.test", rpc_config());
    let call = ContractCall::new("SystemSettings", "issuanceRatio").expect("valid call");

    // When: the issuance ratio is read twice
    adapter.contract_read(call.clone()).await.expect("first read");
    adapter.contract_read(call).await.expect("second read");

    // Then: the resolver is asked once and both reads target the resolved address
    let bodies = http
        .requests()
        .iter()
        .map(|request| {
            serde_json::from_str::<serde_json::Value>(request.body.as_deref().expect("body"))
                .expect("json body")
        })
        .collect::<Vec<_>>();
    assert_eq!(bodies.len(), 3);
    assert_eq!(bodies[0]["params"][0]["to"], "0x4e3b31eb0e5cb73641ee1e65e7dcefe520ba3ef2");
    let lookup = format!("0x21f8a721{:0<64}", hex_ascii("SystemSettings"));
    assert_eq!(bodies[0]["params"][0]["data"], lookup.as_str());
    for body in &bodies[1..] {
        assert_eq!(body["params"][0]["to"], format!("0x{settings}").as_str());
        assert_eq!(body["params"][0]["data"], "0xb410a034");
    }
}

#[tokio::test]
async fn rpc_contract_unknown_to_the_resolver_is_an_invalid_request() {
    let http = ScriptedHttpClient::json(&rpc_result(&format!("0x{}", "0".repeat(64))));
    let adapter = RpcAdapter::new(http, "https://rpc.test", rpc_config());

    let error = adapter
        .contract_read(ContractCall::new("Unlisted", "totalSupply").expect("valid call"))
        .await
        .expect_err("resolver returns the zero address");

    assert_eq!(error.kind(), SourceErrorKind::InvalidRequest);
}

#[tokio::test]
async fn rpc_unknown_contract_without_a_resolver_fails_before_any_request() {
    let http = Arc::new(ScriptedHttpClient::default());
    let mut config = NetworkConfig::default();
    config.contracts.remove("AddressResolver");
    let adapter = RpcAdapter::new(http.clone(), "https://rpc.test", Arc::new(config));

    let error = adapter
        .contract_read(ContractCall::new("Unlisted", "totalSupply").expect("valid call"))
        .await
        .expect_err("unknown contract");

    assert_eq!(error.kind(), SourceErrorKind::InvalidRequest);
    assert!(http.requests().is_empty());
}

// =============================================================================
// Subgraph Adapter
// =============================================================================

#[tokio::test]
async fn subgraph_holders_accept_string_and_number_balances() {
    let http = ScriptedHttpClient::json(
        r#"{"data":{"synthHolders":[
            {"address":"0x00000000000000000000000000000000000000a1","balanceOf":"1234.5"},
            {"address":"0x00000000000000000000000000000000000000a2","balanceOf":99}
        ]}}"#,
    );
    let adapter = SubgraphAdapter::new(http.clone(), "https://subgraph.test");

    let holders = adapter
        .holders(HoldersRequest::new(AssetSymbol::susd(), 2).expect("valid request"))
        .await
        .expect("holders succeed");

    assert_eq!(holders.len(), 2);
    assert_eq!(holders[0].balance, 1234.5);
    assert_eq!(holders[1].balance, 99.0);

    let body: serde_json::Value = serde_json::from_str(&http.only_body()).expect("json body");
    assert!(body["query"].as_str().is_some_and(|query| query.contains("synthHolders")));
    assert_eq!(body["variables"]["synth"], "sUSD");
    assert_eq!(body["variables"]["max"], 2);
}

#[tokio::test]
async fn subgraph_network_totals_parse_into_domain_totals() {
    let http = ScriptedHttpClient::json(
        r#"{"data":{"total":{"snxHolders":"68000","percentLocked":"0.82","activeCRatio":5.1}}}"#,
    );
    let adapter = SubgraphAdapter::new(http, "https://subgraph.test");

    let totals = adapter.network_totals().await.expect("totals succeed");

    assert_eq!(totals.snx_holders, 68_000);
    assert_eq!(totals.percent_locked, 0.82);
    assert_eq!(totals.active_c_ratio, 5.1);
}

#[tokio::test]
async fn subgraph_graphql_errors_are_unavailable() {
    let http = ScriptedHttpClient::json(r#"{"data":null,"errors":[{"message":"indexer down"}]}"#);
    let adapter = SubgraphAdapter::new(http, "https://subgraph.test");

    let error = adapter.network_totals().await.expect_err("graphql error");

    assert_eq!(error.kind(), SourceErrorKind::Unavailable);
    assert!(error.message().contains("indexer down"));
}

#[tokio::test]
async fn subgraph_rates_keep_the_last_update_per_day() {
    // Two updates in one day bucket, one in the next
    let http = ScriptedHttpClient::json(
        r#"{"data":{"rateUpdates":[
            {"timestamp":"1700000000","rate":"3.10"},
            {"timestamp":"1700000100","rate":"3.20"},
            {"timestamp":"1700086400","rate":"3.30"}
        ]}}"#,
    );
    let adapter = SubgraphAdapter::new(http.clone(), "https://subgraph.test");

    let points = adapter
        .price_series(PriceSeriesRequest::new(AssetSymbol::snx(), ChartPeriod::Week))
        .await
        .expect("series succeeds");

    assert_eq!(points.len(), 2);
    assert_eq!(points[0].value, 3.2);
    assert_eq!(points[0].timestamp.unix_seconds(), 1_699_920_000);
    assert_eq!(points[1].value, 3.3);

    let body: serde_json::Value = serde_json::from_str(&http.only_body()).expect("json body");
    assert_eq!(body["variables"]["synth"], "SNX");
}

#[tokio::test]
async fn subgraph_rates_follow_the_timestamp_cursor_across_pages() {
    // Given: a full first page and a short second page
    let http = ScriptedHttpClient::replying([
        Ok(HttpResponse::ok_json(
            r#"{"data":{"rateUpdates":[
                {"timestamp":"1700000000","rate":"3.10"},
                {"timestamp":"1700000100","rate":"3.20"}
            ]}}"#,
        )),
        Ok(HttpResponse::ok_json(
            r#"{"data":{"rateUpdates":[{"timestamp":"1700086400","rate":"3.30"}]}}"#,
        )),
    ]);
    let adapter =
        SubgraphAdapter::new(http.clone(), "https://subgraph.test").with_rate_page_size(2);

    // When: the month series is requested
    let points = adapter
        .price_series(PriceSeriesRequest::new(AssetSymbol::snx(), ChartPeriod::Month))
        .await
        .expect("series succeeds");

    // Then: the newest update from the second page is kept
    assert_eq!(points.len(), 2);
    assert_eq!(points[0].value, 3.2);
    assert_eq!(points[1].value, 3.3);

    // And: the second request resumes after the last timestamp of the first
    let requests = http.requests();
    assert_eq!(requests.len(), 2);
    let second: serde_json::Value =
        serde_json::from_str(requests[1].body.as_deref().expect("body")).expect("json body");
    assert_eq!(second["variables"]["after"], 1_700_000_100);
    assert_eq!(second["variables"]["first"], 2);
}

// =============================================================================
// CoinMarketCap Adapter
// =============================================================================

#[tokio::test]
async fn cmc_quote_reads_usd_price_and_volume() {
    let http = ScriptedHttpClient::json(
        r#"{"data":{"SUSD":{"quote":{"USD":{
            "price":"0.9985","volume_24h":1200000.0,"last_updated":"2024-05-01T12:00:00Z"
        }}}}}"#,
    );
    let adapter = CoinMarketCapAdapter::new(http.clone(), "test-key", "https://cmc.test");

    let quote = adapter
        .market_quote(QuoteRequest::new(AssetSymbol::susd()))
        .await
        .expect("quote succeeds");

    assert_eq!(quote.price, 0.9985);
    assert_eq!(quote.volume_24h, Some(1_200_000.0));
    assert_eq!(quote.as_of.format_rfc3339(), "2024-05-01T12:00:00Z");

    let requests = http.requests();
    let request = &requests[0];
    assert_eq!(request.method, HttpMethod::Get);
    assert_eq!(request.url, "https://cmc.test/v1/cryptocurrency/quotes/latest?symbol=SUSD");
    assert_eq!(
        request.headers.get("x-cmc_pro_api_key").map(String::as_str),
        Some("test-key")
    );
}

#[tokio::test]
async fn cmc_missing_symbol_is_malformed() {
    let http = ScriptedHttpClient::json(r#"{"data":{}}"#);
    let adapter = CoinMarketCapAdapter::new(http, "test-key", "https://cmc.test");

    let error = adapter
        .market_quote(QuoteRequest::new(AssetSymbol::snx()))
        .await
        .expect_err("no data");

    assert_eq!(error.kind(), SourceErrorKind::MalformedResponse);
}

#[tokio::test]
async fn cmc_quotes_resume_through_the_router_once_the_quota_refills() {
    // Given: a CoinMarketCap source allowed one call per 200 ms
    let quote = r#"{"data":{"SNX":{"quote":{"USD":{"price":3.0,"volume_24h":10.0}}}}}"#;
    let http = ScriptedHttpClient::replying([
        Ok(HttpResponse::ok_json(quote)),
        Ok(HttpResponse::ok_json(quote)),
    ]);
    let adapter = CoinMarketCapAdapter::new(http.clone(), "test-key", "https://cmc.test")
        .with_rate_policy(RatePolicy {
            quota_window: Duration::from_millis(200),
            quota_limit: 1,
        });
    let sources: Vec<Arc<dyn DataSource>> = vec![Arc::new(adapter)];
    let router = SourceRouter::new(sources);
    let request = QuoteRequest::new(AssetSymbol::snx());

    // When: a burst spends the quota
    router
        .route_market_quote(&request, SourceStrategy::Auto)
        .await
        .expect("first quote is within budget");
    let refused = router
        .route_market_quote(&request, SourceStrategy::Auto)
        .await
        .expect_err("second quote is over budget");
    assert_eq!(refused.errors[0].code, "source.rate_limited");

    // Then: after the window passes the router reaches the source again
    tokio::time::sleep(Duration::from_millis(400)).await;
    let route = router
        .route_market_quote(&request, SourceStrategy::Auto)
        .await
        .expect("quota refilled");
    assert_eq!(route.selected_source, ProviderId::Cmc);
    assert_eq!(route.data.price, 3.0);
    assert_eq!(http.requests().len(), 2);
}

// =============================================================================
// HTTP Failure Mapping
// =============================================================================

#[tokio::test]
async fn http_failures_map_to_source_error_kinds() {
    let cases = [
        (ScriptedHttpClient::status(429), SourceErrorKind::RateLimited),
        (ScriptedHttpClient::status(401), SourceErrorKind::InvalidRequest),
        (ScriptedHttpClient::status(403), SourceErrorKind::InvalidRequest),
        (ScriptedHttpClient::status(502), SourceErrorKind::Unavailable),
        (
            ScriptedHttpClient::replying([Err(HttpError::new("request timeout"))]),
            SourceErrorKind::Unavailable,
        ),
        (
            ScriptedHttpClient::replying([Err(HttpError::non_retryable("invalid url"))]),
            SourceErrorKind::Internal,
        ),
        (
            ScriptedHttpClient::json("<html>not json</html>"),
            SourceErrorKind::MalformedResponse,
        ),
    ];

    for (http, expected) in cases {
        let adapter = SubgraphAdapter::new(http, "https://subgraph.test");
        let error = adapter.network_totals().await.expect_err("request fails");
        assert_eq!(error.kind(), expected, "unexpected kind for: {error}");
    }
}

#[tokio::test]
async fn retryable_failures_are_flagged_retryable() {
    let unavailable = SubgraphAdapter::new(ScriptedHttpClient::status(503), "https://subgraph.test")
        .network_totals()
        .await
        .expect_err("unavailable");
    let rejected = SubgraphAdapter::new(ScriptedHttpClient::status(401), "https://subgraph.test")
        .network_totals()
        .await
        .expect_err("rejected");

    assert!(unavailable.retryable());
    assert!(!rejected.retryable());
}
