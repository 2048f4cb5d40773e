use std::sync::atomic::{AtomicUsize, Ordering};

use synthstats_tests::*;

/// Answers every request with the same status and body, counting calls.
struct StaticHttpClient {
    status: u16,
    body: &'static str,
    calls: AtomicUsize,
}

impl StaticHttpClient {
    fn new(status: u16, body: &'static str) -> Arc<Self> {
        Arc::new(Self {
            status,
            body,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl HttpClient for StaticHttpClient {
    fn execute<'a>(&'a self, _request: HttpRequest) -> HttpFuture<'a> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(HttpResponse {
                status: self.status,
                body: self.body.to_owned(),
            })
        })
    }
}

struct SourceCase {
    id: ProviderId,
    source: Arc<dyn DataSource>,
    http: Option<Arc<StaticHttpClient>>,
}

fn source_cases() -> Vec<SourceCase> {
    let rpc_http = StaticHttpClient::new(503, "unavailable");
    let subgraph_http = StaticHttpClient::new(503, "unavailable");
    let cmc_http = StaticHttpClient::new(503, "unavailable");

    let mut rpc_config = NetworkConfig::default();
    rpc_config.contracts.insert(
        String::from("EtherCollateral"),
        Address::parse("0x00000000000000000000000000000000000000e1").expect("valid address"),
    );

    vec![
        SourceCase {
            id: ProviderId::Fixture,
            source: Arc::new(FixtureAdapter::default()),
            http: None,
        },
        SourceCase {
            id: ProviderId::Rpc,
            source: Arc::new(RpcAdapter::new(
                rpc_http.clone(),
                "https://rpc.test",
                Arc::new(rpc_config),
            )),
            http: Some(rpc_http),
        },
        SourceCase {
            id: ProviderId::Subgraph,
            source: Arc::new(SubgraphAdapter::new(
                subgraph_http.clone(),
                "https://subgraph.test",
            )),
            http: Some(subgraph_http),
        },
        SourceCase {
            id: ProviderId::Cmc,
            source: Arc::new(CoinMarketCapAdapter::new(
                cmc_http.clone(),
                "test-key",
                "https://cmc.test",
            )),
            http: Some(cmc_http),
        },
    ]
}

/// Calls `endpoint` and returns the error kind, or `None` on success.
async fn attempt(source: &dyn DataSource, endpoint: Endpoint) -> Option<SourceErrorKind> {
    let result = match endpoint {
        Endpoint::ContractRead => source
            .contract_read(ContractCall::new("Synthetix", "totalSupply").expect("valid call"))
            .await
            .map(|_| ()),
        Endpoint::TokenBalance => source
            .token_balance(
                BalanceRequest::new(TokenRef::Native, "EtherCollateral").expect("valid request"),
            )
            .await
            .map(|_| ()),
        Endpoint::MarketQuote => source
            .market_quote(QuoteRequest::new(AssetSymbol::snx()))
            .await
            .map(|_| ()),
        Endpoint::PriceSeries => source
            .price_series(PriceSeriesRequest::new(AssetSymbol::snx(), ChartPeriod::Week))
            .await
            .map(|_| ()),
        Endpoint::Holders => source
            .holders(HoldersRequest::new(AssetSymbol::susd(), 5).expect("valid request"))
            .await
            .map(|_| ()),
        Endpoint::NetworkTotals => source.network_totals().await.map(|_| ()),
    };
    result.err().map(|error| error.kind())
}

const ENDPOINTS: [Endpoint; 6] = [
    Endpoint::ContractRead,
    Endpoint::TokenBalance,
    Endpoint::MarketQuote,
    Endpoint::PriceSeries,
    Endpoint::Holders,
    Endpoint::NetworkTotals,
];

#[tokio::test]
async fn every_source_reports_its_own_id() {
    for case in source_cases() {
        assert_eq!(case.source.id(), case.id);
    }
}

#[tokio::test]
async fn undeclared_endpoints_are_unsupported_and_never_reach_the_network() {
    for case in source_cases() {
        let capabilities = case.source.capabilities();
        for endpoint in ENDPOINTS {
            if capabilities.supports(endpoint) {
                continue;
            }
            let before = case.http.as_ref().map_or(0, |http| http.calls());
            let kind = attempt(case.source.as_ref(), endpoint).await;
            assert_eq!(
                kind,
                Some(SourceErrorKind::UnsupportedEndpoint),
                "source '{}' endpoint '{endpoint}'",
                case.id
            );
            let after = case.http.as_ref().map_or(0, |http| http.calls());
            assert_eq!(before, after, "source '{}' made a request for '{endpoint}'", case.id);
        }
    }
}

#[tokio::test]
async fn declared_endpoints_surface_upstream_outages_as_unavailable() {
    for case in source_cases().into_iter().filter(|case| case.http.is_some()) {
        let capabilities = case.source.capabilities();
        for endpoint in ENDPOINTS.into_iter().filter(|e| capabilities.supports(*e)) {
            let kind = attempt(case.source.as_ref(), endpoint).await;
            assert_eq!(
                kind,
                Some(SourceErrorKind::Unavailable),
                "source '{}' endpoint '{endpoint}'",
                case.id
            );
        }
    }
}

#[tokio::test]
async fn fixture_serves_every_endpoint() {
    let fixture = FixtureAdapter::default();
    for endpoint in ENDPOINTS {
        assert!(fixture.capabilities().supports(endpoint));
        assert_eq!(attempt(&fixture, endpoint).await, None, "endpoint '{endpoint}'");
    }
}

#[tokio::test]
async fn every_source_reports_a_usable_health_score() {
    for case in source_cases() {
        let health = case.source.health().await;
        assert_ne!(health.state, HealthState::Unhealthy, "source '{}'", case.id);
        assert!(health.score > 0, "source '{}'", case.id);
    }
}

#[tokio::test]
async fn router_falls_back_to_the_next_capable_source() {
    // The subgraph outranks the fixture in auto mode, so it is tried first.
    let subgraph_http = StaticHttpClient::new(503, "unavailable");
    let sources: Vec<Arc<dyn DataSource>> = vec![
        Arc::new(SubgraphAdapter::new(subgraph_http.clone(), "https://subgraph.test")),
        Arc::new(FixtureAdapter::default()),
    ];
    let router = SourceRouter::new(sources);

    let route = router
        .route_network_totals(SourceStrategy::Auto)
        .await
        .expect("fixture answers after the subgraph fails");

    assert_eq!(route.selected_source, ProviderId::Fixture);
    assert_eq!(route.source_chain, vec![ProviderId::Subgraph, ProviderId::Fixture]);
    assert_eq!(route.errors.len(), 1);
    assert_eq!(route.errors[0].code, "source.unavailable");
    assert_eq!(route.errors[0].source, Some(ProviderId::Subgraph));
    assert_eq!(route.warnings.len(), 1);
    assert_eq!(subgraph_http.calls(), 1);
}

#[tokio::test]
async fn strict_routing_does_not_fall_back() {
    let subgraph_http = StaticHttpClient::new(503, "unavailable");
    let sources: Vec<Arc<dyn DataSource>> = vec![
        Arc::new(SubgraphAdapter::new(subgraph_http, "https://subgraph.test")),
        Arc::new(FixtureAdapter::default()),
    ];
    let router = SourceRouter::new(sources);

    let failure = router
        .route_network_totals(SourceStrategy::Strict(ProviderId::Subgraph))
        .await
        .expect_err("strict subgraph fails");

    assert_eq!(failure.source_chain, vec![ProviderId::Subgraph]);
    assert_eq!(failure.errors.len(), 1);
}

#[tokio::test]
async fn strict_routing_to_an_unregistered_source_fails_fast() {
    let router = SourceRouter::new(vec![Arc::new(FixtureAdapter::default())]);

    let failure = router
        .route_market_quote(
            &QuoteRequest::new(AssetSymbol::snx()),
            SourceStrategy::Strict(ProviderId::Cmc),
        )
        .await
        .expect_err("cmc is not registered");

    assert_eq!(failure.errors[0].code, "source.adapter_not_registered");
}
