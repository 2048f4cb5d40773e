// Shared imports for the source contract and wire tests
pub use std::sync::Arc;
pub use synthstats_core::{
    adapters::{CoinMarketCapAdapter, FixtureAdapter, RpcAdapter, SubgraphAdapter},
    data_source::{
        BalanceRequest, ContractCall, DataSource, Endpoint, HealthState, HoldersRequest,
        PriceSeriesRequest, QuoteRequest, SourceErrorKind, TokenRef,
    },
    http_client::{HttpClient, HttpFuture, HttpRequest, HttpResponse},
    routing::{SourceRouter, SourceStrategy},
    Address, AssetSymbol, ChartPeriod, NetworkConfig, ProviderId,
};
