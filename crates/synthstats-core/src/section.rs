//! The network section: concurrent fetches feeding one composable snapshot.
//!
//! [`NetworkSection::start`] spawns one task per slot. Slots resolve
//! independently and each applied result bumps a change counter, so a
//! consumer can render partial data, wait for the next change, and render
//! again. The price chart is driven by a [`ChartController`] that re-issues
//! its fetch whenever a period is selected.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::data_source::{
    BalanceRequest, ContractCall, HoldersRequest, PriceSeriesRequest, QuoteRequest, SourceError,
    TokenRef,
};
use crate::query::MetricQueryResult;
use crate::routing::{RouteResult, SourceRouter, SourceStrategy};
use crate::slot::{QuerySlot, SlotKey, SlotOutcome, SlotState, SlotTicket};
use crate::view::{compose, NetworkView};
use crate::{
    AssetSymbol, ChartPeriod, EnvelopeError, HolderBalance, MarketQuote, NetworkConfig,
    NetworkTotals, PricePoint, ProviderId,
};

const SYNTHETIX: &str = "Synthetix";
const SYNTHS_USD: &str = "SynthsUSD";
const SYSTEM_SETTINGS: &str = "SystemSettings";
const SUSD_CURRENCY_KEY: &str = "sUSD";
const REN_BTC: &str = "renBTC";
const REN_BTC_DECIMALS: u8 = 8;

/// Owns the selected chart period and the price-series fetch.
///
/// Selecting a period, including the active one, aborts the in-flight
/// request and issues a new one. The slot's generation guard drops any
/// response that still lands for an older request.
pub struct ChartController {
    router: Arc<SourceRouter>,
    strategy: SourceStrategy,
    symbol: AssetSymbol,
    period: Mutex<ChartPeriod>,
    slot: QuerySlot<Vec<PricePoint>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ChartController {
    pub fn new(
        router: Arc<SourceRouter>,
        strategy: SourceStrategy,
        slot: QuerySlot<Vec<PricePoint>>,
    ) -> Self {
        Self {
            router,
            strategy,
            symbol: AssetSymbol::snx(),
            period: Mutex::new(ChartPeriod::default()),
            slot,
            task: Mutex::new(None),
        }
    }

    pub async fn period(&self) -> ChartPeriod {
        *self.period.lock().await
    }

    pub fn slot(&self) -> &QuerySlot<Vec<PricePoint>> {
        &self.slot
    }

    /// Switches to `period` and fetches its series.
    pub async fn select_period(&self, period: ChartPeriod) -> SlotTicket {
        // Held for the whole switch so concurrent selections apply in order.
        let mut task = self.task.lock().await;
        if let Some(previous) = task.take() {
            previous.abort();
        }

        // The old series must be gone before the new period is observable.
        let ticket = self.slot.begin().await;
        *self.period.lock().await = period;
        let request = PriceSeriesRequest::new(self.symbol.clone(), period);
        let router = Arc::clone(&self.router);
        let strategy = self.strategy.clone();
        let slot = self.slot.clone();

        info!(%period, granularity = %request.granularity, "price chart period selected");
        *task = Some(tokio::spawn(async move {
            let route = router.route_price_series(&request, strategy).await;
            slot.resolve(ticket, SlotOutcome::from_route(route)).await;
        }));

        ticket
    }

    /// Period and chart state as one consistent pair.
    ///
    /// Waits for an in-flight switch, so the series never belongs to a
    /// period other than the one returned with it.
    pub async fn state(&self) -> (ChartPeriod, SlotState<Vec<PricePoint>>) {
        let _switch = self.task.lock().await;
        let period = *self.period.lock().await;
        (period, self.slot.snapshot().await)
    }
}

impl Drop for ChartController {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

struct NetworkSlots {
    snx_quote: QuerySlot<MarketQuote>,
    susd_quote: QuerySlot<MarketQuote>,
    snx_total_supply: QuerySlot<f64>,
    issuance_ratio: QuerySlot<f64>,
    total_issued_synths: QuerySlot<f64>,
    susd_total_supply: QuerySlot<f64>,
    eth_susd_collateral: QuerySlot<f64>,
    eth_collateral: QuerySlot<f64>,
    multi_collateral_eth: QuerySlot<f64>,
    btc_locked: QuerySlot<f64>,
    susd_short_locked: QuerySlot<f64>,
    network_totals: QuerySlot<NetworkTotals>,
    susd_holders: QuerySlot<Vec<HolderBalance>>,
}

impl NetworkSlots {
    fn new(changes: &Arc<watch::Sender<u64>>) -> Self {
        let changes = || Arc::clone(changes);
        Self {
            snx_quote: QuerySlot::new(SlotKey::SnxQuote, changes()),
            susd_quote: QuerySlot::new(SlotKey::SusdQuote, changes()),
            snx_total_supply: QuerySlot::new(SlotKey::SnxTotalSupply, changes()),
            issuance_ratio: QuerySlot::new(SlotKey::IssuanceRatio, changes()),
            total_issued_synths: QuerySlot::new(SlotKey::TotalIssuedSynths, changes()),
            susd_total_supply: QuerySlot::new(SlotKey::SusdTotalSupply, changes()),
            eth_susd_collateral: QuerySlot::new(SlotKey::EthSusdCollateral, changes()),
            eth_collateral: QuerySlot::new(SlotKey::EthCollateral, changes()),
            multi_collateral_eth: QuerySlot::new(SlotKey::MultiCollateralEth, changes()),
            btc_locked: QuerySlot::new(SlotKey::BtcLocked, changes()),
            susd_short_locked: QuerySlot::new(SlotKey::SusdShortLocked, changes()),
            network_totals: QuerySlot::new(SlotKey::NetworkTotals, changes()),
            susd_holders: QuerySlot::new(SlotKey::SusdHolders, changes()),
        }
    }
}

/// Every slot's current result plus the routing metadata behind them.
#[derive(Debug, Clone)]
pub struct NetworkSnapshot {
    pub period: ChartPeriod,
    pub snx_quote: MetricQueryResult<MarketQuote>,
    pub susd_quote: MetricQueryResult<MarketQuote>,
    pub snx_total_supply: MetricQueryResult<f64>,
    pub issuance_ratio: MetricQueryResult<f64>,
    pub total_issued_synths: MetricQueryResult<f64>,
    pub susd_total_supply: MetricQueryResult<f64>,
    pub eth_susd_collateral: MetricQueryResult<f64>,
    pub eth_collateral: MetricQueryResult<f64>,
    pub multi_collateral_eth: MetricQueryResult<f64>,
    pub btc_locked: MetricQueryResult<f64>,
    pub susd_short_locked: MetricQueryResult<f64>,
    pub network_totals: MetricQueryResult<NetworkTotals>,
    pub susd_holders: MetricQueryResult<Vec<HolderBalance>>,
    pub price_chart: MetricQueryResult<Vec<PricePoint>>,
    /// Every source tried by any slot, in first-seen order.
    pub source_chain: Vec<ProviderId>,
    pub errors: Vec<EnvelopeError>,
    pub warnings: Vec<String>,
    /// Slots still waiting on their first response.
    pub pending: Vec<SlotKey>,
}

impl NetworkSnapshot {
    /// True once no slot is `Loading`.
    pub fn is_settled(&self) -> bool {
        self.pending.is_empty()
    }
}

#[derive(Default)]
struct SnapshotMeta {
    source_chain: Vec<ProviderId>,
    errors: Vec<EnvelopeError>,
    warnings: Vec<String>,
    pending: Vec<SlotKey>,
}

impl SnapshotMeta {
    async fn absorb<T: Clone>(&mut self, slot: &QuerySlot<T>) -> MetricQueryResult<T> {
        let state = slot.snapshot().await;
        self.absorb_state(slot.key(), state)
    }

    fn absorb_state<T>(&mut self, key: SlotKey, state: SlotState<T>) -> MetricQueryResult<T> {
        let SlotState {
            result,
            source_chain,
            errors,
            warnings,
            ..
        } = state;

        for provider in source_chain {
            if !self.source_chain.contains(&provider) {
                self.source_chain.push(provider);
            }
        }
        self.errors.extend(errors);
        self.warnings.extend(warnings);
        if result.is_loading() {
            self.pending.push(key);
        }

        result
    }
}

/// The network section controller.
pub struct NetworkSection {
    router: Arc<SourceRouter>,
    config: Arc<NetworkConfig>,
    strategy: SourceStrategy,
    changes: Arc<watch::Sender<u64>>,
    slots: NetworkSlots,
    chart: ChartController,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl NetworkSection {
    pub fn new(
        router: Arc<SourceRouter>,
        config: Arc<NetworkConfig>,
        strategy: SourceStrategy,
    ) -> Self {
        let (changes, _) = watch::channel(0_u64);
        let changes = Arc::new(changes);
        let slots = NetworkSlots::new(&changes);
        let chart = ChartController::new(
            Arc::clone(&router),
            strategy.clone(),
            QuerySlot::new(SlotKey::PriceChart, Arc::clone(&changes)),
        );

        Self {
            router,
            config,
            strategy,
            changes,
            slots,
            chart,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Issues every fetch, with the price chart on `period`. Calling it
    /// again aborts in-flight fetches and refetches everything.
    pub async fn start(&self, period: ChartPeriod) {
        let mut tasks = self.tasks.lock().await;
        for task in tasks.drain(..) {
            task.abort();
        }

        let slots = &self.slots;
        let snx = QuoteRequest::new(AssetSymbol::snx());
        let susd = QuoteRequest::new(AssetSymbol::susd());

        let handles = [
            self.spawn(&slots.snx_quote, Ok(self.quote(snx))).await,
            self.spawn(&slots.susd_quote, Ok(self.quote(susd))).await,
            self.spawn(
                &slots.snx_total_supply,
                self.contract_read(ContractCall::new(SYNTHETIX, "totalSupply")),
            )
            .await,
            self.spawn(
                &slots.issuance_ratio,
                self.contract_read(ContractCall::new(SYSTEM_SETTINGS, "issuanceRatio")),
            )
            .await,
            self.spawn(
                &slots.total_issued_synths,
                self.contract_read(
                    ContractCall::new(SYNTHETIX, "totalIssuedSynths")
                        .and_then(|call| call.with_key(SUSD_CURRENCY_KEY)),
                ),
            )
            .await,
            self.spawn(
                &slots.susd_total_supply,
                self.contract_read(ContractCall::new(SYNTHS_USD, "totalSupply")),
            )
            .await,
            self.spawn(
                &slots.eth_susd_collateral,
                self.balance(BalanceRequest::new(TokenRef::Native, "EtherCollateralsUSD")),
            )
            .await,
            self.spawn(
                &slots.eth_collateral,
                self.balance(BalanceRequest::new(TokenRef::Native, "EtherCollateral")),
            )
            .await,
            self.spawn(
                &slots.multi_collateral_eth,
                self.balance(BalanceRequest::new(TokenRef::Native, "CollateralEth")),
            )
            .await,
            self.spawn(
                &slots.btc_locked,
                self.balance(
                    BalanceRequest::new(TokenRef::Contract(REN_BTC.to_owned()), "CollateralErc20")
                        .map(|req| req.with_decimals(REN_BTC_DECIMALS)),
                ),
            )
            .await,
            self.spawn(
                &slots.susd_short_locked,
                self.balance(BalanceRequest::new(
                    TokenRef::Contract(SYNTHS_USD.to_owned()),
                    "CollateralShort",
                )),
            )
            .await,
            self.spawn(&slots.network_totals, Ok(self.network_totals()))
                .await,
            self.spawn(
                &slots.susd_holders,
                self.holders(HoldersRequest::new(AssetSymbol::susd(), self.config.holders_max)),
            )
            .await,
        ];
        tasks.extend(handles.into_iter().flatten());
        drop(tasks);

        self.chart.select_period(period).await;
        info!(slots = SlotKey::ALL.len(), %period, "network section fetches issued");
    }

    pub async fn period(&self) -> ChartPeriod {
        self.chart.period().await
    }

    /// Switches the price chart period and refetches its series.
    pub async fn select_period(&self, period: ChartPeriod) -> SlotTicket {
        self.chart.select_period(period).await
    }

    pub fn chart(&self) -> &ChartController {
        &self.chart
    }

    /// Receiver that observes every applied slot change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    pub async fn snapshot(&self) -> NetworkSnapshot {
        let slots = &self.slots;
        let mut meta = SnapshotMeta::default();

        let snx_quote = meta.absorb(&slots.snx_quote).await;
        let susd_quote = meta.absorb(&slots.susd_quote).await;
        let snx_total_supply = meta.absorb(&slots.snx_total_supply).await;
        let issuance_ratio = meta.absorb(&slots.issuance_ratio).await;
        let total_issued_synths = meta.absorb(&slots.total_issued_synths).await;
        let susd_total_supply = meta.absorb(&slots.susd_total_supply).await;
        let eth_susd_collateral = meta.absorb(&slots.eth_susd_collateral).await;
        let eth_collateral = meta.absorb(&slots.eth_collateral).await;
        let multi_collateral_eth = meta.absorb(&slots.multi_collateral_eth).await;
        let btc_locked = meta.absorb(&slots.btc_locked).await;
        let susd_short_locked = meta.absorb(&slots.susd_short_locked).await;
        let network_totals = meta.absorb(&slots.network_totals).await;
        let susd_holders = meta.absorb(&slots.susd_holders).await;
        let (period, chart) = self.chart.state().await;
        let price_chart = meta.absorb_state(SlotKey::PriceChart, chart);

        NetworkSnapshot {
            period,
            snx_quote,
            susd_quote,
            snx_total_supply,
            issuance_ratio,
            total_issued_synths,
            susd_total_supply,
            eth_susd_collateral,
            eth_collateral,
            multi_collateral_eth,
            btc_locked,
            susd_short_locked,
            network_totals,
            susd_holders,
            price_chart,
            source_chain: meta.source_chain,
            errors: meta.errors,
            warnings: meta.warnings,
            pending: meta.pending,
        }
    }

    /// Composes the current snapshot into display panels.
    pub async fn view(&self) -> NetworkView {
        compose(&self.snapshot().await, &self.config)
    }

    /// Waits until no slot is loading, or until `timeout` passes.
    ///
    /// Returns whether the section settled in time.
    pub async fn wait_until_settled(&self, timeout: Duration) -> bool {
        let mut receiver = self.subscribe();
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if self.snapshot().await.is_settled() {
                return true;
            }
            match tokio::time::timeout_at(deadline, receiver.changed()).await {
                Ok(Ok(())) => continue,
                Ok(Err(_)) | Err(_) => return self.snapshot().await.is_settled(),
            }
        }
    }

    async fn spawn<T, Fut>(
        &self,
        slot: &QuerySlot<T>,
        fetch: Result<Fut, SourceError>,
    ) -> Option<JoinHandle<()>>
    where
        T: Clone + Send + 'static,
        Fut: Future<Output = RouteResult<T>> + Send + 'static,
    {
        let ticket = slot.begin().await;
        let fetch = match fetch {
            Ok(fetch) => fetch,
            Err(error) => {
                debug!(slot = slot.key().as_str(), %error, "request rejected before routing");
                slot.resolve(ticket, SlotOutcome::rejected(error)).await;
                return None;
            }
        };

        let slot = slot.clone();
        Some(tokio::spawn(async move {
            let outcome = SlotOutcome::from_route(fetch.await);
            slot.resolve(ticket, outcome).await;
        }))
    }

    fn quote(&self, req: QuoteRequest) -> impl Future<Output = RouteResult<MarketQuote>> {
        let router = Arc::clone(&self.router);
        let strategy = self.strategy.clone();
        async move { router.route_market_quote(&req, strategy).await }
    }

    fn contract_read(
        &self,
        call: Result<ContractCall, SourceError>,
    ) -> Result<impl Future<Output = RouteResult<f64>>, SourceError> {
        let call = call?;
        let router = Arc::clone(&self.router);
        let strategy = self.strategy.clone();
        Ok(async move { router.route_contract_read(&call, strategy).await })
    }

    fn balance(
        &self,
        req: Result<BalanceRequest, SourceError>,
    ) -> Result<impl Future<Output = RouteResult<f64>>, SourceError> {
        let req = req?;
        let router = Arc::clone(&self.router);
        let strategy = self.strategy.clone();
        Ok(async move { router.route_token_balance(&req, strategy).await })
    }

    fn network_totals(&self) -> impl Future<Output = RouteResult<NetworkTotals>> {
        let router = Arc::clone(&self.router);
        let strategy = self.strategy.clone();
        async move { router.route_network_totals(strategy).await }
    }

    fn holders(
        &self,
        req: Result<HoldersRequest, SourceError>,
    ) -> Result<impl Future<Output = RouteResult<Vec<HolderBalance>>>, SourceError> {
        let req = req?;
        let router = Arc::clone(&self.router);
        let strategy = self.strategy.clone();
        Ok(async move { router.route_holders(&req, strategy).await })
    }
}

impl Drop for NetworkSection {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{FixtureAdapter, FIXTURE_SNX_PRICE};
    use crate::data_source::Endpoint;

    fn section(adapter: FixtureAdapter) -> NetworkSection {
        NetworkSection::new(
            Arc::new(SourceRouter::new(vec![Arc::new(adapter)])),
            Arc::new(NetworkConfig::default()),
            SourceStrategy::Auto,
        )
    }

    #[tokio::test]
    async fn every_slot_settles_with_fixture_data() {
        let section = section(FixtureAdapter::default());
        section.start(ChartPeriod::Day).await;

        assert!(section.wait_until_settled(Duration::from_secs(5)).await);
        let snapshot = section.snapshot().await;
        assert!(snapshot.errors.is_empty());
        assert_eq!(snapshot.source_chain, vec![ProviderId::Fixture]);
        assert_eq!(
            snapshot.snx_quote.value().map(|quote| quote.price),
            Some(FIXTURE_SNX_PRICE)
        );
    }

    #[tokio::test]
    async fn failed_slot_settles_as_error_with_slot_tagged_envelope_error() {
        let section = section(FixtureAdapter::default().failing([Endpoint::Holders]));
        section.start(ChartPeriod::Day).await;
        section.wait_until_settled(Duration::from_secs(5)).await;

        let snapshot = section.snapshot().await;
        assert!(snapshot.susd_holders.failure().is_some());
        assert!(snapshot
            .errors
            .iter()
            .any(|error| error.slot.as_deref() == Some("susd_holders")));
    }

    #[tokio::test]
    async fn zero_holder_limit_is_rejected_without_routing() {
        let section = NetworkSection::new(
            Arc::new(SourceRouter::default()),
            Arc::new(NetworkConfig {
                holders_max: 0,
                ..NetworkConfig::default()
            }),
            SourceStrategy::Auto,
        );
        section.start(ChartPeriod::Day).await;

        let snapshot = section.snapshot().await;
        let failure = snapshot.susd_holders.failure().expect("rejected");
        assert_eq!(failure.code, "source.invalid_request");
    }

    #[tokio::test]
    async fn chart_series_resets_before_the_new_period_is_visible() {
        let (changes, _receiver) = watch::channel(0);
        let chart = Arc::new(ChartController::new(
            Arc::new(SourceRouter::new(vec![Arc::new(FixtureAdapter::default())])),
            SourceStrategy::Auto,
            QuerySlot::new(SlotKey::PriceChart, Arc::new(changes)),
        ));
        chart.select_period(ChartPeriod::Day).await;
        tokio::time::timeout(Duration::from_secs(5), async {
            while chart.slot().result().await.is_loading() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("day series settles");

        // Park the switch on the period lock.
        let period = chart.period.lock().await;
        let switch = tokio::spawn({
            let chart = Arc::clone(&chart);
            async move { chart.select_period(ChartPeriod::Week).await }
        });

        tokio::time::timeout(Duration::from_secs(5), async {
            while !chart.slot().result().await.is_loading() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("day series is cleared while the period still reads day");
        assert_eq!(*period, ChartPeriod::Day);

        drop(period);
        switch.await.expect("switch completes");
        let (period, state) = chart.state().await;
        assert_eq!(period, ChartPeriod::Week);
        assert_eq!(state.generation, 2);
    }

    #[tokio::test]
    async fn snapshot_before_start_is_all_pending() {
        let section = section(FixtureAdapter::default());
        let snapshot = section.snapshot().await;

        assert_eq!(snapshot.pending.len(), SlotKey::ALL.len());
        assert_eq!(snapshot.period, ChartPeriod::Day);
    }
}
