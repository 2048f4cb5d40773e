//! Display composition for the network section.
//!
//! [`compose`] turns a [`NetworkSnapshot`] into the fixed layout:
//!
//! | Block | Panels |
//! |-------|--------|
//! | Price chart | SNX price over the selected period |
//! | Market row | market cap, sUSD price, 24h volume, issuance c-ratio |
//! | Staking row | total locked, network c-ratio, active c-ratio, holders |
//! | sUSD distribution | top holders and total supply |
//! | Collateral row | ETH locked, BTC locked, sUSD locked in shorts |
//!
//! A panel is `ready` only when its value could be computed; a failed fetch
//! looks exactly like one still in flight.

use serde::{Deserialize, Serialize};

use crate::metrics::{
    collateral_sum, inverse, locked_value, market_cap, network_collateral_ratio, percent_change,
    DerivedMetric,
};
use crate::section::NetworkSnapshot;
use crate::slot::SlotKey;
use crate::{Address, ChartPeriod, Granularity, NetworkConfig, PricePoint};

/// How a panel value is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberStyle {
    /// `$1,234`
    Currency0,
    /// `$1,234.56`
    Currency2,
    /// Ratio as whole percent: `0.5` renders `50%`.
    Percent0,
    /// `1,234`
    Number,
    /// `1,234.5678`
    Number4,
}

impl NumberStyle {
    pub fn format(self, value: f64) -> String {
        match self {
            Self::Currency0 => currency(value, 0),
            Self::Currency2 => currency(value, 2),
            Self::Percent0 => format!("{}%", grouped(value * 100.0, 0)),
            Self::Number => grouped(value, 0),
            Self::Number4 => grouped(value, 4),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelColor {
    Pink,
    Green,
}

/// One stat box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatPanel {
    pub key: String,
    /// Translation key; `title` is the English default.
    pub title_key: String,
    pub title: String,
    pub subtext_key: String,
    pub value: Option<f64>,
    pub display: Option<String>,
    pub ready: bool,
    pub number_style: NumberStyle,
    pub color: PanelColor,
    /// Boxes sharing the row, used for width.
    pub num_boxes: u8,
    pub depends_on: Vec<SlotKey>,
}

struct PanelDef {
    key: &'static str,
    i18n: &'static str,
    title: &'static str,
    style: NumberStyle,
    color: PanelColor,
    depends_on: &'static [SlotKey],
}

impl StatPanel {
    fn build(def: PanelDef, num_boxes: u8, value: DerivedMetric) -> Self {
        let value = value.filter(|value| value.is_finite());
        Self {
            key: def.key.to_owned(),
            title_key: format!("{}.title", def.i18n),
            title: def.title.to_owned(),
            subtext_key: format!("{}.subtext", def.i18n),
            value,
            display: value.map(|value| def.style.format(value)),
            ready: value.is_some(),
            number_style: def.style,
            color: def.color,
            num_boxes,
            depends_on: def.depends_on.to_vec(),
        }
    }
}

/// A row of equally sized stat boxes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsRow {
    pub panels: Vec<StatPanel>,
}

impl StatsRow {
    fn new(panels: Vec<(PanelDef, DerivedMetric)>) -> Self {
        let num_boxes = u8::try_from(panels.len()).unwrap_or(u8::MAX);
        Self {
            panels: panels
                .into_iter()
                .map(|(def, value)| StatPanel::build(def, num_boxes, value))
                .collect(),
        }
    }
}

/// Price chart with period selector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaChartView {
    pub title_key: String,
    pub title: String,
    pub periods: Vec<ChartPeriod>,
    pub active_period: ChartPeriod,
    pub granularity: Granularity,
    pub series: Vec<PricePoint>,
    pub value: Option<f64>,
    pub display: Option<String>,
    /// Change of the current price against the first point of the series.
    pub percent_change: Option<f64>,
    pub number_style: NumberStyle,
    pub ready: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolderEntry {
    pub name: String,
    pub address: Address,
    pub value: f64,
}

/// Top sUSD holders next to the total supply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolderDistribution {
    pub title_key: String,
    pub holders: Vec<HolderEntry>,
    pub total_supply: Option<f64>,
    pub total_supply_display: Option<String>,
    pub ready: bool,
}

/// The full section, ready to render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkView {
    pub title_key: String,
    pub price_chart: AreaChartView,
    pub market: StatsRow,
    pub staking: StatsRow,
    pub susd_distribution: HolderDistribution,
    pub collateral: StatsRow,
    pub pending: Vec<SlotKey>,
}

impl NetworkView {
    /// Every stat panel in display order.
    pub fn panels(&self) -> impl Iterator<Item = &StatPanel> {
        self.market
            .panels
            .iter()
            .chain(&self.staking.panels)
            .chain(&self.collateral.panels)
    }

    pub fn panel(&self, key: &str) -> Option<&StatPanel> {
        self.panels().find(|panel| panel.key == key)
    }
}

pub fn compose(snapshot: &NetworkSnapshot, config: &NetworkConfig) -> NetworkView {
    let snx_price = snapshot.snx_quote.clone().map(|quote| quote.price);
    let susd_price = snapshot.susd_quote.clone().map(|quote| quote.price);
    let snx_volume = snapshot
        .snx_quote
        .clone()
        .and_then_some(|quote| quote.volume_24h);
    let percent_locked = snapshot
        .network_totals
        .clone()
        .map(|totals| totals.percent_locked);
    let active_c_ratio = snapshot
        .network_totals
        .clone()
        .map(|totals| totals.active_c_ratio);
    let snx_holders = snapshot
        .network_totals
        .clone()
        .map(|totals| totals.snx_holders as f64);
    let first_price = snapshot
        .price_chart
        .as_ref()
        .and_then_some(|series| series.first().map(|point| point.value));

    let chart_value = snx_price.success();
    let price_chart = AreaChartView {
        title_key: String::from("snx-price.title"),
        title: String::from("SNX Price"),
        periods: ChartPeriod::ALL.to_vec(),
        active_period: snapshot.period,
        granularity: snapshot.period.granularity(),
        series: snapshot.price_chart.value().cloned().unwrap_or_default(),
        value: chart_value,
        display: chart_value.map(|value| NumberStyle::Currency2.format(value)),
        percent_change: percent_change(&snx_price, &first_price),
        number_style: NumberStyle::Currency2,
        ready: chart_value.is_some() && snapshot.price_chart.is_success(),
    };

    let market = StatsRow::new(vec![
        (
            PanelDef {
                key: "SNXMKTCAP",
                i18n: "snx-market-cap",
                title: "SNX Market Cap",
                style: NumberStyle::Currency0,
                color: PanelColor::Pink,
                depends_on: &[SlotKey::SnxQuote, SlotKey::SnxTotalSupply],
            },
            market_cap(&snx_price, &snapshot.snx_total_supply),
        ),
        (
            PanelDef {
                key: "SUSDPRICE",
                i18n: "susd-price",
                title: "sUSD Price",
                style: NumberStyle::Currency2,
                color: PanelColor::Green,
                depends_on: &[SlotKey::SusdQuote],
            },
            susd_price.success(),
        ),
        (
            PanelDef {
                key: "SNXVOLUME",
                i18n: "snx-volume",
                title: "SNX Volume (24h)",
                style: NumberStyle::Currency0,
                color: PanelColor::Green,
                depends_on: &[SlotKey::SnxQuote],
            },
            snx_volume.success(),
        ),
        (
            PanelDef {
                key: "ISSUANCECRATIO",
                i18n: "issuance-ratio",
                title: "Issuance C-Ratio",
                style: NumberStyle::Percent0,
                color: PanelColor::Green,
                depends_on: &[SlotKey::IssuanceRatio],
            },
            inverse(&snapshot.issuance_ratio),
        ),
    ]);

    let staking = StatsRow::new(vec![
        (
            PanelDef {
                key: "TOTALSNXLOCKED",
                i18n: "total-snx-locked",
                title: "Total SNX Locked",
                style: NumberStyle::Currency0,
                color: PanelColor::Pink,
                depends_on: &[
                    SlotKey::NetworkTotals,
                    SlotKey::SnxTotalSupply,
                    SlotKey::SnxQuote,
                ],
            },
            locked_value(&percent_locked, &snapshot.snx_total_supply, &snx_price),
        ),
        (
            PanelDef {
                key: "NETWORKCRATIO",
                i18n: "network-cratio",
                title: "Network C-Ratio",
                style: NumberStyle::Percent0,
                color: PanelColor::Green,
                depends_on: &[
                    SlotKey::SnxTotalSupply,
                    SlotKey::SnxQuote,
                    SlotKey::TotalIssuedSynths,
                ],
            },
            network_collateral_ratio(
                &snapshot.snx_total_supply,
                &snx_price,
                &snapshot.total_issued_synths,
            ),
        ),
        (
            PanelDef {
                key: "ACTIVECRATIO",
                i18n: "active-cratio",
                title: "Active C-Ratio",
                style: NumberStyle::Percent0,
                color: PanelColor::Green,
                depends_on: &[SlotKey::NetworkTotals],
            },
            active_c_ratio.success(),
        ),
        (
            PanelDef {
                key: "SNXHOLDERS",
                i18n: "snx-holders",
                title: "SNX Holders",
                style: NumberStyle::Number,
                color: PanelColor::Green,
                depends_on: &[SlotKey::NetworkTotals],
            },
            snx_holders.success(),
        ),
    ]);

    let collateral = StatsRow::new(vec![
        (
            PanelDef {
                key: "ETHLOCKED",
                i18n: "eth-collateral",
                title: "ETH Locked",
                style: NumberStyle::Number4,
                color: PanelColor::Green,
                depends_on: &[
                    SlotKey::EthSusdCollateral,
                    SlotKey::EthCollateral,
                    SlotKey::MultiCollateralEth,
                ],
            },
            collateral_sum(&[
                snapshot.eth_susd_collateral.clone(),
                snapshot.eth_collateral.clone(),
                snapshot.multi_collateral_eth.clone(),
            ]),
        ),
        (
            PanelDef {
                key: "BTCLOCKED",
                i18n: "btc-collateral",
                title: "BTC Locked",
                style: NumberStyle::Number4,
                color: PanelColor::Green,
                depends_on: &[SlotKey::BtcLocked],
            },
            snapshot.btc_locked.success(),
        ),
        (
            PanelDef {
                key: "USDLOCKEDSHORT",
                i18n: "short-collateral",
                title: "sUSD Locked in Shorts",
                style: NumberStyle::Currency0,
                color: PanelColor::Pink,
                depends_on: &[SlotKey::SusdShortLocked],
            },
            snapshot.susd_short_locked.success(),
        ),
    ]);

    let total_supply = snapshot.susd_total_supply.success();
    let susd_distribution = HolderDistribution {
        title_key: String::from("susd-distribution.title"),
        holders: snapshot
            .susd_holders
            .value()
            .map(|holders| {
                holders
                    .iter()
                    .map(|holder| HolderEntry {
                        name: config.holder_label(&holder.address),
                        address: holder.address.clone(),
                        value: holder.balance,
                    })
                    .collect()
            })
            .unwrap_or_default(),
        total_supply,
        total_supply_display: total_supply.map(|value| NumberStyle::Currency0.format(value)),
        ready: snapshot.susd_holders.is_success(),
    };

    NetworkView {
        title_key: String::from("section-header.network"),
        price_chart,
        market,
        staking,
        susd_distribution,
        collateral,
        pending: snapshot.pending.clone(),
    }
}

fn currency(value: f64, decimals: usize) -> String {
    let body = grouped(value.abs(), decimals);
    if value < 0.0 {
        format!("-${body}")
    } else {
        format!("${body}")
    }
}

/// Fixed-point rendering with comma thousands separators.
fn grouped(value: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, value.abs());
    let (integer, fraction) = match fixed.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (fixed.as_str(), None),
    };

    let mut output = String::with_capacity(fixed.len() + integer.len() / 3 + 1);
    if value < 0.0 && fixed.chars().any(|ch| ch.is_ascii_digit() && ch != '0') {
        output.push('-');
    }
    for (index, ch) in integer.chars().enumerate() {
        if index > 0 && (integer.len() - index) % 3 == 0 {
            output.push(',');
        }
        output.push(ch);
    }
    if let Some(fraction) = fraction {
        output.push('.');
        output.push_str(fraction);
    }
    output
}
