//! Derived metrics computed from independently arriving fetch results.
//!
//! Every function here is pure and total. A result is `Some` only when each
//! input it depends on is [`MetricQueryResult::Success`]; anything else
//! yields `None`, which the view renders as "no data". Divisions guard
//! against zero denominators and any non-finite outcome is reported as
//! `None` rather than `inf`/`NaN`.

use crate::query::MetricQueryResult;

/// Display value that is either known or not yet computable.
pub type DerivedMetric = Option<f64>;

/// `price * total_supply`.
pub fn market_cap(
    price: &MetricQueryResult<f64>,
    total_supply: &MetricQueryResult<f64>,
) -> DerivedMetric {
    finite(price.success()? * total_supply.success()?)
}

/// USD value of staked collateral: `percent_locked * total_supply * price`.
pub fn locked_value(
    percent_locked: &MetricQueryResult<f64>,
    total_supply: &MetricQueryResult<f64>,
    price: &MetricQueryResult<f64>,
) -> DerivedMetric {
    finite(percent_locked.success()? * total_supply.success()? * price.success()?)
}

/// Sum of balances, known only once every balance is known.
///
/// An empty slice sums to zero.
pub fn collateral_sum(balances: &[MetricQueryResult<f64>]) -> DerivedMetric {
    let mut total = 0.0;
    for balance in balances {
        total += balance.success()?;
    }
    finite(total)
}

/// Collateral value over issued debt: `(total_supply * price) / total_issued`.
pub fn network_collateral_ratio(
    total_supply: &MetricQueryResult<f64>,
    price: &MetricQueryResult<f64>,
    total_issued: &MetricQueryResult<f64>,
) -> DerivedMetric {
    let collateral_value = total_supply.success()? * price.success()?;
    divide(collateral_value, total_issued.success()?)
}

/// Relative change from `prior` to `current`: `current / prior - 1`.
pub fn percent_change(
    current: &MetricQueryResult<f64>,
    prior: &MetricQueryResult<f64>,
) -> DerivedMetric {
    let ratio = divide(current.success()?, prior.success()?)?;
    finite(ratio - 1.0)
}

/// `1 / ratio`; turns an issuance ratio into a collateralization target.
pub fn inverse(ratio: &MetricQueryResult<f64>) -> DerivedMetric {
    divide(1.0, ratio.success()?)
}

fn divide(numerator: f64, denominator: f64) -> DerivedMetric {
    if denominator == 0.0 {
        return None;
    }
    finite(numerator / denominator)
}

fn finite(value: f64) -> DerivedMetric {
    value.is_finite().then_some(value)
}
