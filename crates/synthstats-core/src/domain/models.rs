use serde::{Deserialize, Serialize};

use crate::{Address, AssetSymbol, UtcDateTime, ValidationError};

/// One sample of a price series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: UtcDateTime,
    pub value: f64,
}

impl PricePoint {
    pub fn new(timestamp: UtcDateTime, value: f64) -> Result<Self, ValidationError> {
        validate_non_negative("value", value)?;
        Ok(Self { timestamp, value })
    }
}

/// Latest market figures for one asset, in USD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketQuote {
    pub symbol: AssetSymbol,
    pub price: f64,
    pub volume_24h: Option<f64>,
    pub as_of: UtcDateTime,
}

impl MarketQuote {
    pub fn new(
        symbol: AssetSymbol,
        price: f64,
        volume_24h: Option<f64>,
        as_of: UtcDateTime,
    ) -> Result<Self, ValidationError> {
        validate_non_negative("price", price)?;
        validate_optional_non_negative("volume_24h", volume_24h)?;

        Ok(Self {
            symbol,
            price,
            volume_24h,
            as_of,
        })
    }
}

/// Balance of a single holder in a ranked holder list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolderBalance {
    pub address: Address,
    pub balance: f64,
}

impl HolderBalance {
    pub fn new(address: Address, balance: f64) -> Result<Self, ValidationError> {
        validate_non_negative("balance", balance)?;
        Ok(Self { address, balance })
    }
}

/// Network-wide staking aggregates from the index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetworkTotals {
    pub snx_holders: u64,
    /// Share of collateral supply staked, in `[0, 1]`.
    pub percent_locked: f64,
    /// Collateral-to-debt ratio of wallets that currently hold debt.
    pub active_c_ratio: f64,
}

impl NetworkTotals {
    pub fn new(
        snx_holders: u64,
        percent_locked: f64,
        active_c_ratio: f64,
    ) -> Result<Self, ValidationError> {
        validate_non_negative("percent_locked", percent_locked)?;
        validate_non_negative("active_c_ratio", active_c_ratio)?;

        Ok(Self {
            snx_holders,
            percent_locked,
            active_c_ratio,
        })
    }
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}

fn validate_optional_non_negative(
    field: &'static str,
    value: Option<f64>,
) -> Result<(), ValidationError> {
    match value {
        Some(value) => validate_non_negative(field, value),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_negative_price() {
        let err = MarketQuote::new(AssetSymbol::snx(), -1.0, None, UtcDateTime::now())
            .expect_err("must fail");
        assert_eq!(err, ValidationError::NegativeValue { field: "price" });
    }

    #[test]
    fn rejects_nan_balance() {
        let address = Address::parse("0x57ab1ec28d129707052df4df418d58a2d46d5f51").expect("valid");
        let err = HolderBalance::new(address, f64::NAN).expect_err("must fail");
        assert_eq!(err, ValidationError::NonFiniteValue { field: "balance" });
    }
}
