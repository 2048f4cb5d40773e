use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ValidationError;

const MAX_SYMBOL_LEN: usize = 12;

/// Asset or synth ticker such as `SNX`, `sUSD` or `renBTC`.
///
/// Synth tickers carry a meaningful lowercase prefix, so case is preserved
/// and comparison is exact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssetSymbol(String);

impl AssetSymbol {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let symbol = input.trim();
        let mut chars = symbol.chars();
        match chars.next() {
            None => return Err(ValidationError::EmptySymbol),
            Some(ch) if !ch.is_ascii_alphabetic() => {
                return Err(ValidationError::SymbolInvalidStart { ch })
            }
            Some(_) => {}
        }

        if let Some((index, ch)) = symbol
            .char_indices()
            .find(|(_, ch)| !ch.is_ascii_alphanumeric())
        {
            return Err(ValidationError::SymbolInvalidChar { ch, index });
        }

        // Only ASCII remains, so bytes and chars agree.
        if symbol.len() > MAX_SYMBOL_LEN {
            return Err(ValidationError::SymbolTooLong {
                len: symbol.len(),
                max: MAX_SYMBOL_LEN,
            });
        }

        Ok(Self(symbol.to_owned()))
    }

    pub fn snx() -> Self {
        Self(String::from("SNX"))
    }

    pub fn susd() -> Self {
        Self(String::from("sUSD"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Upper-cased form used by market data APIs, which ignore the synth prefix case.
    pub fn ticker(&self) -> String {
        self.0.to_ascii_uppercase()
    }
}

impl Display for AssetSymbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for AssetSymbol {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for AssetSymbol {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<AssetSymbol> for String {
    fn from(value: AssetSymbol) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_synth_prefix_case() {
        let parsed = AssetSymbol::parse(" sUSD ").expect("symbol should parse");
        assert_eq!(parsed.as_str(), "sUSD");
        assert_ne!(parsed, AssetSymbol::parse("SUSD").expect("symbol should parse"));
    }

    #[test]
    fn rejects_invalid_start() {
        let err = AssetSymbol::parse("1INCH").expect_err("must fail");
        assert!(matches!(err, ValidationError::SymbolInvalidStart { .. }));
    }

    #[test]
    fn ticker_drops_prefix_case() {
        assert_eq!(AssetSymbol::susd().ticker(), "SUSD");
        assert_eq!(AssetSymbol::parse("renBTC").expect("symbol").ticker(), "RENBTC");
    }

    #[test]
    fn rejects_overlong_tickers() {
        let err = AssetSymbol::parse("ABCDEFGHIJKLM").expect_err("must fail");
        assert!(matches!(err, ValidationError::SymbolTooLong { len: 13, max: 12 }));
    }

    #[test]
    fn rejects_invalid_chars() {
        let err = AssetSymbol::parse("SNX-USD").expect_err("must fail");
        assert!(matches!(err, ValidationError::SymbolInvalidChar { .. }));
    }
}
