//! Instrument symbol type.
//!
//! Symbols are compared and sent upper-cased, so subscribing to `aapl`
//! and `AAPL` refers to the same stream.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Case-normalized instrument symbol (e.g., "AAPL", "BINANCE:BTCUSDT").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Create a symbol, trimming whitespace and upper-casing.
    pub fn new(raw: impl AsRef<str>) -> Result<Self> {
        let normalized = raw.as_ref().trim().to_uppercase();
        if normalized.is_empty() {
            return Err(CoreError::InvalidSymbol(raw.as_ref().to_string()));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Symbol without its exchange prefix ("BINANCE:BTCUSDT" -> "BTCUSDT").
    pub fn display_name(&self) -> &str {
        self.0.split_once(':').map_or(self.0.as_str(), |(_, name)| name)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Symbol {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Symbol {
    type Error = CoreError;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_is_upper_cased() {
        let symbol = Symbol::new(" aapl ").unwrap();
        assert_eq!(symbol.as_str(), "AAPL");
        assert_eq!(symbol, Symbol::new("AAPL").unwrap());
    }

    #[test]
    fn test_empty_symbol_rejected() {
        assert!(matches!(Symbol::new("   "), Err(CoreError::InvalidSymbol(_))));
    }

    #[test]
    fn test_display_name_strips_exchange_prefix() {
        let symbol = Symbol::new("binance:btcusdt").unwrap();
        assert_eq!(symbol.display_name(), "BTCUSDT");
        assert_eq!(Symbol::new("MSFT").unwrap().display_name(), "MSFT");
    }

    #[test]
    fn test_symbol_deserializes_normalized() {
        let symbol: Symbol = serde_json::from_str("\"tsla\"").unwrap();
        assert_eq!(symbol.as_str(), "TSLA");
        assert!(serde_json::from_str::<Symbol>("\"\"").is_err());
    }
}
