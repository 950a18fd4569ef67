//! Latest-quote cache.

use dashmap::DashMap;
use tickwatch_core::{Quote, Symbol};

/// Most recent quote per symbol, most-recent-wins.
#[derive(Debug, Default)]
pub struct QuoteBook {
    quotes: DashMap<Symbol, Quote>,
}

impl QuoteBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, quote: &Quote) {
        self.quotes.insert(quote.symbol.clone(), quote.clone());
    }

    pub fn get(&self, symbol: &Symbol) -> Option<Quote> {
        self.quotes.get(symbol).map(|q| q.clone())
    }

    /// All quotes, sorted by symbol.
    pub fn snapshot(&self) -> Vec<Quote> {
        let mut quotes: Vec<Quote> = self.quotes.iter().map(|e| e.value().clone()).collect();
        quotes.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        quotes
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(symbol: &str, price: f64) -> Quote {
        Quote {
            symbol: Symbol::new(symbol).unwrap(),
            price,
            change_percent: Some(0.0),
            observed_at_ms: 0,
        }
    }

    #[test]
    fn test_latest_value_wins() {
        let book = QuoteBook::new();
        book.update(&quote("AAPL", 1.0));
        book.update(&quote("AAPL", 2.0));

        assert_eq!(book.len(), 1);
        assert_eq!(book.get(&Symbol::new("aapl").unwrap()).unwrap().price, 2.0);
    }

    #[test]
    fn test_snapshot_sorted() {
        let book = QuoteBook::new();
        book.update(&quote("TSLA", 3.0));
        book.update(&quote("AAPL", 1.0));
        book.update(&quote("MSFT", 2.0));

        let symbols: Vec<String> = book.snapshot().iter().map(|q| q.symbol.to_string()).collect();
        assert_eq!(symbols, vec!["AAPL", "MSFT", "TSLA"]);
    }
}
