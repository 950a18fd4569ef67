//! Desired-symbol bookkeeping.
//!
//! The set only grows while listeners come and go; it is cleared on full
//! teardown. Every symbol in it is replayed whenever a connection opens.

use std::collections::BTreeSet;
use tickwatch_core::Symbol;

/// Symbols desired by at least one active consumer.
#[derive(Debug, Default, Clone)]
pub struct SubscriptionSet {
    symbols: BTreeSet<Symbol>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a symbol. Returns `true` if it was not already present.
    pub fn insert(&mut self, symbol: Symbol) -> bool {
        self.symbols.insert(symbol)
    }

    /// Remove a symbol. Returns `true` if it was present.
    pub fn remove(&mut self, symbol: &Symbol) -> bool {
        self.symbols.remove(symbol)
    }

    /// Symbols to resend after a connection opens.
    pub fn replay(&self) -> Vec<Symbol> {
        self.symbols.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.symbols.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(s: &str) -> Symbol {
        Symbol::new(s).unwrap()
    }

    #[test]
    fn test_insert_is_idempotent_across_casing() {
        let mut set = SubscriptionSet::new();
        assert!(set.insert(sym("aapl")));
        assert!(!set.insert(sym("AAPL")));
        assert_eq!(set.replay().len(), 1);
    }

    #[test]
    fn test_replay_contains_every_symbol() {
        let mut set = SubscriptionSet::new();
        set.insert(sym("MSFT"));
        set.insert(sym("AAPL"));
        set.insert(sym("TSLA"));

        let replay = set.replay();
        assert_eq!(replay.len(), 3);
        assert!(replay.contains(&sym("AAPL")));
        assert!(replay.contains(&sym("MSFT")));
        assert!(replay.contains(&sym("TSLA")));
    }

    #[test]
    fn test_remove_and_clear() {
        let mut set = SubscriptionSet::new();
        set.insert(sym("AAPL"));
        set.insert(sym("MSFT"));
        assert!(set.remove(&sym("AAPL")));
        assert!(!set.remove(&sym("AAPL")));
        assert_eq!(set.replay(), vec![sym("MSFT")]);

        set.clear();
        assert!(set.replay().is_empty());
    }
}
