//! Main application orchestration.
//!
//! Coordinates all components:
//! - Shared market-data stream
//! - Alert store (in memory or a JSON file) seeded from configuration
//! - Alert monitor and quote book as tick listeners
//! - Connection-state logging

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::quote_book::QuoteBook;
use std::sync::Arc;
use tickwatch_alert::{
    AlertCatalog, AlertMonitor, AlertStore, InMemoryAlertStore, JsonFileAlertStore, LogNotifier,
    Notifier,
};
use tickwatch_core::{Quote, Symbol};
use tickwatch_telemetry::Metrics;
use tickwatch_ws::{
    ConnectionConfig, HandlerResult, StateSubscription, StreamManager, TickSubscription,
};
use tracing::{debug, info, warn};

/// Main application.
pub struct Application {
    config: AppConfig,
    stream: StreamManager,
    store: Arc<dyn AlertCatalog>,
    monitor_store: Arc<dyn AlertStore>,
    notifier: Arc<dyn Notifier>,
    quotes: Arc<QuoteBook>,
}

impl Application {
    /// Create a new application. Fails if the API key is missing.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let connection = config.stream.connection_config()?;
        Self::with_connection(config, connection, Arc::new(LogNotifier))
    }

    /// Create an application with an explicit connection and notifier.
    pub fn with_connection(
        config: AppConfig,
        connection: ConnectionConfig,
        notifier: Arc<dyn Notifier>,
    ) -> AppResult<Self> {
        config.validate()?;

        let stream = StreamManager::new(connection).map_err(Box::new)?;

        let cooldown_ms = config.alerts.default_cooldown_ms;
        let (store, monitor_store) = match &config.alerts.store_path {
            Some(path) => {
                let store = Arc::new(JsonFileAlertStore::open(path, cooldown_ms)?);
                (
                    store.clone() as Arc<dyn AlertCatalog>,
                    store as Arc<dyn AlertStore>,
                )
            }
            None => {
                let store = Arc::new(InMemoryAlertStore::with_default_cooldown(cooldown_ms));
                (
                    store.clone() as Arc<dyn AlertCatalog>,
                    store as Arc<dyn AlertStore>,
                )
            }
        };

        // Rules already in a persisted store keep their saved state.
        let existing = store.alerts()?;
        for rule in &config.alerts.rules {
            let symbol = Symbol::new(&rule.symbol).map_err(tickwatch_alert::AlertError::from)?;
            if existing
                .iter()
                .any(|a| a.symbol == symbol && a.target_price == rule.target_price)
            {
                debug!(symbol = %symbol, target_price = rule.target_price, "Rule already stored");
                continue;
            }

            let cooldown = rule.cooldown_ms.unwrap_or(cooldown_ms);
            let alert = store.add_alert_with_cooldown(&rule.symbol, rule.target_price, cooldown)?;
            if !rule.enabled {
                store.set_enabled(&alert.id, false)?;
            }
        }

        info!(
            alerts = store.alerts()?.len(),
            persisted = config.alerts.store_path.is_some(),
            "Alert store initialized"
        );

        Ok(Self {
            config,
            stream,
            store,
            monitor_store,
            notifier,
            quotes: Arc::new(QuoteBook::new()),
        })
    }

    pub fn stream(&self) -> &StreamManager {
        &self.stream
    }

    pub fn store(&self) -> &Arc<dyn AlertCatalog> {
        &self.store
    }

    pub fn quotes(&self) -> &Arc<QuoteBook> {
        &self.quotes
    }

    /// Symbols to stream: those with alerts, else the configured watch list.
    pub fn stream_symbols(&self) -> AppResult<Vec<Symbol>> {
        let alert_symbols = self.store.symbols()?;
        if !alert_symbols.is_empty() {
            return Ok(alert_symbols);
        }
        let mut symbols = self
            .config
            .watch_symbols
            .iter()
            .map(Symbol::new)
            .collect::<Result<Vec<_>, _>>()
            .map_err(tickwatch_alert::AlertError::from)?;
        symbols.sort();
        symbols.dedup();
        Ok(symbols)
    }

    /// Register listeners and open the stream.
    pub fn start(&self) -> AppResult<RunningApp> {
        let symbols = self.stream_symbols()?;
        info!(
            symbols = ?symbols.iter().map(Symbol::as_str).collect::<Vec<_>>(),
            "Starting stream"
        );

        let state = self.stream.on_connection_state_change(|connected| {
            if connected {
                info!("Market-data stream connected");
            } else {
                warn!("Market-data stream disconnected");
            }
        });

        let monitor = AlertMonitor::new(self.monitor_store.clone(), self.notifier.clone());
        let alerts = self
            .stream
            .subscribe(symbols.iter().map(Symbol::as_str), monitor)
            .map_err(Box::new)?;

        let book = self.quotes.clone();
        let quotes = self
            .stream
            .subscribe(
                symbols.iter().map(Symbol::as_str),
                move |quote: &Quote| -> HandlerResult {
                    book.update(quote);
                    Ok(())
                },
            )
            .map_err(Box::new)?;

        Ok(RunningApp {
            stream: self.stream.clone(),
            state,
            alerts,
            quotes,
        })
    }

    /// Run until Ctrl-C, then tear the stream down.
    pub async fn run(self) -> AppResult<()> {
        let running = self.start()?;

        tokio::signal::ctrl_c().await?;
        info!("Shutdown requested");

        running.shutdown();
        info!(quotes = self.quotes.len(), "Application stopped");

        match Metrics::render() {
            Ok(text) => debug!(metrics = %text, "Final metrics"),
            Err(e) => warn!(error = %e, "Failed to render metrics"),
        }
        Ok(())
    }
}

/// Listener registrations of a started application.
pub struct RunningApp {
    stream: StreamManager,
    state: StateSubscription,
    alerts: TickSubscription,
    quotes: TickSubscription,
}

impl RunningApp {
    pub fn is_connected(&self) -> bool {
        self.stream.is_connected()
    }

    /// Unregister every listener. The last one closes the stream.
    pub fn shutdown(self) {
        self.state.unsubscribe();
        self.alerts.unsubscribe();
        self.quotes.unsubscribe();
    }
}
