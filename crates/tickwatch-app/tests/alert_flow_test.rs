//! End-to-end alert flow against a mock market-data server.
//!
//! Trades pushed by the server reach the quote book and the alert
//! monitor; the cooldown suppresses repeated notifications.

#[path = "../../tickwatch-ws/tests/common/mock_ws.rs"]
mod mock_ws;
use mock_ws::{wait_until, MockWsServer};

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tickwatch_alert::{AlertResult, AlertStore, Notifier, PriceAlertNotification};
use tickwatch_app::{AlertRule, AppConfig, Application};
use tickwatch_core::Symbol;
use tickwatch_ws::ConnectionConfig;

const WAIT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<PriceAlertNotification>>,
}

impl RecordingNotifier {
    fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: &PriceAlertNotification) -> AlertResult<()> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

fn config() -> AppConfig {
    let mut config = AppConfig::default();
    config.alerts.rules = vec![AlertRule {
        symbol: "aapl".to_string(),
        target_price: 150.0,
        cooldown_ms: None,
        enabled: true,
    }];
    config
}

#[tokio::test]
async fn test_trades_drive_quote_book_and_alerts() {
    let server = MockWsServer::start().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let connection = ConnectionConfig {
        url: format!("{}?token=test", server.url()),
        ..Default::default()
    };

    let app = Application::with_connection(config(), connection, notifier.clone()).unwrap();
    let running = app.start().unwrap();

    let srv = &server;
    assert!(
        wait_until(WAIT, move || async move {
            srv.received_messages()
                .await
                .iter()
                .any(|m| m.contains(r#""symbol":"AAPL""#))
        })
        .await
    );
    assert!(running.is_connected());

    server.push(r#"{"type":"trade","data":[{"s":"AAPL","p":149.0,"t":1}]}"#);
    server.push(concat!(
        r#"{"type":"trade","data":["#,
        r#"{"s":"AAPL","p":151.0,"t":2},"#,
        r#"{"s":"AAPL","p":152.0,"t":3}]}"#,
    ));

    let n = notifier.clone();
    assert!(
        wait_until(WAIT, move || {
            let count = n.count();
            async move { count >= 1 }
        })
        .await
    );
    let aapl = Symbol::new("AAPL").unwrap();
    let book = app.quotes().clone();
    assert!(
        wait_until(WAIT, move || {
            let price = book.get(&aapl).map(|q| q.price);
            async move { price == Some(152.0) }
        })
        .await
    );
    tokio::time::sleep(Duration::from_millis(100)).await;

    // 151 fires; 152 arrives inside the cooldown.
    assert_eq!(notifier.count(), 1);
    let sent = notifier.sent.lock().unwrap()[0].clone();
    assert_eq!(sent.title, "AAPL Alert Triggered!");
    assert_eq!(sent.current_price, 151.0);

    let alerts = app.store().alerts().unwrap();
    assert!(alerts[0].last_triggered_at_ms.is_some());

    running.shutdown();
    assert!(
        wait_until(WAIT, move || async move { srv.open_connections().await == 0 }).await
    );
    assert!(!app.stream().is_connected());

    server.shutdown().await;
}

#[tokio::test]
async fn test_missing_api_key_is_config_error() {
    let mut config = config();
    config.stream.api_key = None;
    std::env::remove_var(tickwatch_app::config::API_KEY_ENV);

    assert!(matches!(
        Application::new(config),
        Err(tickwatch_app::AppError::Config(_))
    ));
}
