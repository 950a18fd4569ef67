//! Shared market-data WebSocket stream.
//!
//! Provides one lazily opened connection per manager with:
//! - Automatic reconnection with exponential backoff
//! - Replay of every desired symbol on each open
//! - Application-level ping/pong and idle detection
//! - Ordered, failure-isolated fan-out of quotes to listeners

pub mod connection;
pub mod dispatch;
pub mod error;
pub mod heartbeat;
pub mod message;
pub mod reconnect;
pub mod subscription;
pub mod tracker;

pub use connection::{
    build_authenticated_url, ConnectionConfig, ConnectionState, StateSubscription,
    StreamManager, TickSubscription,
};
pub use dispatch::{ListenerId, StateListener, TickListener};
pub use error::{HandlerError, HandlerResult, WsError, WsResult};
pub use message::{decode_frame, InboundFrame, OutboundFrame};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use tracker::QuoteTracker;
