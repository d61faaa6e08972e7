//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, timeout)
//!     → routing::matcher classifies the path
//!         tunnel → websocket.rs (place, dial pod, upgrade, relay)
//!         plain  → proxy.rs (place, rewrite, forward, add CORS)
//!     → request.rs / response.rs (header rewriting both ways)
//!     → Send to client
//! ```

pub mod proxy;
pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
pub use websocket::TunnelSettings;
