//! # Vany Runtime
//!
//! Wires one in-memory bus, the battery and scanner workers and the gateway
//! into a process, and serves the gateway's client sessions over
//! HTTP/WebSocket.
//!
//! ```text
//!   browser ──ws──→ axum ──GatewayHandle──→ Gateway ─┐
//!      ↑                                             │ bus ("vany")
//!      └── SessionRegistry ←── emit_to/broadcast ────┤
//!                                     TeslaBattery ──┤
//!                                 BluetoothScanner ──┘
//! ```

pub mod config;
pub mod http;
pub mod runtime;

pub use config::{ConfigError, RuntimeConfig, ScannerBackend};
pub use http::{router, AppState};
pub use runtime::{RuntimeError, VanyRuntime};
