//! Data models for the proxy manager
//!
//! These models are shared between Rust and the UI via flutter_rust_bridge and
//! the JSON message boundary.

pub mod diagnostics;
pub mod proxy_settings;
pub mod server;
pub mod state;
pub mod update;

pub use diagnostics::*;
pub use proxy_settings::*;
pub use server::*;
pub use state::*;
pub use update::*;
