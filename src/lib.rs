//! # Proxy Manager Core
#![allow(unexpected_cfgs)]

//! Background core of the Proxy Manager: keeps a list of HTTP proxy servers,
//! applies the selected one to the host's proxy settings and watches GitHub
//! releases for updates.
//!
//! ## Features
//!
//! - Server profiles with credentials and bypass lists
//! - Fixed-server or PAC-based host proxy configuration
//! - Diagnostic probe that confirms traffic really leaves through a proxy
//! - Release feed checks with retry and backoff
//! - State persistence with a backup copy and versioned migrations
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │               Popup / Flutter UI / stdio host            │
//! ├─────────────────────────────────────────────────────────┤
//! │          JSON messages (api::messages, proxy_api)        │
//! ├─────────────────────────────────────────────────────────┤
//! │                ManagerHandle ── actor task               │
//! │  ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌─────────┐  │
//! │  │  Proxy   │  │ Updater  │  │ Storage  │  │ Notify  │  │
//! │  │ Applier  │  │ Checker  │  │ (SQLite) │  │         │  │
//! │  └────┬─────┘  └────┬─────┘  └──────────┘  └─────────┘  │
//! │       │             │                                    │
//! │  ┌────┴─────┐  ┌────┴─────┐                              │
//! │  │ Platform │  │   Net    │                              │
//! │  └──────────┘  └──────────┘                              │
//! └─────────────────────────────────────────────────────────┘
//! ```

// Public modules
pub mod api;
pub mod error;
pub mod i18n;
pub mod manager;
pub mod migration;
pub mod models;
pub mod net;
pub mod notify;
pub mod platform;
pub mod proxy;
pub mod storage;
pub mod updater;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
