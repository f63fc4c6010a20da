//! Host proxy configuration
//!
//! Maps server profiles onto host settings and probes candidate servers.

pub mod applier;
pub mod diagnostics;
pub mod pac;

pub use applier::ProxyApplier;
pub use diagnostics::Diagnostics;
