//! ---
//! cupang_section: "09-runtime"
//! cupang_subsection: "module"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "Shared primitives and utilities for the updater runtime."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
//! Shared primitives for the cupang-updater workspace: the optional runtime
//! configuration file, the on-disk application layout, and tracing setup.

pub mod config;
pub mod logging;

pub use config::{AppPaths, LoggingConfig, RuntimeConfig};
pub use logging::{init_tracing, LogFormat, TracingGuard};
