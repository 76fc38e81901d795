//! Common utilities shared across tlmirror crates.
//!
//! This crate is intentionally small so that every other crate in the
//! workspace can depend on it without pulling in the web or HTTP stacks.
//!
//! # Overview
//!
//! - [`observability`]: centralised tracing/logging initialisation
//!
//! # Examples
//!
//! ```rust
//! use tlmirror_common::observability::{LogConfig, LogFormat};
//!
//! let cfg = LogConfig {
//!     format: "json".parse().unwrap(),
//!     ..LogConfig::default()
//! };
//! assert!(matches!(cfg.format, LogFormat::Json));
//! assert_eq!(cfg.app_name, "tlmirror");
//! ```
pub mod observability;
