//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the token broker:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the auth core and the HTTP
//! server depend on. Configuration is read once at startup into a
//! [`BrokerConfig`](config::BrokerConfig) and threaded into constructors.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
