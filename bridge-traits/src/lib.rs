//! # Host Bridge Traits
//!
//! Platform abstraction traits that the broker core is written against.
//!
//! ## Overview
//!
//! This crate defines the contract between the token broker core and the
//! host-specific implementations. Each trait represents a capability the core
//! requires but that tests replace with in-memory stubs.
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations for token and Drive endpoints
//! - [`FileSystemAccess`](storage::FileSystemAccess) - Durable file I/O for the credential record
//! - [`Clock`](time::Clock) - Time source for deterministic freshness checks
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Host
//! implementations should convert platform-specific errors to `BridgeError`
//! with actionable messages (file paths, network status).
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so they can be shared across the
//! request handlers of the HTTP server.

pub mod error;
pub mod http;
pub mod storage;
pub mod time;

pub use error::BridgeError;

pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use storage::FileSystemAccess;
pub use time::{Clock, FixedClock, LogLevel, SystemClock};
