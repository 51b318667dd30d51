//! # Authentication Module
//!
//! OAuth 2.0 token lifecycle for a single Google Drive account.
//!
//! ## Overview
//!
//! This crate keeps one credential record on disk and hands out an access
//! token that is valid at the time of the call. It covers:
//!
//! - [`CredentialRecord`] merge rules that never destroy a stored refresh token
//! - [`TokenStore`]: file-backed persistence of the record
//! - [`AuthorizationProvider`]: the external OAuth service, with
//!   [`OAuthFlowManager`] speaking the standard token endpoint protocol
//! - [`TokenLifecycleManager`]: freshness checks, refresh, code exchange and
//!   auth event emission

pub mod error;
pub mod manager;
pub mod oauth;
pub mod token_store;
pub mod types;

pub use error::{AuthError, Result};
pub use manager::TokenLifecycleManager;
pub use oauth::{AuthorizationProvider, OAuthConfig, OAuthFlowManager};
pub use token_store::TokenStore;
pub use types::{AuthorizationRequest, CredentialRecord, CredentialStatus, ValidAccessToken};
