//! # Broker Server
//!
//! HTTP surface of the Drive token broker, built on `axum`.
//!
//! ## Routes
//!
//! | Route | Purpose |
//! |---|---|
//! | `GET /` | Home page with the current credential status |
//! | `GET /login` | Redirect to the provider consent screen |
//! | `GET /oauth2callback` | Exchange the authorization code |
//! | `GET /refresh` | Force a token refresh |
//! | `GET /token` | Hand out a valid access token |
//! | `GET /upload`, `POST /upload` | Upload form and Drive upload |
//! | `GET /health` | Liveness check |

pub mod error;
pub mod pages;
pub mod routes;
pub mod server;
pub mod state;

pub use error::{ApiError, PageError};
pub use server::{build_router, serve, spawn_event_logger, MAX_UPLOAD_BYTES};
pub use state::AppState;
