//! Common test infrastructure
//!
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestServer, TestClient, GOOD_URL};
//! use reqwest::StatusCode;
//!
//! #[tokio::test]
//! async fn test_get_info() {
//!     let server = TestServer::spawn().await;
//!     let client = TestClient::new(server.base_url.clone());
//!
//!     let response = client.get_info(GOOD_URL).await;
//!     assert_eq!(response.status(), StatusCode::OK);
//! }
//! ```

// Each test binary uses a different subset of the harness
#![allow(dead_code)]

mod client;
mod constants;
mod fixtures;
mod server;

pub use client::TestClient;
pub use constants::*;
pub use server::TestServer;
