//! HTTP client for end-to-end tests
//!
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::Response;
use serde_json::json;
use std::time::Duration;

pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    pub async fn home(&self) -> Response {
        self.client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .expect("Home request failed")
    }

    pub async fn get_info(&self, url: &str) -> Response {
        self.client
            .post(format!("{}/api/get-info", self.base_url))
            .json(&json!({ "url": url }))
            .send()
            .await
            .expect("Get info request failed")
    }

    /// Submits the download form, urlencoded like a browser would.
    pub async fn download(&self, url: &str, kind: &str, quality: Option<&str>) -> Response {
        let mut form = vec![("url", url), ("type", kind)];
        if let Some(quality) = quality {
            form.push(("quality", quality));
        }
        self.client
            .post(format!("{}/download", self.base_url))
            .form(&form)
            .send()
            .await
            .expect("Download request failed")
    }
}
