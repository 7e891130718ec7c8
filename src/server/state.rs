use axum::extract::FromRef;

use crate::download::DownloadOrchestrator;
use crate::rate_limiter::SlidingWindowRateLimiter;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedOrchestrator = Arc<DownloadOrchestrator>;
pub type GuardedRateLimiter = Arc<SlidingWindowRateLimiter>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub hash: String,
    pub orchestrator: GuardedOrchestrator,
    pub rate_limiter: GuardedRateLimiter,
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        orchestrator: GuardedOrchestrator,
        rate_limiter: GuardedRateLimiter,
    ) -> Self {
        Self {
            config,
            start_time: Instant::now(),
            hash: env!("GIT_HASH").to_owned(),
            orchestrator,
            rate_limiter,
        }
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for GuardedOrchestrator {
    fn from_ref(input: &ServerState) -> Self {
        input.orchestrator.clone()
    }
}

impl FromRef<ServerState> for GuardedRateLimiter {
    fn from_ref(input: &ServerState) -> Self {
        input.rate_limiter.clone()
    }
}
