//! Periodic upstream warmup.
//!
//! Issues health probes to both upstreams on an interval to keep serverless
//! cold starts at bay. Failures are logged at debug and never affect the
//! reported health.

use std::time::Duration;

use crate::state::{AppState, RequestContext};
use crate::upstream::Upstream;

pub fn spawn(state: AppState) -> tokio::task::JoinHandle<()> {
    let interval = Duration::from_millis(state.config.warmup_interval_ms.max(1_000));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The immediate first tick doubles as the startup warmup.
        loop {
            ticker.tick().await;
            let ctx = RequestContext::minted();
            let (api, functions) = tokio::join!(
                state.upstream.probe(Upstream::Api, "/api/v1/health", &ctx),
                state
                    .upstream
                    .probe(Upstream::EdgeFunctions, "/intelligence-health", &ctx),
            );
            for (name, outcome) in [("primary-api", &api), ("edge-functions", &functions)] {
                match &outcome.error {
                    None => tracing::debug!(
                        component = "warmup",
                        upstream = name,
                        duration_ms = outcome.latency_ms,
                        request_id = %ctx.request_id,
                        "upstream warm"
                    ),
                    Some(error) => tracing::debug!(
                        component = "warmup",
                        upstream = name,
                        duration_ms = outcome.latency_ms,
                        request_id = %ctx.request_id,
                        error = %error,
                        "warmup probe failed"
                    ),
                }
            }
        }
    })
}
