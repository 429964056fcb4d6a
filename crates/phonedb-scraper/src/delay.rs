//! Randomized pacing and user-agent rotation.

use std::time::Duration;

use rand::seq::IndexedRandom;
use rand::Rng;

/// Inter-request delay drawn uniformly from `[min_ms, max_ms]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayPolicy {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayPolicy {
    #[must_use]
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        if min_ms <= max_ms {
            Self { min_ms, max_ms }
        } else {
            Self {
                min_ms: max_ms,
                max_ms: min_ms,
            }
        }
    }

    /// No waiting at all.
    #[must_use]
    pub fn none() -> Self {
        Self { min_ms: 0, max_ms: 0 }
    }

    #[must_use]
    pub fn draw(&self) -> Duration {
        if self.min_ms == self.max_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(rand::rng().random_range(self.min_ms..=self.max_ms))
    }

    pub async fn wait(&self) {
        let delay = self.draw();
        if !delay.is_zero() {
            tracing::debug!(delay_ms = delay.as_millis(), "pacing delay");
            tokio::time::sleep(delay).await;
        }
    }
}

/// Pool of user-agent strings; one is picked at random per page or request.
#[derive(Debug, Clone)]
pub struct UserAgentPool {
    agents: Vec<String>,
}

impl UserAgentPool {
    /// Falls back to the built-in desktop agents when `agents` is empty.
    #[must_use]
    pub fn new(agents: Vec<String>) -> Self {
        if agents.is_empty() {
            Self {
                agents: phonedb_core::app_config::DEFAULT_USER_AGENTS
                    .iter()
                    .map(|s| (*s).to_string())
                    .collect(),
            }
        } else {
            Self { agents }
        }
    }

    #[must_use]
    pub fn pick(&self) -> &str {
        self.agents
            .choose(&mut rand::rng())
            .map_or(phonedb_core::app_config::DEFAULT_USER_AGENTS[0], String::as_str)
    }
}
