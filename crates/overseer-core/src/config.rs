//! Engine configuration

use serde::{Deserialize, Serialize};

/// Configuration for a behavior engine and its bus wiring.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Sleep between ticks of the driver loop, in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Per-subscriber channel capacity on the message bus.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// How long `confirm` waits for a status listener before giving up, in
    /// milliseconds. Confirmation proceeds either way; the wait only avoids
    /// dropping the first status messages on the floor.
    #[serde(default = "default_readiness_timeout_ms")]
    pub readiness_timeout_ms: u64,
}

fn default_tick_interval_ms() -> u64 {
    10
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_readiness_timeout_ms() -> u64 {
    5000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            channel_capacity: default_channel_capacity(),
            readiness_timeout_ms: default_readiness_timeout_ms(),
        }
    }
}
