//! Minimal end-to-end run: a two-state patrol behavior driven by the engine,
//! with a listener task printing status and log events.
//!
//! Run with `RUST_LOG=debug cargo run --example patrol` and press ctrl-c to
//! stop early.

use std::sync::Arc;

use overseer_bus::{MessageBus, SubscriberId};
use overseer_core::{topic, AutonomyCell, BehaviorLogEvent, BehaviorStatus, EngineConfig, Outcome};
use overseer_engine::{BehaviorEngine, BehaviorState, DataScope, Node, StateContainer, UserData};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Waits a fixed number of ticks, then reports `done`.
struct Wait {
    outcomes: Vec<Outcome>,
    remaining: u32,
}

impl Wait {
    fn new(ticks: u32) -> Self {
        Self {
            outcomes: vec![Outcome::new("done")],
            remaining: ticks,
        }
    }
}

impl BehaviorState for Wait {
    fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    fn execute(&mut self, _data: &mut dyn DataScope) -> anyhow::Result<Option<Outcome>> {
        if self.remaining == 0 {
            return Ok(Some(Outcome::new("done")));
        }
        self.remaining -= 1;
        Ok(None)
    }
}

/// Pretends to scan the area and stores how many scans it made.
struct Scan {
    outcomes: Vec<Outcome>,
    scans: u32,
}

impl Scan {
    fn new() -> Self {
        Self {
            outcomes: vec![Outcome::new("done")],
            scans: 0,
        }
    }
}

impl BehaviorState for Scan {
    fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    fn execute(&mut self, data: &mut dyn DataScope) -> anyhow::Result<Option<Outcome>> {
        self.scans += 1;
        data.set("scan_count", json!(self.scans));
        if self.scans >= 3 {
            return Ok(Some(Outcome::new("done")));
        }
        Ok(None)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "patrol=info,overseer_engine=info".into()),
        )
        .init();

    let config = EngineConfig {
        tick_interval_ms: 100,
        ..EngineConfig::default()
    };
    let bus = Arc::new(MessageBus::new(config.channel_capacity));
    let autonomy = AutonomyCell::default();

    let mut root = StateContainer::new("Patrol", &["finished"], autonomy.clone());
    root.add(
        "Wait",
        Node::leaf(Wait::new(50)),
        &[("done", "Scan")],
        &[("done", 0)],
        &[],
    )?;
    root.add(
        "Scan",
        Node::leaf(Scan::new()),
        &[("done", "finished")],
        &[("done", 1)],
        &[("scan_count", "total_scans")],
    )?;

    let mut userdata = UserData::new();
    userdata.declare("total_scans", json!(0));

    // mirror stand-in: print what the engine publishes
    let mut status_rx = bus.subscribe(topic::STATUS, SubscriberId::next());
    let mut log_rx = bus.subscribe(topic::LOG, SubscriberId::next());
    tokio::spawn(async move {
        let mut last = None;
        loop {
            tokio::select! {
                Some(v) = status_rx.recv() => {
                    if let Ok(status) = serde_json::from_value::<BehaviorStatus>(v) {
                        if last != Some(status.path_checksum) {
                            info!("mirror: active path checksum {}", status.path_checksum);
                            last = Some(status.path_checksum);
                        }
                    }
                }
                Some(v) = log_rx.recv() => {
                    if let Ok(event) = serde_json::from_value::<BehaviorLogEvent>(v) {
                        info!("mirror: [{:?}] {}", event.severity, event.text);
                    }
                }
                else => break,
            }
        }
    });

    let mut engine = BehaviorEngine::new(root, userdata, autonomy, bus, config);
    engine.confirm("Patrol", 1).await?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    match engine.spin(cancel).await {
        Some(outcome) => info!("patrol ended with outcome '{outcome}'"),
        None => info!("patrol cancelled"),
    }
    engine.destroy();
    Ok(())
}
