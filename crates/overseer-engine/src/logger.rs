//! Behavior-specific logging
//!
//! Operator-visible log lines go two ways: locally through `tracing`, and as
//! structured `BehaviorLogEvent`s on the `behavior/log` topic so a remote UI
//! can display them. Publishing is fire-and-forget and never affects control
//! flow.

use std::sync::Arc;

use overseer_bus::MessageBus;
use overseer_core::{topic, BehaviorLogEvent, LogSeverity};
use tracing::{debug, error, info, warn};

#[derive(Clone)]
pub struct BehaviorLogger {
    bus: Arc<MessageBus>,
}

impl BehaviorLogger {
    pub fn new(bus: Arc<MessageBus>) -> Self {
        Self { bus }
    }

    pub fn log(&self, severity: LogSeverity, text: impl Into<String>) {
        let text = text.into();
        match severity {
            LogSeverity::Debug => debug!("{text}"),
            LogSeverity::Info => info!("{text}"),
            LogSeverity::Warn => warn!("{text}"),
            LogSeverity::Error => error!("{text}"),
        }
        self.bus.publish(topic::LOG, &BehaviorLogEvent { text, severity });
    }

    pub fn info(&self, text: impl Into<String>) {
        self.log(LogSeverity::Info, text);
    }

    pub fn warn(&self, text: impl Into<String>) {
        self.log(LogSeverity::Warn, text);
    }

    pub fn error(&self, text: impl Into<String>) {
        self.log(LogSeverity::Error, text);
    }
}
