//! The operatable behavior engine
//!
//! Wraps the root container with everything an operator needs: the fail-safe
//! execution wrapper, the command subscriptions, and the mirror sync
//! protocol. Command events arrive asynchronously on the bus but are only
//! drained here, once per tick, strictly between execution steps - protocol
//! logic never runs inline on the delivery path.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use overseer_bus::{MessageBus, SubscriberId, Subscription};
use overseer_core::{
    path_checksum, topic, AttachCommand, AutonomyCell, AutonomyCommand, BehaviorId, BehaviorStatus,
    CommandAck, EngineConfig, ExecutionFault, LookupError, Outcome, OutcomeRequest, ProtocolFault,
    StructureDescription, StructureError, StructureRequest,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::container::{ForcedOutcome, StateContainer, TickInputs};
use crate::logger::BehaviorLogger;
use crate::userdata::UserData;

struct Wiring {
    name: String,
    behavior_id: BehaviorId,
    autonomy_rx: Subscription,
    sync_rx: Subscription,
    attach_rx: Subscription,
    structure_rx: Subscription,
    preempt_rx: Subscription,
    transition_rx: Subscription,
}

/// Commands drained from the bus, applied between execution steps.
enum Command {
    Autonomy(i32),
    Sync,
    Attach(u8),
    Structure(i32),
    Preempt,
    Transition(OutcomeRequest),
}

pub struct BehaviorEngine {
    root: StateContainer,
    userdata: UserData,
    autonomy: AutonomyCell,
    bus: Arc<MessageBus>,
    config: EngineConfig,
    logger: BehaviorLogger,
    sub_id: SubscriberId,
    /// Path of the deepest executing leaf. Written by the execution step,
    /// read concurrently by status emitters; the lock is held only for the
    /// copy, never across a blocking call.
    snapshot: Mutex<Option<String>>,
    sync_pending: bool,
    preempt_requested: bool,
    forced: Option<ForcedOutcome>,
    last_fault: Option<ExecutionFault>,
    wiring: Option<Wiring>,
}

impl BehaviorEngine {
    pub fn new(
        root: StateContainer,
        userdata: UserData,
        autonomy: AutonomyCell,
        bus: Arc<MessageBus>,
        config: EngineConfig,
    ) -> Self {
        let logger = BehaviorLogger::new(bus.clone());
        Self {
            root,
            userdata,
            autonomy,
            bus,
            config,
            logger,
            sub_id: SubscriberId::next(),
            snapshot: Mutex::new(None),
            sync_pending: false,
            preempt_requested: false,
            forced: None,
            last_fault: None,
            wiring: None,
        }
    }

    pub fn behavior_id(&self) -> BehaviorId {
        self.wiring.as_ref().map_or(0, |w| w.behavior_id)
    }

    pub fn name(&self) -> Option<&str> {
        self.wiring.as_ref().map(|w| w.name.as_str())
    }

    pub fn autonomy(&self) -> &AutonomyCell {
        &self.autonomy
    }

    pub fn is_controlled(&self) -> bool {
        self.root.is_controlled()
    }

    /// The most recent execution fault, retained for inspection. Cleared by
    /// the next successful step.
    pub fn last_fault(&self) -> Option<&ExecutionFault> {
        self.last_fault.as_ref()
    }

    pub fn root(&self) -> &StateContainer {
        &self.root
    }

    /// Required autonomy of an outcome of the active child, for UI use.
    pub fn required_autonomy(&self, outcome: &Outcome) -> Result<u8, LookupError> {
        self.root.required_autonomy(outcome)
    }

    /// Whether a transition of the root's child `label` via `outcome` would
    /// currently be allowed.
    pub fn is_transition_allowed(&self, label: &str, outcome: &Outcome) -> bool {
        self.root.gate().is_transition_allowed(label, outcome)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Confirm the engine: validate the tree, assign identity, wire up the
    /// bus, and notify every state to start. Mandatory between building the
    /// tree and driving it.
    pub async fn confirm(
        &mut self,
        name: &str,
        behavior_id: BehaviorId,
    ) -> Result<(), StructureError> {
        if let Some(w) = &self.wiring {
            return Err(StructureError::AlreadyConfirmed(w.name.clone()));
        }

        let declared_keys: BTreeSet<String> =
            self.userdata.keys().map(str::to_string).collect();
        self.root.validate(&declared_keys)?;
        self.root.assign_paths("");

        info!("--> setting up pub/sub for behavior '{name}' ({behavior_id})");
        self.wiring = Some(Wiring {
            name: name.to_string(),
            behavior_id,
            autonomy_rx: self.bus.subscribe(topic::CMD_AUTONOMY, self.sub_id),
            sync_rx: self.bus.subscribe(topic::CMD_SYNC, self.sub_id),
            attach_rx: self.bus.subscribe(topic::CMD_ATTACH, self.sub_id),
            structure_rx: self.bus.subscribe(topic::CMD_STRUCTURE, self.sub_id),
            preempt_rx: self.bus.subscribe(topic::CMD_PREEMPT, self.sub_id),
            transition_rx: self.bus.subscribe(topic::CMD_TRANSITION, self.sub_id),
        });

        // readiness handshake: give the mirror a chance to register before
        // the first status messages go out
        let timeout = Duration::from_millis(self.config.readiness_timeout_ms);
        if !self.bus.wait_for_listener(topic::STATUS, timeout).await {
            warn!("no status listener appeared for '{name}'; continuing unattended");
        }

        if !self.autonomy.is_unattended() {
            self.root.set_controlled(true);
        }

        info!("--> notifying behavior '{name}' states to start");
        self.root.notify_start();
        info!("--> behavior '{name}' ({behavior_id}) confirmation complete");
        Ok(())
    }

    /// Tear the engine down: stop every state, disable remote control, and
    /// unregister all command subscriptions.
    pub fn destroy(&mut self) {
        if let Some(w) = self.wiring.take() {
            info!("destroying behavior '{}' ({})", w.name, w.behavior_id);
            for t in [
                topic::CMD_AUTONOMY,
                topic::CMD_SYNC,
                topic::CMD_ATTACH,
                topic::CMD_STRUCTURE,
                topic::CMD_PREEMPT,
                topic::CMD_TRANSITION,
            ] {
                self.bus.unsubscribe(t, self.sub_id);
            }
        }
        self.root.notify_stop();
    }

    // -----------------------------------------------------------------------
    // Driving
    // -----------------------------------------------------------------------

    /// Execute one tick: one fail-safe execution step, then the active-path
    /// snapshot refresh, then the command/sync drain, then continuous status.
    /// Returns the root outcome once the behavior finishes.
    pub fn tick(&mut self) -> Option<Outcome> {
        let inputs = TickInputs {
            preempt: self.preempt_requested,
            forced: self.forced.take(),
        };

        let outcome = match self.root.execute(&mut self.userdata, &inputs) {
            Ok(outcome) => {
                self.last_fault = None;
                outcome
            }
            Err(fault) => {
                // keep the failing state active so the operator can intervene
                self.logger.error(format!(
                    "Failed to execute state '{}': {:#}",
                    fault.label, fault.source
                ));
                self.last_fault = Some(fault);
                None
            }
        };

        self.refresh_snapshot();
        self.drain_commands();
        if self.sync_pending {
            self.process_sync_request();
        }
        if self.wiring.is_some() {
            self.bus.publish(topic::STATUS, &self.latest_status());
        }
        outcome
    }

    /// Drive the engine until it finishes or `cancel` fires.
    pub async fn spin(&mut self, cancel: CancellationToken) -> Option<Outcome> {
        let interval = Duration::from_millis(self.config.tick_interval_ms);
        loop {
            if cancel.is_cancelled() {
                info!("spin cancelled");
                return None;
            }
            if let Some(outcome) = self.tick() {
                info!(
                    "behavior '{}' done with outcome '{outcome}'",
                    self.name().unwrap_or("<unconfirmed>")
                );
                return Some(outcome);
            }
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("spin cancelled");
                    return None;
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    // -----------------------------------------------------------------------
    // Mirror sync protocol
    // -----------------------------------------------------------------------

    /// Continuous status: identity plus a cheap checksum of the active path.
    pub fn latest_status(&self) -> BehaviorStatus {
        let path = self.snapshot.lock().unwrap().clone();
        BehaviorStatus {
            behavior_id: self.behavior_id(),
            path_checksum: path_checksum(path.as_deref()),
        }
    }

    /// Schedule an explicit resync. Drained on the next tick, never inline.
    pub fn request_explicit_sync(&mut self) {
        self.sync_pending = true;
    }

    /// Explicit sync as back-up for when the continuous checksum is not
    /// enough. Best effort: a failure to resolve the active state still
    /// sends a zero checksum rather than dropping the round-trip.
    fn process_sync_request(&mut self) {
        self.sync_pending = false;
        let checksum = match self.resolve_active_path() {
            Ok(path) => {
                info!(
                    "sync request processed by {} with deep state '{path}'",
                    self.behavior_id()
                );
                path_checksum(Some(&path))
            }
            Err(fault) => {
                warn!("explicit sync for {}: {fault}", self.behavior_id());
                0
            }
        };
        self.bus.publish(
            topic::STATUS,
            &BehaviorStatus {
                behavior_id: self.behavior_id(),
                path_checksum: checksum,
            },
        );
        self.bus.publish(topic::FEEDBACK, &CommandAck::new("sync"));
        info!("<-- sent synchronization message for mirror");
    }

    fn resolve_active_path(&self) -> Result<String, ProtocolFault> {
        self.root
            .active_deep_path()
            .ok_or(ProtocolFault::NoActiveState)
    }

    /// Emit the full structural description to the mirror channel.
    fn emit_structure(&self) -> Result<(), ProtocolFault> {
        let w = self.wiring.as_ref().ok_or(ProtocolFault::NotConfirmed)?;
        let msg = StructureDescription {
            behavior_id: w.behavior_id,
            containers: self.root.describe(),
        };
        self.bus.publish(topic::STRUCTURE, &msg);
        Ok(())
    }

    fn refresh_snapshot(&mut self) {
        let path = self.root.active_deep_path();
        let mut guard = self.snapshot.lock().unwrap();
        if *guard != path {
            *guard = path;
        }
    }

    // -----------------------------------------------------------------------
    // Operator commands
    // -----------------------------------------------------------------------

    fn drain_commands(&mut self) {
        let mut commands = Vec::new();
        {
            let Some(w) = self.wiring.as_mut() else {
                return;
            };
            for v in w.autonomy_rx.try_drain() {
                match serde_json::from_value::<AutonomyCommand>(v) {
                    Ok(cmd) => commands.push(Command::Autonomy(cmd.level)),
                    Err(err) => warn!("bad autonomy command: {err}"),
                }
            }
            for _ in w.sync_rx.try_drain() {
                commands.push(Command::Sync);
            }
            for v in w.attach_rx.try_drain() {
                match serde_json::from_value::<AttachCommand>(v) {
                    Ok(cmd) => commands.push(Command::Attach(cmd.level)),
                    Err(err) => warn!("bad attach command: {err}"),
                }
            }
            for v in w.structure_rx.try_drain() {
                match serde_json::from_value::<StructureRequest>(v) {
                    Ok(cmd) => commands.push(Command::Structure(cmd.mirror_id)),
                    Err(err) => warn!("bad structure request: {err}"),
                }
            }
            for _ in w.preempt_rx.try_drain() {
                commands.push(Command::Preempt);
            }
            for v in w.transition_rx.try_drain() {
                match serde_json::from_value::<OutcomeRequest>(v) {
                    Ok(cmd) => commands.push(Command::Transition(cmd)),
                    Err(err) => warn!("bad outcome request: {err}"),
                }
            }
        }
        for command in commands {
            self.apply_command(command);
        }
    }

    fn apply_command(&mut self, command: Command) {
        match command {
            Command::Autonomy(level) => {
                if level < 0 {
                    self.logger
                        .info(format!("negative autonomy level {level} - preempting"));
                    self.preempt_requested = true;
                } else {
                    let level = level.min(i32::from(u8::MAX)) as u8;
                    if level != self.autonomy.get() {
                        info!("--> autonomy level changed to {level}");
                    }
                    self.autonomy.set(level);
                }
                self.bus
                    .publish(topic::FEEDBACK, &CommandAck::new("autonomy"));
            }

            Command::Sync => {
                info!("--> synchronization requested ({})", self.behavior_id());
                self.sync_pending = true;
            }

            Command::Attach(level) => {
                info!("--> enabling attach control at level {level}");
                self.autonomy.set(level);
                self.root.set_controlled(true);
                self.sync_pending = true;
                let name = self
                    .wiring
                    .as_ref()
                    .map(|w| w.name.clone())
                    .unwrap_or_default();
                self.bus
                    .publish(topic::FEEDBACK, &CommandAck::with_args("attach", vec![name]));
                info!("<-- sent attach confirmation");
            }

            Command::Structure(mirror_id) => {
                info!("--> building behavior structure for mirror {mirror_id}");
                match self.emit_structure() {
                    Ok(()) => info!("<-- sent behavior structure to mirror"),
                    Err(fault) => warn!("could not send structure: {fault}"),
                }
                // a mirror is listening, so start honoring remote control
                self.root.set_controlled(true);
            }

            Command::Preempt => {
                // with a mirror attached, preemption goes through the
                // negative autonomy command instead
                if !self.root.is_controlled() {
                    self.logger.info("preempting behavior");
                    self.preempt_requested = true;
                }
            }

            Command::Transition(request) => {
                if !self.root.is_controlled() {
                    debug!("ignoring outcome request while remote control is disabled");
                    return;
                }
                let active = self.root.deep_active();
                let active_label = active
                    .as_ref()
                    .map(|d| d.label.clone())
                    .unwrap_or_else(|| "None".to_string());
                self.bus.publish(
                    topic::FEEDBACK,
                    &CommandAck::with_args(
                        "transition",
                        vec![request.target.clone(), active_label.clone()],
                    ),
                );
                match active {
                    Some(deep) if deep.label == request.target => {
                        match deep.outcomes.get(request.outcome) {
                            Some(outcome) => {
                                self.logger.info(format!(
                                    "--> manually triggered outcome '{outcome}' of state '{}'",
                                    request.target
                                ));
                                self.forced = Some(ForcedOutcome {
                                    label: request.target,
                                    outcome: outcome.clone(),
                                });
                            }
                            None => warn!(
                                "outcome index {} out of range for state '{}'",
                                request.outcome, request.target
                            ),
                        }
                    }
                    _ => warn!(
                        "requested outcome for state '{}' but active state is '{active_label}'",
                        request.target
                    ),
                }
            }
        }
    }
}
