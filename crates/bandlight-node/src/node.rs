//! The node root: owns the config, the mesh engine and the state machine,
//! and drives them from a single cooperative [`Node::tick`].

use bandlight_common::{
    Clock, ConfigStore, DeviceConfig, Feedback, IdleScene, RadioTransport, Renderer,
};
use bandlight_frame::{
    CommandFrame, ConfigSet, DebugOp, EffectId, GroupMask, Opcode, PairingMessage, RadioAddress,
    Rgb, StateOp, SystemOp, MAX_MESH_TTL,
};
use bandlight_metrics::{metric_defs, metrics, MetricLabels};
use rand::RngCore;
use tracing::{debug, info, trace, warn};

use crate::mailbox::{mailbox, InboundFrame, InboundShort, Inbox, MailboxStats, RadioReceiver};
use crate::mesh::{Disposition, MeshEngine, MeshStats};
use crate::pairing::PairingSession;
use crate::state::{transition, Event, NodeState};
use crate::NodeTimings;

/// Result of one [`Node::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    /// A reboot or factory reset was requested. The node processes nothing
    /// further; the embedding must rebuild it from the store.
    Restart,
}

/// Counters for one node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeStats {
    pub mesh: MeshStats,
    pub mailbox: MailboxStats,
    pub heartbeats: u64,
    pub state_transitions: u64,
    pub pairing_requests_sent: u64,
    pub config_acks_sent: u64,
    pub send_failures: u64,
}

/// The collaborators a node was built from, handed back by
/// [`Node::into_parts`].
#[derive(Debug)]
pub struct NodeParts<T, R, S, C> {
    pub transport: T,
    pub renderer: R,
    pub store: S,
    pub clock: C,
}

/// One wearable node.
pub struct Node<T, R, S, C, G> {
    transport: T,
    renderer: R,
    store: S,
    clock: C,
    rng: G,
    timings: NodeTimings,
    address: RadioAddress,

    config: DeviceConfig,
    state: NodeState,
    mesh: MeshEngine,
    receiver: RadioReceiver,
    inbox: Inbox,
    pairing: PairingSession,
    last_heartbeat: Option<u64>,

    last_effect: Option<CommandFrame>,
    effect_running: bool,
    effect_started_at: u64,
    effect_duration_ms: u64,
    blackout_started_at: u64,
    blackout_duration_ms: u64,

    restart_requested: bool,
    stats: NodeStats,
    reported_drops: MailboxStats,
    labels: MetricLabels,
}

impl<T, R, S, C, G> Node<T, R, S, C, G>
where
    T: RadioTransport,
    R: Renderer,
    S: ConfigStore,
    C: Clock,
    G: RngCore,
{
    /// Build a node, loading its configuration from `store`.
    ///
    /// A missing or unreadable config falls back to the defaults. The node
    /// starts in [`NodeState::Init`] and settles on the first tick.
    pub fn new(
        transport: T,
        mut renderer: R,
        mut store: S,
        clock: C,
        rng: G,
        timings: NodeTimings,
    ) -> Self {
        let address = transport.local_address();
        let config = match store.load() {
            Ok(Some(mut config)) => {
                if config.sanitize() {
                    debug!("Sanitized stored config for {}", address);
                }
                config
            }
            Ok(None) => {
                info!("No stored config for {}, using defaults", address);
                DeviceConfig::default()
            }
            Err(e) => {
                warn!("Failed to load config for {}: {}, using defaults", address, e);
                DeviceConfig::default()
            }
        };
        info!(
            "Node {} config: groups={} leds={} ttl={} configured={}",
            address, config.groups, config.led_count, config.mesh_ttl, config.configured
        );
        renderer.set_led_count(config.led_count);

        let labels = MetricLabels::new(address.to_string(), "node");
        let (receiver, inbox) = mailbox();
        Node {
            transport,
            renderer,
            store,
            clock,
            rng,
            mesh: MeshEngine::new(&timings, labels.clone()),
            timings,
            address,
            config,
            state: NodeState::Init,
            receiver,
            inbox,
            pairing: PairingSession::default(),
            last_heartbeat: None,
            last_effect: None,
            effect_running: false,
            effect_started_at: 0,
            effect_duration_ms: 0,
            blackout_started_at: 0,
            blackout_duration_ms: 0,
            restart_requested: false,
            stats: NodeStats::default(),
            reported_drops: MailboxStats::default(),
            labels,
        }
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn stats(&self) -> NodeStats {
        NodeStats {
            mesh: self.mesh.stats(),
            mailbox: self.inbox.stats(),
            ..self.stats
        }
    }

    /// Time of the most recent heartbeat, if any was ever received.
    pub fn last_heartbeat(&self) -> Option<u64> {
        self.last_heartbeat
    }

    pub fn address(&self) -> RadioAddress {
        self.address
    }

    pub fn pairing_session(&self) -> &PairingSession {
        &self.pairing
    }

    /// Handle for the radio driver's receive callback.
    pub fn receiver(&self) -> RadioReceiver {
        self.receiver.clone()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn is_restart_requested(&self) -> bool {
        self.restart_requested
    }

    /// Give back the collaborators, e.g. to rebuild the node after a restart.
    pub fn into_parts(self) -> NodeParts<T, R, S, C> {
        NodeParts {
            transport: self.transport,
            renderer: self.renderer,
            store: self.store,
            clock: self.clock,
        }
    }

    /// Local pairing trigger (long button press). Ignored unless the node
    /// is idle.
    pub fn trigger_pairing(&mut self) -> bool {
        if self.restart_requested || !self.state.can_start_pairing() {
            debug!("Pairing trigger ignored in {}", self.state);
            return false;
        }
        let now = self.clock.now_millis();
        info!("{} starting pairing", self.address);
        self.pairing.start(now);
        self.apply(Event::PairingTriggered);
        true
    }

    /// One pass of the main loop.
    ///
    /// Order: due relay, pairing slot, command slot, then the current
    /// state's periodic work.
    pub fn tick(&mut self) -> TickOutcome {
        if self.restart_requested {
            return TickOutcome::Restart;
        }
        let now = self.clock.now_millis();

        if let Some(payload) = self.mesh.poll_rebroadcast(now) {
            trace!("{} relaying seq={}", self.address, u16::from_be_bytes([payload[0], payload[1]]));
            self.broadcast(&payload);
        }

        while let Some(msg) = self.inbox.take_pairing() {
            self.handle_short(msg);
        }

        while let Some(frame) = self.inbox.take_command() {
            self.handle_frame(frame, now);
            if self.restart_requested {
                return TickOutcome::Restart;
            }
        }

        self.report_mailbox_drops();
        self.tick_state(now);
        TickOutcome::Continue
    }

    fn report_mailbox_drops(&mut self) {
        let current = self.inbox.stats();
        let slot_full = current.slot_full - self.reported_drops.slot_full;
        let rejected = current.rejected - self.reported_drops.rejected;
        for (reason, count) in [("slot_full", slot_full), ("rejected", rejected)] {
            if count > 0 {
                let labels = self.labels.with(&[("reason", reason.to_string())]);
                metrics::counter!(metric_defs::NODE_MAILBOX_DROPPED.name, &labels).increment(count);
            }
        }
        self.reported_drops = current;
    }

    fn apply(&mut self, event: Event) {
        let next = transition(self.state, event);
        if next == self.state {
            return;
        }
        info!("{} state: {} -> {}", self.address, self.state, next);
        self.state = next;
        self.stats.state_transitions += 1;
        let labels = self.labels.with(&[("to", next.name().to_string())]);
        metrics::counter!(metric_defs::NODE_STATE_TRANSITIONS.name, &labels).increment(1);
    }

    fn broadcast(&mut self, data: &[u8]) -> bool {
        match self.transport.send_broadcast(data) {
            Ok(()) => true,
            Err(e) => {
                warn!("{} broadcast failed: {}", self.address, e);
                self.stats.send_failures += 1;
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Command frames
    // ------------------------------------------------------------------

    fn handle_frame(&mut self, frame: InboundFrame, now: u64) {
        let relay_enabled = self.config.mesh_ttl > 0;
        let disposition = self.mesh.on_frame(
            &frame.payload,
            self.config.groups,
            relay_enabled,
            now,
            &mut self.rng,
        );
        if let Disposition::Deliver(cmd) = disposition {
            trace!("{} <- {}: {}", self.address, frame.src, cmd);
            self.process_command(&cmd, now);
        }
    }

    fn process_command(&mut self, cmd: &CommandFrame, now: u64) {
        match cmd.opcode {
            Opcode::Nop => {}
            Opcode::System(op) => self.handle_system(op, cmd, now),
            Opcode::Debug(op) => self.handle_debug(op, cmd),
            Opcode::State(op) if self.state.accepts_show_traffic() => {
                self.handle_state_op(op, cmd, now)
            }
            Opcode::Effect(_) if self.state.accepts_show_traffic() => self.start_effect(*cmd, now),
            Opcode::State(_) | Opcode::Effect(_) => {
                debug!("{} ignoring {} in {}", self.address, cmd.opcode, self.state)
            }
            Opcode::Pairing(_) | Opcode::Unknown(_) => {
                debug!("{} ignoring opcode {}", self.address, cmd.opcode)
            }
        }
    }

    fn handle_system(&mut self, op: SystemOp, cmd: &CommandFrame, now: u64) {
        match op {
            SystemOp::Heartbeat => {
                self.last_heartbeat = Some(now);
                self.stats.heartbeats += 1;
                if matches!(
                    self.state,
                    NodeState::Connecting | NodeState::Standby | NodeState::Disconnected
                ) {
                    self.renderer.feedback(Feedback::Heartbeat);
                }
                self.apply(Event::Heartbeat);
            }
            SystemOp::Ping => info!("{} ping received", self.address),
            SystemOp::Identify => self.renderer.identify(cmd.duration),
            SystemOp::SetLedCount => {
                self.config.led_count = u16::from(cmd.length);
                self.renderer.set_led_count(self.config.led_count);
                info!("{} LED count set to {}", self.address, self.config.led_count);
            }
            SystemOp::SetGroups => {
                self.config.groups = GroupMask(cmd.duration);
                info!("{} groups set to {}", self.address, self.config.groups);
            }
            SystemOp::SaveConfig => {
                if let Err(e) = self.store.save(&self.config) {
                    warn!("{} failed to save config: {}", self.address, e);
                }
            }
            SystemOp::Reboot => {
                info!("{} rebooting", self.address);
                self.restart_requested = true;
            }
            SystemOp::FactoryReset => {
                info!("{} factory reset", self.address);
                let defaults = DeviceConfig::default();
                if let Err(e) = self.store.save(&defaults) {
                    warn!("{} failed to persist factory defaults: {}", self.address, e);
                }
                self.config = defaults;
                self.restart_requested = true;
            }
            SystemOp::SetMeshTtl => {
                self.config.mesh_ttl = cmd.length.min(MAX_MESH_TTL);
                info!("{} mesh TTL set to {}", self.address, self.config.mesh_ttl);
            }
        }
    }

    fn handle_debug(&mut self, op: DebugOp, cmd: &CommandFrame) {
        match op {
            DebugOp::Info => info!(
                "{} debug: state={} groups={} leds={} ttl={}",
                self.address,
                self.state,
                self.config.groups,
                self.config.led_count,
                self.config.mesh_ttl
            ),
            DebugOp::Echo | DebugOp::Stress => {
                debug!("{} debug {:?} seq={}", self.address, op, cmd.sequence)
            }
        }
    }

    fn handle_state_op(&mut self, op: StateOp, cmd: &CommandFrame, now: u64) {
        match op {
            StateOp::Off => {
                self.renderer.clear();
                self.effect_running = false;
                self.apply(Event::StandbyRequested);
            }
            StateOp::Standby => {
                self.effect_running = false;
                self.apply(Event::StandbyRequested);
            }
            StateOp::Active => match self.last_effect {
                Some(effect) => self.start_effect(effect, now),
                None => debug!("{} has no effect to resume", self.address),
            },
            StateOp::Emergency => self.start_effect(emergency_effect(cmd), now),
            StateOp::Blackout => {
                self.renderer.blackout();
                self.effect_running = false;
                self.blackout_started_at = now;
                self.blackout_duration_ms = if cmd.duration > 0 {
                    u64::from(cmd.duration)
                } else if self.last_heartbeat.is_some() {
                    self.timings.blackout_midshow_ms
                } else {
                    self.timings.blackout_preshow_ms
                };
                self.apply(Event::BlackoutRequested);
            }
        }
    }

    fn start_effect(&mut self, effect: CommandFrame, now: u64) {
        self.last_effect = Some(effect);
        self.effect_running = true;
        self.effect_started_at = now;
        self.effect_duration_ms = if effect.duration > 0 {
            u64::from(effect.duration)
        } else {
            self.timings.default_effect_duration_ms
        };
        self.renderer.render_effect(&effect);
        self.apply(Event::EffectStarted);
    }

    // ------------------------------------------------------------------
    // Pairing side-channel
    // ------------------------------------------------------------------

    fn handle_short(&mut self, msg: InboundShort) {
        let message = match PairingMessage::decode(msg.bytes()) {
            Ok(message) => message,
            Err(e) => {
                warn!("{} malformed pairing message from {}: {}", self.address, msg.src, e);
                return;
            }
        };
        match message {
            PairingMessage::PairingAck { target } if target == self.address => {
                if self.state == NodeState::Pairing && self.pairing.on_ack() {
                    info!("{} pairing acknowledged, waiting for config", self.address);
                    self.renderer.feedback(Feedback::PairingAck);
                } else {
                    debug!("{} unexpected pairing ack in {}", self.address, self.state);
                }
            }
            PairingMessage::ConfigSet(assignment) => self.handle_config_set(assignment),
            other => trace!("{} ignoring {:?} from {}", self.address, other, msg.src),
        }
    }

    fn handle_config_set(&mut self, assignment: ConfigSet) {
        if !self.state.accepts_config() {
            debug!("{} ignoring config push in {}", self.address, self.state);
            return;
        }
        info!(
            "{} config push: register={} leds={} standby={}",
            self.address, assignment.register, assignment.led_count, assignment.standby_color
        );

        let candidate = match self.config.with_assignment(&assignment) {
            Ok(candidate) => candidate,
            Err(e) => {
                warn!("{} rejected config: {}", self.address, e);
                self.config_failed();
                return;
            }
        };
        if let Err(e) = self.store.save(&candidate) {
            warn!("{} failed to persist config: {}", self.address, e);
            self.config_failed();
            return;
        }

        self.config = candidate;
        self.pairing.finish();
        self.renderer.set_led_count(self.config.led_count);
        self.renderer.feedback(Feedback::ConfigSaved);
        self.apply(Event::ConfigAccepted);
        self.send_config_ack(true);
        self.record_pairing_result("success");
    }

    fn config_failed(&mut self) {
        self.renderer.feedback(Feedback::ConfigFailed);
        self.send_config_ack(false);
        self.record_pairing_result("rejected");
    }

    fn send_config_ack(&mut self, success: bool) {
        let ack = PairingMessage::ConfigAck { success }.encode();
        if self.broadcast(&ack) {
            self.stats.config_acks_sent += 1;
        }
    }

    fn record_pairing_result(&self, outcome: &'static str) {
        let labels = self.labels.with(&[("outcome", outcome.to_string())]);
        metrics::counter!(metric_defs::NODE_PAIRING_RESULT.name, &labels).increment(1);
    }

    // ------------------------------------------------------------------
    // Per-state periodic work
    // ------------------------------------------------------------------

    fn tick_state(&mut self, now: u64) {
        match self.state {
            NodeState::Init => self.apply(Event::Booted {
                configured: self.config.configured,
            }),
            NodeState::Unconfigured => self.renderer.show_idle(IdleScene::Unconfigured, now),
            NodeState::Pairing => self.tick_pairing(now),
            NodeState::Connecting | NodeState::Disconnected => {
                self.renderer.show_idle(IdleScene::Searching, now)
            }
            NodeState::Standby => self.tick_standby(now),
            NodeState::Active => {
                if !self.effect_running
                    || now.saturating_sub(self.effect_started_at) >= self.effect_duration_ms
                {
                    self.effect_running = false;
                    self.apply(Event::EffectFinished);
                } else {
                    self.renderer.tick_effect(now);
                }
            }
            NodeState::Blackout => {
                if now.saturating_sub(self.blackout_started_at) >= self.blackout_duration_ms {
                    self.apply(Event::BlackoutFinished);
                }
            }
        }
    }

    fn tick_pairing(&mut self, now: u64) {
        if self.pairing.timed_out(now, self.timings.pairing_timeout_ms) {
            warn!("{} pairing timed out", self.address);
            self.pairing.finish();
            self.renderer.feedback(Feedback::PairingFailed);
            self.record_pairing_result("timeout");
            self.apply(Event::PairingTimedOut {
                configured: self.config.configured,
            });
            return;
        }

        if self
            .pairing
            .request_due(now, self.timings.pairing_request_interval_ms)
        {
            debug!("{} sending pairing request", self.address);
            let request = PairingMessage::PairingRequest {
                origin: self.address,
            }
            .encode();
            if self.broadcast(&request) {
                self.stats.pairing_requests_sent += 1;
                metrics::counter!(metric_defs::NODE_PAIRING_REQUESTS.name, &self.labels.to_labels())
                    .increment(1);
            }
            self.pairing.mark_request_sent(now);
        }
        self.renderer.show_idle(IdleScene::Pairing, now);
    }

    fn tick_standby(&mut self, now: u64) {
        match self.last_heartbeat {
            Some(seen) if now.saturating_sub(seen) > self.timings.heartbeat_timeout_ms => {
                warn!("{} heartbeat lost", self.address);
                metrics::counter!(metric_defs::NODE_HEARTBEAT_LOST.name, &self.labels.to_labels())
                    .increment(1);
                self.apply(Event::HeartbeatLost);
            }
            Some(_) => self.renderer.show_idle(IdleScene::MidShow, now),
            None => self
                .renderer
                .show_idle(IdleScene::PreShow(self.config.standby_color), now),
        }
    }
}

/// The effect shown for a state-emergency command: full red strobe, keeping
/// the command's timing fields.
fn emergency_effect(cmd: &CommandFrame) -> CommandFrame {
    CommandFrame {
        opcode: Opcode::Effect(EffectId::STROBE),
        color: Rgb::new(255, 0, 0),
        intensity: 255,
        ..*cmd
    }
}
