//! Simulated show host.
//!
//! The host sits on the far end of the bridge's wired link. It sends
//! heartbeats and scheduled commands, and runs the pairing policy: every
//! pairing request is acknowledged at once and answered with a
//! configuration push a little later.

use std::collections::{BTreeMap, VecDeque};

use bandlight_bridge::DirectedMessage;
use bandlight_frame::{CommandFrame, ConfigSet, Opcode, RadioAddress, MAX_REGISTER};
use bandlight_serial::{encode_envelope, UpstreamDecoder, UpstreamMessage};
use serde::Serialize;
use tracing::{info, warn};

use crate::model::{HostModel, ScheduledCommand};

/// Where one node is in the host's pairing bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PairingStatus {
    /// Acked, config push not sent yet.
    Acknowledged,
    /// Config pushed, waiting for the node's ack.
    ConfigSent,
    Configured,
    Failed,
}

/// The host's record of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PairingRecord {
    pub register: u8,
    pub status: PairingStatus,
}

/// Host counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HostStats {
    pub heartbeats_sent: u64,
    pub commands_sent: u64,
    pub pairing_requests: u64,
    pub config_pushes: u64,
    pub config_acks_ok: u64,
    pub config_acks_failed: u64,
    /// Pairing requests refused because every register was handed out.
    pub registers_exhausted: u64,
}

struct PendingConfig {
    due_ms: u64,
    target: RadioAddress,
}

/// The simulated host controller.
pub struct HostController {
    config: HostModel,
    next_heartbeat_ms: Option<u64>,
    commands: VecDeque<ScheduledCommand>,
    pending_configs: VecDeque<PendingConfig>,
    next_register: u8,
    pairings: BTreeMap<RadioAddress, PairingRecord>,
    decoder: UpstreamDecoder,
    /// Wired bytes waiting to be written to the bridge.
    outbox: Vec<u8>,
    stats: HostStats,
}

impl HostController {
    pub fn new(config: HostModel) -> Self {
        let mut commands: Vec<ScheduledCommand> = config.commands.clone();
        commands.sort_by_key(|c| c.at_ms);
        HostController {
            next_heartbeat_ms: (config.heartbeat_interval_ms > 0).then_some(0),
            commands: commands.into(),
            pending_configs: VecDeque::new(),
            next_register: config.first_register,
            pairings: BTreeMap::new(),
            decoder: UpstreamDecoder::new(),
            outbox: Vec::new(),
            stats: HostStats::default(),
            config,
        }
    }

    pub fn stats(&self) -> HostStats {
        self.stats
    }

    pub fn pairings(&self) -> &BTreeMap<RadioAddress, PairingRecord> {
        &self.pairings
    }

    /// Wired bytes to write to the bridge at `now_ms`.
    pub fn poll(&mut self, now_ms: u64) -> Vec<u8> {
        if let Some(due) = self.next_heartbeat_ms {
            if now_ms >= due {
                let heartbeat = CommandFrame::new(Opcode::HEARTBEAT).with_ttl(self.config.heartbeat_ttl);
                self.write_frame(&heartbeat);
                self.stats.heartbeats_sent += 1;
                self.next_heartbeat_ms = Some(due + self.config.heartbeat_interval_ms);
            }
        }

        while self.commands.front().is_some_and(|c| c.at_ms <= now_ms) {
            if let Some(command) = self.commands.pop_front() {
                let frame = command.to_frame();
                info!("Host sending {} at {} ms", frame.opcode, now_ms);
                self.write_frame(&frame);
                self.stats.commands_sent += 1;
            }
        }

        while self.pending_configs.front().is_some_and(|p| p.due_ms <= now_ms) {
            if let Some(pending) = self.pending_configs.pop_front() {
                self.push_config(pending.target);
            }
        }

        std::mem::take(&mut self.outbox)
    }

    /// Consume bytes the bridge wrote upstream at `now_ms`.
    pub fn on_upstream(&mut self, data: &[u8], now_ms: u64) {
        self.decoder.push(data);
        loop {
            match self.decoder.decode() {
                Ok(Some(message)) => self.handle_upstream(message, now_ms),
                Ok(None) => break,
                Err(e) => warn!("Host dropped upstream frame: {}", e),
            }
        }
    }

    fn handle_upstream(&mut self, message: UpstreamMessage, now_ms: u64) {
        match message {
            UpstreamMessage::PairingRequest { address } => {
                self.stats.pairing_requests += 1;
                self.on_pairing_request(address, now_ms);
            }
            UpstreamMessage::ConfigAck { address, success } => {
                let Some(record) = self.pairings.get_mut(&address) else {
                    warn!("Config ack from unknown node {}", address);
                    return;
                };
                if success {
                    info!("{} configured with register {}", address, record.register);
                    record.status = PairingStatus::Configured;
                    self.stats.config_acks_ok += 1;
                } else {
                    warn!("{} rejected its configuration", address);
                    record.status = PairingStatus::Failed;
                    self.stats.config_acks_failed += 1;
                }
            }
        }
    }

    fn on_pairing_request(&mut self, address: RadioAddress, now_ms: u64) {
        // A node that re-pairs keeps its register.
        let register = match self.pairings.get(&address) {
            Some(record) => record.register,
            None => {
                if self.next_register > MAX_REGISTER {
                    warn!("No register left for {}", address);
                    self.stats.registers_exhausted += 1;
                    return;
                }
                let register = self.next_register;
                self.next_register += 1;
                register
            }
        };

        let record = self.pairings.entry(address).or_insert(PairingRecord {
            register,
            status: PairingStatus::Acknowledged,
        });
        if record.status == PairingStatus::Acknowledged
            && self.pending_configs.iter().any(|p| p.target == address)
        {
            // Repeat request while the push is pending.
            return;
        }
        record.status = PairingStatus::Acknowledged;

        info!("Pairing {} as register {}", address, register);
        self.write_frame(&DirectedMessage::PairingAck { target: address }.to_frame());
        self.pending_configs.push_back(PendingConfig {
            due_ms: now_ms + self.config.config_delay_ms,
            target: address,
        });
    }

    fn push_config(&mut self, target: RadioAddress) {
        let Some(record) = self.pairings.get_mut(&target) else {
            return;
        };
        record.status = PairingStatus::ConfigSent;
        let config = ConfigSet {
            register: record.register,
            led_count: self.config.led_count,
            standby_color: self.config.standby_color,
        };
        self.write_frame(&DirectedMessage::ConfigSet { target, config }.to_frame());
        self.stats.config_pushes += 1;
    }

    fn write_frame(&mut self, frame: &CommandFrame) {
        self.outbox.extend_from_slice(&encode_envelope(&frame.encode()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bandlight_serial::EnvelopeDecoder;

    const NODE: RadioAddress = RadioAddress::new([2, 0, 0, 0, 0, 1]);

    fn frames(bytes: &[u8]) -> Vec<CommandFrame> {
        EnvelopeDecoder::new()
            .feed_all(bytes, 0)
            .iter()
            .map(CommandFrame::from_bytes)
            .collect()
    }

    fn host() -> HostController {
        HostController::new(HostModel {
            heartbeat_interval_ms: 1_000,
            ..HostModel::default()
        })
    }

    #[test]
    fn test_heartbeat_schedule() {
        let mut host = host();
        let sent = frames(&host.poll(0));
        assert_eq!(sent.len(), 1);
        assert!(sent[0].opcode.is_heartbeat());
        assert_eq!(sent[0].ttl, 2);

        assert!(host.poll(999).is_empty());
        assert_eq!(frames(&host.poll(1_000)).len(), 1);
        assert_eq!(host.stats().heartbeats_sent, 2);
    }

    #[test]
    fn test_pairing_policy() {
        let mut host = host();
        host.poll(0);

        let request = UpstreamMessage::PairingRequest { address: NODE }.encode();
        host.on_upstream(&request, 10);
        let sent = frames(&host.poll(10));
        assert_eq!(
            DirectedMessage::from_frame(&sent[0]),
            Some(DirectedMessage::PairingAck { target: NODE })
        );

        // Repeat request before the push goes out: no second ack.
        host.on_upstream(&request, 50);
        assert!(host.poll(50).is_empty());

        let sent = frames(&host.poll(210));
        match DirectedMessage::from_frame(&sent[0]) {
            Some(DirectedMessage::ConfigSet { target, config }) => {
                assert_eq!(target, NODE);
                assert_eq!(config.register, 1);
                assert_eq!(config.led_count, 30);
            }
            other => panic!("expected config push, got {:?}", other),
        }
        assert_eq!(host.pairings()[&NODE].status, PairingStatus::ConfigSent);

        let ack = UpstreamMessage::ConfigAck {
            address: NODE,
            success: true,
        }
        .encode();
        host.on_upstream(&ack, 220);
        assert_eq!(host.pairings()[&NODE].status, PairingStatus::Configured);
        assert_eq!(host.stats().config_acks_ok, 1);
    }

    #[test]
    fn test_registers_assigned_in_order() {
        let mut host = HostController::new(HostModel {
            heartbeat_interval_ms: 0,
            first_register: 14,
            ..HostModel::default()
        });
        for last in 1..=3u8 {
            let address = RadioAddress::new([2, 0, 0, 0, 0, last]);
            host.on_upstream(&UpstreamMessage::PairingRequest { address }.encode(), 0);
        }
        let registers: Vec<u8> = host.pairings().values().map(|r| r.register).collect();
        assert_eq!(registers, vec![14, 15]);
        assert_eq!(host.stats().registers_exhausted, 1);
    }

    #[test]
    fn test_scheduled_commands_in_time_order() {
        let mut host = HostController::new(HostModel {
            heartbeat_interval_ms: 0,
            commands: vec![
                ScheduledCommand {
                    at_ms: 200,
                    ..command(0x11)
                },
                ScheduledCommand {
                    at_ms: 100,
                    ..command(0x23)
                },
            ],
            ..HostModel::default()
        });
        assert!(host.poll(99).is_empty());
        let sent = frames(&host.poll(250));
        let opcodes: Vec<u8> = sent.iter().map(|f| f.opcode.to_byte()).collect();
        assert_eq!(opcodes, vec![0x23, 0x11]);
    }

    fn command(opcode: u8) -> ScheduledCommand {
        ScheduledCommand {
            at_ms: 0,
            opcode,
            ttl: 2,
            flags: 0,
            groups: 0xFFFF,
            duration: 0,
            length: 0,
            color: None,
            speed: 0,
            intensity: 0,
        }
    }
}
