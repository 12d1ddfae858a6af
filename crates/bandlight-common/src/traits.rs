//! Collaborator traits a node or bridge is built on.
//!
//! The protocol core never touches hardware directly. Radio, LEDs, flash and
//! time are all reached through these traits, so the same core runs on a
//! device, in the simulator and in unit tests.

use bandlight_frame::{CommandFrame, RadioAddress, Rgb};

use crate::{DeviceConfig, StoreError, TransportError};

/// Monotonic millisecond clock.
pub trait Clock {
    fn now_millis(&self) -> u64;
}

/// Link-layer radio with broadcast and peer-addressed unicast.
pub trait RadioTransport {
    /// This station's own address.
    fn local_address(&self) -> RadioAddress;

    fn send_broadcast(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Send to one station. The destination must have been added with
    /// [`add_peer`](RadioTransport::add_peer) first.
    fn send_unicast(&mut self, dest: RadioAddress, data: &[u8]) -> Result<(), TransportError>;

    fn add_peer(&mut self, addr: RadioAddress) -> Result<(), TransportError>;

    fn remove_peer(&mut self, addr: RadioAddress) -> Result<(), TransportError>;
}

/// Idle animations shown when no effect is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleScene {
    Unconfigured,
    Pairing,
    /// Looking for the host (connecting or disconnected).
    Searching,
    /// Standby before the show's first heartbeat, in the standby colour.
    PreShow(Rgb),
    /// Standby between songs.
    MidShow,
}

/// Short visual acknowledgements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feedback {
    Heartbeat,
    PairingAck,
    ConfigSaved,
    ConfigFailed,
    PairingFailed,
}

/// LED output.
pub trait Renderer {
    /// Start the effect a command frame describes.
    fn render_effect(&mut self, frame: &CommandFrame);

    /// Advance the running effect.
    fn tick_effect(&mut self, now_ms: u64);

    fn show_idle(&mut self, scene: IdleScene, now_ms: u64);

    fn blackout(&mut self);

    fn clear(&mut self);

    fn feedback(&mut self, feedback: Feedback);

    /// Blink a recognisable pattern for `duration_ms`.
    fn identify(&mut self, duration_ms: u16);

    fn set_led_count(&mut self, count: u16);
}

/// Persistent storage for [`DeviceConfig`].
pub trait ConfigStore {
    /// Load the stored config, `None` if nothing has been stored yet.
    fn load(&mut self) -> Result<Option<DeviceConfig>, StoreError>;

    fn save(&mut self, config: &DeviceConfig) -> Result<(), StoreError>;
}
