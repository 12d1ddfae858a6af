//! Counting renderer for simulated nodes.

use bandlight_common::{Feedback, IdleScene, Renderer};
use bandlight_frame::CommandFrame;

/// A [`Renderer`] that keeps counts instead of a call log, so a long run
/// stays small.
#[derive(Debug, Clone, Default)]
pub struct SimRenderer {
    pub effects_started: u64,
    pub last_effect: Option<CommandFrame>,
    pub blackouts: u64,
    pub identifies: u64,
    pub feedback: Vec<Feedback>,
    pub last_idle: Option<IdleScene>,
    pub led_count: u16,
}

impl SimRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Renderer for SimRenderer {
    fn render_effect(&mut self, frame: &CommandFrame) {
        self.effects_started += 1;
        self.last_effect = Some(*frame);
        self.last_idle = None;
    }

    fn tick_effect(&mut self, _now_ms: u64) {}

    fn show_idle(&mut self, scene: IdleScene, _now_ms: u64) {
        self.last_idle = Some(scene);
    }

    fn blackout(&mut self) {
        self.blackouts += 1;
        self.last_idle = None;
    }

    fn clear(&mut self) {
        self.last_idle = None;
    }

    fn feedback(&mut self, feedback: Feedback) {
        self.feedback.push(feedback);
    }

    fn identify(&mut self, _duration_ms: u16) {
        self.identifies += 1;
    }

    fn set_led_count(&mut self, count: u16) {
        self.led_count = count;
    }
}
