//! Per-tick input snapshots

use serde::{Deserialize, Serialize};

/// Buttons held this tick plus rising-edge flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InputFrame {
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
    pub action: bool,
    /// Action went from released to held this tick
    pub action_just: bool,
    /// Jump went from released to held this tick
    pub jump_just: bool,
}

impl InputFrame {
    /// Fill the rising-edge flags from the previous tick's held buttons
    pub fn with_edges(mut self, prev: &InputFrame) -> InputFrame {
        self.action_just = self.action_just || (self.action && !prev.action);
        self.jump_just = self.jump_just || (self.up && !prev.up);
        self
    }
}

/// Looping list of held-button frames replayed by a headless peer
#[derive(Debug, Clone, Default)]
pub struct InputScript {
    frames: Vec<InputFrame>,
    cursor: usize,
    prev: InputFrame,
}

impl InputScript {
    pub fn new(frames: Vec<InputFrame>) -> Self {
        Self {
            frames,
            cursor: 0,
            prev: InputFrame::default(),
        }
    }

    /// Parse a JSON array of frames
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Next frame with edges derived; an empty script idles
    pub fn next_frame(&mut self) -> InputFrame {
        let Some(raw) = self.frames.get(self.cursor).copied() else {
            return InputFrame::default();
        };
        self.cursor = (self.cursor + 1) % self.frames.len();
        let frame = raw.with_edges(&self.prev);
        self.prev = raw;
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edges_fire_only_on_press() {
        let held = InputFrame {
            up: true,
            action: true,
            ..Default::default()
        };
        let first = held.with_edges(&InputFrame::default());
        assert!(first.jump_just && first.action_just);
        let second = held.with_edges(&held);
        assert!(!second.jump_just && !second.action_just);
    }

    #[test]
    fn script_loops_and_tracks_edges() {
        let mut script =
            InputScript::from_json(r#"[{"up":true},{"up":true},{"right":true}]"#).unwrap();
        assert_eq!(script.len(), 3);
        assert!(script.next_frame().jump_just);
        assert!(!script.next_frame().jump_just);
        assert!(script.next_frame().right);
        // wraps to the first frame, which is a fresh press again
        assert!(script.next_frame().jump_just);
    }

    #[test]
    fn empty_script_idles() {
        let mut script = InputScript::default();
        assert_eq!(script.next_frame(), InputFrame::default());
    }
}
