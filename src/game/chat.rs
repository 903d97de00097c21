//! Short-lived chat log

use serde::Serialize;

use super::player::PlayerId;

/// Longest accepted chat line, in characters
pub const MAX_CHAT_CHARS: usize = 80;
const MAX_LINES: usize = 8;
const LINE_TICKS: u32 = 420;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatLine {
    pub player_id: PlayerId,
    pub text: String,
    /// Ticks until the line disappears
    pub ttl: u32,
}

/// The most recent chat lines, oldest first
#[derive(Debug, Clone, Default)]
pub struct ChatLog {
    lines: Vec<ChatLine>,
}

/// Trim and cut a line to the accepted length. Empty lines are rejected.
pub fn sanitize(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_CHAT_CHARS).collect())
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, player_id: PlayerId, text: String) {
        self.lines.push(ChatLine {
            player_id,
            text,
            ttl: LINE_TICKS,
        });
        if self.lines.len() > MAX_LINES {
            let excess = self.lines.len() - MAX_LINES;
            self.lines.drain(..excess);
        }
    }

    /// Age every line by one tick
    pub fn tick(&mut self) {
        for line in &mut self.lines {
            line.ttl = line.ttl.saturating_sub(1);
        }
        self.lines.retain(|l| l.ttl > 0);
    }

    pub fn lines(&self) -> &[ChatLine] {
        &self.lines
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_recent_lines() {
        let mut log = ChatLog::new();
        for i in 0..12 {
            log.push(0, format!("line {i}"));
        }
        assert_eq!(log.lines().len(), MAX_LINES);
        assert_eq!(log.lines()[0].text, "line 4");
    }

    #[test]
    fn lines_expire() {
        let mut log = ChatLog::new();
        log.push(1, "hi".into());
        for _ in 0..LINE_TICKS - 1 {
            log.tick();
        }
        assert_eq!(log.lines().len(), 1);
        log.tick();
        assert!(log.lines().is_empty());
    }

    #[test]
    fn sanitize_trims_and_truncates() {
        assert_eq!(sanitize("   "), None);
        assert_eq!(sanitize(" hey ").as_deref(), Some("hey"));
        let long = "x".repeat(200);
        assert_eq!(sanitize(&long).map(|s| s.chars().count()), Some(MAX_CHAT_CHARS));
    }
}
