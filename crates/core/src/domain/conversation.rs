use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Customer,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Chronologically ordered turns for one phone number.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationHistory {
    turns: Vec<ConversationTurn>,
}

impl ConversationHistory {
    pub fn new(mut turns: Vec<ConversationTurn>) -> Self {
        turns.sort_by_key(|turn| turn.timestamp);
        Self { turns }
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn recent(&self, count: usize) -> &[ConversationTurn] {
        let start = self.turns.len().saturating_sub(count);
        &self.turns[start..]
    }

    /// Index and turn of the latest assistant message.
    pub fn last_assistant_turn(&self) -> Option<(usize, &ConversationTurn)> {
        self.turns.iter().enumerate().rev().find(|(_, turn)| turn.speaker == Speaker::Assistant)
    }

    /// Customer turns written after the latest assistant message.
    pub fn customer_turns_since_last_reply(&self) -> usize {
        match self.last_assistant_turn() {
            Some((index, _)) => self.turns.len() - index - 1,
            None => self.turns.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{ConversationHistory, ConversationTurn, Speaker};

    fn turn(speaker: Speaker, text: &str, minute: u32) -> ConversationTurn {
        ConversationTurn {
            speaker,
            text: text.to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 10, 19, 10, minute, 0).single().expect("timestamp"),
        }
    }

    #[test]
    fn turns_are_sorted_and_recent_slices_from_the_end() {
        let history = ConversationHistory::new(vec![
            turn(Speaker::Assistant, "b", 2),
            turn(Speaker::Customer, "a", 1),
            turn(Speaker::Customer, "c", 3),
        ]);

        let texts = history.turns().iter().map(|turn| turn.text.as_str()).collect::<Vec<_>>();
        assert_eq!(texts, vec!["a", "b", "c"]);
        assert_eq!(history.recent(2).len(), 2);
        assert_eq!(history.recent(10).len(), 3);
        assert_eq!(history.customer_turns_since_last_reply(), 1);
        assert_eq!(history.last_assistant_turn().map(|(index, _)| index), Some(1));
    }
}
