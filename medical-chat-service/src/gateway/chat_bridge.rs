//! Conversion from client-held conversation turns to rig::completion::Message.

use rig::completion::Message;

use crate::models::{ConversationTurn, Role};

pub fn to_rig_message(turn: &ConversationTurn) -> Message {
    match turn.role {
        Role::User => Message::user(turn.text.clone()),
        Role::Model => Message::assistant(turn.text.clone()),
    }
}

pub fn to_rig_messages(turns: &[ConversationTurn]) -> Vec<Message> {
    turns.iter().map(to_rig_message).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_conversion_keeps_order_and_length() {
        let turns = vec![
            ConversationTurn::user("I have a sore throat"),
            ConversationTurn::model("How long have you had it?"),
            ConversationTurn::user("Two days"),
        ];

        let messages = to_rig_messages(&turns);
        assert_eq!(messages.len(), 3);
        assert!(matches!(messages[0], Message::User { .. }));
        assert!(matches!(messages[1], Message::Assistant { .. }));
        assert!(matches!(messages[2], Message::User { .. }));
    }

    #[test]
    fn test_empty_history() {
        assert!(to_rig_messages(&[]).is_empty());
    }
}
