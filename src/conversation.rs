use crate::protocol::ServerEvent;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Human,
    Assistant,
}

/// One entry in the conversation transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    /// True while this is an optimistic placeholder awaiting the server's
    /// STT confirmation.
    pub pending: bool,
}

impl Turn {
    fn assistant(content: &str) -> Self {
        Self {
            role: Role::Assistant,
            content: content.to_string(),
            pending: false,
        }
    }

    fn human(content: &str) -> Self {
        Self {
            role: Role::Human,
            content: content.to_string(),
            pending: false,
        }
    }
}

/// Ordered transcript of the session. Insertion order is display order; the
/// only removal ever performed is swapping the pending placeholder out when
/// its STT confirmation arrives.
#[derive(Debug, Default)]
pub struct ConversationLog {
    turns: Vec<Turn>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn has_pending(&self) -> bool {
        self.pending_index().is_some()
    }

    fn pending_index(&self) -> Option<usize> {
        self.turns
            .iter()
            .position(|t| t.pending && t.role == Role::Human)
    }

    /// Optimistic insert: append one pending human turn before the audio
    /// buffer is handed to the transport. A stale placeholder from an
    /// utterance that was never confirmed is superseded first, keeping the
    /// at-most-one-pending invariant.
    pub fn push_pending(&mut self, placeholder: &str) {
        if let Some(idx) = self.pending_index() {
            self.turns.remove(idx);
        }
        self.turns.push(Turn {
            role: Role::Human,
            content: placeholder.to_string(),
            pending: true,
        });
    }

    /// Fold one inbound event into the log. Runs to completion on the actor;
    /// never fails. Events the parser does not recognize never get here.
    pub fn apply(&mut self, event: &ServerEvent) {
        match event {
            ServerEvent::System { message } => {
                self.turns.push(Turn::assistant(message));
            }
            ServerEvent::SttResult { transcript, .. } => {
                // Swap the placeholder for the confirmed transcript. A result
                // arriving with no placeholder present is a no-op removal,
                // not an error.
                if let Some(idx) = self.pending_index() {
                    self.turns.remove(idx);
                }
                self.turns.push(Turn::human(transcript));
            }
            ServerEvent::AskAgain { prompt, .. } => {
                // The backend wants a retry; the pending turn (if any) stays
                // until its own STT result lands.
                self.turns.push(Turn::assistant(prompt));
            }
            ServerEvent::Complete { message, .. } => {
                self.turns.push(Turn::assistant(message));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_human_count(log: &ConversationLog) -> usize {
        log.turns()
            .iter()
            .filter(|t| t.pending && t.role == Role::Human)
            .count()
    }

    #[test]
    fn system_message_appends_assistant_turn_to_empty_log() {
        let mut log = ConversationLog::new();
        log.apply(&ServerEvent::System {
            message: "Welcome".into(),
        });
        assert_eq!(log.turns().len(), 1);
        assert_eq!(
            log.turns()[0],
            Turn {
                role: Role::Assistant,
                content: "Welcome".into(),
                pending: false,
            }
        );
    }

    #[test]
    fn pending_turn_stays_until_confirmed() {
        let mut log = ConversationLog::new();
        log.push_pending("Transcribing...");
        assert_eq!(log.turns().len(), 1);
        assert!(log.has_pending());
        assert_eq!(log.turns()[0].role, Role::Human);
    }

    #[test]
    fn stt_result_swaps_placeholder_for_transcript() {
        let mut log = ConversationLog::new();
        log.push_pending("Transcribing...");
        log.apply(&ServerEvent::SttResult {
            transcript: "hello".into(),
            confidence: Some(0.92),
        });
        assert_eq!(log.turns().len(), 1);
        let last = log.turns().last().unwrap();
        assert_eq!(last.role, Role::Human);
        assert_eq!(last.content, "hello");
        assert!(!last.pending);
        assert_eq!(pending_human_count(&log), 0);
    }

    #[test]
    fn stt_result_without_placeholder_just_appends() {
        let mut log = ConversationLog::new();
        log.apply(&ServerEvent::SttResult {
            transcript: "hello".into(),
            confidence: None,
        });
        assert_eq!(log.turns().len(), 1);
        assert_eq!(log.turns()[0].content, "hello");
        assert!(!log.turns()[0].pending);
    }

    #[test]
    fn ask_again_leaves_pending_turn_untouched() {
        let mut log = ConversationLog::new();
        log.push_pending("Transcribing...");
        log.apply(&ServerEvent::AskAgain {
            prompt: "Please repeat".into(),
            missing: vec!["name".into()],
            confidence: Some(0.3),
        });
        assert_eq!(log.turns().len(), 2);
        assert!(log.turns()[0].pending);
        assert_eq!(log.turns()[1].role, Role::Assistant);
        assert_eq!(log.turns()[1].content, "Please repeat");
        assert_eq!(pending_human_count(&log), 1);
    }

    #[test]
    fn complete_appends_assistant_turn() {
        let mut log = ConversationLog::new();
        log.apply(&ServerEvent::Complete {
            message: "All done".into(),
            confidence: Some(0.99),
        });
        assert_eq!(log.turns().len(), 1);
        assert_eq!(log.turns()[0].role, Role::Assistant);
        assert!(!log.turns()[0].pending);
    }

    #[test]
    fn at_most_one_pending_human_turn() {
        let mut log = ConversationLog::new();
        log.push_pending("Transcribing...");
        // A second utterance whose predecessor was never confirmed must not
        // leave two placeholders behind.
        log.push_pending("Transcribing...");
        assert_eq!(pending_human_count(&log), 1);
        assert_eq!(log.turns().len(), 1);
    }

    #[test]
    fn events_fold_in_arrival_order() {
        let mut log = ConversationLog::new();
        log.apply(&ServerEvent::System {
            message: "first".into(),
        });
        log.apply(&ServerEvent::Complete {
            message: "second".into(),
            confidence: None,
        });
        let contents: Vec<&str> = log.turns().iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second"]);
    }

    #[test]
    fn full_exchange_keeps_order_and_roles() {
        let mut log = ConversationLog::new();
        log.apply(&ServerEvent::System {
            message: "Press the button to speak".into(),
        });
        log.push_pending("Transcribing...");
        log.apply(&ServerEvent::SttResult {
            transcript: "book a table for two".into(),
            confidence: Some(0.88),
        });
        log.apply(&ServerEvent::AskAgain {
            prompt: "For what time?".into(),
            missing: vec!["time".into()],
            confidence: Some(0.41),
        });
        log.push_pending("Transcribing...");
        log.apply(&ServerEvent::SttResult {
            transcript: "seven tonight".into(),
            confidence: Some(0.95),
        });
        log.apply(&ServerEvent::Complete {
            message: "Booked for 7pm".into(),
            confidence: Some(0.97),
        });

        let roles: Vec<Role> = log.turns().iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![
                Role::Assistant,
                Role::Human,
                Role::Assistant,
                Role::Human,
                Role::Assistant,
            ]
        );
        assert_eq!(pending_human_count(&log), 0);
    }
}
