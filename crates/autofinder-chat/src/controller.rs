//! Conversation controller.
//!
//! Decides, from the caller-supplied history alone, which intent the current
//! turn is handled under, whether prior context is discarded, and which
//! subsequence of the history reaches generation.

use autofinder_core::types::Turn;

use crate::intent::{Intent, IntentClassifier};

/// Per-turn routing decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnPlan {
    /// Final intent, after stickiness.
    pub intent: Intent,
    /// True when prior turns were discarded for a fresh search.
    pub reset: bool,
    /// Most recent user message, trimmed.
    pub last_user: String,
    /// Turns passed to the prompt, at most `history_window` long.
    pub effective_history: Vec<Turn>,
    /// True when an earlier user turn was already a car search.
    pub already_in_search: bool,
}

// =============================================================================
// ConversationController
// =============================================================================

/// Two-turn lookback controller over a stateless history.
#[derive(Debug, Clone)]
pub struct ConversationController {
    classifier: IntentClassifier,
    history_window: usize,
}

impl ConversationController {
    pub fn new(classifier: IntentClassifier, history_window: usize) -> Self {
        Self {
            classifier,
            history_window,
        }
    }

    /// Plan the handling of the latest user turn.
    ///
    /// Once any earlier user turn was a car search, smalltalk and off-topic
    /// turns stay in the search flow. Context is reset only on the
    /// transition from chatter into a first search.
    pub fn plan(&self, history: &[Turn]) -> TurnPlan {
        let user_turns: Vec<&str> = history
            .iter()
            .filter(|t| t.is_user())
            .map(|t| t.content.trim())
            .collect();

        let (last_user, prev_user) = match user_turns.as_slice() {
            [] => ("", ""),
            [last] => (*last, ""),
            [.., prev, last] => (*last, *prev),
        };

        let mut intent = self.classifier.classify(last_user);
        let prev_intent = if prev_user.is_empty() {
            Intent::Smalltalk
        } else {
            self.classifier.classify(prev_user)
        };

        let prior = user_turns.len().saturating_sub(1);
        let already_in_search = user_turns[..prior]
            .iter()
            .any(|text| self.classifier.classify(text) == Intent::CarSearch);

        if already_in_search && intent != Intent::CarSearch {
            intent = Intent::CarSearch;
        }

        let reset = !last_user.is_empty()
            && prev_intent != Intent::CarSearch
            && intent == Intent::CarSearch
            && !already_in_search;

        // On reset, keep only the caller's own last user turn, unmodified.
        let effective: Vec<Turn> = if reset {
            history
                .iter()
                .rev()
                .find(|t| t.is_user())
                .cloned()
                .into_iter()
                .collect()
        } else {
            history.to_vec()
        };
        let skip = effective.len().saturating_sub(self.history_window);
        let effective_history = effective.into_iter().skip(skip).collect();

        TurnPlan {
            intent,
            reset,
            last_user: last_user.to_string(),
            effective_history,
            already_in_search,
        }
    }
}

impl Default for ConversationController {
    fn default() -> Self {
        Self::new(IntentClassifier::new(), 12)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(history: &[Turn]) -> TurnPlan {
        ConversationController::default().plan(history)
    }

    // ---- Reset ----

    #[test]
    fn test_reset_on_entering_search() {
        let history = vec![
            Turn::user("salut"),
            Turn::assistant("Bonjour ! Que cherchez-vous ?"),
            Turn::user("je veux une voiture diesel"),
        ];
        let p = plan(&history);
        assert!(p.reset);
        assert_eq!(p.intent, Intent::CarSearch);
        assert_eq!(p.effective_history, vec![Turn::user("je veux une voiture diesel")]);
    }

    #[test]
    fn test_first_message_search_resets() {
        let p = plan(&[Turn::user("  une citadine essence  ")]);
        assert!(p.reset);
        assert_eq!(p.last_user, "une citadine essence");
        // The turn itself reaches the prompt as the caller sent it.
        assert_eq!(p.effective_history, vec![Turn::user("  une citadine essence  ")]);
    }

    #[test]
    fn test_no_reset_for_smalltalk() {
        let history = vec![Turn::user("bonjour"), Turn::assistant("Bonjour !"), Turn::user("merci")];
        let p = plan(&history);
        assert!(!p.reset);
        assert_eq!(p.intent, Intent::Smalltalk);
        assert_eq!(p.effective_history.len(), 3);
    }

    #[test]
    fn test_empty_history() {
        let p = plan(&[]);
        assert!(!p.reset);
        assert_eq!(p.intent, Intent::Smalltalk);
        assert!(p.last_user.is_empty());
        assert!(p.effective_history.is_empty());
    }

    #[test]
    fn test_consecutive_searches_do_not_reset() {
        let history = vec![
            Turn::user("je cherche une voiture diesel"),
            Turn::assistant("Voici..."),
            Turn::user("plutôt automatique"),
        ];
        let p = plan(&history);
        assert!(!p.reset);
        assert!(p.already_in_search);
        assert_eq!(p.effective_history.len(), 3);
    }

    // ---- Stickiness ----

    #[test]
    fn test_smalltalk_sticks_to_search() {
        let history = vec![
            Turn::user("une voiture diesel moins de 80000 dh"),
            Turn::assistant("Voici deux voitures..."),
            Turn::user("merci"),
        ];
        let p = plan(&history);
        assert_eq!(p.intent, Intent::CarSearch);
        assert!(!p.reset);
        assert_eq!(p.effective_history.len(), 3);
    }

    #[test]
    fn test_off_topic_sticks_to_search() {
        let history = vec![
            Turn::user("bonjour"),
            Turn::user("un SUV"),
            Turn::user("quelle heure est-il ?"),
        ];
        let p = plan(&history);
        assert_eq!(p.intent, Intent::CarSearch);
        assert!(!p.reset);
    }

    #[test]
    fn test_assistant_turns_do_not_count_as_search() {
        let history = vec![
            Turn::user("bonjour"),
            Turn::assistant("Quel budget pour votre voiture ?"),
            Turn::user("merci"),
        ];
        let p = plan(&history);
        assert!(!p.already_in_search);
        assert_eq!(p.intent, Intent::Smalltalk);
    }

    // ---- Windowing ----

    #[test]
    fn test_history_window_keeps_tail() {
        let mut history = Vec::new();
        for i in 0..20 {
            history.push(Turn::user(format!("question {i}")));
            history.push(Turn::assistant(format!("réponse {i}")));
        }
        history.push(Turn::user("dernier message"));

        let p = plan(&history);
        assert_eq!(p.effective_history.len(), 12);
        assert_eq!(p.effective_history.last(), Some(&Turn::user("dernier message")));
        assert_eq!(p.effective_history[0], Turn::assistant("réponse 14"));
    }

    #[test]
    fn test_custom_window() {
        let controller = ConversationController::new(IntentClassifier::new(), 2);
        let history = vec![Turn::user("a"), Turn::assistant("b"), Turn::user("c")];
        let p = controller.plan(&history);
        assert_eq!(p.effective_history, vec![Turn::assistant("b"), Turn::user("c")]);
    }

    #[test]
    fn test_window_never_exceeded() {
        let controller = ConversationController::default();
        for len in [0, 1, 11, 12, 13, 50] {
            let history: Vec<Turn> = (0..len).map(|i| Turn::user(format!("msg {i}"))).collect();
            assert!(controller.plan(&history).effective_history.len() <= 12, "len {len}");
        }
    }
}
