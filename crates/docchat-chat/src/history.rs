//! Conversation state
//!
//! In-memory turn history keyed by conversation id, plus a per-id turn
//! mutex so two requests on the same conversation cannot interleave their
//! read-generate-append cycles. Different conversations never block each
//! other.

use docchat_core::Turn;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Conversation histories with per-conversation turn exclusion
#[derive(Default)]
pub struct ConversationStore {
    histories: RwLock<HashMap<String, Arc<Mutex<Vec<Turn>>>>>,
    turn_locks: RwLock<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, id: &str) -> Arc<Mutex<Vec<Turn>>> {
        {
            let histories = self.histories.read().unwrap_or_else(|e| e.into_inner());
            if let Some(turns) = histories.get(id) {
                return Arc::clone(turns);
            }
        }
        let mut histories = self.histories.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            histories
                .entry(id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(Vec::new()))),
        )
    }

    /// Authoritative overwrite: the caller-supplied turns become the history
    pub fn replace(&self, id: &str, turns: Vec<Turn>) {
        let entry = self.entry(id);
        let mut guard = entry.lock().unwrap_or_else(|e| e.into_inner());
        *guard = turns;
    }

    /// Append a human/assistant exchange under one lock
    pub fn append_exchange(&self, id: &str, query: &str, answer: &str) {
        let entry = self.entry(id);
        let mut guard = entry.lock().unwrap_or_else(|e| e.into_inner());
        guard.push(Turn::human(query));
        guard.push(Turn::assistant(answer));
    }

    /// Render the transcript in insertion order
    pub fn render(&self, id: &str) -> String {
        let entry = self.entry(id);
        let guard = entry.lock().unwrap_or_else(|e| e.into_inner());
        let mut out = String::new();
        for turn in guard.iter() {
            out.push_str(&format!("{}: {}\n", turn.role.label(), turn.content));
        }
        out
    }

    pub fn turn_count(&self, id: &str) -> usize {
        let entry = self.entry(id);
        let guard = entry.lock().unwrap_or_else(|e| e.into_inner());
        guard.len()
    }

    /// Acquire the turn mutex for one conversation
    ///
    /// Held for the duration of a whole turn in the non-streaming path.
    /// The streaming path releases it while fragments are in flight and
    /// re-acquires it for the final history append.
    pub async fn turn_guard(&self, id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let locks = self.turn_locks.read().unwrap_or_else(|e| e.into_inner());
            locks.get(id).cloned()
        };
        let lock = match lock {
            Some(lock) => lock,
            None => {
                let mut locks = self.turn_locks.write().unwrap_or_else(|e| e.into_inner());
                Arc::clone(
                    locks
                        .entry(id.to_string())
                        .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
                )
            }
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docchat_core::Role;

    #[test]
    fn test_append_and_render() {
        let store = ConversationStore::new();
        store.append_exchange("c1", "Hello?", "Hi there.");
        store.append_exchange("c1", "And again?", "Sure.");

        let transcript = store.render("c1");
        assert_eq!(
            transcript,
            "Human: Hello?\nAssistant: Hi there.\nHuman: And again?\nAssistant: Sure.\n"
        );
        assert_eq!(store.turn_count("c1"), 4);
    }

    #[test]
    fn test_replace_is_authoritative() {
        let store = ConversationStore::new();
        store.append_exchange("c1", "old question", "old answer");

        store.replace("c1", vec![Turn::human("only this")]);
        assert_eq!(store.turn_count("c1"), 1);
        assert_eq!(store.render("c1"), "Human: only this\n");
    }

    #[test]
    fn test_conversations_are_isolated() {
        let store = ConversationStore::new();
        store.append_exchange("c1", "q1", "a1");
        store.append_exchange("c2", "q2", "a2");

        assert!(store.render("c1").contains("q1"));
        assert!(!store.render("c1").contains("q2"));
    }

    #[test]
    fn test_replace_keeps_normalized_roles() {
        let store = ConversationStore::new();
        let turns: Vec<Turn> =
            serde_json::from_str(r#"[{"role": "ai", "content": "from before"}]"#).unwrap();
        store.replace("c1", turns);

        let entry = store.entry("c1");
        let guard = entry.lock().unwrap();
        assert_eq!(guard[0].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_turn_guard_serializes_one_conversation() {
        let store = Arc::new(ConversationStore::new());

        let g1 = store.turn_guard("c1").await;
        // a second guard on the same id must wait
        let store2 = Arc::clone(&store);
        let pending = tokio::spawn(async move {
            let _g = store2.turn_guard("c1").await;
        });
        tokio::task::yield_now().await;
        assert!(!pending.is_finished());

        // a different conversation is not blocked
        let _other = store.turn_guard("c2").await;

        drop(g1);
        pending.await.unwrap();
    }
}
