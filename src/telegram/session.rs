//! Per-user transient UI state.
//!
//! Holds the message id of the last rendered format keyboard, a busy flag while
//! a delivery runs, and the index -> format table of the keyboard currently on
//! screen. Nothing here is persisted; a restart loses it.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::core::types::FormatKind;
use crate::storage::registry::Info;

/// Format snapshot behind one keyboard button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatChoice {
    pub info_id: i64,
    pub format_id: String,
    pub kind: FormatKind,
}

/// Index -> format table of one rendered keyboard. Indexes start at 1.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChoiceTable {
    pub video_id: i64,
    choices: Vec<FormatChoice>,
}

impl ChoiceTable {
    pub fn new(video_id: i64, infos: &[Info]) -> Self {
        Self {
            video_id,
            choices: infos
                .iter()
                .map(|i| FormatChoice {
                    info_id: i.id,
                    format_id: i.format_id.clone(),
                    kind: i.kind,
                })
                .collect(),
        }
    }

    pub fn get(&self, index: usize) -> Option<&FormatChoice> {
        index.checked_sub(1).and_then(|i| self.choices.get(i))
    }

    pub fn find_info(&self, info_id: i64) -> Option<&FormatChoice> {
        self.choices.iter().find(|c| c.info_id == info_id)
    }

    pub fn len(&self) -> usize {
        self.choices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn keyboard_message(&self, user_id: i64) -> Option<i32>;

    async fn set_keyboard_message(&self, user_id: i64, message_id: i32);

    /// Removes and returns the stored keyboard message id.
    async fn take_keyboard_message(&self, user_id: i64) -> Option<i32>;

    /// Marks the user busy. Returns false if a delivery is already running.
    async fn try_begin_download(&self, user_id: i64) -> bool;

    async fn finish_download(&self, user_id: i64);

    async fn is_downloading(&self, user_id: i64) -> bool;

    /// Replaces the user's choice table with the one just rendered.
    async fn set_choices(&self, user_id: i64, table: ChoiceTable);

    /// Consumes the user's choice table.
    async fn take_choices(&self, user_id: i64) -> Option<ChoiceTable>;
}

#[derive(Debug, Default)]
struct UserSession {
    keyboard_message: Option<i32>,
    downloading: bool,
    choices: Option<ChoiceTable>,
}

/// [`SessionStore`] kept in process memory.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<i64, UserSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn keyboard_message(&self, user_id: i64) -> Option<i32> {
        self.sessions.lock().await.get(&user_id).and_then(|s| s.keyboard_message)
    }

    async fn set_keyboard_message(&self, user_id: i64, message_id: i32) {
        self.sessions.lock().await.entry(user_id).or_default().keyboard_message = Some(message_id);
    }

    async fn take_keyboard_message(&self, user_id: i64) -> Option<i32> {
        self.sessions
            .lock()
            .await
            .get_mut(&user_id)
            .and_then(|s| s.keyboard_message.take())
    }

    async fn try_begin_download(&self, user_id: i64) -> bool {
        let mut sessions = self.sessions.lock().await;
        let session = sessions.entry(user_id).or_default();
        if session.downloading {
            return false;
        }
        session.downloading = true;
        true
    }

    async fn finish_download(&self, user_id: i64) {
        if let Some(session) = self.sessions.lock().await.get_mut(&user_id) {
            session.downloading = false;
        }
    }

    async fn is_downloading(&self, user_id: i64) -> bool {
        self.sessions.lock().await.get(&user_id).is_some_and(|s| s.downloading)
    }

    async fn set_choices(&self, user_id: i64, table: ChoiceTable) {
        self.sessions.lock().await.entry(user_id).or_default().choices = Some(table);
    }

    async fn take_choices(&self, user_id: i64) -> Option<ChoiceTable> {
        self.sessions.lock().await.get_mut(&user_id).and_then(|s| s.choices.take())
    }
}
