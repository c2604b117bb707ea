use crate::constants::{session as labels, transcript as fmt};
use crate::llm::Message;
use chrono::{DateTime, Local, NaiveDateTime};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveStatus {
    #[default]
    Unsaved,
    Saved,
}

impl SaveStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unsaved => labels::STATUS_UNSAVED,
            Self::Saved => labels::STATUS_SAVED,
        }
    }
}

/// Where the manager is in a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    NoAssistant,
    Idle,
    AwaitingResponse,
}

/// An archived conversation. Frozen at creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    id: String,
    timestamp: NaiveDateTime,
    mode: String,
    messages: Vec<Message>,
    message_count: usize,
    preview: String,
}

impl Conversation {
    pub fn new(
        id: impl Into<String>,
        timestamp: NaiveDateTime,
        mode: impl Into<String>,
        messages: Vec<Message>,
    ) -> Self {
        let preview = preview_of(&messages);
        Self {
            id: id.into(),
            timestamp,
            mode: mode.into(),
            message_count: messages.len(),
            messages,
            preview,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn timestamp(&self) -> &NaiveDateTime {
        &self.timestamp
    }

    pub fn mode(&self) -> &str {
        &self.mode
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message_count(&self) -> usize {
        self.message_count
    }

    pub fn preview(&self) -> &str {
        &self.preview
    }

    /// `[<stamp>] <preview>（<n>条）`, as listed in the history panel.
    pub fn label(&self) -> String {
        format!(
            "[{}] {}（{}条）",
            self.timestamp.format(fmt::FILENAME_STAMP),
            self.preview,
            self.message_count
        )
    }
}

/// First characters of the last message plus an ellipsis, or the
/// "no messages" marker.
pub fn preview_of(messages: &[Message]) -> String {
    match messages.last() {
        Some(last) => {
            let head: String = last.content.chars().take(labels::PREVIEW_CHARS).collect();
            format!("{head}{}", labels::ELLIPSIS)
        }
        None => labels::NO_MESSAGES.to_string(),
    }
}

/// Everything the presentation layer renders. Only `ConversationManager`
/// mutates it.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub(super) active_messages: Vec<Message>,
    pub(super) current_mode: String,
    pub(super) archive: Vec<Conversation>,
    pub(super) save_status: SaveStatus,
    pub(super) last_saved_time: Option<DateTime<Local>>,
    pub(super) auto_save_enabled: bool,
    /// Always set: generated at startup and on every new/restored conversation.
    pub(super) transcript_path: PathBuf,
}

impl SessionState {
    pub(super) fn new(current_mode: String, transcript_path: PathBuf) -> Self {
        Self {
            active_messages: Vec::new(),
            current_mode,
            archive: Vec::new(),
            save_status: SaveStatus::Unsaved,
            last_saved_time: None,
            auto_save_enabled: false,
            transcript_path,
        }
    }

    pub fn active_messages(&self) -> &[Message] {
        &self.active_messages
    }

    pub fn current_mode(&self) -> &str {
        &self.current_mode
    }

    pub fn archive(&self) -> &[Conversation] {
        &self.archive
    }

    pub fn save_status(&self) -> SaveStatus {
        self.save_status
    }

    pub fn last_saved_time(&self) -> Option<&DateTime<Local>> {
        self.last_saved_time.as_ref()
    }

    /// `HH:MM:SS` of the last successful save.
    pub fn last_saved_label(&self) -> Option<String> {
        self.last_saved_time
            .map(|t| t.format(labels::CLOCK_FORMAT).to_string())
    }

    pub fn auto_save_enabled(&self) -> bool {
        self.auto_save_enabled
    }

    pub fn transcript_path(&self) -> &Path {
        &self.transcript_path
    }
}

/// Effects of a manager command, for the presentation layer to render.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Exchange { user: String, reply: String },
    AutoSaved { path: PathBuf },
    AutoSaveFailed(String),
    Saved { path: PathBuf },
    Archived { id: String },
    Restored { id: String, mode: String },
    ModeFallback { requested: String, applied: String },
    Cleared,
}
