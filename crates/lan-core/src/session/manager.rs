use super::state::{Conversation, Phase, SaveStatus, SessionEvent, SessionState};
use crate::agent::AssistantSession;
use crate::constants::transcript as fmt;
use crate::context::{ModeLookup, PromptCatalog, TranscriptStore};
use crate::error::{LanError, Result};
use crate::llm::Message;
use chrono::Local;
use std::sync::Arc;

/// Owns the visible conversation, the archive and the save state, and keeps
/// the assistant's model-context history in step with them.
///
/// Every command takes `&mut self`, so one command runs to completion before
/// the next can start; a second `submit` cannot overlap an in-flight one.
pub struct ConversationManager {
    state: SessionState,
    assistant: Option<AssistantSession>,
    store: TranscriptStore,
    catalog: Arc<PromptCatalog>,
    max_archived: Option<usize>,
    in_flight: bool,
}

/// Marks a model call in flight. Dropping it (including when the `submit`
/// future is dropped by a caller-side timeout) returns the manager to idle.
struct InFlight<'a>(&'a mut bool);

impl<'a> InFlight<'a> {
    fn begin(flag: &'a mut bool) -> Self {
        *flag = true;
        Self(flag)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        *self.0 = false;
    }
}

impl ConversationManager {
    /// Creates the save folder and the first transcript path, starting in the
    /// catalog's default mode with no assistant attached.
    pub fn new(store: TranscriptStore, catalog: Arc<PromptCatalog>) -> Result<Self> {
        store.ensure_save_location()?;
        let transcript_path = store.new_filename();
        let mode = catalog.default_mode().to_string();

        Ok(Self {
            state: SessionState::new(mode, transcript_path),
            assistant: None,
            store,
            catalog,
            max_archived: None,
            in_flight: false,
        })
    }

    /// Start in `mode` instead of the default. Unknown names keep the default.
    pub fn with_mode(mut self, mode: &str) -> Self {
        if !self.switch_mode(mode) {
            tracing::warn!(mode, "Unknown starting mode, keeping default");
        }
        self
    }

    pub fn with_auto_save(mut self, enabled: bool) -> Self {
        self.state.auto_save_enabled = enabled;
        self
    }

    /// Keep at most `cap` archived conversations, evicting the oldest.
    /// A cap of 0 is raised to 1 so the conversation just archived stays
    /// restorable.
    pub fn with_max_archived(mut self, cap: Option<usize>) -> Self {
        if cap == Some(0) {
            tracing::warn!("max_archived = 0 would evict every archive, keeping 1");
        }
        self.max_archived = cap.map(|c| c.max(1));
        self
    }

    /// Attach the assistant. It adopts this manager's catalog, mode and
    /// visible history.
    pub fn attach(&mut self, mut assistant: AssistantSession) {
        assistant.replace_catalog(self.catalog.clone());
        assistant.switch_mode(&self.state.current_mode);
        assistant.sync(&self.state.active_messages);
        self.assistant = Some(assistant);
    }

    pub fn with_assistant(mut self, assistant: AssistantSession) -> Self {
        self.attach(assistant);
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn assistant(&self) -> Option<&AssistantSession> {
        self.assistant.as_ref()
    }

    pub fn catalog(&self) -> &Arc<PromptCatalog> {
        &self.catalog
    }

    /// `AwaitingResponse` is only seen from inside `submit`; callers holding
    /// the manager always observe `NoAssistant` or `Idle`.
    pub fn phase(&self) -> Phase {
        if self.in_flight {
            Phase::AwaitingResponse
        } else if self.assistant.is_none() {
            Phase::NoAssistant
        } else {
            Phase::Idle
        }
    }

    /// Newest first.
    pub fn recent_conversations(&self, limit: usize) -> Vec<&Conversation> {
        self.state.archive.iter().rev().take(limit).collect()
    }

    /// Run one turn. On model failure nothing in the session changes and the
    /// error is returned for display. Auto-save failures are reported as an
    /// event and never fail the turn.
    pub async fn submit(&mut self, user_text: &str) -> Result<Vec<SessionEvent>> {
        let assistant = self.assistant.as_mut().ok_or(LanError::NoAssistant)?;

        let reply = {
            let _flight = InFlight::begin(&mut self.in_flight);
            assistant.ask(user_text).await?
        };

        self.state.active_messages.push(Message::user(user_text));
        self.state.active_messages.push(Message::assistant(reply.clone()));

        let mut events = vec![SessionEvent::Exchange {
            user: user_text.to_string(),
            reply: reply.clone(),
        }];

        if self.state.auto_save_enabled {
            let path = self.state.transcript_path.clone();
            match self.store.append_exchange(user_text, &reply, &path) {
                Ok(()) => {
                    self.mark_saved();
                    events.push(SessionEvent::AutoSaved { path });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Auto-save failed");
                    events.push(SessionEvent::AutoSaveFailed(e.to_string()));
                }
            }
        }

        Ok(events)
    }

    /// Archive the current conversation (when non-empty) and start a blank one.
    pub fn start_new(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();

        if !self.state.active_messages.is_empty() {
            let messages = std::mem::take(&mut self.state.active_messages);
            let id = self.archive(messages);
            events.push(SessionEvent::Archived { id });
        }

        if let Some(assistant) = self.assistant.as_mut() {
            assistant.clear_history();
        }
        self.reset_save_state();

        events.push(SessionEvent::Cleared);
        events
    }

    /// Replace the current conversation with a copy of an archived one.
    /// The archived entry itself stays in the archive.
    pub fn restore(&mut self, id: &str) -> Result<Vec<SessionEvent>> {
        let conversation = self
            .state
            .archive
            .iter()
            .find(|c| c.id() == id)
            .ok_or_else(|| LanError::NotFound(id.to_string()))?;
        let messages = conversation.messages().to_vec();
        let archived_mode = conversation.mode().to_string();

        let mut events = Vec::new();
        let lookup = self.catalog.resolve(&archived_mode);
        if let ModeLookup::Fallback { requested, applied, .. } = &lookup {
            tracing::warn!(requested = %requested, applied = %applied, "Archived mode no longer exists");
            events.push(SessionEvent::ModeFallback {
                requested: requested.clone(),
                applied: applied.to_string(),
            });
        }
        let mode = lookup.mode_name().to_string();

        self.state.active_messages = messages;
        self.state.current_mode = mode.clone();
        if let Some(assistant) = self.assistant.as_mut() {
            assistant.clear_history();
            assistant.sync(&self.state.active_messages);
            assistant.switch_mode(&mode);
        }
        self.reset_save_state();

        tracing::info!(id, mode = %mode, messages = self.state.active_messages.len(), "Restored conversation");
        events.insert(
            0,
            SessionEvent::Restored {
                id: id.to_string(),
                mode,
            },
        );
        Ok(events)
    }

    /// Rewrite the transcript file with the whole current conversation.
    pub fn save_full(&mut self) -> Result<Vec<SessionEvent>> {
        let path = self.state.transcript_path.clone();
        self.store.write_full(&self.state.active_messages, &path)?;
        self.mark_saved();
        Ok(vec![SessionEvent::Saved { path }])
    }

    pub fn set_auto_save(&mut self, enabled: bool) {
        self.state.auto_save_enabled = enabled;
    }

    /// Change mode for subsequent turns; the conversation is kept.
    /// Returns false and changes nothing for unknown names.
    pub fn switch_mode(&mut self, mode: &str) -> bool {
        if !self.catalog.contains(mode) {
            return false;
        }
        if let Some(assistant) = self.assistant.as_mut() {
            if !assistant.switch_mode(mode) {
                return false;
            }
        }
        self.state.current_mode = mode.to_string();
        true
    }

    /// Returns the applied (clamped) temperature, or `None` without an assistant.
    pub fn set_temperature(&mut self, temperature: f32) -> Option<f32> {
        let assistant = self.assistant.as_mut()?;
        assistant.set_temperature(temperature);
        Some(assistant.temperature())
    }

    /// Swap the prompt catalog. A current mode the new catalog lacks falls
    /// back to its default.
    pub fn replace_catalog(&mut self, catalog: Arc<PromptCatalog>) -> Vec<SessionEvent> {
        self.catalog = catalog;
        if let Some(assistant) = self.assistant.as_mut() {
            assistant.replace_catalog(self.catalog.clone());
        }

        if self.catalog.contains(&self.state.current_mode) {
            return Vec::new();
        }

        let requested = std::mem::replace(
            &mut self.state.current_mode,
            self.catalog.default_mode().to_string(),
        );
        vec![SessionEvent::ModeFallback {
            requested,
            applied: self.state.current_mode.clone(),
        }]
    }

    fn archive(&mut self, messages: Vec<Message>) -> String {
        let now = Local::now().naive_local();
        let id = self.unique_id(now.format(fmt::FILENAME_STAMP).to_string());

        self.state.archive.push(Conversation::new(
            id.clone(),
            now,
            self.state.current_mode.clone(),
            messages,
        ));

        if let Some(cap) = self.max_archived {
            let excess = self.state.archive.len().saturating_sub(cap);
            if excess > 0 {
                self.state.archive.drain(..excess);
                tracing::debug!(evicted = excess, "Evicted archived conversations");
            }
        }

        tracing::info!(id = %id, "Archived conversation");
        id
    }

    /// Same-second archives get `-2`, `-3`, ... so ids stay unique.
    fn unique_id(&self, base: String) -> String {
        let taken = |candidate: &str| self.state.archive.iter().any(|c| c.id() == candidate);
        if !taken(&base) {
            return base;
        }
        let mut n = 2;
        loop {
            let candidate = format!("{base}-{n}");
            if !taken(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    fn mark_saved(&mut self) {
        self.state.save_status = SaveStatus::Saved;
        self.state.last_saved_time = Some(Local::now());
    }

    fn reset_save_state(&mut self) {
        self.state.transcript_path = self.store.new_filename();
        self.state.save_status = SaveStatus::Unsaved;
        self.state.last_saved_time = None;
    }
}
