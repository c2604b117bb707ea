use crate::constants::models;
use crate::context::{ConversationHistory, ModeLookup, PromptCatalog};
use crate::error::{LanError, Result};
use crate::llm::{ChatOptions, LlmClient, Message};
use std::sync::Arc;

/// Wraps a model client, the current mode and the model-context history.
///
/// `ask` is the only operation that talks to the model. It either grows the
/// history by exactly one user and one assistant message or leaves it as it was.
pub struct AssistantSession {
    llm: Box<dyn LlmClient>,
    catalog: Arc<PromptCatalog>,
    mode: String,
    options: ChatOptions,
    history: ConversationHistory,
}

impl AssistantSession {
    /// Start in `mode`, or in the catalog default when `mode` is unknown.
    pub fn new(llm: Box<dyn LlmClient>, catalog: Arc<PromptCatalog>, mode: &str) -> Self {
        let (mode, prompt) = {
            let lookup = catalog.resolve(mode);
            if let ModeLookup::Fallback { requested, applied, .. } = &lookup {
                tracing::warn!(requested = %requested, applied = %applied, "Unknown mode, using default");
            }
            (lookup.mode_name().to_string(), lookup.prompt().to_string())
        };

        Self {
            llm,
            catalog,
            mode,
            options: ChatOptions::default(),
            history: ConversationHistory::new().with_system_prompt(prompt),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.set_temperature(temperature);
        self
    }

    pub fn mode(&self) -> &str {
        &self.mode
    }

    pub fn system_prompt(&self) -> &str {
        self.history.system_prompt().unwrap_or_default()
    }

    pub fn temperature(&self) -> f32 {
        self.options.temperature
    }

    /// Clamped to the range the model accepts. Non-finite values are ignored.
    pub fn set_temperature(&mut self, temperature: f32) {
        if !temperature.is_finite() {
            tracing::warn!(temperature, "Ignoring non-finite temperature");
            return;
        }
        self.options.temperature = temperature.clamp(models::MIN_TEMPERATURE, models::MAX_TEMPERATURE);
    }

    pub fn history(&self) -> &[Message] {
        self.history.messages()
    }

    /// Send `question` with the current system prompt and prior history.
    pub async fn ask(&mut self, question: &str) -> Result<String> {
        let request = self.history.request_for(question);

        let response = self
            .llm
            .chat(&request, &self.options)
            .await
            .map_err(LanError::into_model_error)?;

        if let Some(usage) = response.usage {
            tracing::debug!(
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "Model usage"
            );
        }

        let answer = response.message.content;
        self.history.add_user_message(question);
        self.history.add_assistant_message(answer.clone());
        Ok(answer)
    }

    /// Switch to a known mode, keeping the history. Unknown names are rejected.
    pub fn switch_mode(&mut self, mode: &str) -> bool {
        match self.catalog.resolve(mode) {
            ModeLookup::Known { name, prompt } => {
                self.mode = name.to_string();
                self.history.set_system_prompt(prompt);
                tracing::debug!(mode = name, "Switched mode");
                true
            }
            ModeLookup::Fallback { .. } => false,
        }
    }

    /// Swap in a new catalog and re-read the current mode's prompt from it.
    /// A mode the new catalog lacks degrades to its default.
    pub fn replace_catalog(&mut self, catalog: Arc<PromptCatalog>) {
        self.catalog = catalog;
        let mode = self.mode.clone();
        if !self.switch_mode(&mode) {
            let fallback = self.catalog.default_mode().to_string();
            tracing::warn!(mode = %self.mode, applied = %fallback, "Mode missing from new catalog");
            self.switch_mode(&fallback);
        }
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Rebuild the history as a copy of `messages`.
    pub fn sync(&mut self, messages: &[Message]) {
        self.history.replace_with(messages);
        tracing::debug!(len = self.history.len(), "Synced assistant history");
    }
}
