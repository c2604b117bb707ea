use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::agent::AssistantSession;
use crate::constants::{endpoints, models, modes, transcript};
use crate::context::{PromptCatalog, TranscriptStore};
use crate::error::{LanError, Result};
use crate::llm::{LlmClient, OpenAIClient};
use crate::session::ConversationManager;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub transcript: TranscriptSettings,
    #[serde(default)]
    pub session: SessionSettings,
    /// Extra or overriding mode name → system prompt.
    #[serde(default)]
    pub modes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub model: String,
    pub base_url: String,
    pub api_key_env: String,
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptSettings {
    pub folder: PathBuf,
    pub title: String,
    pub disambiguate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub default_mode: String,
    pub auto_save: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_archived: Option<usize>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: models::DEFAULT_MODEL.to_string(),
            base_url: endpoints::DEEPSEEK_BASE_URL.to_string(),
            api_key_env: models::API_KEY_ENV.to_string(),
            temperature: models::DEFAULT_TEMPERATURE,
        }
    }
}

impl Default for TranscriptSettings {
    fn default() -> Self {
        Self {
            folder: PathBuf::from(transcript::SAVE_FOLDER),
            title: transcript::TITLE.to_string(),
            disambiguate: true,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            default_mode: modes::DEFAULT_MODE.to_string(),
            auto_save: false,
            max_archived: None,
        }
    }
}

impl Settings {
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lan")
            .join("config.toml")
    }

    /// Load from the default config path, falling back to defaults when the
    /// file is missing or unreadable.
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &std::path::Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => tracing::warn!(path = %path.display(), error = %e, "Invalid config, using defaults"),
                },
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Unreadable config, using defaults"),
            }
        }
        Self::default()
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LanError::Config(e.to_string()))?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| LanError::Config(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| LanError::Config(e.to_string()))?;
        Ok(())
    }

    /// The API key from the configured environment variable. Missing or
    /// empty is fatal for session startup.
    pub fn api_key(&self) -> Result<String> {
        match std::env::var(&self.llm.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(LanError::Config(format!(
                "Environment variable {} is not set",
                self.llm.api_key_env
            ))),
        }
    }

    /// Built-in modes merged with the `[modes]` table.
    pub fn build_catalog(&self) -> PromptCatalog {
        self.modes
            .iter()
            .fold(PromptCatalog::builtin(), |catalog, (name, prompt)| {
                catalog.with_mode(name, prompt)
            })
            .with_default(&self.session.default_mode)
    }

    pub fn build_store(&self) -> TranscriptStore {
        TranscriptStore::new(&self.transcript.folder)
            .with_title(&self.transcript.title)
            .with_disambiguation(self.transcript.disambiguate)
    }

    /// Build an LLM client from the current settings.
    pub fn build_llm_client(&self) -> Result<Box<dyn LlmClient>> {
        let client = OpenAIClient::new(self.api_key()?)
            .with_model(&self.llm.model)
            .with_base_url(&self.llm.base_url);
        Ok(Box::new(client))
    }

    /// Wire a manager with an attached assistant around `llm`.
    pub fn build_manager(&self, llm: Box<dyn LlmClient>) -> Result<ConversationManager> {
        let catalog = Arc::new(self.build_catalog());
        let assistant = AssistantSession::new(llm, catalog.clone(), &self.session.default_mode)
            .with_temperature(self.llm.temperature);

        Ok(ConversationManager::new(self.build_store(), catalog)?
            .with_mode(&self.session.default_mode)
            .with_auto_save(self.session.auto_save)
            .with_max_archived(self.session.max_archived)
            .with_assistant(assistant))
    }
}
