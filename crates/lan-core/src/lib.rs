pub mod error;
pub mod constants;
pub mod llm;
pub mod context;
pub mod config;
pub mod agent;
pub mod session;

// Re-export key types
pub use error::{LanError, Result};
pub use llm::{ChatOptions, LlmClient, LlmResponse, Message, OpenAIClient, Role, Usage};
pub use context::{
    ConversationHistory, ModeLookup, PromptCatalog, TranscriptStore,
};
pub use agent::AssistantSession;
pub use session::{Conversation, ConversationManager, Phase, SaveStatus, SessionEvent, SessionState};
pub use config::Settings;
