mod history;
pub mod modes;
pub mod transcript;

pub use history::ConversationHistory;
pub use modes::{ModeLookup, PromptCatalog};
pub use transcript::TranscriptStore;
