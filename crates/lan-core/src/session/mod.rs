mod manager;
mod state;

pub use manager::ConversationManager;
pub use state::{Conversation, Phase, SaveStatus, SessionEvent, SessionState};
