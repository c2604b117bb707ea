mod session;

pub use session::AssistantSession;
