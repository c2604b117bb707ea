/// Lan — centralized constants.
/// Defaults, markers, and on-disk format strings live here.

// ─── Model backend ────────────────────────────────────────────────────────────

pub mod endpoints {
    pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
    pub const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";
}

pub mod models {
    pub const DEFAULT_MODEL: &str = "deepseek-chat";
    pub const API_KEY_ENV: &str = "DEEPSEEK_API_KEY";
    pub const DEFAULT_TEMPERATURE: f32 = 1.0;
    pub const MIN_TEMPERATURE: f32 = 0.0;
    pub const MAX_TEMPERATURE: f32 = 1.5;
}

// ─── Modes ────────────────────────────────────────────────────────────────────

pub mod modes {
    pub const DEFAULT_MODE: &str = "基础模式";
    pub const SOCRATIC_MODE: &str = "苏格拉底模式";
    pub const DEEP_READING_MODE: &str = "深度解读模式";
    pub const CASUAL_MODE: &str = "轻松陪伴模式";
}

// ─── Transcripts ──────────────────────────────────────────────────────────────

pub mod transcript {
    pub const SAVE_FOLDER: &str = "chat_history";
    pub const TITLE: &str = "阅读伴侣对话记录";
    pub const FILE_PREFIX: &str = "chat_";
    pub const FILE_EXTENSION: &str = "md";
    /// `chat_<stamp>.md` and conversation ids share this stamp.
    pub const FILENAME_STAMP: &str = "%Y%m%d_%H%M%S";
    pub const SAVED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
    pub const SECTION_SEPARATOR: &str = "---";
}

// ─── Session ──────────────────────────────────────────────────────────────────

pub mod session {
    pub const PREVIEW_CHARS: usize = 20;
    pub const ELLIPSIS: &str = "...";
    pub const NO_MESSAGES: &str = "无消息";
    pub const STATUS_UNSAVED: &str = "未保存";
    pub const STATUS_SAVED: &str = "已保存";
    pub const CLOCK_FORMAT: &str = "%H:%M:%S";
    /// How many archived conversations the sidebar lists.
    pub const RECENT_LIMIT: usize = 5;
}
