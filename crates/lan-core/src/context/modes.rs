use crate::constants::modes;

const BASIC_PROMPT: &str = "你是Lan，一位温和、耐心的阅读伴侣。\
请用简洁清晰的中文回答用户关于书籍、章节和段落的问题，\
必要时给出原文依据，不确定时坦诚说明。";

const SOCRATIC_PROMPT: &str = "你是Lan，一位苏格拉底式的阅读伴侣。\
不要直接给出结论，而是通过一到两个循序渐进的提问，\
引导用户自己发现文本中的主题、矛盾与隐喻。";

const DEEP_READING_PROMPT: &str = "你是Lan，一位擅长文本细读的文学导师。\
请从主题、结构、人物、修辞和时代背景等角度展开分析，\
条理分明地给出有深度的解读，并指出值得继续思考的问题。";

const CASUAL_PROMPT: &str = "你是Lan，一位轻松友好的读书搭子。\
用聊天的语气分享对书中内容的感受，可以适当幽默，\
但不要编造书中不存在的情节。";

/// Result of looking a mode name up in the catalog.
///
/// Unknown names never fail: they degrade to the catalog's default mode, and
/// `Fallback` records that this happened so callers can tell a corrupted or
/// stale mode name apart from a real one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeLookup<'a> {
    Known {
        name: &'a str,
        prompt: &'a str,
    },
    Fallback {
        requested: String,
        applied: &'a str,
        prompt: &'a str,
    },
}

impl<'a> ModeLookup<'a> {
    /// Name of the mode whose prompt is actually used.
    pub fn mode_name(&self) -> &'a str {
        match self {
            Self::Known { name, .. } => *name,
            Self::Fallback { applied, .. } => *applied,
        }
    }

    pub fn prompt(&self) -> &'a str {
        match self {
            Self::Known { prompt, .. } | Self::Fallback { prompt, .. } => *prompt,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// Static mapping from mode name to system-prompt text.
///
/// Entries keep insertion order so a mode selector lists them stably.
/// The default mode is always present.
#[derive(Debug, Clone)]
pub struct PromptCatalog {
    entries: Vec<(String, String)>,
    default_mode: String,
}

impl PromptCatalog {
    /// A catalog holding only the given default mode.
    pub fn new(default_mode: impl Into<String>, prompt: impl Into<String>) -> Self {
        let default_mode = default_mode.into();
        Self {
            entries: vec![(default_mode.clone(), prompt.into())],
            default_mode,
        }
    }

    /// The built-in reading-companion modes.
    pub fn builtin() -> Self {
        Self::new(modes::DEFAULT_MODE, BASIC_PROMPT)
            .with_mode(modes::SOCRATIC_MODE, SOCRATIC_PROMPT)
            .with_mode(modes::DEEP_READING_MODE, DEEP_READING_PROMPT)
            .with_mode(modes::CASUAL_MODE, CASUAL_PROMPT)
    }

    /// Add a mode, or replace the prompt of an existing one in place.
    pub fn with_mode(mut self, name: impl Into<String>, prompt: impl Into<String>) -> Self {
        let name = name.into();
        let prompt = prompt.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = prompt,
            None => self.entries.push((name, prompt)),
        }
        self
    }

    /// Make `name` the fallback mode. Ignored when `name` is not in the catalog.
    pub fn with_default(mut self, name: &str) -> Self {
        if self.contains(name) {
            self.default_mode = name.to_string();
        } else {
            tracing::warn!(mode = name, "Ignoring unknown default mode");
        }
        self
    }

    pub fn default_mode(&self) -> &str {
        &self.default_mode
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Prompt text for `name`, or the default mode's prompt when unknown.
    pub fn get(&self, name: &str) -> &str {
        self.resolve(name).prompt()
    }

    pub fn resolve(&self, name: &str) -> ModeLookup<'_> {
        if let Some((n, p)) = self.entries.iter().find(|(n, _)| n == name) {
            return ModeLookup::Known {
                name: n.as_str(),
                prompt: p.as_str(),
            };
        }

        let (applied, prompt) = self
            .entries
            .iter()
            .find(|(n, _)| *n == self.default_mode)
            .map(|(n, p)| (n.as_str(), p.as_str()))
            .unwrap_or(("", ""));

        ModeLookup::Fallback {
            requested: name.to_string(),
            applied,
            prompt,
        }
    }
}

impl Default for PromptCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
