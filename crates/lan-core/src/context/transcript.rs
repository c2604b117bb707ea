//! Markdown transcripts of a conversation.
//!
//! Two write modes share one folder: `write_full` rewrites the whole document,
//! `append_exchange` adds a single turn to the end (auto-save).

use crate::constants::transcript as fmt;
use crate::error::{LanError, Result};
use crate::llm::{Message, Role};
use chrono::{Local, NaiveDateTime};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Where and how transcripts are written.
#[derive(Debug, Clone)]
pub struct TranscriptStore {
    dir: PathBuf,
    title: String,
    disambiguate: bool,
}

impl TranscriptStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            title: fmt::TITLE.to_string(),
            disambiguate: true,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// When off, a second file name generated within the same second is
    /// identical to the first and later writes overwrite it.
    pub fn with_disambiguation(mut self, enabled: bool) -> Self {
        self.disambiguate = enabled;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn ensure_save_location(&self) -> Result<&Path> {
        create_dir(&self.dir)?;
        Ok(&self.dir)
    }

    pub fn new_filename(&self) -> PathBuf {
        self.new_filename_at(&Local::now().naive_local())
    }

    pub fn new_filename_at(&self, at: &NaiveDateTime) -> PathBuf {
        let path = new_filename_at(&self.dir, at);
        if self.disambiguate {
            first_free(path)
        } else {
            path
        }
    }

    pub fn write_full(&self, messages: &[Message], path: &Path) -> Result<()> {
        let document = render_full(messages, &self.title, &Local::now().naive_local());
        write_document(&document, path)
    }

    pub fn append_exchange(&self, user_text: &str, ai_text: &str, path: &Path) -> Result<()> {
        append_exchange(user_text, ai_text, path)
    }
}

impl Default for TranscriptStore {
    fn default() -> Self {
        Self::new(fmt::SAVE_FOLDER)
    }
}

/// Create the save folder if needed and return it.
pub fn ensure_save_location(name: impl AsRef<Path>) -> Result<PathBuf> {
    let dir = name.as_ref().to_path_buf();
    create_dir(&dir)?;
    Ok(dir)
}

/// `<dir>/chat_<YYYYMMDD_HHMMSS>.md` for the current local time.
pub fn new_filename(dir: &Path) -> PathBuf {
    new_filename_at(dir, &Local::now().naive_local())
}

pub fn new_filename_at(dir: &Path, at: &NaiveDateTime) -> PathBuf {
    dir.join(format!(
        "{}{}.{}",
        fmt::FILE_PREFIX,
        at.format(fmt::FILENAME_STAMP),
        fmt::FILE_EXTENSION
    ))
}

/// Overwrite `path` with the full transcript of `messages`.
pub fn write_full(messages: &[Message], path: &Path) -> Result<()> {
    let document = render_full(messages, fmt::TITLE, &Local::now().naive_local());
    write_document(&document, path)
}

/// Append one user/assistant section to `path`, creating it on first use.
pub fn append_exchange(user_text: &str, ai_text: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir(parent)?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| LanError::persistence(path, e))?;

    file.write_all(render_exchange(user_text, ai_text).as_bytes())
        .map_err(|e| LanError::persistence(path, e))?;

    tracing::debug!(path = %path.display(), "Appended exchange to transcript");
    Ok(())
}

/// The full-transcript document. User sections are numbered by how many user
/// messages precede them, inclusive.
pub fn render_full(messages: &[Message], title: &str, saved_at: &NaiveDateTime) -> String {
    let turns = messages.iter().filter(|m| m.is_user()).count();

    let mut out = String::new();
    out.push_str(&format!("# 📚 {title}\n\n"));
    out.push_str(&format!(
        "**保存时间:** {}\n",
        saved_at.format(fmt::SAVED_AT_FORMAT)
    ));
    out.push_str(&format!("**对话条数:** {turns} 轮\n\n"));
    out.push_str(&format!("{}\n\n", fmt::SECTION_SEPARATOR));

    let mut user_turn = 0;
    for message in messages {
        match message.role {
            Role::User => {
                user_turn += 1;
                out.push_str(&format!("## 👤 第{user_turn}轮提问\n\n"));
                out.push_str(&format!("{}\n\n", message.content));
            }
            Role::Assistant => {
                out.push_str(&assistant_section(&message.content));
            }
            Role::System => {}
        }
    }
    out
}

pub fn render_exchange(user_text: &str, ai_text: &str) -> String {
    format!(
        "## 👤 用户提问\n\n{user_text}\n\n{}",
        assistant_section(ai_text)
    )
}

fn assistant_section(content: &str) -> String {
    format!("## 🤖 AI回答\n\n{content}\n\n{}\n\n", fmt::SECTION_SEPARATOR)
}

fn write_document(document: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir(parent)?;
    }
    fs::write(path, document).map_err(|e| LanError::persistence(path, e))?;
    tracing::info!(path = %path.display(), "Wrote full transcript");
    Ok(())
}

fn create_dir(dir: &Path) -> Result<()> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|e| LanError::persistence(dir, e))
}

/// `chat_<stamp>.md`, then `chat_<stamp>_2.md`, `_3`, ... until one is free.
fn first_free(path: PathBuf) -> PathBuf {
    if !path.exists() {
        return path;
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();

    let mut n = 2;
    loop {
        let candidate = parent.join(format!("{stem}_{n}.{}", fmt::FILE_EXTENSION));
        if !candidate.exists() {
            tracing::debug!(path = %candidate.display(), "Disambiguated transcript name");
            return candidate;
        }
        n += 1;
    }
}
