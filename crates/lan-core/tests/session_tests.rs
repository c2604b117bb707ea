use lan_core::{
    AssistantSession, ChatOptions, ConversationManager, LanError, LlmClient, LlmResponse, Message,
    Phase, PromptCatalog, Role, SaveStatus, SessionEvent, TranscriptStore,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Mock LLM with scripted replies. Unscripted calls echo the question.
/// Clones share state, so a test can keep one handle after boxing another.
#[derive(Clone, Default)]
struct MockLlm {
    replies: Arc<Mutex<VecDeque<Result<String, String>>>>,
    requests: Arc<Mutex<Vec<(Vec<Message>, ChatOptions)>>>,
}

impl MockLlm {
    fn new() -> Self {
        Self::default()
    }

    fn reply(&self, text: &str) {
        self.replies.lock().unwrap().push_back(Ok(text.to_string()));
    }

    fn fail(&self, error: &str) {
        self.replies.lock().unwrap().push_back(Err(error.to_string()));
    }

    fn requests(&self) -> Vec<(Vec<Message>, ChatOptions)> {
        self.requests.lock().unwrap().clone()
    }

    fn last_request(&self) -> Vec<Message> {
        self.requests().last().map(|(m, _)| m.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl LlmClient for MockLlm {
    async fn chat(
        &self,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<LlmResponse, LanError> {
        self.requests
            .lock()
            .unwrap()
            .push((messages.to_vec(), *options));

        let scripted = self.replies.lock().unwrap().pop_front();
        let text = match scripted {
            Some(Ok(text)) => text,
            Some(Err(e)) => return Err(LanError::ModelInvocation(e)),
            None => format!(
                "回答：{}",
                messages.last().map(|m| m.content.as_str()).unwrap_or("")
            ),
        };

        Ok(LlmResponse {
            message: Message::assistant(text),
            usage: None,
        })
    }
}

/// Never answers; used to drop an in-flight submit.
struct StalledLlm;

#[async_trait::async_trait]
impl LlmClient for StalledLlm {
    async fn chat(
        &self,
        _messages: &[Message],
        _options: &ChatOptions,
    ) -> Result<LlmResponse, LanError> {
        std::future::pending().await
    }
}

fn catalog() -> Arc<PromptCatalog> {
    Arc::new(PromptCatalog::builtin())
}

fn assistant(mock: &MockLlm) -> AssistantSession {
    AssistantSession::new(Box::new(mock.clone()), catalog(), "基础模式")
}

fn manager(dir: &TempDir, mock: &MockLlm) -> ConversationManager {
    let catalog = catalog();
    let assistant = AssistantSession::new(Box::new(mock.clone()), catalog.clone(), "基础模式");
    ConversationManager::new(TranscriptStore::new(dir.path().join("chat_history")), catalog)
        .unwrap()
        .with_assistant(assistant)
}

// ========================================================================
// AssistantSession
// ========================================================================

#[tokio::test]
async fn test_ask_sends_system_history_and_question() {
    let mock = MockLlm::new();
    mock.reply("成长与告别。");
    mock.reply("重逢。");
    let mut session = assistant(&mock);

    let answer = session.ask("第一章的主题是什么？").await.unwrap();
    assert_eq!(answer, "成长与告别。");
    assert_eq!(session.history().len(), 2);

    session.ask("那第二章呢？").await.unwrap();
    let request = mock.last_request();
    assert_eq!(request.len(), 4);
    assert_eq!(request[0].role, Role::System);
    assert_eq!(request[0].content, PromptCatalog::builtin().get("基础模式"));
    assert_eq!(request[1], Message::user("第一章的主题是什么？"));
    assert_eq!(request[2], Message::assistant("成长与告别。"));
    assert_eq!(request[3], Message::user("那第二章呢？"));
    assert_eq!(session.history().len(), 4);
}

#[tokio::test]
async fn test_ask_failure_leaves_history_untouched() {
    let mock = MockLlm::new();
    mock.reply("第一次回答");
    mock.fail("503 Service Unavailable");
    let mut session = assistant(&mock);

    session.ask("第一个问题").await.unwrap();
    let err = session.ask("第二个问题").await.unwrap_err();

    assert!(matches!(err, LanError::ModelInvocation(_)));
    assert_eq!(
        session.history(),
        &[Message::user("第一个问题"), Message::assistant("第一次回答")]
    );
}

#[tokio::test]
async fn test_switch_mode_keeps_history_and_changes_prompt() {
    let mock = MockLlm::new();
    let mut session = assistant(&mock);
    session.ask("你好").await.unwrap();

    assert!(session.switch_mode("苏格拉底模式"));
    assert_eq!(session.mode(), "苏格拉底模式");
    assert_eq!(session.history().len(), 2);

    session.ask("继续").await.unwrap();
    let request = mock.last_request();
    assert_eq!(request[0].content, PromptCatalog::builtin().get("苏格拉底模式"));
    assert_eq!(request[1], Message::user("你好"));
}

#[tokio::test]
async fn test_switch_to_unknown_mode_is_rejected() {
    let mock = MockLlm::new();
    let mut session = assistant(&mock);

    assert!(!session.switch_mode("不存在的模式"));
    assert_eq!(session.mode(), "基础模式");
    assert_eq!(session.system_prompt(), PromptCatalog::builtin().get("基础模式"));
}

#[test]
fn test_unknown_starting_mode_uses_default() {
    let mock = MockLlm::new();
    let session = AssistantSession::new(Box::new(mock), catalog(), "损坏的模式名");
    assert_eq!(session.mode(), "基础模式");
}

#[tokio::test]
async fn test_clear_history_keeps_mode() {
    let mock = MockLlm::new();
    let mut session = assistant(&mock);
    session.switch_mode("深度解读模式");
    session.ask("问题").await.unwrap();

    session.clear_history();
    assert!(session.history().is_empty());
    assert_eq!(session.mode(), "深度解读模式");
}

#[test]
fn test_sync_copies_turns_and_skips_system_messages() {
    let mock = MockLlm::new();
    let mut session = assistant(&mock);

    session.sync(&[
        Message::system("ignored"),
        Message::user("a"),
        Message::assistant("b"),
    ]);
    assert_eq!(session.history(), &[Message::user("a"), Message::assistant("b")]);
}

#[test]
fn test_replace_catalog_rereads_prompt() {
    let mock = MockLlm::new();
    let mut session = assistant(&mock);
    session.switch_mode("轻松陪伴模式");

    let updated = PromptCatalog::builtin().with_mode("轻松陪伴模式", "新的陪伴提示词");
    session.replace_catalog(Arc::new(updated));
    assert_eq!(session.mode(), "轻松陪伴模式");
    assert_eq!(session.system_prompt(), "新的陪伴提示词");

    session.replace_catalog(Arc::new(PromptCatalog::new("基础模式", "只有基础")));
    assert_eq!(session.mode(), "基础模式");
    assert_eq!(session.system_prompt(), "只有基础");
}

#[tokio::test]
async fn test_temperature_is_clamped_and_sent() {
    let mock = MockLlm::new();
    let mut session = assistant(&mock).with_temperature(3.0);
    assert_eq!(session.temperature(), 1.5);

    session.set_temperature(0.3);
    session.ask("q").await.unwrap();
    assert_eq!(mock.requests()[0].1.temperature, 0.3);
}

#[test]
fn test_non_finite_temperature_is_ignored() {
    let mut session = assistant(&MockLlm::new()).with_temperature(0.8);

    session.set_temperature(f32::NAN);
    assert_eq!(session.temperature(), 0.8);

    session.set_temperature(f32::INFINITY);
    assert_eq!(session.temperature(), 0.8);
}

// ========================================================================
// ConversationManager
// ========================================================================

#[tokio::test]
async fn test_submits_alternate_user_and_assistant() {
    let dir = TempDir::new().unwrap();
    let mock = MockLlm::new();
    let mut manager = manager(&dir, &mock);

    for i in 0..3 {
        manager.submit(&format!("问题{i}")).await.unwrap();
    }

    let messages = manager.state().active_messages();
    assert_eq!(messages.len(), 6);
    for (i, message) in messages.iter().enumerate() {
        let expected = if i % 2 == 0 { Role::User } else { Role::Assistant };
        assert_eq!(message.role, expected);
    }
    assert_eq!(manager.assistant().unwrap().history(), messages);
}

#[tokio::test]
async fn test_submit_chapter_question_in_basic_mode() {
    let dir = TempDir::new().unwrap();
    let mock = MockLlm::new();
    mock.reply("The theme is loss.");
    let mut manager = manager(&dir, &mock);
    assert_eq!(manager.state().current_mode(), "基础模式");

    let events = manager.submit("What is the theme of chapter 1?").await.unwrap();

    assert_eq!(
        manager.state().active_messages(),
        &[
            Message::user("What is the theme of chapter 1?"),
            Message::assistant("The theme is loss."),
        ]
    );
    assert_eq!(
        events,
        vec![SessionEvent::Exchange {
            user: "What is the theme of chapter 1?".to_string(),
            reply: "The theme is loss.".to_string(),
        }]
    );
    assert_eq!(manager.state().save_status(), SaveStatus::Unsaved);
    assert!(manager.state().last_saved_time().is_none());
}

#[tokio::test]
async fn test_failed_submit_changes_nothing_and_can_be_retried() {
    let dir = TempDir::new().unwrap();
    let mock = MockLlm::new();
    let mut manager = manager(&dir, &mock).with_auto_save(true);
    manager.submit("第一问").await.unwrap();
    let before = manager.state().active_messages().to_vec();
    let status = manager.state().save_status();

    mock.fail("connection reset");
    let err = manager.submit("第二问").await.unwrap_err();

    assert!(matches!(err, LanError::ModelInvocation(_)));
    assert_eq!(manager.phase(), Phase::Idle);
    assert_eq!(manager.state().active_messages(), before.as_slice());
    assert_eq!(manager.assistant().unwrap().history(), before.as_slice());
    assert_eq!(manager.state().save_status(), status);

    manager.submit("第二问").await.unwrap();
    assert_eq!(manager.state().active_messages().len(), 4);
}

#[tokio::test]
async fn test_submit_without_assistant_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut manager =
        ConversationManager::new(TranscriptStore::new(dir.path()), catalog()).unwrap();
    assert_eq!(manager.phase(), Phase::NoAssistant);

    let err = manager.submit("hello").await.unwrap_err();
    assert!(matches!(err, LanError::NoAssistant));

    manager.attach(assistant(&MockLlm::new()));
    assert_eq!(manager.phase(), Phase::Idle);
}

#[tokio::test]
async fn test_dropped_submit_returns_to_idle() {
    let dir = TempDir::new().unwrap();
    let session = AssistantSession::new(Box::new(StalledLlm), catalog(), "基础模式");
    let mut manager = ConversationManager::new(TranscriptStore::new(dir.path()), catalog())
        .unwrap()
        .with_assistant(session);

    let result = tokio::time::timeout(Duration::from_millis(20), manager.submit("hello")).await;

    assert!(result.is_err());
    assert_eq!(manager.phase(), Phase::Idle);
    assert!(manager.state().active_messages().is_empty());
    assert!(manager.assistant().unwrap().history().is_empty());
}

#[tokio::test]
async fn test_start_new_on_empty_conversation_only_resets() {
    let dir = TempDir::new().unwrap();
    let mut manager = manager(&dir, &MockLlm::new());

    manager.save_full().unwrap();
    let saved_path = manager.state().transcript_path().to_path_buf();
    assert_eq!(manager.state().save_status(), SaveStatus::Saved);

    let events = manager.start_new();

    assert_eq!(events, vec![SessionEvent::Cleared]);
    assert!(manager.state().archive().is_empty());
    assert_eq!(manager.state().save_status(), SaveStatus::Unsaved);
    assert!(manager.state().last_saved_time().is_none());
    let fresh_path = manager.state().transcript_path();
    assert_ne!(fresh_path, saved_path.as_path());
}

#[tokio::test]
async fn test_start_new_then_restore_round_trips() {
    let dir = TempDir::new().unwrap();
    let mock = MockLlm::new();
    let mut manager = manager(&dir, &mock);
    manager.switch_mode("苏格拉底模式");
    manager.submit("主人公为什么离开？").await.unwrap();
    manager.submit("他后悔吗？").await.unwrap();
    let before = manager.state().active_messages().to_vec();

    let events = manager.start_new();
    let id = match &events[0] {
        SessionEvent::Archived { id } => id.clone(),
        other => panic!("expected Archived, got {other:?}"),
    };
    assert!(manager.state().active_messages().is_empty());
    assert!(manager.assistant().unwrap().history().is_empty());

    manager.switch_mode("基础模式");
    let events = manager.restore(&id).unwrap();

    assert_eq!(
        events[0],
        SessionEvent::Restored {
            id: id.clone(),
            mode: "苏格拉底模式".to_string()
        }
    );
    assert_eq!(manager.state().active_messages(), before.as_slice());
    assert_eq!(manager.assistant().unwrap().history(), before.as_slice());
    assert_eq!(manager.state().current_mode(), "苏格拉底模式");
    assert_eq!(manager.assistant().unwrap().mode(), "苏格拉底模式");
    assert_eq!(manager.state().save_status(), SaveStatus::Unsaved);

    manager.submit("继续聊").await.unwrap();
    let request = mock.last_request();
    assert_eq!(request.len(), 6);
    assert_eq!(&request[1..5], before.as_slice());
}

#[tokio::test]
async fn test_archive_is_a_frozen_copy() {
    let dir = TempDir::new().unwrap();
    let mut manager = manager(&dir, &MockLlm::new());
    manager.submit("一").await.unwrap();
    let events = manager.start_new();
    manager.submit("二").await.unwrap();

    let archived = &manager.state().archive()[0];
    assert_eq!(archived.message_count(), 2);
    assert_eq!(archived.messages()[0], Message::user("一"));
    assert_eq!(archived.mode(), "基础模式");
    assert_eq!(archived.preview(), "回答：一...");
    assert!(matches!(events[0], SessionEvent::Archived { .. }));
}

#[tokio::test]
async fn test_restore_unknown_id_mutates_nothing() {
    let dir = TempDir::new().unwrap();
    let mut manager = manager(&dir, &MockLlm::new());
    manager.submit("问题").await.unwrap();
    manager.start_new();
    manager.submit("当前对话").await.unwrap();
    manager.switch_mode("深度解读模式");
    let messages = manager.state().active_messages().to_vec();

    let err = manager.restore("19700101_000000").unwrap_err();

    assert!(matches!(err, LanError::NotFound(ref id) if id == "19700101_000000"));
    assert_eq!(manager.state().active_messages(), messages.as_slice());
    assert_eq!(manager.state().archive().len(), 1);
    assert_eq!(manager.state().current_mode(), "深度解读模式");
}

#[tokio::test]
async fn test_restore_falls_back_when_mode_was_removed() {
    let dir = TempDir::new().unwrap();
    let mut manager = manager(&dir, &MockLlm::new());
    manager.switch_mode("苏格拉底模式");
    manager.submit("问题").await.unwrap();
    let id = match manager.start_new().remove(0) {
        SessionEvent::Archived { id } => id,
        other => panic!("expected Archived, got {other:?}"),
    };

    let events = manager.replace_catalog(Arc::new(PromptCatalog::new("基础模式", "基础")));
    assert_eq!(
        events,
        vec![SessionEvent::ModeFallback {
            requested: "苏格拉底模式".to_string(),
            applied: "基础模式".to_string(),
        }]
    );

    let events = manager.restore(&id).unwrap();
    assert!(events.contains(&SessionEvent::ModeFallback {
        requested: "苏格拉底模式".to_string(),
        applied: "基础模式".to_string(),
    }));
    assert_eq!(manager.state().current_mode(), "基础模式");
    assert_eq!(manager.assistant().unwrap().system_prompt(), "基础");
}

#[tokio::test]
async fn test_manager_switch_mode() {
    let dir = TempDir::new().unwrap();
    let mut manager = manager(&dir, &MockLlm::new());
    manager.submit("问题").await.unwrap();
    let messages = manager.state().active_messages().to_vec();

    assert!(!manager.switch_mode("未知"));
    assert_eq!(manager.state().current_mode(), "基础模式");

    assert!(manager.switch_mode("轻松陪伴模式"));
    assert_eq!(manager.state().current_mode(), "轻松陪伴模式");
    assert_eq!(manager.assistant().unwrap().mode(), "轻松陪伴模式");
    assert_eq!(manager.state().active_messages(), messages.as_slice());
}

#[tokio::test]
async fn test_auto_save_appends_each_exchange() {
    let dir = TempDir::new().unwrap();
    let mock = MockLlm::new();
    mock.reply("答一");
    mock.reply("答二");
    let mut manager = manager(&dir, &mock);
    manager.set_auto_save(true);

    manager.submit("问一").await.unwrap();
    let events = manager.submit("问二").await.unwrap();

    let path = manager.state().transcript_path().to_path_buf();
    assert_eq!(events[1], SessionEvent::AutoSaved { path: path.clone() });
    assert_eq!(manager.state().save_status(), SaveStatus::Saved);
    assert!(manager.state().last_saved_label().is_some());

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(
        content,
        "## 👤 用户提问\n\n问一\n\n## 🤖 AI回答\n\n答一\n\n---\n\n\
## 👤 用户提问\n\n问二\n\n## 🤖 AI回答\n\n答二\n\n---\n\n"
    );
}

#[tokio::test]
async fn test_auto_save_failure_does_not_block_the_turn() {
    let dir = TempDir::new().unwrap();
    let folder = dir.path().join("chat_history");
    let mut manager = manager(&dir, &MockLlm::new()).with_auto_save(true);

    std::fs::remove_dir_all(&folder).unwrap();
    std::fs::write(&folder, "not a directory").unwrap();

    let events = manager.submit("问题").await.unwrap();

    assert!(matches!(events[1], SessionEvent::AutoSaveFailed(_)));
    assert_eq!(manager.state().active_messages().len(), 2);
    assert_eq!(manager.state().save_status(), SaveStatus::Unsaved);
}

#[tokio::test]
async fn test_save_full_writes_every_turn() {
    let dir = TempDir::new().unwrap();
    let mut manager = manager(&dir, &MockLlm::new());
    manager.submit("问一").await.unwrap();
    manager.submit("问二").await.unwrap();
    manager.submit("问三").await.unwrap();

    let events = manager.save_full().unwrap();
    let path = manager.state().transcript_path().to_path_buf();
    assert_eq!(events, vec![SessionEvent::Saved { path: path.clone() }]);
    assert_eq!(manager.state().save_status(), SaveStatus::Saved);

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.starts_with("# 📚 阅读伴侣对话记录\n\n"));
    assert!(content.contains("**对话条数:** 3 轮"));
    assert_eq!(content.matches("轮提问").count(), 3);
    assert_eq!(content.matches("## 🤖 AI回答").count(), 3);
    assert!(content.contains("## 👤 第3轮提问\n\n问三"));
}

#[tokio::test]
async fn test_save_full_failure_keeps_unsaved() {
    let dir = TempDir::new().unwrap();
    let folder = dir.path().join("chat_history");
    let mut manager = manager(&dir, &MockLlm::new());
    manager.submit("问题").await.unwrap();

    std::fs::remove_dir_all(&folder).unwrap();
    std::fs::write(&folder, "not a directory").unwrap();

    let err = manager.save_full().unwrap_err();
    assert!(matches!(err, LanError::Persistence { .. }));
    assert_eq!(manager.state().save_status(), SaveStatus::Unsaved);
    assert!(manager.state().last_saved_time().is_none());
}

#[tokio::test]
async fn test_archive_ids_are_unique_and_capped() {
    let dir = TempDir::new().unwrap();
    let mut manager = manager(&dir, &MockLlm::new()).with_max_archived(Some(2));

    for text in ["一", "二", "三"] {
        manager.submit(text).await.unwrap();
        manager.start_new();
    }

    let archive = manager.state().archive();
    assert_eq!(archive.len(), 2);
    assert_ne!(archive[0].id(), archive[1].id());
    assert_eq!(archive[0].messages()[0], Message::user("二"));

    let recent = manager.recent_conversations(5);
    assert_eq!(recent[0].messages()[0], Message::user("三"));
    assert_eq!(recent[1].messages()[0], Message::user("二"));
}

#[tokio::test]
async fn test_zero_archive_cap_still_keeps_latest() {
    let dir = TempDir::new().unwrap();
    let mut manager = manager(&dir, &MockLlm::new()).with_max_archived(Some(0));
    manager.submit("问题").await.unwrap();

    let id = match manager.start_new().remove(0) {
        SessionEvent::Archived { id } => id,
        other => panic!("expected Archived, got {other:?}"),
    };

    assert_eq!(manager.state().archive().len(), 1);
    manager.restore(&id).unwrap();
    assert_eq!(manager.state().active_messages().len(), 2);
}

#[tokio::test]
async fn test_set_temperature_requires_assistant() {
    let dir = TempDir::new().unwrap();
    let mut bare = ConversationManager::new(TranscriptStore::new(dir.path()), catalog()).unwrap();
    assert_eq!(bare.set_temperature(0.5), None);

    let mut manager = manager(&dir, &MockLlm::new());
    assert_eq!(manager.set_temperature(-1.0), Some(0.0));
}
