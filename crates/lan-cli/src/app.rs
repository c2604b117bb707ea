use crate::commands::{handle_command, CommandResult};
use anyhow::Result;
use lan_core::constants::session::RECENT_LIMIT;
use lan_core::{ConversationManager, Role, SessionEvent};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

const PROMPT: &str = "言って。> ";

pub async fn run_single_prompt(manager: &mut ConversationManager, prompt: &str) -> Result<()> {
    let events = manager.submit(prompt).await?;
    render(&events);
    Ok(())
}

pub async fn run_repl(mut manager: ConversationManager) -> Result<()> {
    println!("你好，我是Lan —— 我一直在这里。");
    println!("当前模式: {}  (/help 查看命令)", manager.state().current_mode());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(PROMPT.as_bytes()).await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match handle_command(input) {
            CommandResult::Quit => break,
            CommandResult::Message(msg) => println!("{msg}"),
            CommandResult::NotACommand => {
                println!("收到！让我想想……");
                match manager.submit(input).await {
                    Ok(events) => render(&events),
                    Err(e) => println!("出错了: {e}"),
                }
            }
            CommandResult::NewConversation => render(&manager.start_new()),
            CommandResult::SaveConversation => match manager.save_full() {
                Ok(events) => render(&events),
                Err(e) => println!("保存失败，请重试: {e}"),
            },
            CommandResult::SetAutoSave(enabled) => {
                manager.set_auto_save(enabled);
                println!("自动保存: {}", if enabled { "开" } else { "关" });
            }
            CommandResult::SwitchMode(mode) => {
                if manager.switch_mode(&mode) {
                    println!("当前模式: {mode}");
                } else {
                    println!("未知模式: {mode}");
                    print_modes(&manager);
                }
            }
            CommandResult::ListModes => print_modes(&manager),
            CommandResult::ListConversations => print_history(&manager),
            CommandResult::RestoreConversation(id) => match manager.restore(&id) {
                Ok(events) => {
                    render(&events);
                    for message in manager.state().active_messages() {
                        let who = match message.role {
                            Role::User => "👤",
                            _ => "🤖",
                        };
                        println!("{who} {}", message.content);
                    }
                }
                Err(e) => println!("{e}"),
            },
            CommandResult::SetTemperature(value) => match manager.set_temperature(value) {
                Some(applied) => println!("创造性: {applied:.1}"),
                None => println!("助手尚未就绪"),
            },
            CommandResult::ShowStatus => print_status(&manager),
        }
    }

    Ok(())
}

fn render(events: &[SessionEvent]) {
    for event in events {
        match event {
            SessionEvent::Exchange { reply, .. } => println!("\n{reply}\n"),
            SessionEvent::AutoSaved { .. } => tracing::debug!("Auto-saved"),
            SessionEvent::AutoSaveFailed(e) => println!("[自动保存失败: {e}]"),
            SessionEvent::Saved { path } => println!("对话已保存至: {}", path.display()),
            SessionEvent::Archived { id } => println!("已归档对话 {id}"),
            SessionEvent::Restored { id, mode } => println!("已恢复对话 {id}（{mode}）"),
            SessionEvent::ModeFallback { requested, applied } => {
                println!("模式 {requested} 不可用，已切换为 {applied}")
            }
            SessionEvent::Cleared => println!("—— 新对话 ——"),
        }
    }
}

fn print_modes(manager: &ConversationManager) {
    let current = manager.state().current_mode();
    for name in manager.catalog().names() {
        let marker = if name == current { "*" } else { " " };
        println!(" {marker} {name}");
    }
}

fn print_history(manager: &ConversationManager) {
    let recent = manager.recent_conversations(RECENT_LIMIT);
    if recent.is_empty() {
        println!("暂无历史对话");
        return;
    }
    println!("📁 历史对话");
    for conversation in recent {
        println!("  {}  {}", conversation.id(), conversation.label());
    }
}

fn print_status(manager: &ConversationManager) {
    let state = manager.state();
    println!("当前模式: {}", state.current_mode());
    println!("保存状态: {}", state.save_status().label());
    if let Some(time) = state.last_saved_label() {
        println!("最后保存: {time}");
    }
    println!("自动保存: {}", if state.auto_save_enabled() { "开" } else { "关" });
    println!("文件: {}", state.transcript_path().display());
    println!("消息数: {}", state.active_messages().len());
    if let Some(assistant) = manager.assistant() {
        println!("创造性: {:.1}", assistant.temperature());
    }
}
