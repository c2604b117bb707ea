/// Result of processing a slash command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    /// Display a message to the user.
    Message(String),
    /// Quit the application.
    Quit,
    /// Archive the current conversation and start a fresh one.
    NewConversation,
    /// Write the full transcript.
    SaveConversation,
    /// Turn per-turn auto-save on or off.
    SetAutoSave(bool),
    /// Switch the reading mode.
    SwitchMode(String),
    /// List available modes.
    ListModes,
    /// List archived conversations.
    ListConversations,
    /// Restore an archived conversation by id.
    RestoreConversation(String),
    /// Change sampling temperature.
    SetTemperature(f32),
    /// Show mode, save status, transcript path.
    ShowStatus,
    /// Not a command - treat as regular input.
    NotACommand,
}

pub fn handle_command(input: &str) -> CommandResult {
    let input = input.trim();
    let parts: Vec<&str> = input.splitn(2, ' ').collect();
    let cmd = parts[0];
    let arg = parts.get(1).map(|s| s.trim()).unwrap_or("");

    match cmd {
        "/help" | "/h" => show_help(),
        "/exit" | "/quit" | "/q" => CommandResult::Quit,
        "/new" => CommandResult::NewConversation,
        "/save" => CommandResult::SaveConversation,
        "/autosave" => match arg {
            "on" => CommandResult::SetAutoSave(true),
            "off" => CommandResult::SetAutoSave(false),
            _ => CommandResult::Message("Usage: /autosave on|off".into()),
        },
        "/mode" => {
            if arg.is_empty() {
                CommandResult::ListModes
            } else {
                CommandResult::SwitchMode(arg.to_string())
            }
        }
        "/modes" => CommandResult::ListModes,
        "/history" | "/conversations" => CommandResult::ListConversations,
        "/restore" => {
            if arg.is_empty() {
                CommandResult::Message("Usage: /restore <conversation-id>".into())
            } else {
                CommandResult::RestoreConversation(arg.to_string())
            }
        }
        "/temp" => match arg.parse::<f32>() {
            Ok(value) if value.is_finite() => CommandResult::SetTemperature(value),
            _ => CommandResult::Message("Usage: /temp <0.0-1.5>".into()),
        },
        "/status" => CommandResult::ShowStatus,
        "/version" => CommandResult::Message(format!("Lan v{}", env!("CARGO_PKG_VERSION"))),

        // Unknown command
        _ => {
            if input.starts_with('/') {
                CommandResult::Message(format!("Unknown command: {cmd}. Type /help for commands."))
            } else {
                CommandResult::NotACommand
            }
        }
    }
}

fn show_help() -> CommandResult {
    let help_text = "\
╭─ Lan Commands ─────────────────────────────────────────────╮

  CONVERSATION
    /new                      Archive this chat and start a new one
    /history                  List archived conversations
    /restore <id>             Restore an archived conversation

  SAVING
    /save                     Save the full transcript
    /autosave on|off          Append every turn to the transcript

  MODE
    /mode <name>              Switch reading mode
    /modes                    List available modes
    /temp <value>             Set creativity (0.0-1.5)

  OTHER
    /status                   Show mode, save status and file
    /help, /h                 Show this help message
    /version                  Show version information
    /exit, /quit, /q          Quit

╰────────────────────────────────────────────────────────────╯";

    CommandResult::Message(help_text.into())
}
