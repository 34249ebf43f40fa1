#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Reset,
    Status,
    Quit,
    Unknown(String),
}

pub const HELP_TEXT: &str = "Commands: /help, /status, /reset, /quit";

/// Parses REPL commands. Anything else is a chat message.
pub fn parse_command(input: &str) -> Option<Command> {
    let trimmed = input.trim();
    if trimmed == "quit" || trimmed == "exit" {
        return Some(Command::Quit);
    }

    let command = trimmed.strip_prefix('/')?;
    let name = command.split_whitespace().next().unwrap_or_default();
    Some(match name {
        "help" | "?" => Command::Help,
        "reset" | "restart" => Command::Reset,
        "status" => Command::Status,
        "quit" | "exit" => Command::Quit,
        other => Command::Unknown(format!("/{other}")),
    })
}
