#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    Clear,
    Show,
    SetModel(String),
    Quit,
    Usage(&'static str),
    Unknown(String),
}

pub const HELP_TEXT: &str = "\
Available commands:
  /set model NAME   Switch the model for this session
  /show             Show provider, model and conversation
  /clear, /cls      Clear the screen
  /bye, /exit       Exit
  /?, /help         Show this help

Use \"\"\" to begin and end a multi-line message.
Attach images with @path or @\"path with spaces\".
Press Ctrl + c to cancel a response, Ctrl + d to exit.
";

/// Every spelling [`parse_slash_command`] recognises, for tab completion.
pub const COMMAND_NAMES: [&str; 9] = [
    "/?", "/bye", "/clear", "/cls", "/exit", "/help", "/quit", "/set", "/show",
];

pub fn parse_slash_command(input: &str) -> Option<SlashCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let mut words = trimmed.split_whitespace();
    let command = words.next().unwrap_or(trimmed).to_string();

    let parsed = match command.as_str() {
        "/help" | "/?" => SlashCommand::Help,
        "/clear" | "/cls" => SlashCommand::Clear,
        "/show" => SlashCommand::Show,
        "/bye" | "/exit" | "/quit" => SlashCommand::Quit,
        "/set" => match (words.next(), words.next()) {
            (Some("model"), Some(name)) => SlashCommand::SetModel(name.to_string()),
            _ => SlashCommand::Usage("Usage: /set model NAME"),
        },
        _ => SlashCommand::Unknown(command),
    };

    Some(parsed)
}
