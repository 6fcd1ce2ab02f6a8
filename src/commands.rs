use research_api::ResearchDepth;

pub const HELP_TEXT: &str = "Commands: /help, /new, /list, /load <id>, /delete <id>, /depth [quick|standard|deep], /academic [on|off], /health, /quit. Any other text starts research on that topic; Ctrl-C cancels it.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    New,
    List,
    Load(i64),
    Delete(i64),
    /// `None` shows the current depth.
    Depth(Option<ResearchDepth>),
    /// `None` toggles.
    Academic(Option<bool>),
    Health,
    Quit,
    Invalid { command: String, usage: &'static str },
    Unknown(String),
}

pub fn parse_slash_command(input: &str) -> Option<SlashCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let mut parts = trimmed.split_whitespace();
    let command = parts.next().unwrap_or(trimmed).to_string();
    let argument = parts.next();

    let parsed = match command.as_str() {
        "/help" => SlashCommand::Help,
        "/new" => SlashCommand::New,
        "/list" => SlashCommand::List,
        "/load" => match parse_id(argument) {
            Some(id) => SlashCommand::Load(id),
            None => invalid(command, "/load <id>"),
        },
        "/delete" => match parse_id(argument) {
            Some(id) => SlashCommand::Delete(id),
            None => invalid(command, "/delete <id>"),
        },
        "/depth" => match argument {
            None => SlashCommand::Depth(None),
            Some(value) => match ResearchDepth::parse(value) {
                Some(depth) => SlashCommand::Depth(Some(depth)),
                None => invalid(command, "/depth [quick|standard|deep]"),
            },
        },
        "/academic" => match argument.map(str::to_ascii_lowercase).as_deref() {
            None => SlashCommand::Academic(None),
            Some("on") => SlashCommand::Academic(Some(true)),
            Some("off") => SlashCommand::Academic(Some(false)),
            Some(_) => invalid(command, "/academic [on|off]"),
        },
        "/health" => SlashCommand::Health,
        "/quit" | "/exit" => SlashCommand::Quit,
        _ => SlashCommand::Unknown(command),
    };

    Some(parsed)
}

fn parse_id(argument: Option<&str>) -> Option<i64> {
    argument?.parse::<i64>().ok().filter(|id| *id > 0)
}

fn invalid(command: String, usage: &'static str) -> SlashCommand {
    SlashCommand::Invalid { command, usage }
}
