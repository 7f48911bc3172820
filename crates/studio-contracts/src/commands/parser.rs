use std::path::PathBuf;

use super::command_registry::{
    CommandKind, CommandSpec, AUDIENCE_COMMAND, CLEAR_REFERENCE_COMMAND, GARMENT_COMMAND,
    NOTES_COMMAND, NO_ARG_COMMANDS, REFERENCE_COMMAND, REGENERATE_COMMAND, VIEW_COMMAND,
};
use crate::category::Audience;
use crate::session::BrainstormView;

/// One line of wizard input, resolved to what the user asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum WizardCommand {
    Noop,
    Chat(String),
    SetGarment(PathBuf),
    SetAudience(Audience),
    Analyze,
    SetView(BrainstormView),
    Keywords,
    Regenerate(usize),
    Next,
    SetReference { index: usize, path: PathBuf },
    ClearReference(usize),
    Notes(String),
    Import,
    Shoot,
    NewSession,
    Status,
    Dismiss,
    Help,
    Quit,
    Invalid { command: String, reason: String },
    Unknown { command: String, arg: String },
}

fn find_kind(command: &str, specs: &[CommandSpec]) -> Option<CommandKind> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.kind)
}

fn parse_path_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => arg
            .split_whitespace()
            .map(str::to_string)
            .filter(|value| !value.is_empty())
            .collect(),
    }
}

fn parse_single_path_arg(arg: &str) -> String {
    let parts = parse_path_args(arg);
    match parts.len() {
        0 => String::new(),
        1 => parts[0].clone(),
        _ => parts.join(" "),
    }
}

fn parse_slot(raw: &str) -> Result<usize, String> {
    raw.trim()
        .parse::<usize>()
        .map_err(|_| format!("'{raw}' is not a slot number"))
}

fn invalid(command: &str, reason: impl Into<String>) -> WizardCommand {
    WizardCommand::Invalid {
        command: command.to_string(),
        reason: reason.into(),
    }
}

fn from_kind(kind: CommandKind) -> WizardCommand {
    match kind {
        CommandKind::Analyze => WizardCommand::Analyze,
        CommandKind::Keywords => WizardCommand::Keywords,
        CommandKind::Next => WizardCommand::Next,
        CommandKind::Import => WizardCommand::Import,
        CommandKind::Shoot => WizardCommand::Shoot,
        CommandKind::NewSession => WizardCommand::NewSession,
        CommandKind::Status => WizardCommand::Status,
        CommandKind::Dismiss => WizardCommand::Dismiss,
        CommandKind::Help => WizardCommand::Help,
        CommandKind::Quit => WizardCommand::Quit,
    }
}

pub fn parse_command(text: &str) -> WizardCommand {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return WizardCommand::Noop;
    }

    let Some(slash_tail) = raw_trimmed.strip_prefix('/') else {
        return WizardCommand::Chat(raw_trimmed.to_string());
    };
    let command_len = slash_tail
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
        .count();
    if command_len == 0 {
        return WizardCommand::Chat(raw_trimmed.to_string());
    }
    let command = slash_tail[..command_len].to_ascii_lowercase();
    let arg = slash_tail[command_len..].trim();

    if let Some(kind) = find_kind(&command, NO_ARG_COMMANDS) {
        return from_kind(kind);
    }

    match command.as_str() {
        GARMENT_COMMAND => {
            let path = parse_single_path_arg(arg);
            if path.is_empty() {
                return invalid(&command, "requires a path");
            }
            WizardCommand::SetGarment(PathBuf::from(path))
        }
        AUDIENCE_COMMAND => match arg.parse::<Audience>() {
            Ok(audience) => WizardCommand::SetAudience(audience),
            Err(reason) => invalid(&command, reason),
        },
        VIEW_COMMAND => match arg.to_ascii_lowercase().as_str() {
            "chat" | "director" => WizardCommand::SetView(BrainstormView::Chat),
            "keywords" | "expert" => WizardCommand::SetView(BrainstormView::Keywords),
            _ => invalid(&command, "expected chat or keywords"),
        },
        REGENERATE_COMMAND => match parse_slot(arg) {
            Ok(index) => WizardCommand::Regenerate(index),
            Err(reason) => invalid(&command, reason),
        },
        REFERENCE_COMMAND => {
            let Some((slot, rest)) = arg.split_once(char::is_whitespace) else {
                return invalid(&command, "requires a slot number and a path");
            };
            let path = parse_single_path_arg(rest);
            if path.is_empty() {
                return invalid(&command, "requires a slot number and a path");
            }
            match parse_slot(slot) {
                Ok(index) => WizardCommand::SetReference {
                    index,
                    path: PathBuf::from(path),
                },
                Err(reason) => invalid(&command, reason),
            }
        }
        CLEAR_REFERENCE_COMMAND => match parse_slot(arg) {
            Ok(index) => WizardCommand::ClearReference(index),
            Err(reason) => invalid(&command, reason),
        },
        NOTES_COMMAND => WizardCommand::Notes(arg.to_string()),
        _ => WizardCommand::Unknown {
            command,
            arg: arg.to_string(),
        },
    }
}
