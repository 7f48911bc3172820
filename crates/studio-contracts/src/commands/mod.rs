mod command_registry;
mod parser;

pub use command_registry::WIZARD_HELP_COMMANDS;
pub use parser::{parse_command, WizardCommand};
