#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CommandKind {
    Analyze,
    Keywords,
    Next,
    Import,
    Shoot,
    NewSession,
    Status,
    Dismiss,
    Help,
    Quit,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub kind: CommandKind,
}

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "analyze",
        kind: CommandKind::Analyze,
    },
    CommandSpec {
        command: "keywords",
        kind: CommandKind::Keywords,
    },
    CommandSpec {
        command: "next",
        kind: CommandKind::Next,
    },
    CommandSpec {
        command: "import",
        kind: CommandKind::Import,
    },
    CommandSpec {
        command: "shoot",
        kind: CommandKind::Shoot,
    },
    CommandSpec {
        command: "new",
        kind: CommandKind::NewSession,
    },
    CommandSpec {
        command: "status",
        kind: CommandKind::Status,
    },
    CommandSpec {
        command: "dismiss",
        kind: CommandKind::Dismiss,
    },
    CommandSpec {
        command: "help",
        kind: CommandKind::Help,
    },
    CommandSpec {
        command: "quit",
        kind: CommandKind::Quit,
    },
    CommandSpec {
        command: "exit",
        kind: CommandKind::Quit,
    },
];

pub(crate) const GARMENT_COMMAND: &str = "garment";
pub(crate) const AUDIENCE_COMMAND: &str = "audience";
pub(crate) const VIEW_COMMAND: &str = "view";
pub(crate) const REGENERATE_COMMAND: &str = "regen";
pub(crate) const REFERENCE_COMMAND: &str = "ref";
pub(crate) const CLEAR_REFERENCE_COMMAND: &str = "unref";
pub(crate) const NOTES_COMMAND: &str = "notes";

pub const WIZARD_HELP_COMMANDS: &[&str] = &[
    "/garment PATH",
    "/audience male|female|unisex",
    "/analyze",
    "/view chat|keywords",
    "/keywords",
    "/regen N",
    "/next",
    "/ref N PATH",
    "/unref N",
    "/notes TEXT",
    "/import",
    "/shoot",
    "/new",
    "/status",
    "/dismiss",
    "/help",
    "/quit",
];
