use std::env;
use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use studio_contracts::commands::{parse_command, WizardCommand, WIZARD_HELP_COMMANDS};
use studio_contracts::events::{EventPayload, SessionLog};
use studio_contracts::settings::SettingsStore;
use studio_contracts::{Audience, BrainstormView, Category, ImageData, Locale, Role, Session, Step};
use studio_engine::{
    ContentTransport, DryrunTransport, GeminiTransport, GenerationClient, Studio, StudioConfig,
    StudioError,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

type DynStudio = Studio<Box<dyn ContentTransport>>;

#[derive(Debug, Parser)]
#[command(name = "studio", version, about = "Fashion photoshoot planning wizard")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive four-step wizard.
    Wizard(WizardArgs),
    /// Run the whole flow in one go.
    Shoot(ShootArgs),
    /// Edit the stored credential and endpoint.
    Settings(SettingsArgs),
}

#[derive(Debug, Args)]
struct RuntimeArgs {
    #[arg(long, default_value = "en")]
    locale: Locale,
    #[arg(long, default_value = "studio-out")]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    settings: Option<PathBuf>,
    /// Answer every request offline.
    #[arg(long)]
    dryrun: bool,
}

#[derive(Debug, Parser)]
struct WizardArgs {
    #[arg(long)]
    garment: Option<PathBuf>,
    #[arg(long)]
    audience: Option<Audience>,
    #[command(flatten)]
    runtime: RuntimeArgs,
}

#[derive(Debug, Parser)]
struct ShootArgs {
    #[arg(long)]
    garment: PathBuf,
    #[arg(long)]
    audience: Audience,
    /// Director chat turns sent before keywords are generated.
    #[arg(long = "message")]
    messages: Vec<String>,
    #[arg(long)]
    notes: Option<String>,
    /// Reference image as SLOT=PATH, slot 0-7.
    #[arg(long = "ref")]
    references: Vec<String>,
    /// Append the summarized plan to the notes before shooting.
    #[arg(long)]
    import_plan: bool,
    #[command(flatten)]
    runtime: RuntimeArgs,
}

#[derive(Debug, Parser)]
struct SettingsArgs {
    #[arg(long)]
    settings: Option<PathBuf>,
    #[arg(long)]
    credential: Option<String>,
    #[arg(long)]
    clear_credential: bool,
    #[arg(long)]
    endpoint: Option<String>,
    #[arg(long)]
    clear_endpoint: bool,
}

fn main() {
    init_tracing();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("studio error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Wizard(args) => {
            run_wizard(args)?;
            Ok(0)
        }
        Command::Shoot(args) => run_shoot(args),
        Command::Settings(args) => run_settings(args),
    }
}

fn default_settings_path() -> PathBuf {
    env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".studio")
        .join("settings.json")
}

fn build_studio(runtime: &RuntimeArgs) -> Result<DynStudio> {
    let config = StudioConfig::from_env();
    let transport: Box<dyn ContentTransport> = if runtime.dryrun {
        Box::new(DryrunTransport)
    } else {
        let store = SettingsStore::new(
            runtime
                .settings
                .clone()
                .unwrap_or_else(default_settings_path),
        );
        let transport = GeminiTransport::from_settings(&store.load(), config.request_timeout);
        if !transport.has_credential() {
            warn!("no API key configured; remote calls will fail until one is set");
        }
        Box::new(transport)
    };
    info!(transport = transport.name(), "studio starting");
    let events_path = runtime
        .events
        .clone()
        .unwrap_or_else(|| runtime.out.join("session.jsonl"));
    let client = GenerationClient::new(transport, config);
    Ok(Studio::new(client, runtime.locale).with_log(SessionLog::new(events_path)))
}

fn run_wizard(args: WizardArgs) -> Result<()> {
    let mut studio = build_studio(&args.runtime)?;
    if let Some(path) = args.garment.as_deref() {
        report(studio.set_garment(ImageData::from_path(path)?));
    }
    if let Some(audience) = args.audience {
        report(studio.set_audience(audience));
    }

    let stdin = io::stdin();
    let mut line = String::new();
    println!("Studio wizard started. Type /help for commands.");
    print_step(studio.session());

    loop {
        print!("[{}] > ", studio.session().step().number());
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }
        studio.tick();

        let before = studio.session().step();
        match parse_command(line.trim_end_matches(['\n', '\r'])) {
            WizardCommand::Noop => continue,
            WizardCommand::Quit => break,
            WizardCommand::Help => println!("Commands: {}", WIZARD_HELP_COMMANDS.join(" ")),
            WizardCommand::Status => print_status(studio.session()),
            WizardCommand::Dismiss => studio.dismiss_error(),
            WizardCommand::SetGarment(path) => match ImageData::from_path(&path) {
                Ok(image) => {
                    if report(studio.set_garment(image)) {
                        println!("Garment set to {}", path.display());
                    }
                }
                Err(err) => println!("Could not load garment: {err:#}"),
            },
            WizardCommand::SetAudience(audience) => {
                if report(studio.set_audience(audience)) {
                    println!("Audience set to {audience}");
                }
            }
            WizardCommand::Analyze => {
                if report(studio.analyze()) {
                    print_last_reply(studio.session());
                }
            }
            WizardCommand::Chat(text) => {
                if report(studio.send_message(&text)) {
                    print_last_reply(studio.session());
                }
            }
            WizardCommand::SetView(view) => {
                if report(studio.set_view(view)) && view == BrainstormView::Keywords {
                    print_keywords(studio.session());
                }
            }
            WizardCommand::Keywords => {
                if report(studio.generate_keywords()) {
                    print_keywords(studio.session());
                }
            }
            WizardCommand::Regenerate(index) => {
                if report(studio.regenerate_keyword(index)) {
                    print_keywords(studio.session());
                }
            }
            WizardCommand::Next => {
                report(studio.proceed_to_assets());
            }
            WizardCommand::SetReference { index, path } => match ImageData::from_path(&path) {
                Ok(image) => {
                    if report(studio.set_reference(index, Some(image))) {
                        println!("Reference {index} set to {}", path.display());
                    }
                }
                Err(err) => println!("Could not load reference: {err:#}"),
            },
            WizardCommand::ClearReference(index) => {
                report(studio.set_reference(index, None));
            }
            WizardCommand::Notes(text) => {
                report(studio.set_notes(&text));
            }
            WizardCommand::Import => {
                if report(studio.import_plan()) {
                    println!("Notes:\n{}", studio.session().accessory_notes());
                }
            }
            WizardCommand::Shoot => {
                println!("Developing photo...");
                if report(studio.start_shoot()) {
                    let (image_path, prompt_path) = write_outputs(&args.runtime.out, studio.session())?;
                    println!("Final image: {}", image_path.display());
                    println!("Master prompt: {}", prompt_path.display());
                }
            }
            WizardCommand::NewSession => {
                report(studio.new_session());
            }
            WizardCommand::Invalid { command, reason } => println!("/{command}: {reason}"),
            WizardCommand::Unknown { command, .. } => {
                println!("Unknown command /{command}. Type /help for commands.")
            }
        }

        if studio.session().step() != before {
            print_step(studio.session());
        }
    }
    Ok(())
}

fn run_shoot(args: ShootArgs) -> Result<i32> {
    let references = args
        .references
        .iter()
        .map(|raw| parse_reference(raw))
        .collect::<Result<Vec<(usize, PathBuf)>>>()?;
    let mut studio = build_studio(&args.runtime)?;

    match shoot_flow(&mut studio, &args, &references) {
        Ok(()) => {}
        Err(err) => {
            eprintln!("{err:#}");
            return Ok(2);
        }
    }
    let (image_path, prompt_path) = write_outputs(&args.runtime.out, studio.session())?;
    println!("{}", json!({
        "final_image": image_path.to_string_lossy(),
        "master_prompt": prompt_path.to_string_lossy(),
    }));
    Ok(0)
}

fn shoot_flow(
    studio: &mut DynStudio,
    args: &ShootArgs,
    references: &[(usize, PathBuf)],
) -> Result<()> {
    studio.set_garment(ImageData::from_path(&args.garment)?)?;
    studio.set_audience(args.audience)?;
    studio.analyze()?;
    for message in &args.messages {
        studio.send_message(message)?;
    }
    studio.generate_keywords()?;
    studio.proceed_to_assets()?;
    for (index, path) in references {
        studio.set_reference(*index, Some(ImageData::from_path(path)?))?;
    }
    if let Some(notes) = args.notes.as_deref() {
        studio.set_notes(notes)?;
    }
    if args.import_plan {
        studio.import_plan()?;
    }
    studio.start_shoot()?;
    Ok(())
}

fn run_settings(args: SettingsArgs) -> Result<i32> {
    let store = SettingsStore::new(args.settings.unwrap_or_else(default_settings_path));
    if args.clear_credential {
        store.set_credential(None)?;
    } else if let Some(credential) = args.credential.as_deref() {
        store.set_credential(Some(credential))?;
    }
    if args.clear_endpoint {
        store.set_endpoint_override(None)?;
    } else if let Some(endpoint) = args.endpoint.as_deref() {
        store.set_endpoint_override(Some(endpoint))?;
    }

    let settings = store.load();
    let mut payload = EventPayload::new();
    payload.insert("path".to_string(), json!(store.path().to_string_lossy()));
    payload.insert(
        "credential".to_string(),
        json!(settings.credential.as_deref().map(mask_secret)),
    );
    payload.insert("endpoint".to_string(), json!(settings.endpoint_override));
    println!("{}", serde_json::Value::Object(payload));
    Ok(0)
}

fn parse_reference(raw: &str) -> Result<(usize, PathBuf)> {
    let Some((slot, path)) = raw.split_once('=') else {
        bail!("--ref expects SLOT=PATH, got '{raw}'");
    };
    let index = slot
        .trim()
        .parse::<usize>()
        .with_context(|| format!("'{slot}' is not a slot number"))?;
    if Category::from_index(index).is_none() {
        bail!("slot {index} is out of range (0-7)");
    }
    Ok((index, PathBuf::from(path.trim())))
}

fn write_outputs(out_dir: &Path, session: &Session) -> Result<(PathBuf, PathBuf)> {
    let Some(image) = session.final_image() else {
        bail!("no final image to write");
    };
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed creating {}", out_dir.display()))?;
    let image_path = out_dir.join(format!("final.{}", image.extension()));
    fs::write(&image_path, image.bytes())
        .with_context(|| format!("failed writing {}", image_path.display()))?;
    let prompt_path = out_dir.join("master_prompt.txt");
    fs::write(&prompt_path, session.master_prompt())
        .with_context(|| format!("failed writing {}", prompt_path.display()))?;
    Ok((image_path, prompt_path))
}

/// Prints the outcome of a wizard action; true when it went through.
fn report(result: Result<(), StudioError>) -> bool {
    match result {
        Ok(()) => true,
        Err(StudioError::Rejected(reason)) => {
            println!("Not now: {reason}");
            false
        }
        Err(StudioError::Generation(err)) => {
            println!("Error: {err}");
            false
        }
    }
}

fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    let visible: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("****{visible}")
}

fn print_step(session: &Session) {
    let step = session.step();
    println!("== Step {} of 4: {} ==", step.number(), step.title());
    let hint = match step {
        Step::Intake => "Set /garment and /audience, then /analyze.",
        Step::Brainstorm => "Chat with the director, /keywords for search terms, /next when ready.",
        Step::Assets => "Add /ref N PATH images and /notes, optionally /import, then /shoot.",
        Step::Result => "Outputs written. /new starts another shoot.",
    };
    println!("{hint}");
}

fn print_last_reply(session: &Session) {
    if let Some(turn) = session.transcript().last() {
        if turn.role == Role::Assistant {
            println!("Director: {}", turn.text);
        }
    }
}

fn print_keywords(session: &Session) {
    let Some(keywords) = session.keywords() else {
        println!("No keywords yet. Run /keywords.");
        return;
    };
    for (category, value) in keywords.iter() {
        println!("  {} {:<12} {value}", category.index(), category.label());
    }
}

fn print_status(session: &Session) {
    let step = session.step();
    println!("Step: {} ({})", step.number(), step.title());
    println!(
        "Audience: {}",
        session.audience().map(|a| a.as_str()).unwrap_or("-")
    );
    println!(
        "Garment: {}",
        session
            .garment()
            .map(|image| format!("{} ({} bytes)", image.mime_type(), image.len()))
            .unwrap_or_else(|| "-".to_string())
    );
    println!("Transcript turns: {}", session.transcript().len());
    if session.keywords().is_some() {
        print_keywords(session);
    }
    let references: Vec<String> = session
        .reference_images()
        .iter()
        .zip(Category::ALL.iter())
        .filter(|(slot, _)| slot.is_some())
        .map(|(_, category)| category.label().to_string())
        .collect();
    if !references.is_empty() {
        println!("References: {}", references.join(", "));
    }
    if !session.accessory_notes().is_empty() {
        println!("Notes: {}", session.accessory_notes());
    }
    if let Some(error) = session.error() {
        println!("Error: {}", error.message);
    }
}
