/// CLI tool for managing picker lists and drawing names
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use roster_picker::config::EXPORT_FILE_NAME;
use roster_picker::diagnostic;
use roster_picker::seed::FolderSeedSource;
use roster_picker::storage::FileStorage;
use roster_picker::{
    EngineConfig, ImportStrategy, PickOutcome, Session, SessionError, StoreError, SLOT_COUNT,
};
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "roster", about = "Random pickers over saved class lists")]
struct Cli {
    /// State file holding saved lists and picker slots
    #[arg(long, global = true, default_value = "roster-state.json")]
    state: PathBuf,

    /// Optional TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List saved list names
    Lists {
        /// Only show names containing this text (case-insensitive)
        #[arg(long)]
        filter: Option<String>,
    },
    /// Print the entries of a saved list
    Show { name: String },
    /// Save a list from a file with one name per line ("-" for stdin)
    Save { name: String, file: String },
    /// Delete a saved list
    Delete { name: String },
    /// Import lists from a JSON file (merges by default; local lists win)
    Import {
        file: PathBuf,
        /// Replace all saved lists instead of merging
        #[arg(long)]
        replace: bool,
    },
    /// Export all lists as pretty-printed JSON
    Export {
        /// Output file ("-" for stdout)
        #[arg(default_value = EXPORT_FILE_NAME)]
        file: String,
    },
    /// Draw names from a saved list without repeats
    Pick {
        list: String,
        #[arg(long, default_value_t = 1)]
        count: usize,
        /// Seed for deterministic output (default: random)
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Merge the first seed file found near a directory into the saved lists
    Bootstrap {
        /// Directory the conventional seed paths are resolved against
        #[arg(long, default_value = ".")]
        base: PathBuf,
    },
    /// Seven-slot picker
    Seven {
        #[command(subcommand)]
        action: SevenAction,
    },
}

#[derive(Subcommand)]
enum SevenAction {
    /// Show all slots
    Show,
    /// Fill every unlocked slot from the active list
    Randomize {
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Toggle the lock on a slot (1-7)
    Lock { slot: usize },
    /// Set a slot's name manually (1-7)
    Set { slot: usize, name: String },
    /// Clear all slots
    Clear,
    /// Choose the list slots are drawn from
    Use { list: String },
    /// Show lists available to the seven-slot picker
    Candidates,
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(debug)
        .compact()
        .try_init();
}

fn open_session(cli: &Cli, seed: Option<u64>) -> Result<Session> {
    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let backend = Arc::new(FileStorage::new(&cli.state));
    Ok(match seed {
        Some(seed) => Session::with_seed(backend, config, seed),
        None => Session::open(backend, config),
    })
}

/// Convert a 1-based slot number from the command line
fn slot_index(slot: usize) -> Result<usize> {
    if slot == 0 || slot > SLOT_COUNT {
        bail!("slot must be between 1 and {}", SLOT_COUNT);
    }
    Ok(slot - 1)
}

fn read_input(file: &str) -> Result<String> {
    if file == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("reading from stdin")?;
        Ok(buffer)
    } else {
        fs::read_to_string(file).with_context(|| format!("reading file '{}'", file))
    }
}

fn print_slots(session: &Session) {
    let allocator = session.allocator();
    let source = allocator.source_list(session.store());
    match source.name {
        Some(name) => println!("List: {} ({} names)", name, source.entries.len()),
        None => println!("List: {} (not found)", allocator.active_list()),
    }
    for (index, slot) in allocator.slots().iter().enumerate() {
        let lock = if slot.locked { "locked" } else { "" };
        println!("{:>2}. {:<24} {}", index + 1, slot.occupant().unwrap_or("-"), lock);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Command::Lists { filter } => {
            let session = open_session(&cli, None)?;
            let store = session.store();
            let keyword = filter.clone().unwrap_or_default();
            for name in store.names_containing(&keyword) {
                let count = store.get(name).map(<[String]>::len).unwrap_or(0);
                println!("{} ({})", name, count);
            }
        }
        Command::Show { name } => {
            let session = open_session(&cli, None)?;
            let Some(entries) = session.store().get(name) else {
                bail!("no list named '{}'", name);
            };
            for entry in entries {
                println!("{}", entry);
            }
        }
        Command::Save { name, file } => {
            let text = read_input(file)?;
            let mut session = open_session(&cli, None)?;
            session.save_list(name, text.lines())?;
            println!("List \"{}\" saved!", name.trim());
        }
        Command::Delete { name } => {
            let mut session = open_session(&cli, None)?;
            if !session.delete_list(name)? {
                bail!("no list named '{}'", name);
            }
            println!("Deleted \"{}\"", name);
        }
        Command::Import { file, replace } => {
            let text = fs::read_to_string(file)
                .with_context(|| format!("reading file '{}'", file.display()))?;
            let strategy = if *replace {
                ImportStrategy::Replace
            } else {
                ImportStrategy::Merge
            };
            let mut session = open_session(&cli, None)?;
            match session.import_json(&text, strategy) {
                Ok(count) => println!("Imported {} lists successfully!", count),
                Err(SessionError::Store(StoreError::Import(e))) => {
                    let source_name = file.display().to_string();
                    eprint!("{}", diagnostic::report_import_error(&source_name, &text, &e));
                    process::exit(1);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Command::Export { file } => {
            let session = open_session(&cli, None)?;
            let json = session.export_json()?;
            if file == "-" {
                println!("{}", json);
            } else {
                fs::write(file, format!("{}\n", json))
                    .with_context(|| format!("writing {}", file))?;
                println!("Exported {} lists to {}", session.store().len(), file);
            }
        }
        Command::Pick { list, count, seed } => {
            let mut session = open_session(&cli, *seed)?;
            let bag = session.create_bag();
            for _ in 0..*count {
                match session.pick_from_list(bag, list)? {
                    PickOutcome::Picked { entry, remaining } => {
                        println!("{}  ({} remaining)", entry, remaining)
                    }
                    PickOutcome::CycleComplete { entry } => {
                        println!("{}  (all names picked, starting over)", entry)
                    }
                    PickOutcome::Empty => bail!("list '{}' has no names to pick from", list),
                }
            }
        }
        Command::Bootstrap { base } => {
            let mut session = open_session(&cli, None)?;
            let source = FolderSeedSource::new(base.clone());
            match session.auto_bootstrap(&source).await {
                Some(path) => println!("Merged lists from {}", path),
                None => println!("No seed file found"),
            }
        }
        Command::Seven { action } => {
            let seed = match action {
                SevenAction::Randomize { seed } => *seed,
                _ => None,
            };
            let mut session = open_session(&cli, seed)?;
            match action {
                SevenAction::Show => {}
                SevenAction::Randomize { .. } => {
                    session.randomize()?;
                }
                SevenAction::Lock { slot } => {
                    session.toggle_lock(slot_index(*slot)?)?;
                }
                SevenAction::Set { slot, name } => {
                    session.set_occupant(slot_index(*slot)?, name)?;
                }
                SevenAction::Clear => session.clear_all(),
                SevenAction::Use { list } => session.switch_list(list),
                SevenAction::Candidates => {
                    let candidates = session.candidate_lists();
                    if candidates.is_empty() {
                        println!("No student lists found - save one with `roster save`");
                    }
                    for name in candidates {
                        println!("{}", name);
                    }
                    return Ok(());
                }
            }
            if let Some(reason) = session.allocator().last_persist_error() {
                eprintln!("Warning: picker state not saved: {}", reason);
            }
            print_slots(&session);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}
