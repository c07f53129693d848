//! cestories CLI tool
//!
//! Command-line front-end for checking Captivity Events modules.
//!
//! ## Commands
//!
//! - `validate [MODULE_DIR...]`: load modules and report bad files and dangling trigger names
//! - `show <EVENT>... [-m MODULE_DIR]...`: print events with their options, parents and children
//!
//! Module directories and the schema come from the settings file unless given on the command
//! line. Exit status is non-zero only when the run itself could not happen (no schema, unreadable
//! settings, broken worker pool); bad module content is reported, not fatal.

use cestories_core::{
    codec::{BadXml, EventAncestryError, Override},
    config::{Settings, SettingsProvider, TomlSettingsProvider},
    event::IngestEvent,
    eventbase::IngestionSession,
    loader::{LoadReport, ModuleLoader},
    CeError,
};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cestories")]
#[command(author, version, about = "A tool for checking Captivity Events modules", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct LoadArgs {
    /// Settings file holding the schema path and module list
    #[arg(short, long, default_value = "cestories.toml")]
    settings: PathBuf,

    /// Schema file, overrides the settings
    #[arg(long)]
    xsd: Option<PathBuf>,

    /// Number of ingestion worker threads
    #[arg(short, long)]
    workers: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load modules and display bad files and unresolved trigger names
    Validate {
        /// Module directories in priority order, override the settings
        modules: Vec<PathBuf>,

        #[command(flatten)]
        load: LoadArgs,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Display events by name
    Show {
        /// Event names
        #[arg(required = true)]
        events: Vec<String>,

        /// Module directory, repeat in priority order; overrides the settings
        #[arg(short, long = "module")]
        modules: Vec<PathBuf>,

        #[command(flatten)]
        load: LoadArgs,
    },
}

#[derive(Serialize)]
struct JsonReport<'a> {
    report: &'a LoadReport,
    bad_xml: Vec<&'a BadXml>,
    ancestry_errors: &'a [EventAncestryError],
    overrides: &'a [Override],
}

fn load(args: LoadArgs, modules: Vec<PathBuf>) -> Result<(IngestionSession, LoadReport), CeError> {
    let provider = TomlSettingsProvider::new(args.settings);
    let mut settings: Settings = provider.get_settings()?;
    if args.xsd.is_some() {
        settings.xsd_file = args.xsd;
    }
    if !modules.is_empty() {
        settings.modules = modules;
    }
    if args.workers.is_some() {
        settings.workers = args.workers;
    }

    let (modules, rejected) = settings.module_paths();
    for module in &rejected {
        eprintln!("Skipping {}: {}", module.path.display(), module.error);
    }

    let loader = ModuleLoader::from_settings(&settings)?;
    let mut session = IngestionSession::new();
    let mut status = |event: &IngestEvent| tracing::debug!("{}", event);
    let report = loader.load(&modules, &mut session, Some(&mut status))?;
    Ok((session, report))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate {
            modules,
            load: args,
            json,
        } => {
            let (session, report) = load(args, modules)?;
            if json {
                let out = JsonReport {
                    report: &report,
                    bad_xml: session.bad_xml.sorted_by_file(),
                    ancestry_errors: &session.ancestry_errors,
                    overrides: session.registry.overrides(),
                };
                println!("{}", serde_json::to_string_pretty(&out)?);
                return Ok(());
            }

            for (file, entries) in session.bad_xml.grouped_by_file() {
                println!("{}", file.display());
                for entry in entries {
                    println!("  {}", entry.message);
                }
            }
            for error in &session.ancestry_errors {
                println!("{error}");
            }
            println!(
                "{} events, {} files, {} bad files, {} unresolved references, {} overrides",
                report.events,
                report.files,
                report.bad_files,
                report.ancestry_errors,
                report.overrides
            );
        }

        Commands::Show {
            events,
            modules,
            load: args,
        } => {
            let (session, _) = load(args, modules)?;
            for name in events {
                let event = match session.registry.lookup(&name) {
                    Ok(event) => event,
                    Err(e) => {
                        eprintln!("{e}");
                        continue;
                    }
                };
                println!("{}", event.name);
                if let Some(role) = event.role() {
                    println!("  role: {role:?}");
                }
                if let Some(file) = &event.xml_file {
                    println!("  file: {}", file.display());
                }
                for option in event.all_options() {
                    let text = option.plain_text().unwrap_or_default();
                    let targets: Vec<&str> = option.outbound_events().map(str::trim).collect();
                    if targets.is_empty() {
                        println!("  option: {text}");
                    } else {
                        println!("  option: {text} -> {}", targets.join(", "));
                    }
                }
                if let Some(node) = session.ancestry.get(&event.name) {
                    println!("  parents: {}", node.parents_names().join(", "));
                    println!("  children: {}", node.children_names().join(", "));
                }
            }
        }
    }
    Ok(())
}
