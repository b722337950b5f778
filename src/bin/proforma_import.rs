// Imports a ProFormA task file and prints the resulting exercise draft as JSON
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use proforma_importer::{
    Catalog, EnvironmentRegistry, ExerciseDraft, FileTypeRegistry, ImporterConfig, ProformaImporter,
};

#[derive(Parser, Debug)]
#[command(
    name = "proforma_import",
    version,
    about = "Import a ProFormA task into an exercise draft"
)]
struct Cli {
    /// ProFormA task XML file
    task: PathBuf,

    /// JSON catalog of execution environments and file types
    #[arg(long, short)]
    catalog: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let (environments, file_types, config) = match &cli.catalog {
        Some(path) => {
            let catalog = Catalog::load(path)
                .with_context(|| format!("failed to load catalog {}", path.display()))?;
            let (environments, file_types, config) = catalog.into_registries();
            (environments, file_types, config.with_env_overrides())
        }
        None => (
            EnvironmentRegistry::new(),
            FileTypeRegistry::new(),
            ImporterConfig::from_env(),
        ),
    };

    let xml = std::fs::read(&cli.task)
        .with_context(|| format!("failed to read task {}", cli.task.display()))?;

    let importer = ProformaImporter::new(environments, file_types, config);
    let mut draft = ExerciseDraft::new();
    importer
        .import_bytes(&mut draft, &xml)
        .with_context(|| format!("failed to import {}", cli.task.display()))?;

    println!("{}", serde_json::to_string_pretty(&draft)?);
    Ok(())
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "warn,proforma_importer=info",
        1 => "info,proforma_importer=debug",
        _ => "debug",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
