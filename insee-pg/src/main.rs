//! Point d'entrée CLI pour insee-pg

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

/// Charge `.env` depuis le répertoire courant, sinon depuis celui du binaire
fn load_env() {
    if dotenvy::dotenv().is_ok() {
        return;
    }
    let beside_binary = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(".env")));
    if let Some(path) = beside_binary {
        let _ = dotenvy::from_path(path);
    }
}

mod cli;

use cli::{Commands, ImportArgs};

/// Importer le Code Officiel Géographique de l'INSEE vers PostGIS ou CSV
#[derive(Parser)]
#[command(name = "insee-pg")]
#[command(author, version)]
#[command(about = "Importer le COG de l'INSEE vers PostGIS (défaut) ou CSV")]
#[command(long_about = "Charge régions, départements, arrondissements, cantons et communes, enrichit les communes du code postal et des coordonnées.\n\nPar défaut, importe vers PostGIS. Utilisez 'to-csv' pour exporter en CSV.")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Sous-commande (défaut: import vers PostGIS)
    #[command(subcommand)]
    command: Option<Commands>,

    /// Arguments pour l'import PostGIS (commande par défaut)
    #[command(flatten)]
    import: ImportArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();

    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Some(Commands::ToCsv { source, output }) => {
            info!(config = %source.config, output = %output.display(), "Export vers CSV");
            cli::cmd_export(source, &output).await?;
        }
        None => {
            info!(config = %cli.import.source.config, schema = %cli.import.schema, "Import vers PostGIS");
            cli::cmd_import(cli.import).await?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::WARN
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(true)
        .init();
}
