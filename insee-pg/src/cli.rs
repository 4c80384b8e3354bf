//! Définition et implémentation des commandes CLI
//!
//! - par défaut : COG → PostGIS
//! - `to-csv` : COG → fichiers CSV (sans DB)

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tracing::info;

use insee_pg::export::pool::{self, DatabaseConfig, DatabaseOverrides};
use insee_pg::{
    Config, CoordinateStrategy, CsvDestination, Destination, GeocoderChain, ImportReport,
    PgDestination, Pipeline,
};

#[derive(Subcommand)]
pub enum Commands {
    /// Export COG tables to CSV files (no database required)
    ToCsv {
        #[command(flatten)]
        source: SourceArgs,

        /// Output directory, one CSV file per table
        #[arg(short, long)]
        output: PathBuf,
    },
}

/// Options communes aux deux commandes
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Directory the configured source files are relative to
    #[arg(long, default_value = "sources")]
    pub sources: PathBuf,

    /// Config preset name (cog2012/cog2012-file/cog2012-geocode) or path to a JSON config
    #[arg(long, default_value = "cog2012")]
    pub config: String,

    /// Coordinate strategy override (défaut : celle de la configuration)
    #[arg(long, value_enum)]
    pub strategy: Option<CoordinateStrategy>,

    /// Default encoding of source files (utf-8, windows-1252, iso-8859-15...)
    #[arg(long)]
    pub encoding: Option<String>,

    /// Timeout of each geocoding request, in seconds
    #[arg(long, default_value_t = 10)]
    pub geocode_timeout: u64,

    /// Write the import report as JSON to this file
    #[arg(long)]
    pub report: Option<PathBuf>,
}

/// Arguments de l'import PostGIS (commande par défaut)
#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Target PostgreSQL schema
    #[arg(long, default_value = "public")]
    pub schema: String,

    /// PostgreSQL host (défaut : env PGHOST / localhost)
    #[arg(long)]
    pub host: Option<String>,

    /// PostgreSQL database name (défaut : env PGDATABASE / insee)
    #[arg(long)]
    pub database: Option<String>,

    /// PostgreSQL user (défaut : env PGUSER / postgres)
    #[arg(long)]
    pub user: Option<String>,

    /// PostgreSQL password (défaut : env PGPASSWORD)
    #[arg(long)]
    pub password: Option<String>,

    /// PostgreSQL port (défaut : env PGPORT / 5432)
    #[arg(long)]
    pub port: Option<u16>,

    /// SSL mode: disable, prefer, require (défaut : env PGSSLMODE / disable)
    #[arg(long)]
    pub ssl: Option<String>,
}

/// Charge la configuration et applique la stratégie demandée
fn load_config(args: &SourceArgs) -> Result<Config> {
    let mut config = Config::from_spec(&args.config)
        .with_context(|| format!("Failed to load config {}", args.config))?;
    if let Some(strategy) = args.strategy {
        config.coordinates.strategy = strategy;
    }
    config.validate()?;
    Ok(config)
}

/// Géocodeurs, seulement pour la stratégie `geocode`
fn load_geocoder(config: &Config, timeout: u64) -> Result<Option<GeocoderChain>> {
    if config.coordinates.strategy != CoordinateStrategy::Geocode
        || config.coordinates.providers.is_empty()
    {
        return Ok(None);
    }
    let chain = GeocoderChain::from_config(&config.coordinates, Duration::from_secs(timeout))?;
    info!(providers = chain.len(), "Geocoding enabled");
    Ok(Some(chain))
}

/// Exécute le pipeline et produit le rapport, même en cas d'échec
async fn run<D>(args: &SourceArgs, config: &Config, dest: &mut D) -> Result<ImportReport>
where
    D: Destination + ?Sized,
{
    let geocoder = load_geocoder(config, args.geocode_timeout)?;

    let mut pipeline = Pipeline::new(config, &args.sources).with_encoding(args.encoding.clone());
    if let Some(ref chain) = geocoder {
        pipeline = pipeline.with_geocoder(chain);
    }

    let start = Instant::now();
    let mut report = ImportReport::new(&args.config, config.coordinates.strategy);
    let result = pipeline.run(dest, &mut report).await;

    report.set_duration(start.elapsed());
    report.finalize();
    report.display();

    if let Some(ref path) = args.report {
        report.save_to_file(path)?;
        info!(path = %path.display(), "Report saved");
    }

    result?;
    println!("{}", report.summary());
    Ok(report)
}

/// Exécute l'import vers PostGIS
pub async fn cmd_import(args: ImportArgs) -> Result<()> {
    let config = load_config(&args.source)?;

    println!("=== Import COG ===");
    println!("Sources: {}", args.source.sources.display());
    println!("Config: {}", args.source.config);
    println!("Strategy: {:?}", config.coordinates.strategy);
    println!("Schema: {}", args.schema);

    let mut db_config = DatabaseConfig::from_env();
    db_config.apply(DatabaseOverrides {
        host: args.host,
        database: args.database,
        user: args.user,
        password: args.password,
        port: args.port,
        ssl: args.ssl,
    })?;
    println!("Database: {}", db_config.describe());

    let db_pool = pool::create_pool(&db_config)?;
    let client = pool::connect(&db_pool).await?;
    println!("Connected to PostgreSQL");

    let mut dest = PgDestination::new(client, &args.schema);
    run(&args.source, &config, &mut dest).await?;
    Ok(())
}

/// Exécute l'export CSV
pub async fn cmd_export(args: SourceArgs, output: &Path) -> Result<()> {
    let config = load_config(&args)?;
    info!(
        sources = %args.sources.display(),
        output = %output.display(),
        strategy = ?config.coordinates.strategy,
        "Export CSV"
    );

    let mut dest = CsvDestination::new(output);
    run(&args, &config, &mut dest).await?;
    Ok(())
}
