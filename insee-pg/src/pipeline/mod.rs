//! Pipeline d'import COG
//!
//! Étapes, exécutées séquentiellement sur une seule destination :
//! 1. recréation des cinq tables
//! 2. chargement des tables de référence
//! 3. construction des tables de correspondance (code postal, coordonnées)
//! 4. enrichissement et insertion des communes
//! 5. colonne géographique des communes
//!
//! La première erreur fatale arrête l'import : rien n'est écrit après la
//! ligne fautive et il n'y a pas de rollback.

pub mod enrich;
pub mod loader;

pub use enrich::{CoordinateSource, Enriched, Enricher};
pub use loader::load_table;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{error, info};

use cog::{
    build_coordinate_lookup, build_override_lookup, build_postal_lookup, Built, CogError,
    CoordinateLookup, OverrideLookup, SourceFormat, SourceReader,
};

use crate::config::{Config, CoordinateStrategy, SourceFile};
use crate::export::schema::{self, TableDef};
use crate::export::Destination;
use crate::geocode::GeocoderChain;
use crate::report::{ImportError, ImportReport};

/// Pipeline configuré, prêt à être exécuté sur une [`Destination`]
pub struct Pipeline<'a> {
    config: &'a Config,
    sources: PathBuf,
    encoding: Option<String>,
    geocoder: Option<&'a GeocoderChain>,
}

impl<'a> Pipeline<'a> {
    /// `sources` : répertoire auquel les chemins de la configuration sont relatifs
    pub fn new(config: &'a Config, sources: &Path) -> Self {
        Self {
            config,
            sources: sources.to_path_buf(),
            encoding: None,
            geocoder: None,
        }
    }

    /// Encodage par défaut des fichiers sans encodage explicite
    pub fn with_encoding(mut self, encoding: Option<String>) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_geocoder(mut self, geocoder: &'a GeocoderChain) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    pub fn strategy(&self) -> CoordinateStrategy {
        self.config.coordinates.strategy
    }

    fn path(&self, source: &SourceFile) -> PathBuf {
        source.resolve(&self.sources)
    }

    fn format(&self, source: &SourceFile) -> Result<SourceFormat> {
        source
            .format(self.encoding.as_deref())
            .with_context(|| format!("Invalid format for {}", source.file))
    }

    /// Exécute les cinq étapes
    pub async fn run<D>(&self, dest: &mut D, report: &mut ImportReport) -> Result<()>
    where
        D: Destination + ?Sized,
    {
        self.config.validate()?;
        let strategy = self.strategy();
        let sources = &self.config.sources;

        let tables = schema::all_tables(strategy);
        dest.reset_tables(&tables).await?;

        let [regions, departements, arrondissements, cantons, communes] = &tables[..] else {
            anyhow::bail!("Unexpected table layout");
        };

        let mut departement_names = HashMap::new();
        for (source, table) in [
            (&sources.regions, regions),
            (&sources.departements, departements),
            (&sources.arrondissements, arrondissements),
            (&sources.cantons, cantons),
        ] {
            let collect = table.name == departements.name;
            load_table(
                dest,
                table,
                &self.path(source),
                self.format(source)?,
                report,
                |record| {
                    if !collect {
                        return;
                    }
                    if let (Some(dep), Some(name)) = (record.text("dep"), record.text("nccenr")) {
                        departement_names
                            .entry(dep.to_string())
                            .or_insert_with(|| name.to_string());
                    }
                },
            )
            .await?;
        }

        let postal = self.build(report, &sources.postal, build_postal_lookup)?;

        let coordinates: Option<CoordinateLookup> = match (&sources.coordinates, strategy) {
            (Some(source), CoordinateStrategy::Geocode) => {
                Some(self.build(report, source, build_coordinate_lookup)?)
            }
            _ => None,
        };

        let overrides: Option<OverrideLookup> = match (&sources.overrides, strategy) {
            (Some(source), CoordinateStrategy::File) => {
                Some(self.build(report, source, build_override_lookup)?)
            }
            _ => None,
        };

        let mut enricher = Enricher::new(strategy, &postal, &departement_names);
        if let Some(ref lookup) = coordinates {
            enricher = enricher.with_coordinates(lookup);
        }
        if let Some(ref lookup) = overrides {
            enricher = enricher.with_overrides(lookup);
        }
        if let Some(geocoder) = self.geocoder {
            enricher = enricher.with_geocoder(geocoder);
        }

        self.load_communes(dest, communes, &enricher, report).await?;

        report.geography_rows = dest.add_geography(communes).await?;
        dest.finish().await?;

        info!(
            rows = report.total_rows(),
            communes = report.inserted(communes.name),
            warnings = report.warnings.len(),
            "Import finished"
        );
        Ok(())
    }

    /// Construit une table de correspondance et reprend ses avertissements
    fn build<T>(
        &self,
        report: &mut ImportReport,
        source: &SourceFile,
        build: fn(&Path, SourceFormat) -> Result<Built<T>, CogError>,
    ) -> Result<T> {
        let path = self.path(source);
        let built = build(&path, self.format(source)?).map_err(|e| {
            error!(file = %path.display(), error = %e, "Cannot build lookup");
            let line = match &e {
                CogError::MalformedRow { line, .. } => Some(*line),
                _ => None,
            };
            report.record_fatal(ImportError {
                table: None,
                source: Some(path.display().to_string()),
                line,
                message: e.to_string(),
            });
            e
        })?;

        report.record_lookup_warnings(&built.warnings);
        Ok(built.lookup)
    }

    /// Enrichit et insère les communes, arrêt à la première erreur
    async fn load_communes<D>(
        &self,
        dest: &mut D,
        table: &TableDef,
        enricher: &Enricher<'_>,
        report: &mut ImportReport,
    ) -> Result<()>
    where
        D: Destination + ?Sized,
    {
        let path = self.path(&self.config.sources.communes);
        let reader = SourceReader::open(&path, self.format(&self.config.sources.communes)?)
            .map_err(|e| {
                loader::fatal(report, table, &path, None, &e.to_string());
                e
            })?;

        for row in reader {
            let row = row.map_err(|e| {
                let line = match &e {
                    CogError::MalformedRow { line, .. } => Some(*line),
                    _ => None,
                };
                loader::fatal(report, table, &path, line, &e.to_string());
                e
            })?;

            let enriched = match enricher.enrich(&row.record).await {
                Ok(enriched) => enriched,
                Err(e) => {
                    error!(
                        file = %path.display(),
                        row = row.line,
                        raw = ?row.raw,
                        record = ?row.record,
                        error = %e,
                        "Cannot enrich commune"
                    );
                    loader::fatal(report, table, &path, Some(row.line), &e.to_string());
                    return Err(e).with_context(|| format!("Row {} of {}", row.line, path.display()));
                }
            };

            if let Err(e) = dest.insert(table, &enriched.record).await {
                error!(
                    file = %path.display(),
                    row = row.line,
                    raw = ?row.raw,
                    record = ?enriched.record,
                    error = %e,
                    "Failed to insert commune"
                );
                loader::fatal(report, table, &path, Some(row.line), &format!("{:#}", e));
                return Err(e).with_context(|| {
                    format!("Row {} of {} into {}", row.line, path.display(), table.name)
                });
            }

            report.record_insert(table.name);
            record_source(report, &enriched);
        }

        info!(table = table.name, rows = report.inserted(table.name), "Communes loaded");
        Ok(())
    }
}

fn record_source(report: &mut ImportReport, enriched: &Enriched) {
    let stats = &mut report.coordinates;
    match enriched.source {
        None => {}
        Some(CoordinateSource::Override) => stats.overrides += 1,
        Some(CoordinateSource::Local) => stats.local += 1,
        Some(CoordinateSource::Geocoded(provider)) => {
            *stats.geocoded.entry(provider.to_string()).or_default() += 1;
        }
        Some(CoordinateSource::Missing { ref query, ref last_error }) => {
            stats.missing += 1;
            let message = match (query, last_error) {
                (Some(query), Some(error)) => {
                    format!("No coordinates for {} ({:?}): {}", enriched.ci, query, error)
                }
                (Some(query), None) => format!("No coordinates for {} ({:?})", enriched.ci, query),
                _ => format!("No coordinates for {}", enriched.ci),
            };
            report.record_warning("geocode", None, message);
        }
    }
}
