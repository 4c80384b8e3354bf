//! Rapport d'import
//!
//! Collecte les compteurs par table, l'origine des coordonnées des
//! communes, les avertissements des tables de correspondance et l'erreur
//! fatale éventuelle. Sérialisable en JSON (`--report`).

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

use cog::LookupWarning;

use crate::config::CoordinateStrategy;

/// Statut global de l'import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImportStatus {
    /// Import réussi sans avertissement
    Success,
    /// Import terminé avec des avertissements
    PartialSuccess,
    /// Import interrompu par une erreur fatale
    Failed,
}

/// Avertissement non bloquant
#[derive(Debug, Clone, Serialize)]
pub struct ImportWarning {
    /// Fichier source ou étape concernée
    pub source: String,
    /// Ligne de données (1 = première ligne après l'en-tête)
    pub line: Option<u64>,
    pub message: String,
}

/// Erreur fatale ayant interrompu l'import
#[derive(Debug, Clone, Serialize)]
pub struct ImportError {
    pub table: Option<String>,
    pub source: Option<String>,
    pub line: Option<u64>,
    pub message: String,
}

/// Origine des coordonnées des communes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoordinateStats {
    /// Fichier de surcharge (stratégie `file`)
    pub overrides: usize,
    /// Fichier de coordonnées local
    pub local: usize,
    /// Géocodage distant, par fournisseur
    pub geocoded: HashMap<String, usize>,
    /// Sans coordonnées
    pub missing: usize,
}

impl CoordinateStats {
    pub fn geocoded_total(&self) -> usize {
        self.geocoded.values().sum()
    }
}

/// Rapport complet d'import
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    /// Preset ou fichier de configuration
    pub config: String,
    pub strategy: CoordinateStrategy,
    pub duration_secs: f64,
    pub status: ImportStatus,

    /// Lignes insérées par table
    pub by_table: HashMap<String, usize>,
    pub coordinates: CoordinateStats,
    /// Lignes dont la colonne géographique a été remplie
    pub geography_rows: Option<u64>,

    pub warnings: Vec<ImportWarning>,
    pub error: Option<ImportError>,
}

impl ImportReport {
    pub fn new(config: &str, strategy: CoordinateStrategy) -> Self {
        Self {
            config: config.to_string(),
            strategy,
            duration_secs: 0.0,
            status: ImportStatus::Success,
            by_table: HashMap::new(),
            coordinates: CoordinateStats::default(),
            geography_rows: None,
            warnings: Vec::new(),
            error: None,
        }
    }

    /// Enregistre une ligne insérée
    pub fn record_insert(&mut self, table: &str) {
        *self.by_table.entry(table.to_string()).or_default() += 1;
    }

    /// Nombre de lignes insérées dans une table
    pub fn inserted(&self, table: &str) -> usize {
        self.by_table.get(table).copied().unwrap_or_default()
    }

    /// Reprend les avertissements d'une table de correspondance
    pub fn record_lookup_warnings(&mut self, warnings: &[LookupWarning]) {
        self.warnings.extend(warnings.iter().map(|w| ImportWarning {
            source: w.path.display().to_string(),
            line: Some(w.line),
            message: w.message.clone(),
        }));
    }

    pub fn record_warning(&mut self, source: &str, line: Option<u64>, message: String) {
        self.warnings.push(ImportWarning {
            source: source.to_string(),
            line,
            message,
        });
    }

    /// Enregistre l'erreur fatale
    pub fn record_fatal(&mut self, error: ImportError) {
        self.error = Some(error);
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    /// Détermine le statut final
    pub fn finalize(&mut self) {
        self.status = if self.error.is_some() {
            ImportStatus::Failed
        } else if !self.warnings.is_empty() {
            ImportStatus::PartialSuccess
        } else {
            ImportStatus::Success
        };
    }

    /// Nombre total de lignes insérées
    pub fn total_rows(&self) -> usize {
        self.by_table.values().sum()
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("IMPORT REPORT - {} (strategy: {:?})", self.config, self.strategy);
        println!("{}", "=".repeat(60));

        println!("\nStatus: {:?}", self.status);
        println!("Duration: {:.2}s", self.duration_secs);

        println!("\n--- TABLES ---");
        let mut tables: Vec<_> = self.by_table.iter().collect();
        tables.sort_by_key(|(name, _)| name.as_str());
        for (name, rows) in tables {
            println!("  {}: {} rows", name, rows);
        }

        if self.strategy.has_coordinates() {
            println!("\n--- COORDINATES ---");
            println!(
                "  {} from overrides, {} local, {} geocoded, {} missing",
                self.coordinates.overrides,
                self.coordinates.local,
                self.coordinates.geocoded_total(),
                self.coordinates.missing
            );
            let mut providers: Vec<_> = self.coordinates.geocoded.iter().collect();
            providers.sort_by_key(|(name, _)| name.as_str());
            for (provider, count) in providers {
                println!("    {}: {}", provider, count);
            }
            if let Some(rows) = self.geography_rows {
                println!("  geography column: {} rows", rows);
            }
        }

        if !self.warnings.is_empty() {
            println!("\n--- WARNINGS ({}) ---", self.warnings.len());
            for w in self.warnings.iter().take(10) {
                match w.line {
                    Some(line) => println!("  [{}:{}] {}", w.source, line, w.message),
                    None => println!("  [{}] {}", w.source, w.message),
                }
            }
            if self.warnings.len() > 10 {
                println!("  ... and {} more", self.warnings.len() - 10);
            }
        }

        if let Some(ref e) = self.error {
            println!("\n--- ERROR ---");
            let location = match (&e.source, e.line) {
                (Some(source), Some(line)) => format!("[{}:{}]", source, line),
                (Some(source), None) => format!("[{}]", source),
                _ => String::new(),
            };
            println!("  {} {}", location, e.message);
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Affichage compact pour le résumé
    pub fn summary(&self) -> String {
        format!(
            "{}: {} rows, {} communes, {} warnings",
            self.config,
            self.total_rows(),
            self.inserted("communes"),
            self.warnings.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cog::WarningKind;
    use std::path::PathBuf;

    #[test]
    fn test_record_insert() {
        let mut report = ImportReport::new("cog2012", CoordinateStrategy::None);
        report.record_insert("regions");
        report.record_insert("regions");
        report.record_insert("communes");

        assert_eq!(report.inserted("regions"), 2);
        assert_eq!(report.inserted("communes"), 1);
        assert_eq!(report.inserted("cantons"), 0);
        assert_eq!(report.total_rows(), 3);
    }

    #[test]
    fn test_lookup_warnings() {
        let mut report = ImportReport::new("cog2012", CoordinateStrategy::Geocode);
        report.record_lookup_warnings(&[LookupWarning {
            path: PathBuf::from("insee.csv"),
            line: 4,
            kind: WarningKind::Duplicate,
            message: "row #4 key 75056 is already defined to \"75001\"".into(),
        }]);

        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].source, "insee.csv");
        assert_eq!(report.warnings[0].line, Some(4));
    }

    #[test]
    fn test_finalize() {
        let mut report = ImportReport::new("cog2012", CoordinateStrategy::None);
        report.record_insert("regions");
        report.finalize();
        assert_eq!(report.status, ImportStatus::Success);

        report.record_warning("geocode", None, "No coordinates for 01002".into());
        report.finalize();
        assert_eq!(report.status, ImportStatus::PartialSuccess);

        report.record_fatal(ImportError {
            table: Some("communes".into()),
            source: Some("comsimp.csv".into()),
            line: Some(2),
            message: "Missing zipcode for 01099".into(),
        });
        report.finalize();
        assert_eq!(report.status, ImportStatus::Failed);
    }

    #[test]
    fn test_geocoded_total() {
        let mut stats = CoordinateStats::default();
        stats.geocoded.insert("nominatim".into(), 3);
        stats.geocoded.insert("ban".into(), 2);
        assert_eq!(stats.geocoded_total(), 5);
    }

    #[test]
    fn test_summary() {
        let mut report = ImportReport::new("cog2012", CoordinateStrategy::None);
        report.record_insert("communes");
        report.record_insert("communes");

        let summary = report.summary();
        assert!(summary.contains("cog2012"));
        assert!(summary.contains("2 communes"));
    }

    #[test]
    fn test_serialize() {
        let report = ImportReport::new("cog2012-geocode", CoordinateStrategy::Geocode);
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"strategy\":\"geocode\""));
        assert!(json.contains("\"status\":\"Success\""));
    }
}
