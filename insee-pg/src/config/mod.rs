//! Configuration des sources et de la stratégie de coordonnées

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cog::SourceFormat;

/// Configuration principale
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Fichiers sources, relatifs au répertoire `--sources`
    pub sources: SourcesConfig,

    /// Origine des coordonnées des communes
    #[serde(default)]
    pub coordinates: CoordinatesConfig,
}

/// Fichiers d'entrée du pipeline
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourcesConfig {
    pub regions: SourceFile,
    pub departements: SourceFile,
    pub arrondissements: SourceFile,
    pub cantons: SourceFile,
    pub communes: SourceFile,

    /// Correspondance INSEE ↔ code postal
    pub postal: SourceFile,

    /// Coordonnées (3 colonnes, sans en-tête)
    #[serde(default)]
    pub coordinates: Option<SourceFile>,

    /// Surcharge code postal + coordonnées par `ci`
    #[serde(default)]
    pub overrides: Option<SourceFile>,
}

/// Un fichier source
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceFile {
    /// Chemin du fichier
    pub file: String,

    /// Séparateur de champs
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Encodage (label WHATWG : utf-8, windows-1252, iso-8859-15...)
    #[serde(default)]
    pub encoding: Option<String>,
}

fn default_delimiter() -> char {
    ','
}

/// Stratégie de résolution des coordonnées des communes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CoordinateStrategy {
    /// Pas de colonnes longitude/latitude
    #[default]
    None,
    /// Fichier de surcharge obligatoire pour chaque commune
    File,
    /// Fichier de coordonnées, puis géocodage distant
    Geocode,
}

impl CoordinateStrategy {
    /// La table communes porte des colonnes longitude/latitude
    pub fn has_coordinates(self) -> bool {
        !matches!(self, CoordinateStrategy::None)
    }
}

/// Configuration des coordonnées
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CoordinatesConfig {
    #[serde(default)]
    pub strategy: CoordinateStrategy,

    /// Fournisseurs de géocodage, par ordre de priorité
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,

    /// Langue des résultats de géocodage
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "fr".to_string()
}

impl Default for CoordinatesConfig {
    fn default() -> Self {
        Self {
            strategy: CoordinateStrategy::None,
            providers: Vec::new(),
            language: default_language(),
        }
    }
}

/// Type de fournisseur de géocodage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenStreetMap Nominatim
    Nominatim,
    /// Base Adresse Nationale (api-adresse.data.gouv.fr)
    Ban,
}

/// Un fournisseur de géocodage
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    pub kind: ProviderKind,

    /// URL de base (défaut : service public du fournisseur)
    #[serde(default)]
    pub url: Option<String>,
}

impl Config {
    /// Charge une configuration depuis un fichier
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse config JSON")
    }

    /// Charge une configuration depuis un preset embarqué
    pub fn from_preset(preset: &str) -> Result<Self> {
        match preset {
            "cog2012" => Self::load_embedded(include_str!("presets/cog2012.json")),
            "cog2012-file" => Self::load_embedded(include_str!("presets/cog2012-file.json")),
            "cog2012-geocode" => Self::load_embedded(include_str!("presets/cog2012-geocode.json")),
            _ => anyhow::bail!(
                "Unknown preset: {}. Use: cog2012, cog2012-file, cog2012-geocode",
                preset
            ),
        }
    }

    /// Preset embarqué ou chemin vers un fichier JSON
    pub fn from_spec(spec: &str) -> Result<Self> {
        match spec {
            "cog2012" | "cog2012-file" | "cog2012-geocode" => Self::from_preset(spec),
            _ => Self::load(Path::new(spec)),
        }
    }

    fn load_embedded(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse embedded config")
    }

    /// Vérifie que les fichiers requis par la stratégie sont déclarés
    pub fn validate(&self) -> Result<()> {
        match self.coordinates.strategy {
            CoordinateStrategy::None => {}
            CoordinateStrategy::File => {
                if self.sources.overrides.is_none() {
                    anyhow::bail!("Strategy `file` requires `sources.overrides`");
                }
            }
            CoordinateStrategy::Geocode => {
                if self.sources.coordinates.is_none() && self.coordinates.providers.is_empty() {
                    anyhow::bail!(
                        "Strategy `geocode` requires `sources.coordinates` or at least one provider"
                    );
                }
            }
        }
        Ok(())
    }
}

impl SourceFile {
    /// Chemin absolu du fichier, relatif au répertoire des sources
    pub fn resolve(&self, base: &Path) -> PathBuf {
        let path = Path::new(&self.file);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base.join(path)
        }
    }

    /// Format de lecture (séparateur et encodage)
    pub fn format(&self, default_encoding: Option<&str>) -> Result<SourceFormat> {
        let mut delimiter = [0u8; 4];
        let encoded = self.delimiter.encode_utf8(&mut delimiter);
        if encoded.len() != 1 {
            anyhow::bail!("Delimiter must be a single ASCII character: {:?}", self.delimiter);
        }

        let mut format = SourceFormat::default().with_delimiter(encoded.as_bytes()[0]);
        if let Some(label) = self.encoding.as_deref().or(default_encoding) {
            let encoding = cog::encoding_for_label(label)
                .with_context(|| format!("Unknown encoding: {}", label))?;
            format = format.with_encoding(encoding);
        }
        Ok(format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_parse() {
        for preset in ["cog2012", "cog2012-file", "cog2012-geocode"] {
            let config = Config::from_preset(preset).unwrap();
            config.validate().unwrap();
        }
    }

    #[test]
    fn test_preset_strategies() {
        assert_eq!(
            Config::from_preset("cog2012").unwrap().coordinates.strategy,
            CoordinateStrategy::None
        );
        assert_eq!(
            Config::from_preset("cog2012-file").unwrap().coordinates.strategy,
            CoordinateStrategy::File
        );

        let geocode = Config::from_preset("cog2012-geocode").unwrap();
        assert_eq!(geocode.coordinates.strategy, CoordinateStrategy::Geocode);
        assert_eq!(geocode.coordinates.providers[0].kind, ProviderKind::Nominatim);
        assert_eq!(geocode.coordinates.providers[1].kind, ProviderKind::Ban);
    }

    #[test]
    fn test_unknown_preset() {
        assert!(Config::from_preset("cog1999").is_err());
    }

    #[test]
    fn test_source_file_format() {
        let file = SourceFile {
            file: "galichon/insee.utf8.csv".into(),
            delimiter: ';',
            encoding: Some("windows-1252".into()),
        };
        let format = file.format(None).unwrap();
        assert_eq!(format.delimiter, b';');
        assert_eq!(format.encoding.name(), "windows-1252");

        assert_eq!(
            file.resolve(Path::new("sources")),
            PathBuf::from("sources/galichon/insee.utf8.csv")
        );
    }

    #[test]
    fn test_source_file_rejects_wide_delimiter() {
        let file = SourceFile {
            file: "x.csv".into(),
            delimiter: '§',
            encoding: None,
        };
        assert!(file.format(None).is_err());
    }

    #[test]
    fn test_file_strategy_requires_overrides() {
        let mut config = Config::from_preset("cog2012").unwrap();
        config.coordinates.strategy = CoordinateStrategy::File;
        assert!(config.validate().is_err());
    }
}
