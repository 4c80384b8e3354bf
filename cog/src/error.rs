//! Types d'erreurs pour le crate cog

use std::path::PathBuf;

use thiserror::Error;

/// Erreurs fatales pouvant survenir lors de la lecture des fichiers COG
#[derive(Debug, Error)]
pub enum CogError {
    /// Erreur d'I/O lors de la lecture d'un fichier source
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Erreur du lecteur CSV
    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Encodage inconnu ou séquences invalides
    #[error("Encoding error in {path}: {reason}")]
    Encoding { path: PathBuf, reason: String },

    /// Colonne obligatoire absente de l'en-tête
    #[error("Missing column `{column}` in {path}")]
    MissingColumn { path: PathBuf, column: String },

    /// Ligne mal formée (nombre de champs, etc.)
    #[error("Malformed row {line} in {path}: {reason}")]
    MalformedRow {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    /// `dep`/`com` ne permettent pas de former un identifiant sur 5 caractères
    #[error("Cannot derive commune identifier from dep {dep:?} and com {com:?}")]
    InvalidCommuneCode { dep: String, com: String },

    /// Commune sans code postal résolu
    #[error("Missing zipcode for {ci}")]
    MissingPostalCode { ci: String },

    /// Commune sans coordonnées alors que le fichier de surcharge est obligatoire
    #[error("Missing coordinates for {ci}")]
    MissingCoordinates { ci: String },
}

impl CogError {
    /// Crée une erreur de ligne mal formée avec contexte
    pub fn malformed(path: impl Into<PathBuf>, line: u64, reason: impl Into<String>) -> Self {
        Self::MalformedRow {
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }

    /// Crée une erreur d'I/O avec le chemin concerné
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
