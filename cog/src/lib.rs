//! # cog
//!
//! Lecture des fichiers du Code Officiel Géographique (COG) de l'INSEE :
//! régions, départements, arrondissements, cantons et communes, ainsi que
//! les fichiers annexes (codes postaux, coordonnées).
//!
//! ## Features
//!
//! - Décodage UTF-8 / Windows-1252 / Latin-9 avec `encoding_rs`
//! - En-têtes normalisés (insensibles à la casse) vers des noms de colonnes
//! - Identifiant commune `ci` et normalisation des codes corses (`2A`/`2B`)
//! - Tables de correspondance immuables, politique « premier gagnant »
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cog::{build_postal_lookup, SourceFormat};
//! use std::path::Path;
//!
//! let built = build_postal_lookup(Path::new("insee.csv"), SourceFormat::default().with_delimiter(b';'))?;
//! println!("{} codes postaux, {} warnings", built.lookup.len(), built.warnings.len());
//! assert_eq!(built.lookup.postal_code("2A004"), Some("20000"));
//! ```

pub mod code;
pub mod commune;
pub mod error;
pub mod lookup;
pub mod reader;
pub mod types;

pub use code::{corsica_key, derive_ci, normalize_code};
pub use commune::CommuneFields;
pub use error::CogError;
pub use lookup::{
    build_coordinate_lookup, build_override_lookup, build_postal_lookup, Built,
    CoordinateLookup, LookupWarning, OverrideEntry, OverrideLookup, PostalLookup, WarningKind,
};
pub use reader::{encoding_for_label, SourceFormat, SourceReader};
pub use types::{Coordinates, Record, SourceRow, Value};
