//! # insee-pg
//!
//! Import du Code Officiel Géographique (COG) de l'INSEE vers PostGIS,
//! enrichi des codes postaux et des coordonnées des communes.
//!
//! ## Features
//!
//! - Régions, départements, arrondissements, cantons et communes
//! - Code postal par commune (fichier de correspondance INSEE ↔ code postal)
//! - Coordonnées selon la stratégie : aucune, fichier de surcharge, ou
//!   fichier local puis géocodage distant (Nominatim, BAN)
//! - Colonne `geography(Point, 4326)` sur les communes
//! - Export CSV sans base de données
//!
//! ## Usage CLI
//!
//! ```bash
//! # Import vers PostGIS (commande par défaut)
//! insee-pg --sources ./sources --config cog2012-geocode
//!
//! # Export CSV (sans base de données)
//! insee-pg to-csv --sources ./sources --output ./out/
//! ```

pub mod config;
pub mod export;
pub mod geocode;
pub mod pipeline;
pub mod report;

pub use config::{Config, CoordinateStrategy};
pub use export::pool::{create_pool, DatabaseConfig};
pub use export::{CsvDestination, Destination, PgDestination};
pub use geocode::{Geocoder, GeocoderChain};
pub use pipeline::Pipeline;
pub use report::{ImportReport, ImportStatus};
