//! Destinations d'export (PostgreSQL, CSV)

pub mod csv;
pub mod pool;
pub mod postgres;
pub mod schema;

use anyhow::Result;
use async_trait::async_trait;
use cog::Record;

use schema::TableDef;

pub use self::csv::CsvDestination;
pub use postgres::PgDestination;

/// Cible d'écriture du pipeline
///
/// Les appels sont strictement séquentiels : tables recréées, lignes
/// insérées une à une, puis post-traitement géographique.
#[async_trait]
pub trait Destination: Send {
    /// Supprime puis recrée les tables (perte des données existantes)
    async fn reset_tables(&mut self, tables: &[TableDef]) -> Result<()>;

    /// Insère une ligne ; une violation de contrainte est une erreur
    async fn insert(&mut self, table: &TableDef, record: &Record) -> Result<()>;

    /// Ajoute la colonne géographique si longitude/latitude existent.
    /// Retourne le nombre de lignes renseignées, `None` si non applicable.
    async fn add_geography(&mut self, table: &TableDef) -> Result<Option<u64>>;

    /// Termine l'export (flush des fichiers, etc.)
    async fn finish(&mut self) -> Result<()>;
}
