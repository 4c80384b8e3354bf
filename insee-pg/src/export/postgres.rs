//! Export vers PostgreSQL/PostGIS

use anyhow::{Context, Result};
use async_trait::async_trait;
use deadpool_postgres::Object;
use tokio_postgres::types::ToSql;
use tracing::{debug, info, warn};

use cog::{Record, Value};

use super::schema::TableDef;
use super::Destination;

/// SRID des points géographiques (WGS84)
pub const GEOGRAPHY_SRID: u32 = 4326;

/// Nom de la colonne géographique ajoutée aux communes
pub const GEOGRAPHY_COLUMN: &str = "geog";

/// Destination PostgreSQL : une connexion, utilisée séquentiellement
pub struct PgDestination {
    client: Object,
    schema: String,
}

impl PgDestination {
    pub fn new(client: Object, schema: &str) -> Self {
        Self {
            client,
            schema: schema.to_string(),
        }
    }

    /// Crée le schéma cible s'il n'existe pas
    async fn ensure_schema(&self) -> Result<()> {
        self.client
            .execute(&format!("CREATE SCHEMA IF NOT EXISTS {}", self.schema), &[])
            .await
            .with_context(|| format!("Failed to create schema {}", self.schema))?;
        Ok(())
    }

    /// Active PostGIS si nécessaire (peut nécessiter des droits superuser).
    /// Si l'extension existe déjà mais que l'utilisateur ne peut pas la (re)créer,
    /// on dégrade gracieusement.
    async fn ensure_postgis(&self) -> Result<()> {
        match self
            .client
            .execute("CREATE EXTENSION IF NOT EXISTS postgis", &[])
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!("CREATE EXTENSION postgis failed (will check if already installed): {e}");
                let exists = self
                    .client
                    .query_opt("SELECT 1 FROM pg_extension WHERE extname = 'postgis'", &[])
                    .await
                    .context("Failed to check pg_extension")?
                    .is_some();
                if exists {
                    Ok(())
                } else {
                    Err(anyhow::anyhow!(
                        "PostGIS extension is not installed and could not be created: {e}"
                    ))
                }
            }
        }
    }
}

/// Requête INSERT paramétrée pour les colonnes d'une ligne
pub fn insert_sql(qualified_table: &str, columns: &[&str]) -> String {
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${}", i)).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        qualified_table,
        columns.join(", "),
        placeholders.join(", ")
    )
}

/// Requête de remplissage de la colonne géographique
pub fn geography_update_sql(qualified_table: &str) -> String {
    format!(
        "UPDATE {table} SET {column} = ST_SetSRID(ST_MakePoint(longitude, latitude), {srid})::geography \
         WHERE latitude IS NOT NULL",
        table = qualified_table,
        column = GEOGRAPHY_COLUMN,
        srid = GEOGRAPHY_SRID
    )
}

fn to_sql_value(value: &Value) -> Box<dyn ToSql + Sync + Send> {
    match value {
        Value::Text(text) => Box::new(text.clone()),
        Value::Float(float) => Box::new(*float),
    }
}

#[async_trait]
impl Destination for PgDestination {
    async fn reset_tables(&mut self, tables: &[TableDef]) -> Result<()> {
        self.ensure_schema().await?;

        if tables.iter().any(|t| t.has_column("latitude")) {
            self.ensure_postgis().await?;
        }

        for table in tables.iter().rev() {
            self.client
                .execute(&table.drop_sql(&self.schema), &[])
                .await
                .with_context(|| format!("Failed to drop table {}", table.qualified(&self.schema)))?;
        }

        for table in tables {
            self.client
                .execute(&table.create_sql(&self.schema), &[])
                .await
                .with_context(|| format!("Failed to create table {}", table.qualified(&self.schema)))?;
            info!("Created table {}", table.qualified(&self.schema));
        }

        Ok(())
    }

    async fn insert(&mut self, table: &TableDef, record: &Record) -> Result<()> {
        let columns: Vec<&str> = record.columns().collect();
        let sql = insert_sql(&table.qualified(&self.schema), &columns);

        let stmt = self
            .client
            .prepare_cached(&sql)
            .await
            .with_context(|| format!("Failed to prepare insert into {}", table.name))?;

        let values: Vec<Box<dyn ToSql + Sync + Send>> =
            record.iter().map(|(_, value)| to_sql_value(value)).collect();
        let refs: Vec<&(dyn ToSql + Sync)> = values
            .iter()
            .map(|v| v.as_ref() as &(dyn ToSql + Sync))
            .collect();

        self.client
            .execute(&stmt, &refs)
            .await
            .with_context(|| format!("Failed to insert into {}", table.qualified(&self.schema)))?;
        Ok(())
    }

    async fn add_geography(&mut self, table: &TableDef) -> Result<Option<u64>> {
        if !(table.has_column("longitude") && table.has_column("latitude")) {
            debug!(table = table.name, "No longitude/latitude columns, skipping geography");
            return Ok(None);
        }

        let qualified = table.qualified(&self.schema);
        self.client
            .execute(
                &format!(
                    "ALTER TABLE {} ADD COLUMN IF NOT EXISTS {} geography(Point, {})",
                    qualified, GEOGRAPHY_COLUMN, GEOGRAPHY_SRID
                ),
                &[],
            )
            .await
            .with_context(|| format!("Failed to add geography column to {}", qualified))?;

        let updated = self
            .client
            .execute(&geography_update_sql(&qualified), &[])
            .await
            .with_context(|| format!("Failed to fill geography column of {}", qualified))?;

        info!(table = %qualified, rows = updated, "Geography column populated");
        Ok(Some(updated))
    }

    async fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_sql() {
        assert_eq!(
            insert_sql("public.regions", &["region", "cheflieu", "tncc"]),
            "INSERT INTO public.regions (region, cheflieu, tncc) VALUES ($1, $2, $3)"
        );
    }

    #[test]
    fn test_geography_update_sql() {
        let sql = geography_update_sql("public.communes");
        assert!(sql.starts_with("UPDATE public.communes SET geog = "));
        assert!(sql.contains("ST_SetSRID(ST_MakePoint(longitude, latitude), 4326)::geography"));
        assert!(sql.ends_with("WHERE latitude IS NOT NULL"));
    }
}
