//! Export CSV (sans base de données) : un fichier par table

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use cog::Record;

use super::schema::{ColumnKind, TableDef};
use super::Destination;

/// Écrit chaque table dans `<output>/<table>.csv`, colonnes dans l'ordre du schéma
pub struct CsvDestination {
    output: PathBuf,
    writers: HashMap<&'static str, csv::Writer<File>>,
    keys: KeyTracker,
}

impl CsvDestination {
    pub fn new(output: &Path) -> Self {
        Self {
            output: output.to_path_buf(),
            writers: HashMap::new(),
            keys: KeyTracker::default(),
        }
    }

    /// Chemin du fichier d'une table
    pub fn table_path(&self, table: &str) -> PathBuf {
        self.output.join(format!("{}.csv", table))
    }
}

/// Valeurs d'une ligne dans l'ordre des colonnes de la table
///
/// Mêmes refus qu'en base : colonne inconnue, NULL dans une colonne
/// NOT NULL, texte plus long que le VARCHAR (compté en caractères).
pub fn ordered_values(table: &TableDef, record: &Record) -> Result<Vec<String>> {
    if let Some(unknown) = record.columns().find(|c| !table.has_column(c)) {
        anyhow::bail!("column \"{}\" of relation \"{}\" does not exist", unknown, table.name);
    }

    let mut values = Vec::with_capacity(table.columns.len());
    for column in &table.columns {
        let value = record.get(column.name);
        if !column.nullable && value.map_or(true, |v| v.is_null()) {
            anyhow::bail!(
                "null value in column \"{}\" of relation \"{}\" violates not-null constraint",
                column.name,
                table.name
            );
        }

        let text = value.map(|v| v.to_string()).unwrap_or_default();
        if let ColumnKind::Varchar(size) = column.kind {
            if text.chars().count() > usize::from(size) {
                anyhow::bail!(
                    "value too long for type character varying({}) in column \"{}\" of relation \"{}\"",
                    size,
                    column.name,
                    table.name
                );
            }
        }
        values.push(text);
    }
    Ok(values)
}

/// Clés primaires et contraintes d'unicité déjà vues, par contrainte
#[derive(Debug, Default)]
pub struct KeyTracker {
    seen: HashMap<String, HashSet<Vec<String>>>,
}

impl KeyTracker {
    /// Contraintes d'une table : (nom à la PostgreSQL, colonnes)
    fn constraints(table: &TableDef) -> Vec<(String, Vec<&'static str>)> {
        let mut constraints = vec![(format!("{}_pkey", table.name), table.primary_key.clone())];
        for column in table.columns.iter().filter(|c| c.unique) {
            constraints.push((format!("{}_{}_key", table.name, column.name), vec![column.name]));
        }
        for unique in &table.unique {
            constraints.push((format!("{}_{}_key", table.name, unique.join("_")), unique.clone()));
        }
        constraints
    }

    /// Vérifie puis enregistre les clés d'une ligne
    ///
    /// Un tuple contenant NULL ne viole pas une contrainte d'unicité.
    pub fn check(&mut self, table: &TableDef, record: &Record) -> Result<()> {
        let mut pending = Vec::new();
        for (name, columns) in Self::constraints(table) {
            let tuple: Option<Vec<String>> = columns
                .iter()
                .map(|c| record.get(c).filter(|v| !v.is_null()).map(|v| v.to_string()))
                .collect();
            let Some(tuple) = tuple else {
                continue;
            };

            if self.seen.get(&name).is_some_and(|seen| seen.contains(&tuple)) {
                anyhow::bail!(
                    "duplicate key value violates unique constraint \"{}\": Key ({})=({}) already exists",
                    name,
                    columns.join(", "),
                    tuple.join(", ")
                );
            }
            pending.push((name, tuple));
        }

        for (name, tuple) in pending {
            self.seen.entry(name).or_default().insert(tuple);
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }
}

#[async_trait]
impl Destination for CsvDestination {
    async fn reset_tables(&mut self, tables: &[TableDef]) -> Result<()> {
        std::fs::create_dir_all(&self.output)
            .with_context(|| format!("Failed to create {}", self.output.display()))?;

        self.writers.clear();
        self.keys.clear();
        for table in tables {
            let path = self.table_path(table.name);
            let mut writer = csv::Writer::from_path(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            writer.write_record(table.columns.iter().map(|c| c.name))?;
            self.writers.insert(table.name, writer);
            info!("Created {}", path.display());
        }
        Ok(())
    }

    async fn insert(&mut self, table: &TableDef, record: &Record) -> Result<()> {
        let values = ordered_values(table, record)?;
        self.keys.check(table, record)?;
        let writer = self
            .writers
            .get_mut(table.name)
            .with_context(|| format!("Table {} was not created", table.name))?;
        writer
            .write_record(&values)
            .with_context(|| format!("Failed to write row to {}.csv", table.name))?;
        Ok(())
    }

    async fn add_geography(&mut self, _table: &TableDef) -> Result<Option<u64>> {
        Ok(None)
    }

    async fn finish(&mut self) -> Result<()> {
        for (table, writer) in self.writers.iter_mut() {
            writer
                .flush()
                .with_context(|| format!("Failed to flush {}.csv", table))?;
        }
        Ok(())
    }
}
