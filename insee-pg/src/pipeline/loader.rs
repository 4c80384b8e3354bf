//! Chargement des tables de référence (régions, départements,
//! arrondissements, cantons) telles quelles

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{error, info};

use cog::{CogError, Record, SourceFormat, SourceReader};

use crate::export::schema::TableDef;
use crate::export::Destination;
use crate::report::{ImportError, ImportReport};

/// Charge un fichier dans une table, une ligne insérée par ligne lue
///
/// `inspect` voit chaque ligne insérée. Toute erreur est journalisée avec
/// le fichier, le numéro de ligne, la ligne brute et la ligne transformée,
/// puis remontée.
pub async fn load_table<D, F>(
    dest: &mut D,
    table: &TableDef,
    path: &Path,
    format: SourceFormat,
    report: &mut ImportReport,
    mut inspect: F,
) -> Result<usize>
where
    D: Destination + ?Sized,
    F: FnMut(&Record),
{
    let reader = SourceReader::open(path, format).map_err(|e| {
        error!(file = %path.display(), table = table.name, error = %e, "Cannot open source");
        fatal(report, table, path, None, &e.to_string());
        e
    })?;

    let mut inserted = 0;
    for row in reader {
        let row = row.map_err(|e| {
            error!(file = %path.display(), table = table.name, error = %e, "Cannot read row");
            let line = match &e {
                CogError::MalformedRow { line, .. } => Some(*line),
                _ => None,
            };
            fatal(report, table, path, line, &e.to_string());
            e
        })?;

        if let Err(e) = dest.insert(table, &row.record).await {
            error!(
                file = %path.display(),
                row = row.line,
                raw = ?row.raw,
                record = ?row.record,
                error = %e,
                "Failed to insert row"
            );
            fatal(report, table, path, Some(row.line), &format!("{:#}", e));
            return Err(e).with_context(|| {
                format!("Row {} of {} into {}", row.line, path.display(), table.name)
            });
        }

        inspect(&row.record);
        report.record_insert(table.name);
        inserted += 1;
    }

    info!(table = table.name, rows = inserted, file = %path.display(), "Table loaded");
    Ok(inserted)
}

pub(crate) fn fatal(
    report: &mut ImportReport,
    table: &TableDef,
    path: &Path,
    line: Option<u64>,
    message: &str,
) {
    report.record_fatal(ImportError {
        table: Some(table.name.to_string()),
        source: Some(path.display().to_string()),
        line,
        message: message.to_string(),
    });
}
