//! Tests du pipeline complet sur les fixtures, sans base de données

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use geo::Point;
use serde_json::json;

use cog::{Coordinates, Record, Value};
use insee_pg::export::csv::ordered_values;
use insee_pg::export::schema::TableDef;
use insee_pg::geocode::GeocodeError;
use insee_pg::{
    Config, CoordinateStrategy, CsvDestination, Destination, Geocoder, GeocoderChain,
    ImportReport, ImportStatus, Pipeline,
};

fn fixtures() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../fixtures/cog")
}

fn config(strategy: CoordinateStrategy, communes: &str) -> Config {
    serde_json::from_value(json!({
        "sources": {
            "regions": { "file": "reg.csv" },
            "departements": { "file": "depts.csv" },
            "arrondissements": { "file": "arrond.csv" },
            "cantons": { "file": "canton.csv" },
            "communes": { "file": communes },
            "postal": { "file": "insee.csv", "delimiter": ";" },
            "coordinates": { "file": "coordinates.csv" },
            "overrides": { "file": "overrides.csv" }
        },
        "coordinates": { "strategy": strategy }
    }))
    .unwrap()
}

/// Destination en mémoire, vérifie les colonnes comme le ferait la base
#[derive(Default)]
struct MemoryDestination {
    tables: HashMap<&'static str, Vec<Record>>,
    geography_requested: bool,
    finished: bool,
}

impl MemoryDestination {
    fn rows(&self, table: &str) -> &[Record] {
        self.tables.get(table).map(Vec::as_slice).unwrap_or_default()
    }

    fn commune(&self, ci: &str) -> Option<&Record> {
        self.rows("communes").iter().find(|r| r.text("ci") == Some(ci))
    }
}

#[async_trait]
impl Destination for MemoryDestination {
    async fn reset_tables(&mut self, tables: &[TableDef]) -> Result<()> {
        self.tables = tables.iter().map(|t| (t.name, Vec::new())).collect();
        Ok(())
    }

    async fn insert(&mut self, table: &TableDef, record: &Record) -> Result<()> {
        ordered_values(table, record)?;
        let rows = self
            .tables
            .get_mut(table.name)
            .ok_or_else(|| anyhow::anyhow!("relation \"{}\" does not exist", table.name))?;
        rows.push(record.clone());
        Ok(())
    }

    async fn add_geography(&mut self, table: &TableDef) -> Result<Option<u64>> {
        if !(table.has_column("longitude") && table.has_column("latitude")) {
            return Ok(None);
        }
        self.geography_requested = true;
        let filled = self
            .rows(table.name)
            .iter()
            .filter(|r| r.get("latitude").is_some_and(|v| !v.is_null()))
            .count();
        Ok(Some(filled as u64))
    }

    async fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}

/// Géocodeur de test : réponses fixes par requête, requêtes enregistrées
struct Recording {
    answers: HashMap<String, Coordinates>,
    queries: Arc<Mutex<Vec<String>>>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Geocoder for Recording {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn resolve(&self, query: &str) -> Result<Option<Coordinates>, GeocodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.to_string());
        Ok(self.answers.get(query).copied())
    }
}

fn recording(answers: &[(&str, Coordinates)]) -> (GeocoderChain, Arc<Mutex<Vec<String>>>, Arc<AtomicUsize>) {
    let queries = Arc::new(Mutex::new(Vec::new()));
    let calls = Arc::new(AtomicUsize::new(0));
    let geocoder = Recording {
        answers: answers.iter().map(|(q, p)| (q.to_string(), *p)).collect(),
        queries: Arc::clone(&queries),
        calls: Arc::clone(&calls),
    };
    (GeocoderChain::new(vec![Box::new(geocoder)]), queries, calls)
}

fn coordinates_of(record: &Record) -> (Option<f64>, Option<f64>) {
    let float = |column: &str| match record.get(column) {
        Some(Value::Float(value)) => *value,
        _ => None,
    };
    (float("longitude"), float("latitude"))
}

#[tokio::test]
async fn test_strategy_none() {
    let config = config(CoordinateStrategy::None, "comsimp.csv");
    let mut dest = MemoryDestination::default();
    let mut report = ImportReport::new("test", CoordinateStrategy::None);

    Pipeline::new(&config, &fixtures())
        .run(&mut dest, &mut report)
        .await
        .unwrap();

    assert_eq!(dest.rows("regions").len(), 3);
    assert_eq!(dest.rows("departements").len(), 4);
    assert_eq!(dest.rows("arrondissements").len(), 3);
    assert_eq!(dest.rows("cantons").len(), 3);
    assert_eq!(dest.rows("communes").len(), 4);

    // Premier code postal conservé pour Paris
    let paris = dest.commune("75056").unwrap();
    assert_eq!(paris.text("cp"), Some("75001"));
    assert!(paris.get("longitude").is_none());

    // Corse : dep stocké tel quel, code postal trouvé via la clé 20004
    let ajaccio = dest.commune("2A004").unwrap();
    assert_eq!(ajaccio.text("dep"), Some("2A"));
    assert_eq!(ajaccio.text("cp"), Some("20000"));

    assert_eq!(report.inserted("communes"), 4);
    assert_eq!(report.geography_rows, None);
    assert!(dest.finished);

    // Doublon, identifiant vide, code postal vide dans insee.csv
    assert_eq!(report.warnings.len(), 3);
    report.finalize();
    assert_eq!(report.status, ImportStatus::PartialSuccess);
}

#[tokio::test]
async fn test_strategy_file() {
    let config = config(CoordinateStrategy::File, "comsimp.csv");
    let mut dest = MemoryDestination::default();
    let mut report = ImportReport::new("test", CoordinateStrategy::File);

    Pipeline::new(&config, &fixtures())
        .run(&mut dest, &mut report)
        .await
        .unwrap();

    assert_eq!(dest.rows("communes").len(), 4);

    let first = dest.commune("01001").unwrap();
    assert_eq!(coordinates_of(first), (Some(5.33), Some(46.03)));
    assert_eq!(first.text("cp"), Some("01400"));

    // Pas de cp dans la surcharge : code postal de la correspondance
    let varey = dest.commune("01002").unwrap();
    assert_eq!(varey.text("cp"), Some("01640"));
    assert_eq!(coordinates_of(varey), (Some(5.42), Some(45.91)));

    assert_eq!(report.coordinates.overrides, 4);
    assert_eq!(report.geography_rows, Some(4));
    assert!(dest.geography_requested);
}

#[tokio::test]
async fn test_strategy_geocode_local_hit_skips_geocoder() {
    let config = config(CoordinateStrategy::Geocode, "comsimp.csv");
    let (chain, queries, calls) = recording(&[(
        "L'Abergement-de-Varey, Ain, France",
        Point::new(5.4265, 45.9136),
    )]);
    let mut dest = MemoryDestination::default();
    let mut report = ImportReport::new("test", CoordinateStrategy::Geocode);

    Pipeline::new(&config, &fixtures())
        .with_geocoder(&chain)
        .run(&mut dest, &mut report)
        .await
        .unwrap();

    let paris = dest.commune("75056").unwrap();
    assert_eq!(coordinates_of(paris), (Some(2.3522), Some(48.8566)));

    // Seule la commune absente du fichier local est géocodée
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        queries.lock().unwrap().as_slice(),
        ["L'Abergement-de-Varey, Ain, France".to_string()]
    );

    let varey = dest.commune("01002").unwrap();
    assert_eq!(coordinates_of(varey), (Some(5.4265), Some(45.9136)));

    assert_eq!(report.coordinates.local, 3);
    assert_eq!(report.coordinates.geocoded.get("recording"), Some(&1));
    assert_eq!(report.coordinates.missing, 0);
}

#[tokio::test]
async fn test_strategy_geocode_all_empty_keeps_going() {
    let config = config(CoordinateStrategy::Geocode, "comsimp.csv");
    let (chain, _, calls) = recording(&[]);
    let mut dest = MemoryDestination::default();
    let mut report = ImportReport::new("test", CoordinateStrategy::Geocode);

    Pipeline::new(&config, &fixtures())
        .with_geocoder(&chain)
        .run(&mut dest, &mut report)
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(dest.rows("communes").len(), 4);

    let varey = dest.commune("01002").unwrap();
    assert_eq!(coordinates_of(varey), (None, None));

    assert_eq!(report.coordinates.missing, 1);
    assert_eq!(report.geography_rows, Some(3));
    assert!(report
        .warnings
        .iter()
        .any(|w| w.message.contains("01002") && w.message.contains("Ain, France")));
}

#[tokio::test]
async fn test_missing_postal_code_stops_import() {
    let config = config(CoordinateStrategy::None, "comsimp_missing_cp.csv");
    let mut dest = MemoryDestination::default();
    let mut report = ImportReport::new("test", CoordinateStrategy::None);

    let err = Pipeline::new(&config, &fixtures())
        .run(&mut dest, &mut report)
        .await
        .unwrap_err();
    assert!(format!("{:#}", err).contains("Missing zipcode for 01099"));

    // Rien n'est écrit après la ligne fautive
    let communes: Vec<_> = dest.rows("communes").iter().filter_map(|r| r.text("ci")).collect();
    assert_eq!(communes, vec!["01001"]);
    assert!(!dest.finished);

    let error = report.error.as_ref().unwrap();
    assert_eq!(error.table.as_deref(), Some("communes"));
    assert_eq!(error.line, Some(2));
    report.finalize();
    assert_eq!(report.status, ImportStatus::Failed);
}

#[tokio::test]
async fn test_missing_source_file_is_fatal() {
    let config = config(CoordinateStrategy::None, "comsimp.csv");
    let mut dest = MemoryDestination::default();
    let mut report = ImportReport::new("test", CoordinateStrategy::None);

    let result = Pipeline::new(&config, &fixtures().join("nowhere"))
        .run(&mut dest, &mut report)
        .await;

    assert!(result.is_err());
    assert_eq!(report.error.as_ref().and_then(|e| e.table.as_deref()), Some("regions"));
    assert!(dest.rows("regions").is_empty());
}

#[tokio::test]
async fn test_extra_field_in_reference_file_is_fatal() {
    let mut config = config(CoordinateStrategy::None, "comsimp.csv");
    config.sources.regions.file = "reg_extra_field.csv".into();
    let mut dest = MemoryDestination::default();
    let mut report = ImportReport::new("test", CoordinateStrategy::None);

    let err = Pipeline::new(&config, &fixtures())
        .run(&mut dest, &mut report)
        .await
        .unwrap_err();
    assert!(format!("{:#}", err).contains("expected 5 fields, found 6"));

    // Seule la ligne qui précède est chargée
    assert_eq!(dest.rows("regions").len(), 1);
    assert!(dest.rows("communes").is_empty());

    let error = report.error.as_ref().unwrap();
    assert_eq!(error.table.as_deref(), Some("regions"));
    assert_eq!(error.line, Some(2));
}

#[tokio::test]
async fn test_csv_export_rejects_duplicate_commune() {
    let output = std::env::temp_dir().join(format!("insee-pg-duplicate-{}", std::process::id()));
    let config = config(CoordinateStrategy::None, "comsimp_duplicate.csv");
    let mut dest = CsvDestination::new(&output);
    let mut report = ImportReport::new("test", CoordinateStrategy::None);

    let err = Pipeline::new(&config, &fixtures())
        .run(&mut dest, &mut report)
        .await
        .unwrap_err();
    assert!(format!("{:#}", err).contains("communes_pkey"));

    let error = report.error.as_ref().unwrap();
    assert_eq!(error.table.as_deref(), Some("communes"));
    assert_eq!(error.line, Some(3));
    assert_eq!(report.inserted("communes"), 2);

    std::fs::remove_dir_all(&output).ok();
}

#[tokio::test]
async fn test_csv_export_writes_every_table() {
    let output = std::env::temp_dir().join(format!("insee-pg-export-{}", std::process::id()));
    let config = config(CoordinateStrategy::File, "comsimp.csv");
    let mut dest = CsvDestination::new(&output);
    let mut report = ImportReport::new("test", CoordinateStrategy::File);

    Pipeline::new(&config, &fixtures())
        .run(&mut dest, &mut report)
        .await
        .unwrap();

    let communes = std::fs::read_to_string(dest.table_path("communes")).unwrap();
    let mut lines = communes.lines();
    assert_eq!(
        lines.next(),
        Some("cdc,cheflieu,reg,dep,com,ar,ct,tncc,artmaj,ncc,artmin,nccenr,ci,cp,longitude,latitude")
    );
    assert_eq!(lines.count(), 4);
    assert!(dest.table_path("cantons").exists());

    std::fs::remove_dir_all(&output).ok();
}
