//! Tables de correspondance construites depuis les fichiers annexes
//!
//! - correspondance INSEE ↔ code postal (séparateur `;`, en-têtes `insee`,
//!   `codepos`, `departement` optionnel)
//! - coordonnées (séparateur `,`, sans en-tête, exactement 3 champs :
//!   identifiant, longitude, latitude)
//! - surcharge directe par `ci` (en-têtes `ci`, `cp`, `longitude`, `latitude`)
//!
//! Une clé vide, invalide ou en double produit un [`LookupWarning`] et la
//! ligne est ignorée : la première occurrence d'une clé est conservée.
//! Les tables sont immuables une fois construites.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use geo::Point;
use tracing::{info, warn};

use crate::code::{corsica_key, normalize_code, CODE_LEN};
use crate::reader::{SourceFormat, SourceReader};
use crate::types::{Coordinates, SourceRow};
use crate::CogError;

/// Nature d'un problème non fatal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// Identifiant absent ou vide
    EmptyKey,
    /// Code postal absent ou vide
    EmptyValue,
    /// Code non numérique ou de mauvaise longueur
    InvalidCode,
    /// Longitude/latitude illisible ou hors bornes
    InvalidCoordinate,
    /// Clé déjà définie (la première valeur est conservée)
    Duplicate,
}

/// Problème non fatal rencontré pendant la construction d'une table
#[derive(Debug, Clone, PartialEq)]
pub struct LookupWarning {
    pub path: PathBuf,
    pub line: u64,
    pub kind: WarningKind,
    pub message: String,
}

impl fmt::Display for LookupWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.path.display(), self.line, self.message)
    }
}

/// Issue d'une ligne : avertissement (on continue) ou erreur fatale
#[derive(Debug)]
pub enum RowIssue {
    Warning(WarningKind, String),
    Fatal(CogError),
}

/// Table construite avec ses avertissements
#[derive(Debug)]
pub struct Built<T> {
    pub lookup: T,
    pub warnings: Vec<LookupWarning>,
}

/// Correspondance INSEE -> code postal
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostalLookup {
    postal_code_by_ci: HashMap<String, String>,
    region_by_ci: HashMap<String, String>,
}

impl PostalLookup {
    /// Code postal d'une commune (clé normalisée Corse)
    pub fn postal_code(&self, ci: &str) -> Option<&str> {
        self.postal_code_by_ci
            .get(&corsica_key(ci))
            .map(String::as_str)
    }

    /// Libellé département/région associé à la commune dans le fichier de correspondance
    pub fn region(&self, ci: &str) -> Option<&str> {
        self.region_by_ci.get(&corsica_key(ci)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.postal_code_by_ci.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postal_code_by_ci.is_empty()
    }
}

/// Coordonnées par commune
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoordinateLookup {
    coordinates_by_ci: HashMap<String, Coordinates>,
}

impl CoordinateLookup {
    pub fn coordinates(&self, ci: &str) -> Option<Coordinates> {
        self.coordinates_by_ci.get(&corsica_key(ci)).copied()
    }

    pub fn len(&self) -> usize {
        self.coordinates_by_ci.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates_by_ci.is_empty()
    }
}

/// Entrée du fichier de surcharge
#[derive(Debug, Clone, PartialEq)]
pub struct OverrideEntry {
    pub postal_code: Option<String>,
    pub coordinates: Coordinates,
}

/// Surcharge directe code postal + coordonnées, par `ci` exact
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverrideLookup {
    by_ci: HashMap<String, OverrideEntry>,
}

impl OverrideLookup {
    pub fn get(&self, ci: &str) -> Option<&OverrideEntry> {
        self.by_ci.get(ci)
    }

    pub fn len(&self) -> usize {
        self.by_ci.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_ci.is_empty()
    }
}

/// Valeur conservée, telle qu'affichée dans l'avertissement de doublon
trait KeptValue {
    fn describe(&self) -> String;
}

impl KeptValue for String {
    fn describe(&self) -> String {
        self.clone()
    }
}

impl KeptValue for Coordinates {
    fn describe(&self) -> String {
        format!("({}, {})", self.x(), self.y())
    }
}

impl KeptValue for OverrideEntry {
    fn describe(&self) -> String {
        match &self.postal_code {
            Some(cp) => format!("{} {}", cp, self.coordinates.describe()),
            None => self.coordinates.describe(),
        }
    }
}

/// Accumulateur commun aux trois constructeurs
struct Collector<'a> {
    path: &'a Path,
    warnings: Vec<LookupWarning>,
}

impl<'a> Collector<'a> {
    fn new(path: &'a Path) -> Self {
        Self {
            path,
            warnings: Vec::new(),
        }
    }

    fn warn(&mut self, line: u64, kind: WarningKind, message: String) {
        warn!(path = %self.path.display(), line, kind = ?kind, "{}", message);
        self.warnings.push(LookupWarning {
            path: self.path.to_path_buf(),
            line,
            kind,
            message,
        });
    }

    /// Applique la politique « premier gagnant »
    fn insert_first_wins<V: KeptValue>(
        &mut self,
        map: &mut HashMap<String, V>,
        line: u64,
        key: String,
        value: V,
    ) -> bool {
        match map.entry(key) {
            Entry::Occupied(existing) => {
                let message = format!(
                    "row #{} key {} is already defined to {}",
                    line,
                    existing.key(),
                    existing.get().describe()
                );
                self.warn(line, WarningKind::Duplicate, message);
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        }
    }

    /// Trie l'issue d'une ligne : warning consigné, fatal propagé
    fn handle<T>(&mut self, line: u64, result: Result<T, RowIssue>) -> Result<Option<T>, CogError> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(RowIssue::Warning(kind, message)) => {
                self.warn(line, kind, message);
                Ok(None)
            }
            Err(RowIssue::Fatal(e)) => Err(e),
        }
    }
}

/// Entrée validée du fichier de correspondance postale
#[derive(Debug, Clone, PartialEq)]
pub struct PostalEntry {
    pub ci: String,
    pub postal_code: String,
    pub region: Option<String>,
}

/// Valide une ligne du fichier de correspondance INSEE ↔ code postal
pub fn parse_postal_row(row: &SourceRow) -> Result<PostalEntry, RowIssue> {
    let line = row.line;
    let insee = row.record.text("insee").map(str::trim).unwrap_or_default();
    if insee.is_empty() {
        return Err(RowIssue::Warning(
            WarningKind::EmptyKey,
            format!("insee row #{} is empty", line),
        ));
    }

    let codepos = row.record.text("codepos").map(str::trim).unwrap_or_default();
    if codepos.is_empty() {
        return Err(RowIssue::Warning(
            WarningKind::EmptyValue,
            format!("codepos row #{} is empty", line),
        ));
    }

    let ci = normalize_code(insee).ok_or_else(|| {
        RowIssue::Warning(
            WarningKind::InvalidCode,
            format!("insee row #{} is not a valid code: {:?}", line, insee),
        )
    })?;
    let postal_code = normalize_code(codepos).ok_or_else(|| {
        RowIssue::Warning(
            WarningKind::InvalidCode,
            format!("codepos row #{} is not a valid code: {:?}", line, codepos),
        )
    })?;

    Ok(PostalEntry {
        ci,
        postal_code,
        region: row.record.text("departement").map(|s| s.trim().to_string()),
    })
}

/// Valide une ligne du fichier de coordonnées (3 champs, sans en-tête)
///
/// Un nombre de champs différent de 3 est fatal.
pub fn parse_coordinate_row(path: &Path, row: &SourceRow) -> Result<(String, Coordinates), RowIssue> {
    let line = row.line;
    if row.raw.len() != 3 {
        return Err(RowIssue::Fatal(CogError::malformed(
            path,
            line,
            format!("expected 3 fields, found {}: {:?}", row.raw.len(), row.raw),
        )));
    }

    let ci = normalize_code(&row.raw[0]).ok_or_else(|| {
        RowIssue::Warning(
            WarningKind::InvalidCode,
            format!("insee row #{} is not a valid code: {:?}", line, row.raw[0]),
        )
    })?;

    let coordinates = parse_coordinates(&row.raw[1], &row.raw[2]).ok_or_else(|| {
        RowIssue::Warning(
            WarningKind::InvalidCoordinate,
            format!(
                "coordinates row #{} are invalid: ({:?}, {:?})",
                line, row.raw[1], row.raw[2]
            ),
        )
    })?;

    Ok((ci, coordinates))
}

/// Valide une ligne du fichier de surcharge
pub fn parse_override_row(row: &SourceRow) -> Result<(String, OverrideEntry), RowIssue> {
    let line = row.line;
    let ci = row.record.text("ci").map(str::trim).unwrap_or_default();
    if ci.is_empty() {
        return Err(RowIssue::Warning(
            WarningKind::EmptyKey,
            format!("ci row #{} is empty", line),
        ));
    }
    if ci.len() != CODE_LEN {
        return Err(RowIssue::Warning(
            WarningKind::InvalidCode,
            format!("ci row #{} is not a valid code: {:?}", line, ci),
        ));
    }

    let postal_code = row.record.text("cp").and_then(normalize_code);

    let longitude = row.record.text("longitude").unwrap_or_default();
    let latitude = row.record.text("latitude").unwrap_or_default();
    let coordinates = parse_coordinates(longitude, latitude).ok_or_else(|| {
        RowIssue::Warning(
            WarningKind::InvalidCoordinate,
            format!(
                "coordinates row #{} are invalid: ({:?}, {:?})",
                line, longitude, latitude
            ),
        )
    })?;

    Ok((
        ci.to_uppercase(),
        OverrideEntry {
            postal_code,
            coordinates,
        },
    ))
}

/// Parse une paire longitude/latitude en degrés
pub fn parse_coordinates(longitude: &str, latitude: &str) -> Option<Coordinates> {
    let x: f64 = fast_float::parse(longitude.trim()).ok()?;
    let y: f64 = fast_float::parse(latitude.trim()).ok()?;

    if !(-180.0..=180.0).contains(&x) || !(-90.0..=90.0).contains(&y) {
        return None;
    }
    Some(Point::new(x, y))
}

/// Construit la correspondance INSEE -> code postal
pub fn build_postal_lookup(path: &Path, format: SourceFormat) -> Result<Built<PostalLookup>, CogError> {
    let reader = SourceReader::open(path, format)?;
    reader.require_column("insee")?;
    reader.require_column("codepos")?;

    let mut collector = Collector::new(path);
    let mut lookup = PostalLookup::default();

    for row in reader {
        let row = row?;
        let Some(entry) = collector.handle(row.line, parse_postal_row(&row))? else {
            continue;
        };

        let kept = collector.insert_first_wins(
            &mut lookup.postal_code_by_ci,
            row.line,
            entry.ci.clone(),
            entry.postal_code,
        );
        if kept {
            if let Some(region) = entry.region {
                lookup.region_by_ci.insert(entry.ci, region);
            }
        }
    }

    info!(
        path = %path.display(),
        entries = lookup.len(),
        warnings = collector.warnings.len(),
        "Postal code lookup built"
    );

    Ok(Built {
        lookup,
        warnings: collector.warnings,
    })
}

/// Construit la table des coordonnées par commune
pub fn build_coordinate_lookup(
    path: &Path,
    format: SourceFormat,
) -> Result<Built<CoordinateLookup>, CogError> {
    let reader = SourceReader::open(path, format.without_headers())?;

    let mut collector = Collector::new(path);
    let mut lookup = CoordinateLookup::default();

    for row in reader {
        let row = row?;
        if let Some((ci, coordinates)) = collector.handle(row.line, parse_coordinate_row(path, &row))? {
            collector.insert_first_wins(&mut lookup.coordinates_by_ci, row.line, ci, coordinates);
        }
    }

    info!(
        path = %path.display(),
        entries = lookup.len(),
        warnings = collector.warnings.len(),
        "Coordinate lookup built"
    );

    Ok(Built {
        lookup,
        warnings: collector.warnings,
    })
}

/// Construit la table de surcharge par `ci`
pub fn build_override_lookup(
    path: &Path,
    format: SourceFormat,
) -> Result<Built<OverrideLookup>, CogError> {
    let reader = SourceReader::open(path, format)?;
    reader.require_column("ci")?;
    reader.require_column("longitude")?;
    reader.require_column("latitude")?;

    let mut collector = Collector::new(path);
    let mut lookup = OverrideLookup::default();

    for row in reader {
        let row = row?;
        if let Some((ci, entry)) = collector.handle(row.line, parse_override_row(&row))? {
            collector.insert_first_wins(&mut lookup.by_ci, row.line, ci, entry);
        }
    }

    info!(
        path = %path.display(),
        entries = lookup.len(),
        warnings = collector.warnings.len(),
        "Override lookup built"
    );

    Ok(Built {
        lookup,
        warnings: collector.warnings,
    })
}
