//! Types de données pour le crate cog

use std::fmt;

use geo::Point;

/// Coordonnées d'une commune en degrés WGS84 (x = longitude, y = latitude)
pub type Coordinates = Point<f64>;

/// Valeur d'une colonne destinée à la base
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Texte, `None` pour NULL (champ CSV vide)
    Text(Option<String>),

    /// Flottant double précision, `None` pour NULL
    Float(Option<f64>),
}

impl Value {
    /// Vrai si la valeur est NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Text(None) | Value::Float(None))
    }

    /// Accès au texte (None si NULL ou si ce n'est pas du texte)
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(Some(s)) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(Some(s)) => write!(f, "{}", s),
            Value::Float(Some(v)) => write!(f, "{}", v),
            Value::Text(None) | Value::Float(None) => Ok(()),
        }
    }
}

/// Une ligne source transformée : colonnes normalisées -> valeurs
///
/// L'ordre des colonnes est celui de l'en-tête du fichier, suivi des
/// colonnes ajoutées par l'enrichissement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ajoute ou remplace une colonne
    pub fn set(&mut self, column: &str, value: Value) {
        match self.fields.iter_mut().find(|(name, _)| name == column) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((column.to_string(), value)),
        }
    }

    /// Ajoute une colonne texte (chaîne vide -> NULL)
    pub fn set_text(&mut self, column: &str, value: Option<&str>) {
        let value = value.filter(|v| !v.is_empty()).map(str::to_string);
        self.set(column, Value::Text(value));
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Texte non vide d'une colonne
    pub fn text(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Value::as_text)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Une ligne brute telle que lue dans le fichier, avec son contexte
#[derive(Debug, Clone)]
pub struct SourceRow {
    /// Numéro de ligne de données (1 = première ligne après l'en-tête)
    pub line: u64,

    /// Champs bruts, dans l'ordre du fichier
    pub raw: Vec<String>,

    /// Ligne transformée (en-têtes normalisés)
    pub record: Record,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_text_empty_is_null() {
        let mut record = Record::new();
        record.set_text("artmin", Some(""));
        record.set_text("ncc", Some("PARIS"));

        assert!(record.get("artmin").unwrap().is_null());
        assert_eq!(record.text("ncc"), Some("PARIS"));
        assert_eq!(record.text("absent"), None);
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut record = Record::new();
        record.set_text("dep", Some("01"));
        record.set_text("com", Some("001"));
        record.set_text("dep", Some("2A"));

        let columns: Vec<&str> = record.columns().collect();
        assert_eq!(columns, vec!["dep", "com"]);
        assert_eq!(record.text("dep"), Some("2A"));
    }
}
