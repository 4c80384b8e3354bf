//! Enrichissement des communes : identifiant `ci`, code postal, coordonnées

use std::collections::HashMap;

use tracing::{debug, warn};

use cog::{
    CogError, CommuneFields, CoordinateLookup, Coordinates, OverrideLookup, PostalLookup, Record,
    Value,
};

use crate::config::CoordinateStrategy;
use crate::geocode::GeocoderChain;

/// Origine des coordonnées d'une commune
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinateSource {
    /// Fichier de surcharge
    Override,
    /// Fichier de coordonnées local
    Local,
    /// Fournisseur de géocodage
    Geocoded(&'static str),
    /// Aucune coordonnée trouvée
    Missing {
        query: Option<String>,
        last_error: Option<String>,
    },
}

/// Commune enrichie, prête à être insérée
#[derive(Debug, Clone)]
pub struct Enriched {
    pub ci: String,
    pub record: Record,
    pub coordinates: Option<Coordinates>,
    /// `None` quand la stratégie ne porte pas de coordonnées
    pub source: Option<CoordinateSource>,
}

/// Enrichit les lignes `comsimp` à partir des tables de correspondance
pub struct Enricher<'a> {
    strategy: CoordinateStrategy,
    postal: &'a PostalLookup,
    coordinates: Option<&'a CoordinateLookup>,
    overrides: Option<&'a OverrideLookup>,
    geocoder: Option<&'a GeocoderChain>,
    departements: &'a HashMap<String, String>,
}

impl<'a> Enricher<'a> {
    /// `departements` : code département -> nom enrichi, utilisé dans les
    /// requêtes de géocodage quand le fichier postal n'a pas de libellé
    pub fn new(
        strategy: CoordinateStrategy,
        postal: &'a PostalLookup,
        departements: &'a HashMap<String, String>,
    ) -> Self {
        Self {
            strategy,
            postal,
            coordinates: None,
            overrides: None,
            geocoder: None,
            departements,
        }
    }

    pub fn with_coordinates(mut self, coordinates: &'a CoordinateLookup) -> Self {
        self.coordinates = Some(coordinates);
        self
    }

    pub fn with_overrides(mut self, overrides: &'a OverrideLookup) -> Self {
        self.overrides = Some(overrides);
        self
    }

    pub fn with_geocoder(mut self, geocoder: &'a GeocoderChain) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    /// Enrichit une ligne ; une erreur est fatale pour l'import
    pub async fn enrich(&self, record: &Record) -> Result<Enriched, CogError> {
        let fields = CommuneFields::from_record(record);
        let ci = fields.ci().ok_or_else(|| CogError::InvalidCommuneCode {
            dep: fields.dep.to_string(),
            com: fields.com.to_string(),
        })?;

        let postal_code = self
            .overrides
            .and_then(|o| o.get(&ci))
            .and_then(|entry| entry.postal_code.as_deref())
            .or_else(|| self.postal.postal_code(&ci))
            .ok_or_else(|| CogError::MissingPostalCode { ci: ci.clone() })?
            .to_string();

        let (coordinates, source) = match self.strategy {
            CoordinateStrategy::None => (None, None),
            CoordinateStrategy::File => {
                let entry = self
                    .overrides
                    .and_then(|o| o.get(&ci))
                    .ok_or_else(|| CogError::MissingCoordinates { ci: ci.clone() })?;
                (Some(entry.coordinates), Some(CoordinateSource::Override))
            }
            CoordinateStrategy::Geocode => {
                let (coordinates, source) = self.locate(&ci, &fields).await;
                (coordinates, Some(source))
            }
        };

        let mut enriched = record.clone();
        enriched.set_text("ci", Some(&ci));
        enriched.set_text("cp", Some(&postal_code));
        if self.strategy.has_coordinates() {
            enriched.set("longitude", Value::Float(coordinates.map(|p| p.x())));
            enriched.set("latitude", Value::Float(coordinates.map(|p| p.y())));
        }

        Ok(Enriched {
            ci,
            record: enriched,
            coordinates,
            source,
        })
    }

    /// Fichier local d'abord, puis fournisseurs distants
    async fn locate(&self, ci: &str, fields: &CommuneFields<'_>) -> (Option<Coordinates>, CoordinateSource) {
        if let Some(point) = self.coordinates.and_then(|c| c.coordinates(ci)) {
            return (Some(point), CoordinateSource::Local);
        }

        let Some(geocoder) = self.geocoder.filter(|g| !g.is_empty()) else {
            warn!(ci, "No coordinates for commune");
            return (
                None,
                CoordinateSource::Missing {
                    query: None,
                    last_error: None,
                },
            );
        };

        let query = self.geocode_query(ci, fields);
        let outcome = geocoder.resolve(&query).await;
        match (outcome.coordinates, outcome.provider) {
            (Some(point), Some(provider)) => {
                debug!(ci, provider, query = %query, "Commune geocoded");
                (Some(point), CoordinateSource::Geocoded(provider))
            }
            _ => {
                warn!(
                    ci,
                    query = %query,
                    last_error = outcome.last_error.as_deref().unwrap_or("none"),
                    "No coordinates found for commune"
                );
                (
                    None,
                    CoordinateSource::Missing {
                        query: Some(query),
                        last_error: outcome.last_error,
                    },
                )
            }
        }
    }

    /// `"<nom avec article>, <département>, France"`
    pub fn geocode_query(&self, ci: &str, fields: &CommuneFields<'_>) -> String {
        let area = self
            .postal
            .region(ci)
            .or_else(|| self.departements.get(fields.dep).map(String::as_str));

        match area {
            Some(area) => format!("{}, {}, France", fields.display_name(), area),
            None => format!("{}, France", fields.display_name()),
        }
    }
}
