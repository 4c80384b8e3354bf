//! Géocodage distant des communes sans coordonnées locales
//!
//! Chaque fournisseur implémente [`Geocoder`]. La [`GeocoderChain`] les
//! interroge dans l'ordre configuré et s'arrête au premier résultat ; une
//! erreur d'un fournisseur est journalisée puis traitée comme « pas de
//! résultat ».

mod ban;
mod nominatim;

pub use ban::Ban;
pub use nominatim::Nominatim;

use std::time::Duration;

use async_trait::async_trait;
use cog::Coordinates;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{CoordinatesConfig, ProviderKind};

/// Erreurs d'un fournisseur de géocodage
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// Erreur réseau ou de décodage HTTP
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Réponse HTTP non 2xx
    #[error("{provider} answered with status {status}")]
    Status { provider: &'static str, status: u16 },

    /// Réponse illisible
    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse {
        provider: &'static str,
        reason: String,
    },
}

/// Un fournisseur de géocodage : texte libre -> coordonnées éventuelles
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Nom du fournisseur pour les logs
    fn name(&self) -> &'static str;

    /// Recherche une commune ; `Ok(None)` si aucun résultat
    async fn resolve(&self, query: &str) -> Result<Option<Coordinates>, GeocodeError>;
}

/// Résultat d'une recherche sur la chaîne de fournisseurs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeocodeOutcome {
    pub coordinates: Option<Coordinates>,
    /// Fournisseur ayant répondu
    pub provider: Option<&'static str>,
    /// Dernière erreur rencontrée
    pub last_error: Option<String>,
}

/// Fournisseurs interrogés par ordre de priorité
#[derive(Default)]
pub struct GeocoderChain {
    providers: Vec<Box<dyn Geocoder>>,
}

impl GeocoderChain {
    pub fn new(providers: Vec<Box<dyn Geocoder>>) -> Self {
        Self { providers }
    }

    /// Construit la chaîne décrite par la configuration
    pub fn from_config(config: &CoordinatesConfig, timeout: Duration) -> anyhow::Result<Self> {
        if config.providers.is_empty() {
            return Ok(Self::default());
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("insee-pg/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let providers = config
            .providers
            .iter()
            .map(|provider| -> Box<dyn Geocoder> {
                match provider.kind {
                    ProviderKind::Nominatim => Box::new(Nominatim::new(
                        client.clone(),
                        provider.url.as_deref(),
                        &config.language,
                    )),
                    ProviderKind::Ban => Box::new(Ban::new(client.clone(), provider.url.as_deref())),
                }
            })
            .collect();

        Ok(Self::new(providers))
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Interroge les fournisseurs dans l'ordre, premier résultat gagnant
    pub async fn resolve(&self, query: &str) -> GeocodeOutcome {
        let mut outcome = GeocodeOutcome::default();

        for provider in &self.providers {
            match provider.resolve(query).await {
                Ok(Some(coordinates)) => {
                    debug!(provider = provider.name(), query, "Geocoded");
                    outcome.coordinates = Some(coordinates);
                    outcome.provider = Some(provider.name());
                    return outcome;
                }
                Ok(None) => {
                    debug!(provider = provider.name(), query, "No geocoding result");
                }
                Err(e) => {
                    warn!(provider = provider.name(), query, error = %e, "Geocoding failed");
                    outcome.last_error = Some(e.to_string());
                }
            }
        }

        outcome
    }
}
