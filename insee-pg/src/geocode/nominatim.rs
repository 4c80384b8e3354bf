//! Fournisseur OpenStreetMap Nominatim
//!
//! Le service public limite l'usage à une requête par seconde : les
//! requêtes vers l'URL par défaut sont espacées d'au moins une seconde.

use std::time::Duration;

use async_trait::async_trait;
use cog::Coordinates;
use geo::Point;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{GeocodeError, Geocoder};

const DEFAULT_URL: &str = "https://nominatim.openstreetmap.org";
const NAME: &str = "nominatim";
const PUBLIC_MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Résultat de l'API `search` (format jsonv2) : coordonnées en chaînes
#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

/// Espacement minimal entre deux requêtes
struct Throttle {
    min_interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl Throttle {
    fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: Mutex::new(None),
        }
    }

    /// Attend que l'intervalle soit écoulé depuis la requête précédente
    async fn wait(&self) {
        let mut last = self.last.lock().await;
        if let Some(previous) = *last {
            let ready = previous + self.min_interval;
            if ready > Instant::now() {
                tokio::time::sleep_until(ready).await;
            }
        }
        *last = Some(Instant::now());
    }
}

pub struct Nominatim {
    client: reqwest::Client,
    base_url: String,
    language: String,
    throttle: Throttle,
}

impl Nominatim {
    /// Sans URL, interroge le service public (une requête par seconde)
    pub fn new(client: reqwest::Client, base_url: Option<&str>, language: &str) -> Self {
        let min_interval = match base_url {
            None => PUBLIC_MIN_INTERVAL,
            Some(_) => Duration::ZERO,
        };
        Self {
            client,
            base_url: base_url.unwrap_or(DEFAULT_URL).trim_end_matches('/').to_string(),
            language: language.to_string(),
            throttle: Throttle::new(min_interval),
        }
    }
}

/// Extrait le premier résultat d'une réponse `search`
pub(crate) fn parse_response(body: &str) -> Result<Option<Coordinates>, GeocodeError> {
    let places: Vec<Place> = serde_json::from_str(body).map_err(|e| GeocodeError::InvalidResponse {
        provider: NAME,
        reason: e.to_string(),
    })?;

    let Some(place) = places.into_iter().next() else {
        return Ok(None);
    };

    let parse = |value: &str| {
        value.trim().parse::<f64>().map_err(|e| GeocodeError::InvalidResponse {
            provider: NAME,
            reason: format!("{}: {:?}", e, value),
        })
    };

    Ok(Some(Point::new(parse(&place.lon)?, parse(&place.lat)?)))
}

#[async_trait]
impl Geocoder for Nominatim {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn resolve(&self, query: &str) -> Result<Option<Coordinates>, GeocodeError> {
        self.throttle.wait().await;
        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[
                ("q", query),
                ("format", "jsonv2"),
                ("limit", "1"),
                ("countrycodes", "fr"),
                ("accept-language", self.language.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GeocodeError::Status {
                provider: NAME,
                status: response.status().as_u16(),
            });
        }

        parse_response(&response.text().await?)
    }
}
