//! Fournisseur Base Adresse Nationale (api-adresse.data.gouv.fr)

use async_trait::async_trait;
use cog::Coordinates;
use geo::Point;
use serde::Deserialize;

use super::{GeocodeError, Geocoder};

const DEFAULT_URL: &str = "https://api-adresse.data.gouv.fr";
const NAME: &str = "ban";

/// Réponse GeoJSON de `/search/`
#[derive(Debug, Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    geometry: PointGeometry,
}

#[derive(Debug, Deserialize)]
struct PointGeometry {
    coordinates: [f64; 2],
}

pub struct Ban {
    client: reqwest::Client,
    base_url: String,
}

impl Ban {
    pub fn new(client: reqwest::Client, base_url: Option<&str>) -> Self {
        Self {
            client,
            base_url: base_url.unwrap_or(DEFAULT_URL).trim_end_matches('/').to_string(),
        }
    }
}

pub(crate) fn parse_response(body: &str) -> Result<Option<Coordinates>, GeocodeError> {
    let collection: FeatureCollection =
        serde_json::from_str(body).map_err(|e| GeocodeError::InvalidResponse {
            provider: NAME,
            reason: e.to_string(),
        })?;

    Ok(collection
        .features
        .into_iter()
        .next()
        .map(|feature| Point::new(feature.geometry.coordinates[0], feature.geometry.coordinates[1])))
}

#[async_trait]
impl Geocoder for Ban {
    fn name(&self) -> &'static str {
        NAME
    }

    // La BAN ne connaît que le français : pas de paramètre de langue
    async fn resolve(&self, query: &str) -> Result<Option<Coordinates>, GeocodeError> {
        let response = self
            .client
            .get(format!("{}/search/", self.base_url))
            .query(&[("q", query), ("type", "municipality"), ("limit", "1")])
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
