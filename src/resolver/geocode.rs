//! Reverse geocoding of report coordinates to a locality and street address

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::model::Coordinates;

const DEFAULT_ENDPOINT: &str = "https://nominatim.openstreetmap.org/reverse";
const ENV_GEOCODER_ENDPOINT: &str = "GEOCODER_ENDPOINT";

/// Nominatim requires an identifying User-Agent
const USER_AGENT: &str = "civicsight-agent/1.0";

#[derive(Debug, thiserror::Error)]
pub enum GeocodeError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Geocoder returned HTTP {0}")]
    BadStatus(u16),

    #[error("No locality resolvable for coordinates {0}")]
    NoLocality(Coordinates),
}

/// Locality and address data resolved from coordinates
#[derive(Debug, Clone)]
pub struct ResolvedLocality {
    /// City/town/village name used for form search
    pub locality: String,
    pub state: Option<String>,
    /// Formatted street address for the outcome record
    pub address: String,
}

/// Collaborator seam for reverse geocoding
#[async_trait]
pub trait LocalityResolver: Send + Sync {
    async fn reverse(&self, coordinates: Coordinates) -> Result<ResolvedLocality, GeocodeError>;
}

/// Nominatim (OpenStreetMap) reverse geocoder. Free, no API key.
pub struct NominatimResolver {
    client: Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    #[serde(default)]
    address: NominatimAddress,
}

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    municipality: Option<String>,
    county: Option<String>,
    house_number: Option<String>,
    road: Option<String>,
    state: Option<String>,
    postcode: Option<String>,
}

impl NominatimResolver {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .user_agent(USER_AGENT)
                .build()
                .unwrap_or_else(|_| Client::new()),
            endpoint: std::env::var(ENV_GEOCODER_ENDPOINT)
                .unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string()),
        }
    }

    /// Assemble locality and formatted address from the address parts
    fn build_locality(
        address: NominatimAddress,
        coordinates: Coordinates,
    ) -> Result<ResolvedLocality, GeocodeError> {
        // Precedence mirrors how municipal boundaries are usually tagged
        let locality = address
            .city
            .or(address.town)
            .or(address.village)
            .or(address.municipality)
            .or(address.county)
            .ok_or(GeocodeError::NoLocality(coordinates))?;

        let street_line = match (&address.house_number, &address.road) {
            (Some(number), Some(road)) => format!("{} {}", number, road),
            (None, Some(road)) => road.clone(),
            // No street data: fall back to raw coordinates in the address
            _ => format!("{}, {}", coordinates.latitude, coordinates.longitude),
        };

        let mut full_address = format!("{}, {}", street_line, locality);
        if let Some(state) = &address.state {
            full_address.push_str(", ");
            full_address.push_str(state);
        }
        if let Some(postcode) = &address.postcode {
            full_address.push(' ');
            full_address.push_str(postcode);
        }

        Ok(ResolvedLocality {
            locality,
            state: address.state,
            address: full_address,
        })
    }
}

impl Default for NominatimResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocalityResolver for NominatimResolver {
    async fn reverse(&self, coordinates: Coordinates) -> Result<ResolvedLocality, GeocodeError> {
        tracing::debug!(coordinates = %coordinates, "Reverse geocoding");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("lat", coordinates.latitude.to_string()),
                ("lon", coordinates.longitude.to_string()),
                ("format", "json".to_string()),
                ("addressdetails", "1".to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GeocodeError::BadStatus(response.status().as_u16()));
        }

        let payload: NominatimResponse = response.json().await?;
        let resolved = Self::build_locality(payload.address, coordinates)?;

        tracing::info!(
            locality = %resolved.locality,
            address = %resolved.address,
            "Geocoded location"
        );

        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coords() -> Coordinates {
        Coordinates {
            latitude: 37.7749,
            longitude: -122.4194,
        }
    }

    #[test]
    fn locality_precedence_city_first() {
        let address = NominatimAddress {
            city: Some("San Francisco".into()),
            county: Some("San Francisco County".into()),
            road: Some("Market St".into()),
            house_number: Some("1455".into()),
            state: Some("California".into()),
            postcode: Some("94103".into()),
            ..Default::default()
        };

        let resolved = NominatimResolver::build_locality(address, coords()).unwrap();
        assert_eq!(resolved.locality, "San Francisco");
        assert_eq!(resolved.address, "1455 Market St, San Francisco, California 94103");
    }

    #[test]
    fn locality_falls_back_to_county() {
        let address = NominatimAddress {
            county: Some("Marin County".into()),
            ..Default::default()
        };

        let resolved = NominatimResolver::build_locality(address, coords()).unwrap();
        assert_eq!(resolved.locality, "Marin County");
        // No street data: the address carries the raw coordinates
        assert!(resolved.address.contains("37.7749"));
    }

    #[test]
    fn missing_locality_is_an_error() {
        let result = NominatimResolver::build_locality(NominatimAddress::default(), coords());
        assert!(matches!(result, Err(GeocodeError::NoLocality(_))));
    }
}
