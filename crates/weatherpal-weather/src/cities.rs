//! Built-in cities and a searchable city list.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ForecastError;
use crate::types::Location;

/// Cities offered without any lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum City {
    RioDeJaneiro,
    Beijing,
    LosAngeles,
}

impl City {
    pub const ALL: [City; 3] = [City::RioDeJaneiro, City::Beijing, City::LosAngeles];

    pub fn name(&self) -> &'static str {
        match self {
            Self::RioDeJaneiro => "Rio de Janeiro",
            Self::Beijing => "Beijing",
            Self::LosAngeles => "Los Angeles",
        }
    }

    pub fn country(&self) -> &'static str {
        match self {
            Self::RioDeJaneiro => "BR",
            Self::Beijing => "CN",
            Self::LosAngeles => "US",
        }
    }

    pub fn location(&self) -> Location {
        let (lat, lon) = match self {
            Self::RioDeJaneiro => (-22.9068, -43.1729),
            Self::Beijing => (39.9042, 116.4074),
            Self::LosAngeles => (34.0522, -118.2437),
        };
        Location::new(self.name(), lat, lon)
    }
}

impl std::fmt::Display for City {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One row of a city list file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityEntry {
    pub id: i64,
    pub name: String,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
}

impl CityEntry {
    pub fn location(&self) -> Location {
        Location::new(self.name.clone(), self.lat, self.lon)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CityCatalog {
    entries: Vec<CityEntry>,
}

impl CityCatalog {
    /// Catalog of the built-in [`City`] values.
    pub fn builtin() -> Self {
        let entries = City::ALL
            .iter()
            .enumerate()
            .map(|(i, city)| {
                let loc = city.location();
                CityEntry {
                    id: i as i64 + 1,
                    name: loc.name,
                    country: city.country().to_string(),
                    lat: loc.latitude,
                    lon: loc.longitude,
                }
            })
            .collect();
        Self { entries }
    }

    /// Parse a JSON array of `{id, name, country, lat, lon}`.
    ///
    /// # Errors
    /// [`ForecastError::Decode`] if the document does not match.
    pub fn from_json(body: &[u8]) -> Result<Self, ForecastError> {
        let entries: Vec<CityEntry> = serde_json::from_slice(body)?;
        tracing::debug!("Loaded {} cities", entries.len());
        Ok(Self { entries })
    }

    /// # Errors
    /// [`ForecastError::Decode`] if the file is unreadable or malformed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ForecastError> {
        let path = path.as_ref();
        let body = std::fs::read(path)
            .map_err(|e| ForecastError::Decode(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&body)
    }

    pub fn entries(&self) -> &[CityEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Case-insensitive substring match on name or country code.
    /// An empty query matches nothing.
    pub fn search(&self, query: &str) -> Vec<&CityEntry> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.entries
            .iter()
            .filter(|c| {
                c.name.to_lowercase().contains(&needle) || c.country.to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// Exact, case-insensitive name match.
    pub fn find(&self, name: &str) -> Option<&CityEntry> {
        let name = name.trim();
        self.entries.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }
}
