//! Fixed resort registry.
//!
//! Loaded once at startup from config and never mutated afterwards. The
//! registry order is the tie-break order used everywhere a "first resort"
//! has to be picked.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Stable resort identifier (e.g. "vail").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResortId(String);

impl ResortId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResortId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Static metadata for one resort.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResortInfo {
    pub id: ResortId,
    /// Human-readable name.
    pub name: String,
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lon: f64,
    /// Logo asset reference used by the UI layer.
    #[serde(default)]
    pub logo: Option<String>,
}

/// Ordered, immutable set of resorts.
#[derive(Debug, Clone)]
pub struct ResortRegistry {
    resorts: Vec<ResortInfo>,
}

impl ResortRegistry {
    /// Build a registry, rejecting an empty list or duplicate ids.
    pub fn new(resorts: Vec<ResortInfo>) -> Result<Self> {
        if resorts.is_empty() {
            return Err(Error::Config("resort registry must not be empty".into()));
        }

        let mut seen = HashSet::new();
        for resort in &resorts {
            if resort.id.as_str().trim().is_empty() {
                return Err(Error::Config(format!(
                    "resort '{}' has an empty id",
                    resort.name
                )));
            }
            if !seen.insert(resort.id.clone()) {
                return Err(Error::Config(format!("duplicate resort id '{}'", resort.id)));
            }
        }

        Ok(Self { resorts })
    }

    pub fn len(&self) -> usize {
        self.resorts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resorts.is_empty()
    }

    /// Resorts in registry order.
    pub fn iter(&self) -> impl Iterator<Item = &ResortInfo> {
        self.resorts.iter()
    }

    /// Resort ids in registry order.
    pub fn ids(&self) -> impl Iterator<Item = &ResortId> {
        self.resorts.iter().map(|r| &r.id)
    }

    pub fn get(&self, id: &ResortId) -> Option<&ResortInfo> {
        self.resorts.iter().find(|r| &r.id == id)
    }

    pub fn index_of(&self, id: &ResortId) -> Option<usize> {
        self.resorts.iter().position(|r| &r.id == id)
    }
}
