//! Candidate Registry — the ordered list of backend variants the fallback chain walks.
//!
//! Built once at startup (defaults or `EXTRACT_CANDIDATES`), read-only afterwards.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointFamily {
    Stable,
    Experimental,
}

impl EndpointFamily {
    pub fn api_version(self) -> &'static str {
        match self {
            EndpointFamily::Stable => "v1",
            EndpointFamily::Experimental => "v1beta",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub id: String,
    pub endpoint_family: EndpointFamily,
    pub model_name: String,
    /// Stable endpoints reject the structured-output flag with a 400.
    #[serde(default)]
    pub supports_structured_output_hint: bool,
    /// Lower is tried first.
    #[serde(default)]
    pub priority: i32,
}

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("candidate registry is empty")]
    Empty,

    #[error("duplicate candidate id '{0}'")]
    DuplicateId(String),

    #[error("candidate at position {0} has an empty id or model name")]
    Incomplete(usize),
}

#[derive(Debug, Clone)]
pub struct CandidateRegistry {
    candidates: Vec<Candidate>,
}

impl CandidateRegistry {
    /// Sorts by priority. `sort_by_key` is stable, so ties keep declaration order.
    pub fn new(mut candidates: Vec<Candidate>) -> Result<Self, RegistryError> {
        if candidates.is_empty() {
            return Err(RegistryError::Empty);
        }
        for (i, c) in candidates.iter().enumerate() {
            if c.id.trim().is_empty() || c.model_name.trim().is_empty() {
                return Err(RegistryError::Incomplete(i));
            }
            if candidates[..i].iter().any(|prev| prev.id == c.id) {
                return Err(RegistryError::DuplicateId(c.id.clone()));
            }
        }
        candidates.sort_by_key(|c| c.priority);
        Ok(Self { candidates })
    }

    #[cfg(test)]
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn get(&self, index: usize) -> Option<&Candidate> {
        self.candidates.get(index)
    }
}

/// Stable v1 first (no hint), then the v1beta models that accept the JSON hint.
pub fn default_candidates() -> Vec<Candidate> {
    vec![
        Candidate {
            id: "gemini-1.5-flash@v1".to_string(),
            endpoint_family: EndpointFamily::Stable,
            model_name: "gemini-1.5-flash".to_string(),
            supports_structured_output_hint: false,
            priority: 0,
        },
        Candidate {
            id: "gemini-2.0-flash@v1beta".to_string(),
            endpoint_family: EndpointFamily::Experimental,
            model_name: "gemini-2.0-flash".to_string(),
            supports_structured_output_hint: true,
            priority: 1,
        },
        Candidate {
            id: "gemini-2.5-flash-preview@v1beta".to_string(),
            endpoint_family: EndpointFamily::Experimental,
            model_name: "gemini-2.5-flash-preview-09-2025".to_string(),
            supports_structured_output_hint: true,
            priority: 2,
        },
    ]
}
