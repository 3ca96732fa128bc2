//! Schema Normalizer — lenient with upstream, strict with the caller.
//!
//! Only the top-level shape is enforced: an object with an object `profile`.
//! Everything below is coerced to the record shape, never rejected, and every
//! collection is present (possibly empty) in the output.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

const DEFAULT_SKILL_RATING: u8 = 3;
const MAX_SKILL_RATING: u8 = 5;

#[derive(Debug, Error, PartialEq)]
pub enum NormalizeError {
    #[error("top-level value is not an object")]
    NotAnObject,

    #[error("missing required key 'profile'")]
    MissingProfile,

    #[error("'profile' is not an object")]
    ProfileNotAnObject,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub firstname: String,
    pub lastname: String,
    pub current_role: String,
    pub years_experience: String,
    pub main_tech: String,
    pub summary: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    pub client_name: String,
    pub period: String,
    pub role: String,
    pub context: String,
    pub phases: String,
    pub tech_stack: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Education {
    pub year: String,
    pub degree: String,
    pub location: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Certification {
    pub name: String,
    pub issuer: String,
    pub year: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    pub rating: u8,
}

/// The validated output shape handed to the CV editor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub profile: Profile,
    pub experiences: Vec<Experience>,
    pub education: Vec<Education>,
    pub certifications: Vec<Certification>,
    #[serde(rename = "skills_categories")]
    pub skills_by_category: BTreeMap<String, Vec<Skill>>,
}

pub fn normalize(value: Value) -> Result<NormalizedRecord, NormalizeError> {
    let Value::Object(mut root) = value else {
        return Err(NormalizeError::NotAnObject);
    };
    let profile = match root.remove("profile") {
        Some(Value::Object(p)) => p,
        Some(_) => return Err(NormalizeError::ProfileNotAnObject),
        None => return Err(NormalizeError::MissingProfile),
    };

    Ok(NormalizedRecord {
        profile: Profile {
            firstname: field(&profile, "firstname"),
            lastname: field(&profile, "lastname"),
            current_role: field(&profile, "current_role"),
            years_experience: field(&profile, "years_experience"),
            main_tech: field(&profile, "main_tech"),
            summary: field(&profile, "summary"),
        },
        experiences: array_of(&root, "experiences")
            .filter_map(Value::as_object)
            .map(|e| Experience {
                client_name: field(e, "client_name"),
                period: field(e, "period"),
                role: field(e, "role"),
                context: field(e, "context"),
                phases: field(e, "phases"),
                tech_stack: string_list(e.get("tech_stack")),
            })
            .collect(),
        education: array_of(&root, "education")
            .filter_map(Value::as_object)
            .map(|e| Education {
                year: field(e, "year"),
                degree: field(e, "degree"),
                location: field(e, "location"),
            })
            .collect(),
        certifications: array_of(&root, "certifications")
            .filter_map(certification)
            .collect(),
        skills_by_category: skills(root.get("skills_categories")),
    })
}

/// Coerces any scalar to a string: null → "", numbers/bools → text,
/// arrays of scalars → one item per line, objects → compact JSON.
pub fn coerce_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(coerce_to_string)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Object(_) => value.to_string(),
    }
}

fn field(obj: &Map<String, Value>, key: &str) -> String {
    obj.get(key).map(coerce_to_string).unwrap_or_default()
}

fn array_of<'a>(root: &'a Map<String, Value>, key: &str) -> std::slice::Iter<'a, Value> {
    let empty: &[Value] = &[];
    match root.get(key) {
        Some(Value::Array(items)) => items.iter(),
        None | Some(Value::Null) => empty.iter(),
        Some(other) => {
            warn!(key, kind = value_kind(other), "Expected an array, defaulting to empty");
            empty.iter()
        }
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(coerce_to_string)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    }
}

fn certification(value: &Value) -> Option<Certification> {
    match value {
        Value::Object(c) => Some(Certification {
            name: field(c, "name"),
            issuer: field(c, "issuer"),
            year: field(c, "year"),
        }),
        Value::String(s) if !s.trim().is_empty() => Some(Certification {
            name: s.trim().to_string(),
            ..Default::default()
        }),
        _ => None,
    }
}

fn skills(value: Option<&Value>) -> BTreeMap<String, Vec<Skill>> {
    let categories = match value {
        Some(Value::Object(categories)) => categories,
        None | Some(Value::Null) => return BTreeMap::new(),
        Some(other) => {
            warn!(
                kind = value_kind(other),
                "Expected skills_categories to be an object, defaulting to empty"
            );
            return BTreeMap::new();
        }
    };

    categories
        .iter()
        .map(|(category, items)| {
            let skills = match items {
                Value::Array(items) => items.iter().filter_map(skill).collect(),
                _ => Vec::new(),
            };
            (category.clone(), skills)
        })
        .collect()
}

fn skill(value: &Value) -> Option<Skill> {
    match value {
        Value::Object(s) => {
            let name = field(s, "name");
            if name.trim().is_empty() {
                return None;
            }
            Some(Skill {
                name,
                rating: rating(s.get("rating")),
            })
        }
        Value::String(name) if !name.trim().is_empty() => Some(Skill {
            name: name.trim().to_string(),
            rating: DEFAULT_SKILL_RATING,
        }),
        _ => None,
    }
}

fn rating(value: Option<&Value>) -> u8 {
    let raw = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match raw {
        Some(r) if r.is_finite() => r.round().clamp(0.0, f64::from(MAX_SKILL_RATING)) as u8,
        _ => DEFAULT_SKILL_RATING,
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
