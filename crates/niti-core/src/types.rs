//! Domain records shared by every crate.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Catalog value meaning "no restriction".
pub const ANYONE: &str = "Anyone";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Male" => Ok(Gender::Male),
            "Female" => Ok(Gender::Female),
            "Other" => Ok(Gender::Other),
            other => Err(Error::field("gender", format!("Unknown gender: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocationType {
    Urban,
    Rural,
    #[serde(rename = "Semi-Urban")]
    SemiUrban,
}

impl LocationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationType::Urban => "Urban",
            LocationType::Rural => "Rural",
            LocationType::SemiUrban => "Semi-Urban",
        }
    }
}

impl fmt::Display for LocationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LocationType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Urban" => Ok(LocationType::Urban),
            "Rural" => Ok(LocationType::Rural),
            "Semi-Urban" => Ok(LocationType::SemiUrban),
            other => Err(Error::field(
                "location",
                format!("Unknown location type: {}", other),
            )),
        }
    }
}

/// Postal address. State and city are always derived from the pincode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub pincode: String,
    pub state: String,
    pub city: String,
}

/// A citizen's stored profile, keyed by email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub email: String,
    pub name: String,
    pub gender: Gender,
    pub age: u32,
    #[serde(flatten)]
    pub address: Address,
    pub location: LocationType,
    pub caste: String,
    pub disability: bool,
    pub minority: bool,
    pub student: bool,
    pub bpl: bool,
    pub income: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_photo: Option<String>,
    pub aadhar_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// A welfare scheme from the reference catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scheme {
    pub id: String,
    pub scheme_name: String,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub benefits: Option<String>,
    #[serde(default)]
    pub documents_required: Option<String>,
    #[serde(default, alias = "application_Process")]
    pub application_process: Option<String>,
    #[serde(default)]
    pub contact_info: Option<String>,
    #[serde(flatten)]
    pub eligibility: SchemeEligibility,
}

/// Discrete eligibility fields of a scheme, as stored in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemeEligibility {
    #[serde(default = "anyone")]
    pub gender: String,
    #[serde(default = "anyone")]
    pub location: String,
    #[serde(default = "anyone_list")]
    pub eligible_castes: Vec<String>,
    #[serde(default = "no")]
    pub disability: String,
    #[serde(default = "no")]
    pub minority: String,
    #[serde(default = "no")]
    pub student: String,
    #[serde(default = "no")]
    pub bpl: String,
    #[serde(default)]
    pub age_range: String,
    #[serde(default)]
    pub income_range: String,
}

fn anyone() -> String {
    ANYONE.into()
}
fn anyone_list() -> Vec<String> {
    vec![ANYONE.into()]
}
fn no() -> String {
    "No".into()
}

impl Default for SchemeEligibility {
    fn default() -> Self {
        Self {
            gender: anyone(),
            location: anyone(),
            eligible_castes: anyone_list(),
            disability: no(),
            minority: no(),
            student: no(),
            bpl: no(),
            age_range: String::new(),
            income_range: String::new(),
        }
    }
}

/// One inline form error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Current UTC time as RFC 3339.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_defaults_when_fields_missing() {
        let scheme: Scheme = serde_json::from_value(serde_json::json!({
            "id": "s1",
            "scheme_name": "PM Awas",
            "application_Process": "Apply online",
        }))
        .unwrap();
        assert_eq!(scheme.application_process.as_deref(), Some("Apply online"));
        assert_eq!(scheme.eligibility.gender, ANYONE);
        assert_eq!(scheme.eligibility.eligible_castes, vec![ANYONE.to_string()]);
    }

    #[test]
    fn test_location_wire_names() {
        let json = serde_json::to_string(&LocationType::SemiUrban).unwrap();
        assert_eq!(json, "\"Semi-Urban\"");
        assert_eq!(
            "Semi-Urban".parse::<LocationType>().unwrap(),
            LocationType::SemiUrban
        );
        assert!("Metro".parse::<LocationType>().is_err());
    }
}
