//! The three-step registration form.
//!
//! Field values arrive as the strings a browser form submits. Each step is
//! validated on its own; the demographics step also resolves the pincode,
//! and the form does not move past it until state and city are known. A
//! form submitted directly at a later step is resolved there instead.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use niti_core::{Address, Error, FieldError, Gender, LocationType, Result, UserProfile};

use crate::lookup::PostalLookup;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());
static PINCODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{6}$").unwrap());

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_AGE: u32 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntakeStep {
    #[default]
    Credentials,
    Demographics,
    Welfare,
    Complete,
}

impl IntakeStep {
    pub fn next(self) -> Self {
        match self {
            IntakeStep::Credentials => IntakeStep::Demographics,
            IntakeStep::Demographics => IntakeStep::Welfare,
            IntakeStep::Welfare | IntakeStep::Complete => IntakeStep::Complete,
        }
    }

    /// One-based position shown in the progress indicator.
    pub fn number(self) -> u8 {
        match self {
            IntakeStep::Credentials => 1,
            IntakeStep::Demographics => 2,
            IntakeStep::Welfare => 3,
            IntakeStep::Complete => 4,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeForm {
    pub step: IntakeStep,

    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub name: String,

    pub gender: String,
    #[serde(deserialize_with = "lenient_string")]
    pub age: String,
    pub location: String,
    pub caste: String,
    #[serde(deserialize_with = "lenient_string")]
    pub pincode: String,
    /// Filled from the pincode lookup; client-supplied values are ignored.
    #[serde(skip_deserializing)]
    pub state: String,
    #[serde(skip_deserializing)]
    pub city: String,

    pub disability: bool,
    pub minority: bool,
    pub student: bool,
    pub bpl: bool,
    #[serde(deserialize_with = "lenient_string")]
    pub income: String,
}

/// Accept numbers for text fields so JSON clients need not quote them.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number, got {}",
            other
        ))),
    }
}

/// Optional variant of [`lenient_string`]; `null` means "not supplied".
pub(crate) fn lenient_opt_string<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number, got {}",
            other
        ))),
    }
}

impl IntakeForm {
    /// Validate the current step and move to the next one.
    ///
    /// On the demographics step the pincode is resolved before returning;
    /// a rejected code clears state and city and fails with a `pincode`
    /// field error. Later steps resolve it too when the address is still
    /// empty. Errors leave the form on its current step.
    pub async fn advance(&mut self, lookup: &dyn PostalLookup) -> Result<IntakeStep> {
        let mut errors = self.check_step(self.step);

        let resolve_now = match self.step {
            IntakeStep::Credentials => false,
            IntakeStep::Demographics => errors.is_empty(),
            IntakeStep::Welfare | IntakeStep::Complete => {
                self.state.is_empty() || self.city.is_empty()
            }
        };
        if resolve_now {
            let resolved = match check_pincode(&self.pincode) {
                Ok(()) => self.resolve_pincode(lookup).await,
                Err(e) => Err(e),
            };
            if let Err(e) = resolved {
                errors.push(e);
            }
        }

        if !errors.is_empty() {
            debug!("Step {} rejected: {} field errors", self.step.number(), errors.len());
            return Err(Error::Validation(errors));
        }

        self.step = self.step.next();
        Ok(self.step)
    }

    /// Advance through every remaining step.
    pub async fn finish(&mut self, lookup: &dyn PostalLookup) -> Result<()> {
        while self.step != IntakeStep::Complete {
            self.advance(lookup).await?;
        }
        Ok(())
    }

    /// Per-field checks for one step. Does not touch the network.
    pub fn check_step(&self, step: IntakeStep) -> Vec<FieldError> {
        let mut errors = Vec::new();
        match step {
            IntakeStep::Credentials => {
                if self.email.trim().is_empty() {
                    errors.push(FieldError::new("email", "Email is required"));
                } else if !EMAIL_RE.is_match(self.email.trim()) {
                    errors.push(FieldError::new("email", "Enter a valid email address"));
                }
                if self.password.chars().count() < MIN_PASSWORD_LEN {
                    errors.push(FieldError::new(
                        "password",
                        format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
                    ));
                }
                if self.name.trim().is_empty() {
                    errors.push(FieldError::new("name", "Name is required"));
                }
            }
            IntakeStep::Demographics => {
                if self.gender.parse::<Gender>().is_err() {
                    errors.push(FieldError::new("gender", "Select a gender"));
                }
                if let Err(e) = parse_age(&self.age) {
                    errors.push(e);
                }
                if self.location.parse::<LocationType>().is_err() {
                    errors.push(FieldError::new("location", "Select a location type"));
                }
                if self.caste.trim().is_empty() {
                    errors.push(FieldError::new("caste", "Caste category is required"));
                }
                if let Err(e) = check_pincode(&self.pincode) {
                    errors.push(e);
                }
            }
            IntakeStep::Welfare => {
                if let Err(e) = parse_income(&self.income) {
                    errors.push(e);
                }
            }
            IntakeStep::Complete => {}
        }
        errors
    }

    /// Build the profile row. Every step must pass and the address must
    /// have been filled by a successful lookup.
    pub fn to_profile(&self) -> Result<UserProfile> {
        let mut errors: Vec<FieldError> = [
            IntakeStep::Credentials,
            IntakeStep::Demographics,
            IntakeStep::Welfare,
        ]
        .into_iter()
        .flat_map(|step| self.check_step(step))
        .collect();

        if errors.iter().all(|e| e.field != "pincode")
            && (self.state.is_empty() || self.city.is_empty())
        {
            errors.push(FieldError::new(
                "pincode",
                "Enter a valid pincode to fill in state and city",
            ));
        }
        if !errors.is_empty() {
            return Err(Error::Validation(errors));
        }

        Ok(UserProfile {
            email: self.email.trim().to_string(),
            name: self.name.trim().to_string(),
            gender: self.gender.parse()?,
            age: parse_age(&self.age).map_err(|e| Error::Validation(vec![e]))?,
            address: Address {
                pincode: self.pincode.trim().to_string(),
                state: self.state.clone(),
                city: self.city.clone(),
            },
            location: self.location.parse()?,
            caste: self.caste.trim().to_string(),
            disability: self.disability,
            minority: self.minority,
            student: self.student,
            bpl: self.bpl,
            income: parse_income(&self.income).map_err(|e| Error::Validation(vec![e]))?,
            profile_photo: None,
            aadhar_verified: false,
            created_at: None,
            updated_at: None,
        })
    }

    async fn resolve_pincode(
        &mut self,
        lookup: &dyn PostalLookup,
    ) -> std::result::Result<(), FieldError> {
        self.state.clear();
        self.city.clear();
        let address = resolve(lookup, self.pincode.trim()).await?;
        self.state = address.state;
        self.city = address.city;
        Ok(())
    }
}

/// Look up a well-formed pincode, turning rejections and lookup failures
/// into a `pincode` field error.
pub async fn resolve(
    lookup: &dyn PostalLookup,
    pincode: &str,
) -> std::result::Result<Address, FieldError> {
    match lookup.resolve(pincode).await {
        Ok(Some(address)) => Ok(address),
        Ok(None) => Err(FieldError::new("pincode", "Pincode not found")),
        Err(e) => {
            warn!("Pincode lookup for {} failed: {}", pincode, e);
            Err(FieldError::new(
                "pincode",
                "Could not look up the pincode, please try again",
            ))
        }
    }
}

pub fn check_pincode(raw: &str) -> std::result::Result<(), FieldError> {
    if PINCODE_RE.is_match(raw.trim()) {
        Ok(())
    } else {
        Err(FieldError::new("pincode", "Pincode must be 6 digits"))
    }
}

pub fn parse_age(raw: &str) -> std::result::Result<u32, FieldError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(FieldError::new("age", "Age is required"));
    }
    match raw.parse::<u32>() {
        Ok(age) if age <= MAX_AGE => Ok(age),
        _ => Err(FieldError::new(
            "age",
            format!("Age must be a whole number between 0 and {}", MAX_AGE),
        )),
    }
}

pub fn parse_income(raw: &str) -> std::result::Result<f64, FieldError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(FieldError::new("income", "Income is required"));
    }
    match raw.parse::<f64>() {
        Ok(income) if income.is_finite() && income >= 0.0 => Ok(income),
        _ => Err(FieldError::new("income", "Income must be a non-negative number")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    /// Knows 110001 only; `down` makes every call fail.
    struct StubLookup {
        down: bool,
    }

    #[async_trait]
    impl PostalLookup for StubLookup {
        async fn resolve(&self, pincode: &str) -> Result<Option<Address>> {
            if self.down {
                return Err(Error::PostalLookup("connection refused".into()));
            }
            Ok((pincode == "110001").then(|| Address {
                pincode: pincode.into(),
                state: "Delhi".into(),
                city: "Central Delhi".into(),
            }))
        }
    }

    fn step_one() -> IntakeForm {
        IntakeForm {
            email: "asha@example.in".into(),
            password: "secret1".into(),
            name: "Asha".into(),
            ..Default::default()
        }
    }

    fn step_two(pincode: &str) -> IntakeForm {
        IntakeForm {
            step: IntakeStep::Demographics,
            gender: "Female".into(),
            age: "29".into(),
            location: "Semi-Urban".into(),
            caste: "OBC".into(),
            pincode: pincode.into(),
            ..step_one()
        }
    }

    fn fields(err: Error) -> Vec<String> {
        match err {
            Error::Validation(errors) => errors.into_iter().map(|e| e.field).collect(),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_credentials_step() {
        let lookup = StubLookup { down: false };
        let mut form = IntakeForm {
            email: "not-an-email".into(),
            password: "abc".into(),
            ..Default::default()
        };
        let err = form.advance(&lookup).await.unwrap_err();
        assert_eq!(fields(err), vec!["email", "password", "name"]);
        assert_eq!(form.step, IntakeStep::Credentials);

        let mut form = step_one();
        assert_eq!(form.advance(&lookup).await.unwrap(), IntakeStep::Demographics);
    }

    #[tokio::test]
    async fn test_known_pincode_fills_address_before_welfare_step() {
        let lookup = StubLookup { down: false };
        let mut form = step_two("110001");
        assert_eq!(form.advance(&lookup).await.unwrap(), IntakeStep::Welfare);
        assert_eq!(form.state, "Delhi");
        assert_eq!(form.city, "Central Delhi");
    }

    #[tokio::test]
    async fn test_rejected_pincode_blocks_progress() {
        let lookup = StubLookup { down: false };
        let mut form = step_two("999999");
        let err = form.advance(&lookup).await.unwrap_err();
        assert_eq!(fields(err), vec!["pincode"]);
        assert_eq!(form.step, IntakeStep::Demographics);
        assert!(form.state.is_empty());
        assert!(form.city.is_empty());
    }

    #[tokio::test]
    async fn test_lookup_outage_is_inline_error() {
        let lookup = StubLookup { down: true };
        let mut form = step_two("110001");
        let err = form.advance(&lookup).await.unwrap_err();
        assert_eq!(fields(err), vec!["pincode"]);
        assert!(form.state.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_pincode_skips_lookup() {
        let lookup = StubLookup { down: true };
        let mut form = step_two("1100");
        let err = form.advance(&lookup).await.unwrap_err();
        match err {
            Error::Validation(errors) => assert_eq!(errors[0].message, "Pincode must be 6 digits"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_finish_and_build_profile() {
        let lookup = StubLookup { down: false };
        let mut form = step_one();
        form.gender = "Female".into();
        form.age = "29".into();
        form.location = "Urban".into();
        form.caste = "General".into();
        form.pincode = "110001".into();
        form.income = "-5".into();

        let err = form.finish(&lookup).await.unwrap_err();
        assert_eq!(fields(err), vec!["income"]);
        assert_eq!(form.step, IntakeStep::Welfare);

        form.income = "120000".into();
        form.bpl = true;
        form.finish(&lookup).await.unwrap();
        assert_eq!(form.step, IntakeStep::Complete);

        let profile = form.to_profile().unwrap();
        assert_eq!(profile.age, 29);
        assert_eq!(profile.address.city, "Central Delhi");
        assert!(profile.bpl);
        assert!(!profile.aadhar_verified);
    }

    #[tokio::test]
    async fn test_later_step_without_address_resolves_pincode() {
        let lookup = StubLookup { down: false };
        let mut form = IntakeForm {
            step: IntakeStep::Welfare,
            income: "50000".into(),
            ..step_two("999999")
        };
        let err = form.advance(&lookup).await.unwrap_err();
        assert_eq!(fields(err), vec!["pincode"]);
        assert_eq!(form.step, IntakeStep::Welfare);

        form.pincode = "".into();
        form.income = "".into();
        let err = form.advance(&lookup).await.unwrap_err();
        assert_eq!(fields(err), vec!["income", "pincode"]);

        form.pincode = "110001".into();
        form.income = "50000".into();
        assert_eq!(form.advance(&lookup).await.unwrap(), IntakeStep::Complete);
        assert_eq!(form.state, "Delhi");
        form.to_profile().unwrap();
    }

    #[test]
    fn test_to_profile_requires_resolved_address() {
        let mut form = step_two("110001");
        form.income = "0".into();
        assert_eq!(fields(form.to_profile().unwrap_err()), vec!["pincode"]);
    }

    #[test]
    fn test_age_bounds() {
        assert_eq!(parse_age("0").unwrap(), 0);
        assert_eq!(parse_age(" 120 ").unwrap(), 120);
        assert!(parse_age("121").is_err());
        assert!(parse_age("-1").is_err());
        assert!(parse_age("twenty").is_err());
    }

    #[test]
    fn test_deserialize_ignores_client_address() {
        let form: IntakeForm = serde_json::from_value(json!({
            "email": "a@b.com",
            "age": 31,
            "income": 0,
            "state": "Forged",
            "city": "Forged"
        }))
        .unwrap();
        assert_eq!(form.age, "31");
        assert_eq!(form.income, "0");
        assert!(form.state.is_empty());
        assert_eq!(form.step, IntakeStep::Credentials);

        let echoed = serde_json::to_value(&form).unwrap();
        assert!(echoed.get("password").is_none());
    }
}
