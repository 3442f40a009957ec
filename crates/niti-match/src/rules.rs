//! Rule-based scorer over the local catalog.
//!
//! Evaluates each scheme's discrete eligibility fields against the stored
//! profile. Used when no external recommendation process is deployed.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use niti_core::{Error, Result, Scheme, UserProfile, ANYONE};
use niti_store::SqliteStore;

use crate::scorer::Scorer;

pub struct RuleScorer {
    store: Arc<SqliteStore>,
}

impl RuleScorer {
    pub fn new(store: Arc<SqliteStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Scorer for RuleScorer {
    async fn score(&self, email: &str) -> Result<Vec<String>> {
        let profile = self
            .store
            .get_profile(email)?
            .ok_or_else(|| Error::Scorer(format!("no profile for {}", email)))?;

        let ids = self
            .store
            .get_all_schemes()?
            .into_iter()
            .filter(|scheme| match mismatch(scheme, &profile) {
                Some(reason) => {
                    debug!("{} not eligible for {}: {}", email, scheme.id, reason);
                    false
                }
                None => true,
            })
            .map(|scheme| scheme.id)
            .collect();
        Ok(ids)
    }

    fn name(&self) -> &'static str {
        "rules"
    }
}

/// The first rule the profile fails, or `None` when every rule holds.
pub fn mismatch(scheme: &Scheme, profile: &UserProfile) -> Option<String> {
    let rules = &scheme.eligibility;

    if rules.gender != ANYONE && rules.gender != profile.gender.as_str() {
        return Some(format!("requires gender {}", rules.gender));
    }
    if rules.location != ANYONE && rules.location != profile.location.as_str() {
        return Some(format!("requires location {}", rules.location));
    }
    if !rules.eligible_castes.iter().any(|c| c == ANYONE || *c == profile.caste) {
        return Some(format!("requires caste in {:?}", rules.eligible_castes));
    }

    let flags = [
        ("disability", &rules.disability, profile.disability),
        ("minority", &rules.minority, profile.minority),
        ("student", &rules.student, profile.student),
        ("bpl", &rules.bpl, profile.bpl),
    ];
    for (label, required, held) in flags {
        if required == "Yes" && !held {
            return Some(format!("requires {} status", label));
        }
    }

    if !range_admits(&rules.age_range, f64::from(profile.age)) {
        return Some(format!("age outside {}", rules.age_range));
    }
    if !range_admits(&rules.income_range, profile.income) {
        return Some(format!("income outside {}", rules.income_range));
    }
    None
}

/// Whether `value` satisfies a catalog range expression.
///
/// Accepted shapes: empty/`any`/`anyone`, `a<=x<=b`, `<=n`, `>=n`, `<n`,
/// `>n`, `a-b`. Whitespace and the words `age`/`income` are ignored. A shape
/// whose numbers fail to parse is false; an unrecognised shape is true.
pub fn range_admits(expr: &str, value: f64) -> bool {
    let lowered = expr.trim().to_lowercase();
    if lowered.is_empty() || lowered == "any" || lowered == "anyone" {
        return true;
    }
    let compact: String = lowered.chars().filter(|c| !c.is_whitespace()).collect();
    let compact = compact.replace("age", "").replace("income", "");
    evaluate(&compact, value).unwrap_or(false)
}

fn evaluate(expr: &str, value: f64) -> Option<bool> {
    if expr.matches("<=").count() == 2 {
        let parts: Vec<&str> = expr.split("<=").collect();
        let min = num(parts[0])?;
        let max = num(parts[2])?;
        return Some(min <= value && value <= max);
    }
    if expr.contains("<=") {
        return Some(value <= num(&expr.replace("<=", ""))?);
    }
    if expr.contains(">=") {
        return Some(value >= num(&expr.replace(">=", ""))?);
    }
    if expr.contains('<') {
        return Some(value < num(&expr.replace('<', ""))?);
    }
    if expr.contains('>') {
        return Some(value > num(&expr.replace('>', ""))?);
    }
    if expr.contains('-') {
        let parts: Vec<&str> = expr.split('-').collect();
        if parts.len() != 2 {
            return None;
        }
        let min = num(parts[0])?;
        let max = num(parts[1])?;
        return Some(min <= value && value <= max);
    }
    Some(true)
}

fn num(s: &str) -> Option<f64> {
    s.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use niti_core::{Address, Gender, LocationType, SchemeEligibility};

    fn profile() -> UserProfile {
        UserProfile {
            email: "a@b.com".into(),
            name: "Ravi".into(),
            gender: Gender::Male,
            age: 20,
            address: Address::default(),
            location: LocationType::Rural,
            caste: "SC".into(),
            disability: false,
            minority: false,
            student: true,
            bpl: false,
            income: 150000.0,
            profile_photo: None,
            aadhar_verified: false,
            created_at: None,
            updated_at: None,
        }
    }

    fn scheme(id: &str, eligibility: SchemeEligibility) -> Scheme {
        Scheme {
            id: id.into(),
            scheme_name: id.into(),
            details: None,
            benefits: None,
            documents_required: None,
            application_process: None,
            contact_info: None,
            eligibility,
        }
    }

    #[test]
    fn test_range_shapes() {
        assert!(range_admits("", 5.0));
        assert!(range_admits("Anyone", 5.0));
        assert!(range_admits("18 <= age <= 35", 20.0));
        assert!(!range_admits("18<=age<=35", 36.0));
        assert!(range_admits("<=250000", 150000.0));
        assert!(range_admits("income >= 100", 100.0));
        assert!(!range_admits("<18", 18.0));
        assert!(range_admits(">60", 61.0));
        assert!(range_admits("14-25", 25.0));
        assert!(!range_admits("14-25", 26.0));
    }

    #[test]
    fn test_range_parse_failures() {
        assert!(!range_admits("<=2,50,000", 1.0));
        assert!(!range_admits("10-20-30", 15.0));
        assert!(range_admits("students only", 1.0));
    }

    #[test]
    fn test_mismatch_rules() {
        let p = profile();
        assert_eq!(mismatch(&scheme("open", SchemeEligibility::default()), &p), None);

        let women = SchemeEligibility {
            gender: "Female".into(),
            ..Default::default()
        };
        assert!(mismatch(&scheme("w", women), &p).is_some());

        let sc_students = SchemeEligibility {
            eligible_castes: vec!["SC".into(), "ST".into()],
            student: "Yes".into(),
            age_range: "16-25".into(),
            ..Default::default()
        };
        assert_eq!(mismatch(&scheme("sc", sc_students), &p), None);

        let bpl = SchemeEligibility {
            bpl: "Yes".into(),
            ..Default::default()
        };
        assert_eq!(
            mismatch(&scheme("bpl", bpl), &p).as_deref(),
            Some("requires bpl status")
        );
    }

    #[tokio::test]
    async fn test_rule_scorer_reads_store() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = Arc::new(SqliteStore::open(dir.path().join("niti.db")).unwrap());
        store.insert_profile(&profile()).unwrap();
        store
            .import_schemes(&[
                scheme("s1", SchemeEligibility::default()),
                scheme(
                    "s2",
                    SchemeEligibility {
                        location: "Urban".into(),
                        ..Default::default()
                    },
                ),
            ])
            .unwrap();

        let scorer = RuleScorer::new(store);
        assert_eq!(scorer.score("a@b.com").await.unwrap(), vec!["s1".to_string()]);
        assert!(matches!(
            scorer.score("nobody@b.com").await,
            Err(Error::Scorer(_))
        ));
    }
}
