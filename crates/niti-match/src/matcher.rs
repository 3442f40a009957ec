//! The eligibility run: score, supersede, hydrate.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

use niti_core::{Error, Result, Scheme};
use niti_store::SqliteStore;

use crate::scorer::Scorer;

/// Result of one eligibility run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "schemes", rename_all = "snake_case")]
pub enum MatchOutcome {
    Found(Vec<Scheme>),
    /// The run succeeded and the user qualifies for nothing.
    NoEligibleSchemes,
}

impl MatchOutcome {
    pub fn schemes(&self) -> &[Scheme] {
        match self {
            MatchOutcome::Found(schemes) => schemes,
            MatchOutcome::NoEligibleSchemes => &[],
        }
    }
}

pub struct EligibilityMatcher {
    store: Arc<SqliteStore>,
    scorer: Arc<dyn Scorer>,
    /// Emails with a run outstanding.
    in_flight: Mutex<HashSet<String>>,
}

/// Clears the busy mark for one email when dropped.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<String>>,
    email: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set.lock().remove(&self.email);
    }
}

impl EligibilityMatcher {
    pub fn new(store: Arc<SqliteStore>, scorer: Arc<dyn Scorer>) -> Self {
        Self {
            store,
            scorer,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn scorer_name(&self) -> &'static str {
        self.scorer.name()
    }

    pub fn is_running(&self, email: &str) -> bool {
        self.in_flight.lock().contains(email)
    }

    /// Run the matcher for `email`.
    ///
    /// A scorer failure aborts before any eligibility row is touched. The
    /// replace is atomic, so a storage failure leaves the previous set in
    /// place. A second call for the same email while one is outstanding
    /// fails with `Conflict`.
    pub async fn find_schemes(&self, email: &str) -> Result<MatchOutcome> {
        let _busy = self.begin(email)?;

        if !self.store.profile_exists(email)? {
            return Err(Error::NotFound(format!("profile {}", email)));
        }

        let ids = self.scorer.score(email).await.map_err(|e| {
            warn!("Scorer '{}' failed for {}: {}", self.scorer.name(), email, e);
            e
        })?;

        self.store.replace_eligible_schemes(email, &ids)?;
        let schemes = self.store.get_eligible_schemes(email)?;

        info!(
            "Eligibility run for {}: {} ids scored, {} schemes hydrated",
            email,
            ids.len(),
            schemes.len()
        );

        if schemes.is_empty() {
            Ok(MatchOutcome::NoEligibleSchemes)
        } else {
            Ok(MatchOutcome::Found(schemes))
        }
    }

    /// The schemes recorded by the last completed run.
    pub fn current_schemes(&self, email: &str) -> Result<MatchOutcome> {
        let schemes = self.store.get_eligible_schemes(email)?;
        if schemes.is_empty() {
            Ok(MatchOutcome::NoEligibleSchemes)
        } else {
            Ok(MatchOutcome::Found(schemes))
        }
    }

    fn begin(&self, email: &str) -> Result<InFlight<'_>> {
        let mut set = self.in_flight.lock();
        if !set.insert(email.to_string()) {
            return Err(Error::Conflict(format!(
                "an eligibility run for {} is already in progress",
                email
            )));
        }
        Ok(InFlight {
            set: &self.in_flight,
            email: email.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use niti_core::{Address, Gender, LocationType, SchemeEligibility, UserProfile};
    use tempfile::TempDir;
    use tokio::sync::Notify;

    /// Replays a fixed response; `None` simulates a 500 from the scorer.
    struct ScriptedScorer {
        response: Mutex<Option<Vec<&'static str>>>,
    }

    impl ScriptedScorer {
        fn new(response: Option<Vec<&'static str>>) -> Arc<Self> {
            Arc::new(Self {
                response: Mutex::new(response),
            })
        }

        fn set(&self, response: Option<Vec<&'static str>>) {
            *self.response.lock() = response;
        }
    }

    #[async_trait]
    impl Scorer for ScriptedScorer {
        async fn score(&self, _email: &str) -> Result<Vec<String>> {
            match self.response.lock().clone() {
                Some(ids) => Ok(ids.into_iter().map(String::from).collect()),
                None => Err(Error::Scorer("status 500".into())),
            }
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    /// Blocks inside `score` until released.
    struct GatedScorer {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl Scorer for GatedScorer {
        async fn score(&self, _email: &str) -> Result<Vec<String>> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(vec!["s1".into()])
        }

        fn name(&self) -> &'static str {
            "gated"
        }
    }

    fn scheme(id: &str) -> Scheme {
        Scheme {
            id: id.into(),
            scheme_name: format!("Scheme {}", id),
            details: None,
            benefits: None,
            documents_required: None,
            application_process: None,
            contact_info: None,
            eligibility: SchemeEligibility::default(),
        }
    }

    fn seeded_store() -> (Arc<SqliteStore>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SqliteStore::open(dir.path().join("niti.db")).unwrap());
        store
            .import_schemes(&[scheme("s1"), scheme("s2"), scheme("s3")])
            .unwrap();
        store
            .insert_profile(&UserProfile {
                email: "a@b.com".into(),
                name: "Meera".into(),
                gender: Gender::Female,
                age: 41,
                address: Address::default(),
                location: LocationType::SemiUrban,
                caste: "General".into(),
                disability: false,
                minority: false,
                student: false,
                bpl: false,
                income: 50000.0,
                profile_photo: None,
                aadhar_verified: false,
                created_at: None,
                updated_at: None,
            })
            .unwrap();
        (store, dir)
    }

    fn sorted_ids(outcome: &MatchOutcome) -> Vec<String> {
        let mut ids: Vec<String> = outcome.schemes().iter().map(|s| s.id.clone()).collect();
        ids.sort();
        ids
    }

    #[tokio::test]
    async fn test_returns_exactly_scored_schemes() {
        let (store, _dir) = seeded_store();
        let matcher = EligibilityMatcher::new(store, ScriptedScorer::new(Some(vec!["s1", "s3"])));

        let outcome = matcher.find_schemes("a@b.com").await.unwrap();
        assert_eq!(sorted_ids(&outcome), vec!["s1", "s3"]);
        assert_eq!(
            sorted_ids(&matcher.current_schemes("a@b.com").unwrap()),
            vec!["s1", "s3"]
        );
    }

    #[tokio::test]
    async fn test_rerun_replaces_previous_set() {
        let (store, _dir) = seeded_store();
        let scorer = ScriptedScorer::new(Some(vec!["s1", "s3"]));
        let matcher = EligibilityMatcher::new(store.clone(), scorer.clone());
        matcher.find_schemes("a@b.com").await.unwrap();

        scorer.set(Some(vec!["s2"]));
        let outcome = matcher.find_schemes("a@b.com").await.unwrap();
        assert_eq!(sorted_ids(&outcome), vec!["s2"]);
        assert_eq!(store.get_eligible_scheme_ids("a@b.com").unwrap(), vec!["s2"]);
    }

    #[tokio::test]
    async fn test_scorer_failure_leaves_rows_untouched() {
        let (store, _dir) = seeded_store();
        let scorer = ScriptedScorer::new(Some(vec!["s1", "s2"]));
        let matcher = EligibilityMatcher::new(store.clone(), scorer.clone());
        matcher.find_schemes("a@b.com").await.unwrap();

        scorer.set(None);
        let err = matcher.find_schemes("a@b.com").await.unwrap_err();
        assert!(matches!(err, Error::Scorer(_)));
        assert_eq!(
            store.get_eligible_scheme_ids("a@b.com").unwrap(),
            vec!["s1", "s2"]
        );
    }

    #[tokio::test]
    async fn test_empty_response_is_explicit_empty_state() {
        let (store, _dir) = seeded_store();
        let matcher = EligibilityMatcher::new(store.clone(), ScriptedScorer::new(Some(vec![])));

        let outcome = matcher.find_schemes("a@b.com").await.unwrap();
        assert_eq!(outcome, MatchOutcome::NoEligibleSchemes);
        assert!(store.get_eligible_scheme_ids("a@b.com").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_ids_dropped_by_join() {
        let (store, _dir) = seeded_store();
        let matcher =
            EligibilityMatcher::new(store, ScriptedScorer::new(Some(vec!["s2", "retired"])));
        let outcome = matcher.find_schemes("a@b.com").await.unwrap();
        assert_eq!(sorted_ids(&outcome), vec!["s2"]);
    }

    #[tokio::test]
    async fn test_unknown_profile_is_not_found() {
        let (store, _dir) = seeded_store();
        let matcher = EligibilityMatcher::new(store, ScriptedScorer::new(Some(vec!["s1"])));
        assert!(matches!(
            matcher.find_schemes("ghost@b.com").await,
            Err(Error::NotFound(_))
        ));
        assert!(!matcher.is_running("ghost@b.com"));
    }

    #[tokio::test]
    async fn test_second_run_while_busy_is_refused() {
        let (store, _dir) = seeded_store();
        let gate = Arc::new(GatedScorer {
            entered: Notify::new(),
            release: Notify::new(),
        });
        let matcher = Arc::new(EligibilityMatcher::new(store, gate.clone()));

        let first = {
            let matcher = matcher.clone();
            tokio::spawn(async move { matcher.find_schemes("a@b.com").await })
        };
        gate.entered.notified().await;

        assert!(matcher.is_running("a@b.com"));
        assert!(matches!(
            matcher.find_schemes("a@b.com").await,
            Err(Error::Conflict(_))
        ));

        gate.release.notify_one();
        let outcome = first.await.unwrap().unwrap();
        assert_eq!(sorted_ids(&outcome), vec!["s1"]);
        assert!(!matcher.is_running("a@b.com"));
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_value(MatchOutcome::NoEligibleSchemes).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "no_eligible_schemes" }));
    }
}
