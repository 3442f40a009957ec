//! The verification flow: validate, submit, record.

use tracing::info;

use niti_core::{Error, Result};
use niti_store::SqliteStore;

use crate::client::{VerifyRequest, Verifier};

pub const MISSING_IMAGES: &str = "Please upload both front and back images of your Aadhaar card";
pub const REJECTED: &str =
    "Verification failed. Please ensure your Aadhaar details match your profile information.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    Verified,
    /// The verifier answered but did not match the card to the profile.
    Rejected(String),
}

/// Verify `email`'s identity card.
///
/// The verified flag is only ever set here, and only on a positive
/// verdict. Rejections and verifier failures leave the profile unchanged.
pub async fn verify(
    store: &SqliteStore,
    verifier: &dyn Verifier,
    email: &str,
    front: &[u8],
    back: &[u8],
) -> Result<VerifyOutcome> {
    if front.is_empty() || back.is_empty() {
        return Err(Error::field("images", MISSING_IMAGES));
    }

    let profile = store
        .get_profile(email)?
        .ok_or_else(|| Error::NotFound(format!("profile {}", email)))?;
    if profile.aadhar_verified {
        return Ok(VerifyOutcome::Verified);
    }

    let request = VerifyRequest::encode(email, front, back);
    if !verifier.check(&request).await? {
        info!("Verifier rejected documents for {}", email);
        return Ok(VerifyOutcome::Rejected(REJECTED.to_string()));
    }

    if !store.set_verified(email)? {
        return Err(Error::NotFound(format!("profile {}", email)));
    }
    info!("Marked {} as verified", email);
    Ok(VerifyOutcome::Verified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use niti_core::{Address, Gender, LocationType, UserProfile};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Fixed verdict; `None` simulates a transport failure.
    struct FixedVerifier {
        verdict: Option<bool>,
        calls: AtomicUsize,
    }

    impl FixedVerifier {
        fn new(verdict: Option<bool>) -> Self {
            Self {
                verdict,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Verifier for FixedVerifier {
        async fn check(&self, _request: &VerifyRequest) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.verdict
                .ok_or_else(|| Error::Verifier("connection refused".into()))
        }
    }

    fn store_with_profile() -> (SqliteStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(dir.path().join("niti.db")).unwrap();
        store
            .insert_profile(&UserProfile {
                email: "a@b.com".into(),
                name: "Asha".into(),
                gender: Gender::Female,
                age: 29,
                address: Address {
                    pincode: "110001".into(),
                    state: "Delhi".into(),
                    city: "Central Delhi".into(),
                },
                location: LocationType::Urban,
                caste: "OBC".into(),
                disability: false,
                minority: false,
                student: false,
                bpl: true,
                income: 90000.0,
                profile_photo: None,
                aadhar_verified: false,
                created_at: None,
                updated_at: None,
            })
            .unwrap();
        (store, dir)
    }

    fn is_verified(store: &SqliteStore) -> bool {
        store.get_profile("a@b.com").unwrap().unwrap().aadhar_verified
    }

    #[tokio::test]
    async fn test_positive_verdict_sets_flag() {
        let (store, _dir) = store_with_profile();
        let verifier = FixedVerifier::new(Some(true));
        let outcome = verify(&store, &verifier, "a@b.com", b"f", b"b").await.unwrap();
        assert_eq!(outcome, VerifyOutcome::Verified);
        assert!(is_verified(&store));
    }

    #[tokio::test]
    async fn test_negative_verdict_leaves_flag() {
        let (store, _dir) = store_with_profile();
        let verifier = FixedVerifier::new(Some(false));
        let outcome = verify(&store, &verifier, "a@b.com", b"f", b"b").await.unwrap();
        assert_eq!(outcome, VerifyOutcome::Rejected(REJECTED.to_string()));
        assert!(!is_verified(&store));
    }

    #[tokio::test]
    async fn test_missing_image_makes_no_call() {
        let (store, _dir) = store_with_profile();
        let verifier = FixedVerifier::new(Some(true));
        let err = verify(&store, &verifier, "a@b.com", b"f", b"").await.unwrap_err();
        assert!(matches!(err, Error::Validation(ref f) if f[0].message == MISSING_IMAGES));
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_transport_error_leaves_flag() {
        let (store, _dir) = store_with_profile();
        let verifier = FixedVerifier::new(None);
        let err = verify(&store, &verifier, "a@b.com", b"f", b"b").await.unwrap_err();
        assert!(matches!(err, Error::Verifier(_)));
        assert!(!is_verified(&store));
    }

    #[tokio::test]
    async fn test_already_verified_skips_verifier() {
        let (store, _dir) = store_with_profile();
        store.set_verified("a@b.com").unwrap();
        let verifier = FixedVerifier::new(Some(false));
        let outcome = verify(&store, &verifier, "a@b.com", b"f", b"b").await.unwrap();
        assert_eq!(outcome, VerifyOutcome::Verified);
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_profile() {
        let (store, _dir) = store_with_profile();
        let verifier = FixedVerifier::new(Some(true));
        assert!(matches!(
            verify(&store, &verifier, "x@y.com", b"f", b"b").await,
            Err(Error::NotFound(_))
        ));
    }
}
