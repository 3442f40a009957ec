//! Registration and profile edits.

use serde::Deserialize;
use tracing::{error, info, warn};

use niti_core::{Error, FieldError, Result, UserProfile};
use niti_store::{PhotoBucket, ProfileUpdate, SqliteStore};

use crate::credentials::hash_password;
use crate::form::{check_pincode, lenient_opt_string, parse_age, parse_income, resolve, IntakeForm};
use crate::lookup::PostalLookup;

/// Create the login identity and the profile row for a finished form.
///
/// The two writes are not one transaction from the caller's view: if the
/// profile insert fails the identity is deleted again and the insert error
/// is returned.
pub fn register(store: &SqliteStore, form: &IntakeForm) -> Result<UserProfile> {
    let profile = form.to_profile()?;
    let password_hash = hash_password(&form.password)?;

    store.create_identity(&profile.email, &password_hash)?;

    if let Err(insert_err) = store.insert_profile(&profile) {
        warn!(
            "Profile insert for {} failed, removing identity: {}",
            profile.email, insert_err
        );
        if let Err(cleanup_err) = store.delete_identity(&profile.email) {
            error!(
                "Could not remove orphaned identity {}: {}",
                profile.email, cleanup_err
            );
        }
        return Err(insert_err);
    }

    info!("Registered {}", profile.email);
    store
        .get_profile(&profile.email)?
        .ok_or_else(|| Error::Internal(format!("profile {} vanished after insert", profile.email)))
}

/// Fields editable after signup. Absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProfileEdit {
    #[serde(deserialize_with = "lenient_opt_string")]
    pub age: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub income: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub pincode: Option<String>,
}

/// Apply an edit. A changed pincode is re-resolved and replaces state and
/// city; a rejected code fails the whole edit.
pub async fn update_profile(
    store: &SqliteStore,
    lookup: &dyn PostalLookup,
    email: &str,
    edit: &ProfileEdit,
) -> Result<UserProfile> {
    let mut errors: Vec<FieldError> = Vec::new();
    let mut update = ProfileUpdate::default();

    if let Some(raw) = &edit.age {
        match parse_age(raw) {
            Ok(age) => update.age = Some(age),
            Err(e) => errors.push(e),
        }
    }
    if let Some(raw) = &edit.income {
        match parse_income(raw) {
            Ok(income) => update.income = Some(income),
            Err(e) => errors.push(e),
        }
    }
    let pincode = match &edit.pincode {
        Some(raw) => match check_pincode(raw) {
            Ok(()) => Some(raw.trim()),
            Err(e) => {
                errors.push(e);
                None
            }
        },
        None => None,
    };
    if !errors.is_empty() {
        return Err(Error::Validation(errors));
    }

    if let Some(code) = pincode {
        let address = resolve(lookup, code)
            .await
            .map_err(|e| Error::Validation(vec![e]))?;
        update.address = Some(address);
    }

    if !store.update_profile(email, &update)? {
        return Err(Error::NotFound(format!("profile {}", email)));
    }
    store
        .get_profile(email)?
        .ok_or_else(|| Error::NotFound(format!("profile {}", email)))
}

/// Store a new profile photo and record its key. Returns the key.
///
/// The previous photo object, if any, is removed once the new key is
/// recorded.
pub fn upload_photo(
    store: &SqliteStore,
    bucket: &PhotoBucket,
    email: &str,
    filename: &str,
    bytes: &[u8],
) -> Result<String> {
    if bytes.is_empty() {
        return Err(Error::field("photo", "Choose an image to upload"));
    }

    let key = PhotoBucket::object_key(email, filename);
    bucket.put(&key, bytes)?;

    let previous = match store.set_profile_photo(email, &key) {
        Ok(previous) => previous,
        Err(e) => {
            let _ = bucket.remove(&key);
            return Err(e);
        }
    };

    if let Some(old) = previous.filter(|old| *old != key) {
        if let Err(e) = bucket.remove(&old) {
            warn!("Left stale photo {} behind: {}", old, e);
        }
    }
    info!("Stored profile photo {} for {}", key, email);
    Ok(key)
}
