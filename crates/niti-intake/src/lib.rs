//! Niti Intake — the three-step registration form, login credentials,
//! profile edits and the postal-code lookup that fills state and city.

pub mod credentials;
pub mod form;
pub mod lookup;
pub mod profile;

pub use credentials::{hash_password, login, verify_password};
pub use form::{IntakeForm, IntakeStep};
pub use lookup::{HttpPostalLookup, PostalLookup};
pub use profile::{register, update_profile, upload_photo, ProfileEdit};
