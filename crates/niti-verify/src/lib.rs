//! Niti Verify — identity-document verification.
//!
//! Uploads the front and back images of a user's identity card to the
//! external OCR verifier and records a positive result on the profile.

pub mod client;
pub mod flow;

pub use client::{HttpVerifier, VerifyRequest, Verifier};
pub use flow::{verify, VerifyOutcome, MISSING_IMAGES, REJECTED};
