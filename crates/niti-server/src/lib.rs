//! Niti-Nirman server library: application state, the session gate and
//! the HTTP routes. The `niti` binary wires these to a listener.

pub mod auth;
pub mod i18n;
pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::{AppState, Collaborators};
