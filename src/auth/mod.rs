//! Adaptive authentication and session subsystem.
//!
//! Login control flow: bearer/body extraction → input validation → schema
//! capabilities → credential resolution → lockout check → password
//! verification (with legacy-hash migration) → lockout bookkeeping → token
//! issuance. Protected endpoints run bearer extraction → token verification →
//! optional account re-fetch.
//!
//! Every store round-trip that is not essential to the outcome of the request
//! (activity probing, lockout bookkeeping, hash migration, refresh-token
//! records) is caught locally and logged; availability of the login path wins
//! over completeness of the secondary behaviors.

pub mod bearer;
pub mod debug_gate;
pub mod error;
pub mod lockout;
pub mod password;
pub mod resolver;
pub mod schema;
pub mod state;
pub mod token;

pub use error::ApiError;
pub use resolver::{Account, Role};
pub use state::{AuthConfig, AuthState};
