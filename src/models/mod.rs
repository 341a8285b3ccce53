//! Domain models for identity reconciliation.
//!
//! - [`Contact`]: a stored observation of an email and/or phone number. Every
//!   contact is either the primary of an identity or a secondary linked to it.
//! - [`Observation`]: a validated incoming `(email, phoneNumber)` pair.
//! - [`IdentityView`]: the consolidated identity returned to callers.

mod contact;
mod identify;

pub use contact::*;
pub use identify::*;
