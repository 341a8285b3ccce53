//! Identity resolution.
//!
//! Resolution runs in two strictly ordered stages against a [`ContactStore`]:
//!
//! 1. [`match_contacts`] finds every stored contact connected to the incoming
//!    observation, either directly through an equal email/phone number or
//!    indirectly through the `linked_id` graph.
//! 2. [`merge`] picks the canonical primary of that set, demotes any other
//!    primaries, and records a new contact only when the observation carries
//!    a value the identity has not seen yet.
//!
//! Neither stage provides mutual exclusion on its own. Callers that can run
//! concurrently must wrap [`identify`] in a transaction that serializes
//! writers, as [`crate::db::Database::identify`] does.

mod matcher;
mod merger;
mod store;


pub use matcher::match_contacts;
pub use merger::merge;
pub use store::{ContactFilter, ContactStore};

use crate::error::Result;
use crate::models::{IdentityView, Observation};

/// Match the observation against `store` and merge it into an identity.
pub fn identify<S>(store: &S, observation: &Observation) -> Result<IdentityView>
where
    S: ContactStore + ?Sized,
{
    let matched = match_contacts(store, observation)?;
    merge(store, observation, matched)
}
