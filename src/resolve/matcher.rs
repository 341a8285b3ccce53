use std::collections::{BTreeSet, HashMap, HashSet};

use super::store::{ContactFilter, ContactStore};
use crate::error::Result;
use crate::models::{Contact, Observation};

/// Find every live contact connected to `observation`.
///
/// The seed set holds contacts sharing the observation's email or phone
/// number. It is then closed over the link graph: each pass looks up contacts
/// whose id or `linked_id` equals an id or `linked_id` already in the set,
/// until a pass discovers nothing new. With every secondary pointing straight
/// at its primary this settles after the first expansion; longer chains left
/// behind in storage are still followed to the end.
///
/// The result is deduplicated by id and ordered by creation time, then id.
/// An empty result means no existing identity matches.
pub fn match_contacts<S>(store: &S, observation: &Observation) -> Result<Vec<Contact>>
where
    S: ContactStore + ?Sized,
{
    let seed = store.find_contacts(&ContactFilter::by_identifiers(
        observation.email(),
        observation.phone_number(),
    ))?;

    if seed.is_empty() {
        return Ok(seed);
    }

    let seed_len = seed.len();
    let mut matched: HashMap<i64, Contact> = seed.into_iter().map(|c| (c.id, c)).collect();
    let mut expanded: HashSet<i64> = HashSet::new();
    let mut passes = 0;

    loop {
        let frontier: BTreeSet<i64> = matched
            .values()
            .flat_map(|c| std::iter::once(c.id).chain(c.linked_id))
            .filter(|id| !expanded.contains(id))
            .collect();

        if frontier.is_empty() {
            break;
        }

        expanded.extend(frontier.iter().copied());
        passes += 1;

        let linked = store.find_contacts(&ContactFilter::by_links(frontier.into_iter().collect()))?;
        for contact in linked {
            matched.entry(contact.id).or_insert(contact);
        }
    }

    let mut contacts: Vec<Contact> = matched.into_values().collect();
    contacts.sort_by_key(Contact::age_key);

    tracing::debug!(
        seed = seed_len,
        matched = contacts.len(),
        passes,
        "Matched existing contacts"
    );

    Ok(contacts)
}
