use super::store::ContactStore;
use crate::error::Result;
use crate::models::{Contact, IdentityView, NewContact, Observation};

/// Merge `observation` into the identity formed by `matched`.
///
/// `matched` must be the output of [`super::match_contacts`] for the same
/// observation. With no match a new primary is created. Otherwise the oldest
/// primary becomes canonical, every other contact in the set is linked
/// directly to it (demoting stray primaries), and a single secondary is
/// created holding whichever of the observed values are new to the identity.
pub fn merge<S>(store: &S, observation: &Observation, matched: Vec<Contact>) -> Result<IdentityView>
where
    S: ContactStore + ?Sized,
{
    if matched.is_empty() {
        let contact = store.create_contact(NewContact::primary(
            observation.email().map(str::to_owned),
            observation.phone_number().map(str::to_owned),
        ))?;
        tracing::info!(contact_id = contact.id, "Created primary contact");

        return Ok(assemble_view(&contact, std::slice::from_ref(&contact)));
    }

    let mut contacts = matched;
    let primary_idx = select_primary(&contacts);
    let primary_id = contacts[primary_idx].id;

    if contacts[primary_idx].is_primary() {
        for contact in contacts.iter_mut() {
            if contact.id == primary_id
                || (contact.is_secondary() && contact.linked_id == Some(primary_id))
            {
                continue;
            }

            let was_primary = contact.is_primary();
            let previous_link = contact.linked_id;
            store.link_to_primary(contact, primary_id)?;

            if was_primary {
                tracing::info!(contact_id = contact.id, primary_id, "Demoted primary contact");
            } else {
                tracing::info!(
                    contact_id = contact.id,
                    primary_id,
                    previous_link,
                    "Relinked secondary contact"
                );
            }
        }
    }

    let novel_email = observation
        .email()
        .filter(|email| !contacts.iter().any(|c| c.email.as_deref() == Some(*email)));
    let novel_phone = observation
        .phone_number()
        .filter(|phone| !contacts.iter().any(|c| c.phone_number.as_deref() == Some(*phone)));

    if novel_email.is_some() || novel_phone.is_some() {
        let contact = store.create_contact(NewContact::secondary(
            novel_email.map(str::to_owned),
            novel_phone.map(str::to_owned),
            primary_id,
        ))?;
        tracing::info!(contact_id = contact.id, primary_id, "Created secondary contact");
        contacts.push(contact);
    }

    Ok(assemble_view(&contacts[primary_idx], &contacts))
}

/// Index of the canonical primary: the oldest primary in the set.
///
/// A non-empty matched set always contains a primary while stored links are
/// consistent. If it does not, the oldest contact is used instead.
fn select_primary(contacts: &[Contact]) -> usize {
    let oldest_primary = contacts
        .iter()
        .enumerate()
        .filter(|(_, c)| c.is_primary())
        .min_by_key(|(_, c)| c.age_key())
        .map(|(idx, _)| idx);

    match oldest_primary {
        Some(idx) => idx,
        None => {
            let idx = contacts
                .iter()
                .enumerate()
                .min_by_key(|(_, c)| c.age_key())
                .map(|(idx, _)| idx)
                .unwrap_or(0);
            tracing::warn!(
                contact_id = contacts.get(idx).map(|c| c.id),
                matched = contacts.len(),
                "Matched contacts contain no primary, falling back to oldest contact"
            );
            idx
        }
    }
}

fn assemble_view(primary: &Contact, contacts: &[Contact]) -> IdentityView {
    let mut emails = Vec::new();
    let mut phone_numbers = Vec::new();

    for contact in std::iter::once(primary).chain(contacts) {
        push_unique(&mut emails, contact.email.as_deref());
        push_unique(&mut phone_numbers, contact.phone_number.as_deref());
    }

    IdentityView {
        primary_contact_id: primary.id,
        emails,
        phone_numbers,
        secondary_contact_ids: contacts
            .iter()
            .filter(|c| c.is_secondary())
            .map(|c| c.id)
            .collect(),
    }
}

fn push_unique(values: &mut Vec<String>, value: Option<&str>) {
    if let Some(value) = value {
        if !values.iter().any(|v| v == value) {
            values.push(value.to_owned());
        }
    }
}
