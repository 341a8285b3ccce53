use crate::error::Result;
use crate::models::{Contact, NewContact};

/// Storage operations the resolver depends on.
///
/// Implementations must hide soft-deleted contacts from [`find_contacts`]
/// and return results ordered by creation time, then id.
///
/// [`find_contacts`]: ContactStore::find_contacts
pub trait ContactStore {
    /// All live contacts matching any clause of `filter`.
    fn find_contacts(&self, filter: &ContactFilter) -> Result<Vec<Contact>>;

    /// Persist a new contact, assigning its id and timestamps.
    fn create_contact(&self, input: NewContact) -> Result<Contact>;

    /// Make `contact` a secondary of `primary_id`, refreshing `updated_at`.
    ///
    /// The change is applied to storage and to `contact` in place.
    fn link_to_primary(&self, contact: &mut Contact, primary_id: i64) -> Result<()>;
}

/// OR-combined lookup clauses for [`ContactStore::find_contacts`].
///
/// A filter with no clauses matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactFilter {
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub ids: Vec<i64>,
    pub linked_ids: Vec<i64>,
}

impl ContactFilter {
    /// Contacts sharing the given email or phone number.
    pub fn by_identifiers(email: Option<&str>, phone_number: Option<&str>) -> Self {
        Self {
            email: email.map(str::to_owned),
            phone_number: phone_number.map(str::to_owned),
            ..Self::default()
        }
    }

    /// Contacts whose id is in `ids` or whose `linked_id` is in `ids`.
    pub fn by_links(ids: Vec<i64>) -> Self {
        Self {
            linked_ids: ids.clone(),
            ids,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.phone_number.is_none()
            && self.ids.is_empty()
            && self.linked_ids.is_empty()
    }

    /// Whether `contact` is visible and satisfies at least one clause.
    pub fn matches(&self, contact: &Contact) -> bool {
        if contact.deleted_at.is_some() {
            return false;
        }

        let email = self.email.is_some() && contact.email == self.email;
        let phone = self.phone_number.is_some() && contact.phone_number == self.phone_number;
        let id = self.ids.contains(&contact.id);
        let linked = contact
            .linked_id
            .is_some_and(|linked_id| self.linked_ids.contains(&linked_id));

        email || phone || id || linked
    }
}
