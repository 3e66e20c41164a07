//! Emergency contact structure and the contact resolver.
//!
//! A user's safety circle is a fixed shape: at most one family contact, at
//! most one partner contact, and up to [`MAX_FRIENDS`] friends. Every entry
//! optionally carries a phone number and/or an email address.
//! [`resolve_contacts`] is the only code that walks this shape; everything
//! downstream works with the flat [`ResolvedContacts`] sets.

use std::collections::BTreeSet;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use validator::ValidateEmail;

/// Number of friend slots in a safety circle.
pub const MAX_FRIENDS: usize = 2;

/// A single person in a user's safety circle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactEntry {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Free-form relation label, e.g. "Mother". Family contacts only.
    #[serde(default)]
    pub relation: Option<String>,
}

impl ContactEntry {
    pub fn with_phone(phone: impl Into<String>) -> Self {
        Self {
            phone: Some(phone.into()),
            ..Self::default()
        }
    }

    pub fn with_email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            ..Self::default()
        }
    }
}

/// The full safety circle of a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyContacts {
    #[serde(default)]
    pub family: Option<ContactEntry>,
    #[serde(default)]
    pub partner: Option<ContactEntry>,
    /// Friend slots. Accepts a shorter list on input and pads with `None`.
    #[serde(default, deserialize_with = "deserialize_friends")]
    pub friends: [Option<ContactEntry>; MAX_FRIENDS],
}

fn deserialize_friends<'de, D>(
    deserializer: D,
) -> Result<[Option<ContactEntry>; MAX_FRIENDS], D::Error>
where
    D: Deserializer<'de>,
{
    let list =
        Option::<Vec<Option<ContactEntry>>>::deserialize(deserializer)?.unwrap_or_default();
    if list.len() > MAX_FRIENDS {
        return Err(D::Error::invalid_length(list.len(), &"at most 2 friend contacts"));
    }

    let mut slots: [Option<ContactEntry>; MAX_FRIENDS] = Default::default();
    for (slot, entry) in slots.iter_mut().zip(list) {
        *slot = entry;
    }
    Ok(slots)
}

impl EmergencyContacts {
    fn entries(&self) -> impl Iterator<Item = &ContactEntry> {
        self.family
            .iter()
            .chain(self.partner.iter())
            .chain(self.friends.iter().flatten())
    }
}

/// Flat, de-duplicated notification targets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedContacts {
    pub phones: BTreeSet<String>,
    pub emails: BTreeSet<String>,
}

impl ResolvedContacts {
    /// Total number of distinct addresses across both channels.
    pub fn len(&self) -> usize {
        self.phones.len() + self.emails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phones.is_empty() && self.emails.is_empty()
    }
}

/// Flatten a safety circle into phone and email sets.
///
/// Blank fields contribute nothing. Addresses shared between roles appear
/// once. Emails that are not syntactically valid are dropped so a single bad
/// entry cannot fail a whole email batch.
pub fn resolve_contacts(contacts: &EmergencyContacts) -> ResolvedContacts {
    let mut resolved = ResolvedContacts::default();

    for entry in contacts.entries() {
        if let Some(phone) = entry.phone.as_deref().and_then(normalize_phone) {
            resolved.phones.insert(phone);
        }
        if let Some(email) = entry.email.as_deref().and_then(normalize_email) {
            resolved.emails.insert(email);
        }
    }

    resolved
}

/// Strip common phone separators, keeping digits and a leading `+`.
///
/// Returns `None` if no digits remain.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let mut out = String::with_capacity(trimmed.len());
    if trimmed.starts_with('+') {
        out.push('+');
    }
    out.extend(trimmed.chars().filter(char::is_ascii_digit));

    if out.trim_start_matches('+').is_empty() {
        None
    } else {
        Some(out)
    }
}

/// Trim and lowercase an email address, dropping invalid ones.
pub fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() || !email.validate_email() {
        return None;
    }
    Some(email)
}
