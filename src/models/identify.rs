use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// Body of `POST /identify`.
///
/// `phoneNumber` is accepted either as a JSON string or as a JSON number,
/// since clients commonly send it as the latter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub phone_number: Option<String>,
}

impl IdentifyRequest {
    pub fn into_observation(self) -> Result<Observation> {
        Observation::new(self.email, self.phone_number)
    }
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Text(s)) => Some(s),
        Some(Raw::Number(n)) => Some(n.to_string()),
        None => None,
    })
}

/// A validated `(email, phoneNumber)` pair with at least one value present.
///
/// Empty strings are treated as absent. Values are otherwise kept verbatim:
/// matching is exact string equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    email: Option<String>,
    phone_number: Option<String>,
}

impl Observation {
    pub fn new(email: Option<String>, phone_number: Option<String>) -> Result<Self> {
        let email = email.filter(|s| !s.is_empty());
        let phone_number = phone_number.filter(|s| !s.is_empty());

        if email.is_none() && phone_number.is_none() {
            return Err(Error::MissingIdentifier);
        }

        Ok(Self {
            email,
            phone_number,
        })
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn phone_number(&self) -> Option<&str> {
        self.phone_number.as_deref()
    }
}

/// The consolidated view of one identity.
///
/// `emails` and `phone_numbers` list the primary's own value first (when it
/// has one), followed by every other distinct value in contact order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityView {
    pub primary_contact_id: i64,
    pub emails: Vec<String>,
    pub phone_numbers: Vec<String>,
    pub secondary_contact_ids: Vec<i64>,
}

/// Response body of `POST /identify`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyResponse {
    pub contact: IdentityView,
}

/// Body returned with every non-2xx response from the HTTP API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
