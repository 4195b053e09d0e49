//! User profile types.
//!
//! `UserProfile` is what the backend returns for the logged-in customer.
//! `ProfileUpdate` is the partial form submitted from the account page; the
//! email is deliberately absent because it cannot change after sign-up.

use serde::{Deserialize, Serialize};

use nursery_core::Email;

/// Postal address attached to a profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
}

/// The authenticated customer's profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Address,
    /// Grants access to the back-office pages.
    #[serde(default)]
    pub is_admin: bool,
}

impl UserProfile {
    /// "First Last", trimmed when either part is blank.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Apply a partial update in place. Fields left as `None` are kept.
    pub fn apply(&mut self, update: &ProfileUpdate) {
        if let Some(first_name) = &update.first_name {
            self.first_name.clone_from(first_name);
        }
        if let Some(last_name) = &update.last_name {
            self.last_name.clone_from(last_name);
        }
        if let Some(phone) = &update.phone {
            self.phone = Some(phone.clone());
        }
        if let Some(address) = &update.address {
            address.apply_to(&mut self.address);
        }
    }
}

/// Partial address change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
}

impl AddressUpdate {
    fn apply_to(&self, address: &mut Address) {
        if let Some(street) = &self.street {
            address.street = Some(street.clone());
        }
        if let Some(city) = &self.city {
            address.city = Some(city.clone());
        }
        if let Some(zip_code) = &self.zip_code {
            address.zip_code = Some(zip_code.clone());
        }
    }

    fn is_empty(&self) -> bool {
        self.street.is_none() && self.city.is_none() && self.zip_code.is_none()
    }
}

/// Partial profile change sent to `PUT /api/auth/profile`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<AddressUpdate>,
}

impl ProfileUpdate {
    /// True when the update would not change anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.phone.is_none()
            && self.address.as_ref().is_none_or(AddressUpdate::is_empty)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_profile() -> UserProfile {
        UserProfile {
            first_name: "Rosa".to_string(),
            last_name: "Gallica".to_string(),
            email: Email::parse("rosa@garden.example").unwrap(),
            phone: None,
            address: Address {
                street: Some("1 Greenhouse Row".to_string()),
                city: Some("Portland".to_string()),
                zip_code: Some("97201".to_string()),
            },
            is_admin: false,
        }
    }

    #[test]
    fn test_profile_wire_format() {
        let json = r#"{
            "firstName": "Rosa",
            "lastName": "Gallica",
            "email": "rosa@garden.example",
            "address": {"city": "Portland", "zipCode": "97201"},
            "isAdmin": true
        }"#;

        let profile: UserProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.full_name(), "Rosa Gallica");
        assert_eq!(profile.address.zip_code.as_deref(), Some("97201"));
        assert_eq!(profile.address.street, None);
        assert!(profile.is_admin);
    }

    #[test]
    fn test_apply_partial_update_keeps_untouched_fields() {
        let mut profile = sample_profile();
        let update = ProfileUpdate {
            phone: Some("555-0100".to_string()),
            address: Some(AddressUpdate {
                city: Some("Salem".to_string()),
                ..AddressUpdate::default()
            }),
            ..ProfileUpdate::default()
        };

        profile.apply(&update);

        assert_eq!(profile.first_name, "Rosa");
        assert_eq!(profile.phone.as_deref(), Some("555-0100"));
        assert_eq!(profile.address.city.as_deref(), Some("Salem"));
        assert_eq!(profile.address.street.as_deref(), Some("1 Greenhouse Row"));
        assert_eq!(profile.email.as_str(), "rosa@garden.example");
    }

    #[test]
    fn test_update_serializes_only_present_fields() {
        let update = ProfileUpdate {
            last_name: Some("Canina".to_string()),
            ..ProfileUpdate::default()
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({"lastName": "Canina"}));
    }

    #[test]
    fn test_empty_update() {
        assert!(ProfileUpdate::default().is_empty());
        assert!(
            ProfileUpdate {
                address: Some(AddressUpdate::default()),
                ..ProfileUpdate::default()
            }
            .is_empty()
        );
    }
}
