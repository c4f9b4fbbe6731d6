use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::{AddressId, UserId};
use crate::domain::nullable;
use crate::validation::{self, Validate, ValidationError};

// ============================================================================
// Address Value Objects
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    /// e.g. "Home", "Office"
    pub label: String,
    pub recipient_name: String,
    pub phone: String,
    pub address_line_1: String,
    pub address_line_2: Option<String>,
    pub city: String,
    pub province: String,
    pub postal_code: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Address {
    pub fn belongs_to(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }

    pub fn apply(&mut self, update: AddressUpdate, now: DateTime<Utc>) {
        if let Some(v) = update.label {
            self.label = v;
        }
        if let Some(v) = update.recipient_name {
            self.recipient_name = v;
        }
        if let Some(v) = update.phone {
            self.phone = v;
        }
        if let Some(v) = update.address_line_1 {
            self.address_line_1 = v;
        }
        if let Some(v) = update.address_line_2 {
            self.address_line_2 = v;
        }
        if let Some(v) = update.city {
            self.city = v;
        }
        if let Some(v) = update.province {
            self.province = v;
        }
        if let Some(v) = update.postal_code {
            self.postal_code = v;
        }
        if let Some(v) = update.is_default {
            self.is_default = v;
        }
        self.updated_at = now;
    }
}

/// Address fields as captured from the customer; also the shape embedded in
/// order responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAddress {
    pub label: String,
    pub recipient_name: String,
    pub phone: String,
    pub address_line_1: String,
    pub address_line_2: Option<String>,
    pub city: String,
    pub province: String,
    pub postal_code: String,
    #[serde(default)]
    pub is_default: bool,
}

impl Validate for NewAddress {
    fn validate(&self) -> Result<(), ValidationError> {
        validation::required("label", &self.label, 50)?;
        validation::required("recipient_name", &self.recipient_name, 100)?;
        validation::required("phone", &self.phone, 20)?;
        validation::required("address_line_1", &self.address_line_1, 200)?;
        validation::optional_max_len(
            "address_line_2",
            self.address_line_2.as_deref(),
            200,
        )?;
        validation::required("city", &self.city, 100)?;
        validation::required("province", &self.province, 100)?;
        validation::required("postal_code", &self.postal_code, 10)
    }
}

impl From<&Address> for NewAddress {
    fn from(address: &Address) -> Self {
        Self {
            label: address.label.clone(),
            recipient_name: address.recipient_name.clone(),
            phone: address.phone.clone(),
            address_line_1: address.address_line_1.clone(),
            address_line_2: address.address_line_2.clone(),
            city: address.city.clone(),
            province: address.province.clone(),
            postal_code: address.postal_code.clone(),
            is_default: address.is_default,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddressUpdate {
    pub label: Option<String>,
    pub recipient_name: Option<String>,
    pub phone: Option<String>,
    pub address_line_1: Option<String>,
    /// `Some(None)` clears the second line.
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub address_line_2: Option<Option<String>>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub postal_code: Option<String>,
    pub is_default: Option<bool>,
}

impl Validate for AddressUpdate {
    fn validate(&self) -> Result<(), ValidationError> {
        let required = [
            ("label", self.label.as_deref(), 50),
            ("recipient_name", self.recipient_name.as_deref(), 100),
            ("phone", self.phone.as_deref(), 20),
            ("address_line_1", self.address_line_1.as_deref(), 200),
            ("city", self.city.as_deref(), 100),
            ("province", self.province.as_deref(), 100),
            ("postal_code", self.postal_code.as_deref(), 10),
        ];
        for (field, value, max) in required {
            if let Some(value) = value {
                validation::required(field, value, max)?;
            }
        }
        validation::optional_max_len(
            "address_line_2",
            self.address_line_2.as_ref().and_then(|v| v.as_deref()),
            200,
        )
    }
}
