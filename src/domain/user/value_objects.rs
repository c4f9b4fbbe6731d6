use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::UserId;
use crate::validation::{self, Validate, ValidationError};

// ============================================================================
// User Value Objects
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
}

impl Validate for NewUser {
    fn validate(&self) -> Result<(), ValidationError> {
        validation::required("email", &self.email, 255)?;
        validation::email("email", &self.email)?;
        validation::required("name", &self.name, 100)?;
        validation::optional_max_len("phone", self.phone.as_deref(), 20)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
}

impl Validate for UserUpdate {
    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            validation::required("name", name, 100)?;
        }
        validation::optional_max_len("phone", self.phone.as_deref(), 20)
    }
}

impl User {
    pub fn apply(&mut self, update: UserUpdate, now: DateTime<Utc>) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(phone) = update.phone {
            self.phone = Some(phone);
        }
        self.updated_at = now;
    }
}
