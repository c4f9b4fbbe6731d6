use std::sync::Arc;

use crate::clock::Clock;
use crate::domain::ids::UserId;
use crate::store::{constraints, Store};
use crate::validation::Validate;

use super::errors::UserError;
use super::value_objects::*;

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl UserService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    #[tracing::instrument(skip(self, input))]
    pub async fn register(&self, mut input: NewUser) -> Result<User, UserError> {
        input.email = input.email.trim().to_ascii_lowercase();
        input.validate()?;
        let email = input.email.clone();

        let user = self
            .store
            .insert_user(input, self.clock.now())
            .await
            .map_err(|e| {
                if e.is_duplicate(constraints::USER_EMAIL) {
                    UserError::EmailTaken(email)
                } else {
                    e.into()
                }
            })?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    pub async fn get(&self, id: UserId) -> Result<User, UserError> {
        self.store.get_user(id).await?.ok_or(UserError::NotFound(id))
    }

    pub async fn update(&self, id: UserId, update: UserUpdate) -> Result<User, UserError> {
        update.validate()?;
        let now = self.clock.now();
        self.modify(id, |user| user.apply(update, now)).await
    }

    pub async fn deactivate(&self, id: UserId) -> Result<User, UserError> {
        let now = self.clock.now();
        let user = self
            .modify(id, |user| {
                user.is_active = false;
                user.updated_at = now;
            })
            .await?;

        tracing::info!(user_id = %id, "User deactivated");
        Ok(user)
    }

    /// Read-modify-write under a row lock.
    async fn modify<F>(&self, id: UserId, change: F) -> Result<User, UserError>
    where
        F: FnOnce(&mut User) + Send,
    {
        let mut tx = self.store.begin().await?;
        let mut user = tx.lock_user(id).await?.ok_or(UserError::NotFound(id))?;
        change(&mut user);
        tx.save_user(&user).await?;
        tx.commit().await?;
        Ok(user)
    }
}
