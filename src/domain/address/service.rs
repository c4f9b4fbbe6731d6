use std::sync::Arc;

use crate::clock::Clock;
use crate::domain::ids::{AddressId, UserId};
use crate::store::Store;
use crate::validation::Validate;

use super::errors::AddressError;
use super::value_objects::*;

#[derive(Clone)]
pub struct AddressService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl AddressService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// A user's first address becomes their default.
    #[tracing::instrument(skip(self, input))]
    pub async fn add(&self, user_id: UserId, mut input: NewAddress) -> Result<Address, AddressError> {
        input.validate()?;
        if self.store.get_user(user_id).await?.is_none() {
            return Err(AddressError::UnknownUser(user_id));
        }
        if self.store.list_addresses(user_id).await?.is_empty() {
            input.is_default = true;
        }

        let address = self
            .store
            .insert_address(user_id, input, self.clock.now())
            .await?;

        tracing::info!(
            address_id = %address.id,
            is_default = address.is_default,
            "Address added"
        );
        Ok(address)
    }

    /// Addresses owned by someone else are reported as missing.
    pub async fn get(&self, user_id: UserId, id: AddressId) -> Result<Address, AddressError> {
        match self.store.get_address(id).await? {
            Some(address) if address.belongs_to(user_id) => Ok(address),
            _ => Err(AddressError::NotFound(id)),
        }
    }

    pub async fn update(
        &self,
        user_id: UserId,
        id: AddressId,
        update: AddressUpdate,
    ) -> Result<Address, AddressError> {
        update.validate()?;
        let mut address = self.get(user_id, id).await?;
        address.apply(update, self.clock.now());
        self.store.save_address(&address).await?;
        Ok(address)
    }

    pub async fn list(&self, user_id: UserId) -> Result<Vec<Address>, AddressError> {
        Ok(self.store.list_addresses(user_id).await?)
    }

    pub async fn set_default(&self, user_id: UserId, id: AddressId) -> Result<Address, AddressError> {
        self.update(
            user_id,
            id,
            AddressUpdate {
                is_default: Some(true),
                ..AddressUpdate::default()
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixture, home_address};

    #[tokio::test]
    async fn test_first_address_becomes_default() {
        let fx = fixture();
        let user = fx.user("rina@example.com").await;

        let address = fx
            .addresses
            .add(
                user.id,
                NewAddress {
                    is_default: false,
                    ..home_address()
                },
            )
            .await
            .unwrap();

        assert!(address.is_default);
    }

    #[tokio::test]
    async fn test_only_one_default_per_user() {
        let fx = fixture();
        let user = fx.user("rina@example.com").await;
        let home = fx.addresses.add(user.id, home_address()).await.unwrap();
        let office = fx
            .addresses
            .add(
                user.id,
                NewAddress {
                    label: "Office".to_string(),
                    is_default: true,
                    ..home_address()
                },
            )
            .await
            .unwrap();

        let defaults: Vec<_> = fx
            .addresses
            .list(user.id)
            .await
            .unwrap()
            .into_iter()
            .filter(|a| a.is_default)
            .map(|a| a.id)
            .collect();
        assert_eq!(defaults, vec![office.id]);

        fx.addresses.set_default(user.id, home.id).await.unwrap();
        let defaults: Vec<_> = fx
            .addresses
            .list(user.id)
            .await
            .unwrap()
            .into_iter()
            .filter(|a| a.is_default)
            .map(|a| a.id)
            .collect();
        assert_eq!(defaults, vec![home.id]);
    }

    #[tokio::test]
    async fn test_default_flag_is_per_user() {
        let fx = fixture();
        let rina = fx.user("rina@example.com").await;
        let budi = fx.user("budi@example.com").await;

        let rina_home = fx.addresses.add(rina.id, home_address()).await.unwrap();
        fx.addresses.add(budi.id, home_address()).await.unwrap();

        assert!(fx.addresses.get(rina.id, rina_home.id).await.unwrap().is_default);
    }

    #[tokio::test]
    async fn test_foreign_address_is_not_found() {
        let fx = fixture();
        let rina = fx.user("rina@example.com").await;
        let budi = fx.user("budi@example.com").await;
        let address = fx.addresses.add(rina.id, home_address()).await.unwrap();

        let err = fx.addresses.get(budi.id, address.id).await.unwrap_err();
        assert!(matches!(err, AddressError::NotFound(id) if id == address.id));
    }

    #[tokio::test]
    async fn test_add_for_unknown_user() {
        let fx = fixture();
        let err = fx
            .addresses
            .add(UserId::new(77), home_address())
            .await
            .unwrap_err();
        assert!(matches!(err, AddressError::UnknownUser(_)));
    }

    #[tokio::test]
    async fn test_update_clears_second_line() {
        let fx = fixture();
        let user = fx.user("rina@example.com").await;
        let address = fx
            .addresses
            .add(
                user.id,
                NewAddress {
                    address_line_2: Some("Blok C".to_string()),
                    ..home_address()
                },
            )
            .await
            .unwrap();

        let kept = fx
            .addresses
            .update(
                user.id,
                address.id,
                AddressUpdate {
                    city: Some("Jakarta".to_string()),
                    ..AddressUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(kept.address_line_2.as_deref(), Some("Blok C"));

        let cleared = fx
            .addresses
            .update(
                user.id,
                address.id,
                AddressUpdate {
                    address_line_2: Some(None),
                    ..AddressUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(cleared.address_line_2, None);
        assert_eq!(cleared.city, "Jakarta");
        assert_eq!(fx.addresses.get(user.id, address.id).await.unwrap().address_line_2, None);
    }
}
