use std::sync::Arc;

use crate::clock::Clock;
use crate::domain::ids::BannerId;
use crate::store::Store;
use crate::validation::Validate;

use super::errors::PromotionError;
use super::value_objects::*;

#[derive(Clone)]
pub struct BannerService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl BannerService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn create(&self, input: NewBanner) -> Result<Banner, PromotionError> {
        input.validate()?;
        let banner = self.store.insert_banner(input, self.clock.now()).await?;

        tracing::info!(banner_id = %banner.id, "Banner created");
        Ok(banner)
    }

    pub async fn get(&self, id: BannerId) -> Result<Banner, PromotionError> {
        self.store
            .get_banner(id)
            .await?
            .ok_or(PromotionError::BannerNotFound(id))
    }

    pub async fn update(&self, id: BannerId, update: BannerUpdate) -> Result<Banner, PromotionError> {
        update.validate()?;
        let mut banner = self.get(id).await?;
        banner.apply(update);
        // the merged window may be inverted even when each half was fine
        validate_window(banner.start_date, banner.end_date)?;

        self.store.save_banner(&banner).await?;
        Ok(banner)
    }

    pub async fn deactivate(&self, id: BannerId) -> Result<Banner, PromotionError> {
        self.update(
            id,
            BannerUpdate {
                is_active: Some(false),
                ..BannerUpdate::default()
            },
        )
        .await
    }

    /// Banners to show right now, in display order.
    pub async fn list_live(&self) -> Result<Vec<Banner>, PromotionError> {
        let now = self.clock.now();
        let banners = self.store.list_banners(true).await?;
        Ok(banners.into_iter().filter(|b| b.is_live(now)).collect())
    }

    pub async fn list_all(&self) -> Result<Vec<Banner>, PromotionError> {
        Ok(self.store.list_banners(false).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{Classify, ErrorKind};
    use crate::testing::fixture;
    use chrono::Duration;

    fn banner(title: &str, sort_order: i32) -> NewBanner {
        NewBanner {
            title: title.to_string(),
            subtitle: None,
            image_url: format!("https://cdn.example.com/{title}.png"),
            link_url: None,
            sort_order,
            start_date: None,
            end_date: None,
        }
    }

    #[tokio::test]
    async fn test_list_live_respects_window_and_order() {
        let fx = fixture();
        let now = fx.clock.now();

        fx.banners.create(banner("second", 2)).await.unwrap();
        fx.banners.create(banner("first", 1)).await.unwrap();
        fx.banners
            .create(NewBanner {
                start_date: Some(now + Duration::days(1)),
                ..banner("upcoming", 0)
            })
            .await
            .unwrap();
        let hidden = fx.banners.create(banner("hidden", 0)).await.unwrap();
        fx.banners.deactivate(hidden.id).await.unwrap();

        let titles: Vec<_> = fx
            .banners
            .list_live()
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.title)
            .collect();
        assert_eq!(titles, vec!["first", "second"]);

        fx.clock.advance(Duration::days(2));
        let titles: Vec<_> = fx
            .banners
            .list_live()
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.title)
            .collect();
        assert_eq!(titles, vec!["upcoming", "first", "second"]);
    }

    #[tokio::test]
    async fn test_update_cannot_invert_window() {
        let fx = fixture();
        let now = fx.clock.now();
        let created = fx
            .banners
            .create(NewBanner {
                start_date: Some(now),
                ..banner("sale", 0)
            })
            .await
            .unwrap();

        let err = fx
            .banners
            .update(
                created.id,
                BannerUpdate {
                    end_date: Some(Some(now - Duration::hours(1))),
                    ..BannerUpdate::default()
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(fx.banners.get(created.id).await.unwrap().end_date, None);
    }

    #[tokio::test]
    async fn test_clearing_end_date_makes_banner_live_again() {
        let fx = fixture();
        let now = fx.clock.now();
        let expired = fx
            .banners
            .create(NewBanner {
                end_date: Some(now - Duration::days(1)),
                ..banner("expired", 0)
            })
            .await
            .unwrap();
        assert!(fx.banners.list_live().await.unwrap().is_empty());

        let reopened = fx
            .banners
            .update(
                expired.id,
                BannerUpdate {
                    end_date: Some(None),
                    ..BannerUpdate::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(reopened.end_date, None);
        assert_eq!(fx.banners.list_live().await.unwrap().len(), 1);
    }
}
