use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::BannerId;
use crate::domain::nullable;
use crate::validation::{self, Validate, ValidationError};

// ============================================================================
// Banner Value Objects
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Banner {
    pub id: BannerId,
    pub title: String,
    pub subtitle: Option<String>,
    pub image_url: String,
    pub link_url: Option<String>,
    pub is_active: bool,
    pub sort_order: i32,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Banner {
    /// Active and inside its scheduling window (both ends inclusive).
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && self.start_date.map_or(true, |start| start <= now)
            && self.end_date.map_or(true, |end| now <= end)
    }

    pub fn apply(&mut self, update: BannerUpdate) {
        if let Some(v) = update.title {
            self.title = v;
        }
        if let Some(v) = update.subtitle {
            self.subtitle = v;
        }
        if let Some(v) = update.image_url {
            self.image_url = v;
        }
        if let Some(v) = update.link_url {
            self.link_url = v;
        }
        if let Some(v) = update.is_active {
            self.is_active = v;
        }
        if let Some(v) = update.sort_order {
            self.sort_order = v;
        }
        if let Some(v) = update.start_date {
            self.start_date = v;
        }
        if let Some(v) = update.end_date {
            self.end_date = v;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBanner {
    pub title: String,
    pub subtitle: Option<String>,
    pub image_url: String,
    pub link_url: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl Validate for NewBanner {
    fn validate(&self) -> Result<(), ValidationError> {
        validation::required("title", &self.title, 200)?;
        validation::optional_max_len("subtitle", self.subtitle.as_deref(), 300)?;
        validation::required("image_url", &self.image_url, 500)?;
        validation::optional_max_len("link_url", self.link_url.as_deref(), 500)?;
        validate_window(self.start_date, self.end_date)
    }
}

/// `Some(None)` on an optional field clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BannerUpdate {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<Option<String>>,
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub link_url: Option<Option<String>>,
    pub is_active: Option<bool>,
    pub sort_order: Option<i32>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub start_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub end_date: Option<Option<DateTime<Utc>>>,
}

impl Validate for BannerUpdate {
    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(title) = &self.title {
            validation::required("title", title, 200)?;
        }
        validation::optional_max_len("subtitle", self.subtitle.as_ref().and_then(|v| v.as_deref()), 300)?;
        if let Some(image_url) = &self.image_url {
            validation::required("image_url", image_url, 500)?;
        }
        validation::optional_max_len("link_url", self.link_url.as_ref().and_then(|v| v.as_deref()), 500)?;
        validate_window(self.start_date.flatten(), self.end_date.flatten())
    }
}

pub(crate) fn validate_window(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<(), ValidationError> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => Err(ValidationError::Invalid {
            field: "end_date",
            reason: "must not be before start_date".to_string(),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn banner(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Banner {
        Banner {
            id: BannerId::new(1),
            title: "Ramadan Sale".to_string(),
            subtitle: None,
            image_url: "https://cdn.example.com/sale.png".to_string(),
            link_url: None,
            is_active: true,
            sort_order: 0,
            start_date: start,
            end_date: end,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_live_window() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();

        assert!(banner(None, None).is_live(now));
        assert!(banner(Some(now), Some(now)).is_live(now));
        assert!(!banner(Some(now + Duration::seconds(1)), None).is_live(now));
        assert!(!banner(None, Some(now - Duration::seconds(1))).is_live(now));

        let inactive = Banner {
            is_active: false,
            ..banner(None, None)
        };
        assert!(!inactive.is_live(now));
    }

    #[test]
    fn test_update_clears_optional_fields() {
        let end = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        let mut scheduled = Banner {
            subtitle: Some("Up to 50% off".to_string()),
            link_url: Some("https://shop.example.com/sale".to_string()),
            ..banner(None, Some(end))
        };

        scheduled.apply(BannerUpdate {
            subtitle: Some(None),
            end_date: Some(None),
            ..BannerUpdate::default()
        });

        assert_eq!(scheduled.subtitle, None);
        assert_eq!(scheduled.end_date, None);
        assert_eq!(scheduled.link_url.as_deref(), Some("https://shop.example.com/sale"));

        let update: BannerUpdate = serde_json::from_str(r#"{"link_url": null}"#).unwrap();
        assert_eq!(update.link_url, Some(None));
        assert_eq!(update.subtitle, None);
    }

    #[test]
    fn test_window_must_be_ordered() {
        let start = Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap();
        assert!(validate_window(Some(start), Some(start - Duration::days(1))).is_err());
        assert!(validate_window(Some(start), Some(start)).is_ok());
        assert!(validate_window(None, Some(start)).is_ok());
    }
}
