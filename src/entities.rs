use std::str::FromStr;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use crate::error::CatalogError;

pub type ImageId = String;
pub type CategoryId = String;
pub type StatisticId = String;

pub const DEFAULT_CATEGORY_ICON: &str = "category";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub id: ImageId,
    pub title: String,
    pub url: String,
    pub category_id: CategoryId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory_id: Option<CategoryId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated fields of an image that is about to be created. The url and the
/// code are assigned by the store.
#[derive(Clone, Debug, PartialEq)]
pub struct NewImage {
    pub title: String,
    pub category_id: CategoryId,
    pub subcategory_id: Option<CategoryId>,
    pub price: Option<f64>,
}

impl NewImage {
    pub fn new(
        title: &str,
        category_id: &str,
        subcategory_id: Option<&str>,
        price: Option<f64>,
    ) -> Result<Self, CatalogError> {
        let title = title.trim();
        let category_id = category_id.trim();
        if title.is_empty() || category_id.is_empty() {
            return Err(CatalogError::validation("Missing required fields"));
        }
        validate_price(price)?;
        Ok(Self {
            title: title.to_string(),
            category_id: category_id.to_string(),
            subcategory_id: non_empty(subcategory_id),
            price,
        })
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ImagePatch {
    pub title: Option<String>,
    pub category_id: Option<CategoryId>,
    #[serde(default, deserialize_with = "double_option")]
    pub subcategory_id: Option<Option<CategoryId>>,
    #[serde(default, deserialize_with = "double_option")]
    pub price: Option<Option<f64>>,
}

impl ImagePatch {
    pub fn validate(&self) -> Result<(), CatalogError> {
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(CatalogError::validation("Title must not be empty"));
            }
        }
        if let Some(category_id) = &self.category_id {
            if category_id.trim().is_empty() {
                return Err(CatalogError::validation("Category must not be empty"));
            }
        }
        if let Some(price) = self.price {
            validate_price(price)?;
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub icon: String,
    pub parent_id: Option<CategoryId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconKind {
    /// An inline `data:` image.
    Embedded,
    /// The name of a symbolic icon.
    Symbol,
}

impl Category {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn icon_kind(&self) -> IconKind {
        if self.icon.starts_with("data:") {
            IconKind::Embedded
        } else {
            IconKind::Symbol
        }
    }
}

/// A category as the API returns it, with the number of its direct subcategories.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryView {
    #[serde(flatten)]
    pub category: Category,
    pub sub_category_count: usize,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewCategory {
    pub name: String,
    pub icon: Option<String>,
    pub parent_id: Option<CategoryId>,
}

impl NewCategory {
    pub fn validate(self) -> Result<Self, CatalogError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(CatalogError::validation("Missing required fields"));
        }
        let icon = non_empty(self.icon.as_deref()).unwrap_or_else(|| DEFAULT_CATEGORY_ICON.to_string());
        Ok(Self {
            name: name.to_string(),
            icon: Some(icon),
            parent_id: non_empty(self.parent_id.as_deref()),
        })
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub icon: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub parent_id: Option<Option<CategoryId>>,
}

impl CategoryPatch {
    pub fn validate(&self) -> Result<(), CatalogError> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(CatalogError::validation("Name must not be empty"));
            }
        }
        if let Some(icon) = &self.icon {
            if icon.trim().is_empty() {
                return Err(CatalogError::validation("Icon must not be empty"));
            }
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StatisticType {
    Daily,
    Weekly,
    Monthly,
}

impl StatisticType {
    pub const ALL: [StatisticType; 3] = [StatisticType::Daily, StatisticType::Weekly, StatisticType::Monthly];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatisticType::Daily => "daily",
            StatisticType::Weekly => "weekly",
            StatisticType::Monthly => "monthly",
        }
    }

    /// First day of the period `at` falls into. Weeks start on Monday.
    pub fn period_start(&self, at: DateTime<Utc>) -> NaiveDate {
        let date = at.date_naive();
        match self {
            StatisticType::Daily => date,
            StatisticType::Weekly => date - Duration::days(date.weekday().num_days_from_monday() as i64),
            StatisticType::Monthly => date - Duration::days(date.day0() as i64),
        }
    }
}

impl FromStr for StatisticType {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(StatisticType::Daily),
            "weekly" => Ok(StatisticType::Weekly),
            "monthly" => Ok(StatisticType::Monthly),
            _ => Err(CatalogError::validation(format!("Invalid statistic type: {}", s))),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Statistic {
    pub id: StatisticId,
    #[serde(rename = "type")]
    pub kind: StatisticType,
    pub date: NaiveDate,
    #[serde(default)]
    pub visits: u64,
    #[serde(default)]
    pub image_views: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Visits,
    ImageViews,
}

/// Events counted into one statistics period that are not stored yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodCount {
    pub kind: StatisticType,
    pub date: NaiveDate,
    pub visits: u64,
    pub image_views: u64,
}

impl PeriodCount {
    pub fn new(kind: StatisticType, date: NaiveDate) -> Self {
        Self { kind, date, visits: 0, image_views: 0 }
    }

    pub fn add(&mut self, counter: Counter) {
        match counter {
            Counter::Visits => self.visits += 1,
            Counter::ImageViews => self.image_views += 1,
        }
    }

    pub fn merge(&mut self, other: &PeriodCount) {
        self.visits += other.visits;
        self.image_views += other.image_views;
    }
}

fn validate_price(price: Option<f64>) -> Result<(), CatalogError> {
    match price {
        Some(p) if !p.is_finite() || p < 0.0 => Err(CatalogError::validation("Price must be a non-negative number")),
        _ => Ok(()),
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|x| !x.is_empty()).map(|x| x.to_string())
}

/// Tells an absent field (`None`) apart from an explicit `null` (`Some(None)`).
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}
