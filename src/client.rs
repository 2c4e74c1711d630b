use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use itertools::Itertools;
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;
use crate::entities::*;
use crate::error::CatalogError;
use crate::storage::{DbOperation, Storage};
use crate::utils::code_utils::generate_image_code;

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ImageFilter {
    pub category_id: Option<CategoryId>,
    pub subcategory_id: Option<CategoryId>,
}

impl ImageFilter {
    pub fn by_category(category_id: &str) -> Self {
        Self { category_id: Some(category_id.to_string()), subcategory_id: None }
    }

    fn matches(&self, image: &Image) -> bool {
        let category_matches = match non_empty(&self.category_id) {
            Some(id) => image.category_id == id,
            None => true,
        };
        let subcategory_matches = match non_empty(&self.subcategory_id) {
            Some(id) => image.subcategory_id.as_deref() == Some(id),
            None => true,
        };
        category_matches && subcategory_matches
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CategoryFilter {
    pub parent_id: Option<CategoryId>,
    pub root: Option<bool>,
}

impl CategoryFilter {
    pub fn roots() -> Self {
        Self { parent_id: None, root: Some(true) }
    }

    pub fn children_of(parent_id: &str) -> Self {
        Self { parent_id: Some(parent_id.to_string()), root: None }
    }

    fn matches(&self, category: &Category) -> bool {
        let parent_matches = match non_empty(&self.parent_id) {
            Some(id) => category.parent_id.as_deref() == Some(id),
            None => true,
        };
        let root_matches = match self.root {
            Some(root) => category.is_root() == root,
            None => true,
        };
        parent_matches && root_matches
    }
}

/// The catalog document store. Operations are appended to the backing
/// [`Storage`] first and applied to the in-memory collections afterwards, so
/// a failed write leaves the catalog untouched.
pub struct CatalogClient<S: Storage> {
    storage: S,
    connected: bool,
    images: DashMap<ImageId, Image>,
    image_order: Vec<ImageId>,
    image_codes: DashMap<String, ImageId>,
    categories: DashMap<CategoryId, Category>,
    category_order: Vec<CategoryId>,
    statistics: DashMap<(StatisticType, NaiveDate), Statistic>,
}

impl<S: Storage> CatalogClient<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            connected: false,
            images: DashMap::new(),
            image_order: Vec::new(),
            image_codes: DashMap::new(),
            categories: DashMap::new(),
            category_order: Vec::new(),
            statistics: DashMap::new(),
        }
    }

    /// Replays the document log. Calling it again once connected is a no-op.
    pub async fn connect(&mut self) -> Result<(), CatalogError> {
        if self.connected {
            return Ok(());
        }
        info!("Starting DB import from document log...");
        let operations = self.storage.read_all().await?;
        let operations_count = operations.len();
        for operation in operations {
            self.apply(operation);
        }
        self.connected = true;
        info!(operations = operations_count, images = self.images.len(), categories = self.categories.len(), "DB imported");
        Ok(())
    }

    pub fn ensure_connected(&self) -> Result<(), CatalogError> {
        if !self.connected {
            return Err(CatalogError::NotConnected);
        }
        Ok(())
    }

    pub fn get_image_count(&self) -> usize {
        self.images.len()
    }

    pub fn get_category_count(&self) -> usize {
        self.categories.len()
    }

    /// Matching images, newest first. Images created at the same instant keep
    /// reverse insertion order.
    pub fn find_images(&self, filter: &ImageFilter) -> Vec<Image> {
        self.image_order.iter().rev()
            .filter_map(|id| self.images.get(id).map(|x| x.value().clone()))
            .filter(|x| filter.matches(x))
            .sorted_by(|a, b| b.created_at.cmp(&a.created_at))
            .collect()
    }

    pub fn get_image_by_id(&self, image_id: &str) -> Option<Image> {
        self.images.get(image_id).map(|x| x.value().clone())
    }

    pub fn get_image_by_code(&self, code: &str) -> Option<Image> {
        let image_id = self.image_codes.get(code).map(|x| x.value().clone())?;
        self.get_image_by_id(&image_id)
    }

    /// Checks that the category is an existing root category and that the
    /// subcategory, if any, is one of its children.
    pub fn validate_image_references(&self, category_id: &str, subcategory_id: Option<&str>) -> Result<(), CatalogError> {
        let category = self.categories.get(category_id).map(|x| x.value().clone())
            .ok_or_else(|| CatalogError::validation(format!("Unknown category: {}", category_id)))?;
        if !category.is_root() {
            return Err(CatalogError::validation(format!("Category {} is a subcategory", category_id)));
        }
        if let Some(subcategory_id) = subcategory_id {
            let subcategory = self.categories.get(subcategory_id).map(|x| x.value().clone())
                .ok_or_else(|| CatalogError::validation(format!("Unknown subcategory: {}", subcategory_id)))?;
            if subcategory.parent_id.as_deref() != Some(category_id) {
                return Err(CatalogError::validation(format!("Subcategory {} does not belong to category {}", subcategory_id, category_id)));
            }
        }
        Ok(())
    }

    pub async fn create_image(&mut self, new_image: NewImage, url: String) -> Result<Image, CatalogError> {
        self.validate_image_references(&new_image.category_id, new_image.subcategory_id.as_deref())?;
        let mut code = generate_image_code();
        while self.image_codes.contains_key(&code) {
            code = generate_image_code();
        }
        let now = Utc::now();
        let image = Image {
            id: Uuid::new_v4().to_string(),
            title: new_image.title,
            url,
            category_id: new_image.category_id,
            subcategory_id: new_image.subcategory_id,
            price: new_image.price,
            code,
            created_at: now,
            updated_at: now,
        };
        self.commit(DbOperation::CreateImage { image: image.clone() }).await?;
        Ok(image)
    }

    pub async fn update_image(&mut self, image_id: &str, patch: ImagePatch) -> Result<Option<Image>, CatalogError> {
        patch.validate()?;
        let Some(mut image) = self.get_image_by_id(image_id) else {
            return Ok(None);
        };
        if let Some(title) = patch.title {
            image.title = title.trim().to_string();
        }
        if let Some(category_id) = patch.category_id {
            image.category_id = category_id.trim().to_string();
        }
        if let Some(subcategory_id) = patch.subcategory_id {
            image.subcategory_id = non_empty(&subcategory_id).map(|x| x.to_string());
        }
        if let Some(price) = patch.price {
            image.price = price;
        }
        self.validate_image_references(&image.category_id, image.subcategory_id.as_deref())?;
        image.updated_at = Utc::now();
        self.commit(DbOperation::UpdateImage { image: image.clone() }).await?;
        Ok(Some(image))
    }

    pub async fn delete_image(&mut self, image_id: &str) -> Result<Option<Image>, CatalogError> {
        let Some(image) = self.get_image_by_id(image_id) else {
            return Ok(None);
        };
        self.commit(DbOperation::DeleteImage { image_id: image.id.clone() }).await?;
        Ok(Some(image))
    }

    pub fn list_categories(&self, filter: &CategoryFilter) -> Vec<CategoryView> {
        self.category_order.iter()
            .filter_map(|id| self.categories.get(id).map(|x| x.value().clone()))
            .filter(|x| filter.matches(x))
            .map(|x| self.to_view(x))
            .collect()
    }

    pub fn get_category_by_id(&self, category_id: &str) -> Option<CategoryView> {
        let category = self.categories.get(category_id).map(|x| x.value().clone())?;
        Some(self.to_view(category))
    }

    pub async fn create_category(&mut self, new_category: NewCategory) -> Result<Category, CatalogError> {
        let new_category = new_category.validate()?;
        if let Some(parent_id) = &new_category.parent_id {
            self.validate_parent(parent_id, None)?;
        }
        let now = Utc::now();
        let category = Category {
            id: Uuid::new_v4().to_string(),
            name: new_category.name,
            icon: new_category.icon.unwrap_or_else(|| DEFAULT_CATEGORY_ICON.to_string()),
            parent_id: new_category.parent_id,
            created_at: now,
            updated_at: now,
        };
        self.commit(DbOperation::CreateCategory { category: category.clone() }).await?;
        Ok(category)
    }

    pub async fn update_category(&mut self, category_id: &str, patch: CategoryPatch) -> Result<Option<Category>, CatalogError> {
        patch.validate()?;
        let Some(mut category) = self.categories.get(category_id).map(|x| x.value().clone()) else {
            return Ok(None);
        };
        if let Some(name) = patch.name {
            category.name = name.trim().to_string();
        }
        if let Some(icon) = patch.icon {
            category.icon = icon.trim().to_string();
        }
        if let Some(parent_id) = patch.parent_id {
            let parent_id = non_empty(&parent_id).map(|x| x.to_string());
            if parent_id != category.parent_id {
                if let Some(parent_id) = &parent_id {
                    self.validate_parent(parent_id, Some(category_id))?;
                }
                if self.is_referenced_by_images(category_id) {
                    return Err(CatalogError::conflict("Category is referenced by images"));
                }
                category.parent_id = parent_id;
            }
        }
        category.updated_at = Utc::now();
        self.commit(DbOperation::UpdateCategory { category: category.clone() }).await?;
        Ok(Some(category))
    }

    pub async fn delete_category(&mut self, category_id: &str) -> Result<Option<Category>, CatalogError> {
        let Some(category) = self.categories.get(category_id).map(|x| x.value().clone()) else {
            return Ok(None);
        };
        if self.get_sub_category_count(category_id) > 0 {
            return Err(CatalogError::conflict("Category has subcategories"));
        }
        if self.is_referenced_by_images(category_id) {
            return Err(CatalogError::conflict("Category is referenced by images"));
        }
        self.commit(DbOperation::DeleteCategory { category_id: category.id.clone() }).await?;
        Ok(Some(category))
    }

    pub fn get_sub_category_count(&self, category_id: &str) -> usize {
        self.categories.iter()
            .filter(|x| x.value().parent_id.as_deref() == Some(category_id))
            .count()
    }

    /// Adds the counts to their period records. All records are written as
    /// one log line, so either every period is updated or none is. Expects
    /// at most one count per period.
    pub async fn record(&mut self, counts: &[PeriodCount], at: DateTime<Utc>) -> Result<(), CatalogError> {
        if counts.is_empty() {
            return Ok(());
        }
        let statistics = counts.iter()
            .map(|count| {
                let mut statistic = self.statistics.get(&(count.kind, count.date))
                    .map(|x| x.value().clone())
                    .unwrap_or_else(|| Statistic {
                        id: Uuid::new_v4().to_string(),
                        kind: count.kind,
                        date: count.date,
                        visits: 0,
                        image_views: 0,
                        created_at: at,
                        updated_at: at,
                    });
                statistic.visits += count.visits;
                statistic.image_views += count.image_views;
                statistic.updated_at = at;
                statistic
            })
            .collect();
        self.commit(DbOperation::UpsertStatistics { statistics }).await
    }

    /// Statistics, most recent period first.
    pub fn list_statistics(&self, kind: Option<StatisticType>) -> Vec<Statistic> {
        self.statistics.iter()
            .filter(|x| kind.map_or(true, |kind| x.value().kind == kind))
            .map(|x| x.value().clone())
            .sorted_by(|a, b| b.date.cmp(&a.date).then_with(|| a.kind.as_str().cmp(b.kind.as_str())))
            .collect()
    }

    fn to_view(&self, category: Category) -> CategoryView {
        let sub_category_count = self.get_sub_category_count(&category.id);
        CategoryView { category, sub_category_count }
    }

    fn validate_parent(&self, parent_id: &str, child_id: Option<&str>) -> Result<(), CatalogError> {
        if child_id == Some(parent_id) {
            return Err(CatalogError::validation("A category cannot be its own parent"));
        }
        let parent = self.categories.get(parent_id).map(|x| x.value().clone())
            .ok_or_else(|| CatalogError::validation(format!("Unknown parent category: {}", parent_id)))?;
        if !parent.is_root() {
            return Err(CatalogError::validation("Subcategories cannot have subcategories"));
        }
        if let Some(child_id) = child_id {
            if self.get_sub_category_count(child_id) > 0 {
                return Err(CatalogError::validation("A category with subcategories cannot become a subcategory"));
            }
        }
        Ok(())
    }

    fn is_referenced_by_images(&self, category_id: &str) -> bool {
        self.images.iter().any(|x| {
            let image = x.value();
            image.category_id == category_id || image.subcategory_id.as_deref() == Some(category_id)
        })
    }

    async fn commit(&mut self, operation: DbOperation) -> Result<(), CatalogError> {
        self.ensure_connected()?;
        debug!("Writing to document log: {:?}", operation);
        self.storage.write(operation.clone()).await?;
        self.apply(operation);
        Ok(())
    }

    fn apply(&mut self, operation: DbOperation) {
        match operation {
            DbOperation::CreateImage { image } | DbOperation::UpdateImage { image } => self.put_image(image),
            DbOperation::DeleteImage { image_id } => self.remove_image(&image_id),
            DbOperation::CreateCategory { category } | DbOperation::UpdateCategory { category } => self.put_category(category),
            DbOperation::DeleteCategory { category_id } => self.remove_category(&category_id),
            DbOperation::UpsertStatistics { statistics } => {
                for statistic in statistics {
                    self.statistics.insert((statistic.kind, statistic.date), statistic);
                }
            }
        }
    }

    fn put_image(&mut self, image: Image) {
        let id = image.id.clone();
        let code = image.code.clone();
        match self.images.insert(id.clone(), image) {
            Some(previous) if previous.code != code => {
                self.image_codes.remove(&previous.code);
            }
            Some(_) => {}
            None => self.image_order.push(id.clone()),
        }
        self.image_codes.insert(code, id);
    }

    fn remove_image(&mut self, image_id: &str) {
        if let Some((_, image)) = self.images.remove(image_id) {
            self.image_codes.remove(&image.code);
            self.image_order.retain(|x| x != image_id);
        }
    }

    fn put_category(&mut self, category: Category) {
        let id = category.id.clone();
        if self.categories.insert(id.clone(), category).is_none() {
            self.category_order.push(id);
        }
    }

    fn remove_category(&mut self, category_id: &str) {
        if self.categories.remove(category_id).is_some() {
            self.category_order.retain(|x| x != category_id);
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|x| !x.is_empty())
}
