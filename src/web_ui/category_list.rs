use crate::entities::{CategoryView, IconKind};
use crate::utils::{matches_search, normalize_search};

const CATEGORIES_PAGE_URL: &str = "/admin/categories";

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryRow {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub icon_is_embedded: bool,
    pub parent_id: Option<String>,
    pub sub_category_count: usize,
    pub delete_url: String,
    pub subcategories_url: Option<String>,
}

impl From<CategoryView> for CategoryRow {
    fn from(view: CategoryView) -> Self {
        let id_param = urlencoding::encode(&view.category.id).into_owned();
        let subcategories_url = (view.sub_category_count > 0)
            .then(|| format!("{}?parent={}", CATEGORIES_PAGE_URL, id_param));
        Self {
            icon_is_embedded: view.category.icon_kind() == IconKind::Embedded,
            delete_url: format!("{}/{}/delete", CATEGORIES_PAGE_URL, id_param),
            subcategories_url,
            sub_category_count: view.sub_category_count,
            id: view.category.id,
            name: view.category.name,
            icon: view.category.icon,
            parent_id: view.category.parent_id,
        }
    }
}

/// The searchable category table. When it shows the subcategories of one
/// parent it carries a back link to the root listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryList {
    pub rows: Vec<CategoryRow>,
    pub query: String,
    pub total: usize,
    pub parent_id: Option<String>,
    pub parent_name: Option<String>,
    pub back_url: Option<String>,
}

impl CategoryList {
    pub fn new(categories: Vec<CategoryView>, query: &str, parent: Option<&CategoryView>) -> Self {
        let term = normalize_search(query);
        let total = categories.len();
        let rows = categories.into_iter()
            .filter(|x| matches_search(&x.category.name, &term))
            .map(CategoryRow::from)
            .collect();
        Self {
            rows,
            query: query.trim().to_string(),
            total,
            parent_id: parent.map(|x| x.category.id.clone()),
            parent_name: parent.map(|x| x.category.name.clone()),
            back_url: parent.map(|_| CATEGORIES_PAGE_URL.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use crate::entities::Category;
    use super::*;

    fn view(id: &str, name: &str, icon: &str, parent_id: Option<&str>, sub_category_count: usize) -> CategoryView {
        let now = Utc::now();
        CategoryView {
            category: Category {
                id: id.to_string(),
                name: name.to_string(),
                icon: icon.to_string(),
                parent_id: parent_id.map(|x| x.to_string()),
                created_at: now,
                updated_at: now,
            },
            sub_category_count,
        }
    }

    #[test]
    fn rows_filter_by_name_case_insensitively() {
        let categories = vec![
            view("a", "Shoes", "checkroom", None, 2),
            view("b", "Hats", "data:image/png;base64,AAAA", None, 0),
            view("c", "Running SHOES", "category", None, 0),
        ];
        let list = CategoryList::new(categories, " shoes ", None);
        assert_eq!(list.total, 3);
        assert_eq!(list.query, "shoes");
        assert_eq!(list.rows.iter().map(|x| x.id.as_str()).collect::<Vec<_>>(), vec!["a", "c"]);
        assert_eq!(list.back_url, None);
    }

    #[test]
    fn drill_down_only_for_categories_with_children() {
        let list = CategoryList::new(vec![view("a b", "A", "category", None, 1), view("c", "C", "category", None, 0)], "", None);
        assert_eq!(list.rows[0].subcategories_url.as_deref(), Some("/admin/categories?parent=a%20b"));
        assert_eq!(list.rows[0].delete_url, "/admin/categories/a%20b/delete");
        assert_eq!(list.rows[1].subcategories_url, None);
    }

    #[test]
    fn subset_has_back_link_and_icon_kinds() {
        let parent = view("a", "Shoes", "checkroom", None, 2);
        let children = vec![
            view("b", "Sneakers", "data:image/svg+xml;base64,AAAA", Some("a"), 0),
            view("c", "Boots", "hiking", Some("a"), 0),
        ];
        let list = CategoryList::new(children, "", Some(&parent));
        assert_eq!(list.back_url.as_deref(), Some("/admin/categories"));
        assert_eq!(list.parent_name.as_deref(), Some("Shoes"));
        assert_eq!(list.parent_id.as_deref(), Some("a"));
        assert!(list.rows[0].icon_is_embedded);
        assert!(!list.rows[1].icon_is_embedded);
        assert_eq!(list.rows[1].parent_id.as_deref(), Some("a"));
    }

    #[test]
    fn empty_search_result() {
        let list = CategoryList::new(vec![view("a", "Shoes", "category", None, 0)], "zzz", None);
        assert!(list.is_empty());
        assert_eq!(list.total, 1);
    }
}
