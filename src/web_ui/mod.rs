mod category_list;

use std::collections::HashMap;
use askama::Template;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Form, Multipart, Path, Query, State};
use axum::http::header::SET_COOKIE;
use axum::http::StatusCode;
use axum::response::{AppendHeaders, Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use tracing::{error, info};
use crate::api::controllers::auth::open_session;
use crate::api::controllers::images::{remove_image, store_image, ImageUpload};
use crate::api::controllers::statistics;
use crate::api::{expired_session_cookie, session_cookie, AdminSession, ApiContext, ApiError, Catalog};
use crate::client::{CategoryFilter, ImageFilter};
use crate::entities::{Counter, Image, NewCategory, Statistic, StatisticType};
use crate::web_ui::category_list::CategoryList;

const LOGIN_URL: &str = "/login";
const DASHBOARD_URL: &str = "/admin/dashboard";
const CATEGORIES_URL: &str = "/admin/categories";
const IMAGES_URL: &str = "/admin/images";

const DASHBOARD_DAYS: usize = 7;
const DASHBOARD_WEEKS: usize = 4;
const DASHBOARD_MONTHS: usize = 6;

pub fn router() -> Router<ApiContext> {
    Router::new()
        // public
        .route("/", get(gallery))
        .route("/login", get(login_page).post(login))
        .route("/logout", post(logout))

        // admin
        .route("/admin", get(|| async { Redirect::to(DASHBOARD_URL) }))
        .route("/admin/dashboard", get(dashboard))
        .route("/admin/categories", get(categories_page).post(create_category))
        .route("/admin/categories/:category_id/delete", post(delete_category))
        .route("/admin/images", get(images_page).post(upload_image))
        .route("/admin/images/:image_id/delete", post(delete_image))
}

struct HtmlTemplate<T>(T);

impl<T> IntoResponse for HtmlTemplate<T>
    where
        T: Template,
{
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render template. Error: {}", err),
            ).into_response(),
        }
    }
}

/// Which navigation entry of the admin layout is highlighted.
#[derive(Debug, Default, Clone, Copy)]
struct Nav {
    dashboard: bool,
    images: bool,
    categories: bool,
}

impl Nav {
    fn dashboard() -> Self {
        Self { dashboard: true, ..Default::default() }
    }

    fn images() -> Self {
        Self { images: true, ..Default::default() }
    }

    fn categories() -> Self {
        Self { categories: true, ..Default::default() }
    }
}

fn to_login() -> Response {
    Redirect::to(LOGIN_URL).into_response()
}

/// Redirects back to `url` with the failure shown as a flash message.
fn redirect_with_error(url: &str, err: ApiError) -> Response {
    if let ApiError::Internal { message, cause } = &err {
        error!(error = ?cause, "{}", message);
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    let target = format!("{}{}error={}", url, separator, urlencoding::encode(&err.to_string()));
    Redirect::to(&target).into_response()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|x| x.trim().to_string()).filter(|x| !x.is_empty())
}

fn categories_url(parent_id: Option<&str>) -> String {
    match parent_id {
        Some(parent_id) => format!("{}?parent={}", CATEGORIES_URL, urlencoding::encode(parent_id)),
        None => CATEGORIES_URL.to_string(),
    }
}

fn images_url(category_id: Option<&str>) -> String {
    match category_id {
        Some(category_id) => format!("{}?category={}", IMAGES_URL, urlencoding::encode(category_id)),
        None => IMAGES_URL.to_string(),
    }
}

fn gallery_url(category_id: &str, subcategory_id: Option<&str>) -> String {
    let mut url = format!("/?category={}", urlencoding::encode(category_id));
    if let Some(subcategory_id) = subcategory_id {
        url.push_str(&format!("&subcategory={}", urlencoding::encode(subcategory_id)));
    }
    url
}

fn category_names(db: &Catalog) -> HashMap<String, String> {
    db.list_categories(&CategoryFilter::default())
        .into_iter()
        .map(|x| (x.category.id, x.category.name))
        .collect()
}

#[derive(Debug, Clone)]
struct ImageRow {
    title: String,
    url: String,
    code: String,
    category_name: String,
    subcategory_name: Option<String>,
    price: Option<String>,
    created_at: String,
    delete_url: String,
}

impl ImageRow {
    fn new(image: Image, names: &HashMap<String, String>) -> Self {
        let name_of = |id: &String| names.get(id).cloned().unwrap_or_else(|| id.clone());
        Self {
            category_name: name_of(&image.category_id),
            subcategory_name: image.subcategory_id.as_ref().map(name_of),
            price: image.price.map(|x| format!("{:.2}", x)),
            created_at: image.created_at.format("%Y-%m-%d %H:%M").to_string(),
            delete_url: format!("{}/{}/delete", IMAGES_URL, urlencoding::encode(&image.id)),
            title: image.title,
            url: image.url,
            code: image.code,
        }
    }
}

#[derive(Debug, Clone)]
struct CategoryOption {
    id: String,
    label: String,
    selected: bool,
}

#[derive(Debug, Clone)]
struct GalleryLink {
    name: String,
    url: String,
    active: bool,
}

#[derive(Default, Template)]
#[template(path = "login.html")]
struct LoginTemplate {
    error: Option<String>,
}

#[derive(Deserialize)]
struct LoginForm {
    password: String,
}

async fn login_page(admin: Option<AdminSession>) -> Response {
    if admin.is_some() {
        return Redirect::to(DASHBOARD_URL).into_response();
    }
    HtmlTemplate(LoginTemplate::default()).into_response()
}

async fn login(
    State(ctx): State<ApiContext>,
    Form(form): Form<LoginForm>,
) -> Response {
    match open_session(&ctx, &form.password) {
        Some(token) => {
            let cookie = session_cookie(&token, ctx.sessions.ttl());
            (AppendHeaders([(SET_COOKIE, cookie)]), Redirect::to(DASHBOARD_URL)).into_response()
        }
        None => {
            let template = LoginTemplate { error: Some("Invalid password".to_string()) };
            (StatusCode::UNAUTHORIZED, HtmlTemplate(template)).into_response()
        }
    }
}

async fn logout(
    State(ctx): State<ApiContext>,
    admin: Option<AdminSession>,
) -> impl IntoResponse {
    if let Some(admin) = admin {
        ctx.sessions.revoke(&admin.token);
    }
    (AppendHeaders([(SET_COOKIE, expired_session_cookie())]), Redirect::to(LOGIN_URL))
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    nav: Nav,
    image_count: usize,
    category_count: usize,
    root_category_count: usize,
    daily: Vec<Statistic>,
    weekly: Vec<Statistic>,
    monthly: Vec<Statistic>,
}

async fn dashboard(
    State(ctx): State<ApiContext>,
    admin: Option<AdminSession>,
) -> Response {
    let Some(_) = admin else { return to_login() };
    statistics::flush_or_warn(&ctx).await;
    let db = ctx.db.read().await;
    let recent = |kind: StatisticType, count: usize| -> Vec<Statistic> {
        db.list_statistics(Some(kind)).into_iter().take(count).collect()
    };
    let template = DashboardTemplate {
        nav: Nav::dashboard(),
        image_count: db.get_image_count(),
        category_count: db.get_category_count(),
        root_category_count: db.list_categories(&CategoryFilter::roots()).len(),
        daily: recent(StatisticType::Daily, DASHBOARD_DAYS),
        weekly: recent(StatisticType::Weekly, DASHBOARD_WEEKS),
        monthly: recent(StatisticType::Monthly, DASHBOARD_MONTHS),
    };
    HtmlTemplate(template).into_response()
}

#[derive(Deserialize, Debug, Default)]
struct CategoriesQuery {
    q: Option<String>,
    parent: Option<String>,
    error: Option<String>,
}

#[derive(Template)]
#[template(path = "categories.html")]
struct CategoriesTemplate {
    nav: Nav,
    list: CategoryList,
    error: Option<String>,
}

async fn categories_page(
    State(ctx): State<ApiContext>,
    admin: Option<AdminSession>,
    Query(query): Query<CategoriesQuery>,
) -> Response {
    let Some(_) = admin else { return to_login() };
    let db = ctx.db.read().await;
    let parent = match non_empty(query.parent) {
        Some(parent_id) => match db.get_category_by_id(&parent_id) {
            Some(parent) => Some(parent),
            None => return Redirect::to(CATEGORIES_URL).into_response(),
        },
        None => None,
    };
    let filter = match &parent {
        Some(parent) => CategoryFilter::children_of(&parent.category.id),
        None => CategoryFilter::roots(),
    };
    let categories = db.list_categories(&filter);
    let list = CategoryList::new(categories, query.q.as_deref().unwrap_or_default(), parent.as_ref());
    HtmlTemplate(CategoriesTemplate { nav: Nav::categories(), list, error: non_empty(query.error) }).into_response()
}

#[derive(Deserialize, Debug)]
struct CategoryForm {
    name: String,
    icon: Option<String>,
    parent_id: Option<String>,
}

async fn create_category(
    State(ctx): State<ApiContext>,
    admin: Option<AdminSession>,
    Form(form): Form<CategoryForm>,
) -> Response {
    let Some(_) = admin else { return to_login() };
    let parent_id = non_empty(form.parent_id);
    let back = categories_url(parent_id.as_deref());
    let new_category = NewCategory { name: form.name, icon: form.icon, parent_id };
    let result = ctx.db.write().await.create_category(new_category).await;
    match result {
        Ok(category) => {
            info!(id = %category.id, name = %category.name, "category created");
            Redirect::to(&back).into_response()
        }
        Err(err) => redirect_with_error(&back, ApiError::from_catalog("Failed to create category")(err)),
    }
}

async fn delete_category(
    State(ctx): State<ApiContext>,
    admin: Option<AdminSession>,
    Path(category_id): Path<String>,
) -> Response {
    let Some(_) = admin else { return to_login() };
    let mut db = ctx.db.write().await;
    let parent_id = db.get_category_by_id(&category_id).and_then(|x| x.category.parent_id);
    let back = categories_url(parent_id.as_deref());
    match db.delete_category(&category_id).await {
        Ok(Some(category)) => {
            info!(id = %category.id, "category deleted");
            Redirect::to(&back).into_response()
        }
        Ok(None) => redirect_with_error(&back, ApiError::NotFound),
        Err(err) => redirect_with_error(&back, ApiError::from_catalog("Failed to delete category")(err)),
    }
}

#[derive(Deserialize, Debug, Default)]
struct ImagesQuery {
    category: Option<String>,
    error: Option<String>,
}

#[derive(Template)]
#[template(path = "images.html")]
struct ImagesTemplate {
    nav: Nav,
    images: Vec<ImageRow>,
    categories: Vec<CategoryOption>,
    subcategories: Vec<CategoryOption>,
    filtered: bool,
    error: Option<String>,
}

async fn images_page(
    State(ctx): State<ApiContext>,
    admin: Option<AdminSession>,
    Query(query): Query<ImagesQuery>,
) -> Response {
    let Some(_) = admin else { return to_login() };
    let selected = non_empty(query.category);
    let db = ctx.db.read().await;
    let names = category_names(&db);
    let (roots, children): (Vec<_>, Vec<_>) = db.list_categories(&CategoryFilter::default())
        .into_iter()
        .partition(|x| x.category.is_root());
    let categories = roots.into_iter()
        .map(|x| CategoryOption {
            selected: selected.as_deref() == Some(x.category.id.as_str()),
            label: x.category.name,
            id: x.category.id,
        })
        .collect();
    let subcategories = children.into_iter()
        .map(|x| {
            let parent_name = x.category.parent_id.as_ref().and_then(|id| names.get(id)).cloned().unwrap_or_default();
            CategoryOption {
                selected: false,
                label: format!("{} / {}", parent_name, x.category.name),
                id: x.category.id,
            }
        })
        .collect();
    let filter = ImageFilter { category_id: selected.clone(), subcategory_id: None };
    let images = db.find_images(&filter).into_iter().map(|x| ImageRow::new(x, &names)).collect();
    let template = ImagesTemplate {
        nav: Nav::images(),
        images,
        categories,
        subcategories,
        filtered: selected.is_some(),
        error: non_empty(query.error),
    };
    HtmlTemplate(template).into_response()
}

async fn upload(ctx: &ApiContext, multipart: Result<Multipart, MultipartRejection>) -> Result<Image, ApiError> {
    let upload = ImageUpload::from_multipart(multipart?).await?;
    store_image(ctx, upload).await
}

async fn upload_image(
    State(ctx): State<ApiContext>,
    admin: Option<AdminSession>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let Some(_) = admin else { return to_login() };
    match upload(&ctx, multipart).await {
        Ok(image) => Redirect::to(&images_url(Some(&image.category_id))).into_response(),
        Err(err) => redirect_with_error(IMAGES_URL, err),
    }
}

async fn delete_image(
    State(ctx): State<ApiContext>,
    admin: Option<AdminSession>,
    Path(image_id): Path<String>,
) -> Response {
    let Some(_) = admin else { return to_login() };
    match remove_image(&ctx, &image_id).await {
        Ok(image) => Redirect::to(&images_url(Some(&image.category_id))).into_response(),
        Err(err) => redirect_with_error(IMAGES_URL, err),
    }
}

#[derive(Deserialize, Debug, Default)]
struct GalleryQuery {
    category: Option<String>,
    subcategory: Option<String>,
}

#[derive(Template)]
#[template(path = "gallery.html")]
struct GalleryTemplate {
    categories: Vec<GalleryLink>,
    subcategories: Vec<GalleryLink>,
    images: Vec<ImageRow>,
}

async fn gallery(
    State(ctx): State<ApiContext>,
    Query(query): Query<GalleryQuery>,
) -> Response {
    statistics::count(&ctx, Counter::Visits);
    let category = non_empty(query.category);
    let subcategory = non_empty(query.subcategory);

    let db = ctx.db.read().await;
    let categories = db.list_categories(&CategoryFilter::roots())
        .into_iter()
        .map(|x| GalleryLink {
            url: gallery_url(&x.category.id, None),
            active: category.as_deref() == Some(x.category.id.as_str()),
            name: x.category.name,
        })
        .collect();
    let subcategories = match &category {
        Some(category_id) => db.list_categories(&CategoryFilter::children_of(category_id))
            .into_iter()
            .map(|x| GalleryLink {
                url: gallery_url(category_id, Some(&x.category.id)),
                active: subcategory.as_deref() == Some(x.category.id.as_str()),
                name: x.category.name,
            })
            .collect(),
        None => Vec::new(),
    };
    let names = category_names(&db);
    let filter = ImageFilter { category_id: category.clone(), subcategory_id: subcategory };
    let images = db.find_images(&filter).into_iter().map(|x| ImageRow::new(x, &names)).collect();
    HtmlTemplate(GalleryTemplate { categories, subcategories, images }).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_encoded() {
        assert_eq!(categories_url(None), "/admin/categories");
        assert_eq!(categories_url(Some("a b")), "/admin/categories?parent=a%20b");
        assert_eq!(images_url(Some("x&y")), "/admin/images?category=x%26y");
        assert_eq!(gallery_url("a", Some("b")), "/?category=a&subcategory=b");
    }

    #[test]
    fn error_redirect_keeps_existing_query() {
        let response = redirect_with_error("/admin/categories?parent=a", ApiError::Conflict("Category has subcategories".to_string()));
        let location = response.headers().get("location").unwrap().to_str().unwrap();
        assert_eq!(location, "/admin/categories?parent=a&error=Category%20has%20subcategories");

        let response = redirect_with_error("/admin/images", ApiError::bad_request("Missing required fields"));
        let location = response.headers().get("location").unwrap().to_str().unwrap();
        assert_eq!(location, "/admin/images?error=Missing%20required%20fields");
    }

    #[test]
    fn templates_render() {
        let html = LoginTemplate { error: Some("Invalid password".to_string()) }.render().unwrap();
        assert!(html.contains("Invalid password"));

        let list = CategoryList::default();
        let html = CategoriesTemplate { nav: Nav::categories(), list, error: None }.render().unwrap();
        assert!(html.contains("No categories"));
    }
}
