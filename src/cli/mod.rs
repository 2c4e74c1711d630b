use std::path::PathBuf;
use std::time::Duration;
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use crate::api;
use crate::assets::AssetStore;
use crate::client::{CatalogClient, CategoryFilter};
use crate::config::{AppConfig, ServerConfig};
use crate::entities::NewImage;
use crate::storage::FileStorage;

const BYTES_IN_MB: usize = 1024 * 1024;
const SECONDS_IN_HOUR: u64 = 60 * 60;

#[derive(Parser, Debug)]
#[command(name = "stylepins", version, about = "An admin-managed image catalog")]
pub struct Cli {
    #[arg(long, global = true, env = "STYLEPINS_WORKDIR", default_value = ".", help = "Directory holding the catalog DB and the uploaded files")]
    pub workdir: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP server (API, admin UI and public gallery)
    Serve(ServeArgs),
    /// Upload an image from the local filesystem
    AddImage(AddImageArgs),
    /// Print the category tree
    Categories,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[arg(long, env = "STYLEPINS_BIND", default_value = "127.0.0.1:3000", help = "Address to listen on")]
    pub bind: String,

    #[arg(long, env = "STYLEPINS_ADMIN_PASSWORD", required = true, hide_env_values = true, help = "Password for the admin login")]
    pub admin_password: String,

    #[arg(long, env = "STYLEPINS_SESSION_TTL_HOURS", default_value_t = 24, help = "Admin session lifetime in hours")]
    pub session_ttl_hours: u64,

    #[arg(long, env = "STYLEPINS_MAX_UPLOAD_MB", default_value_t = 20, help = "Maximum request body size in megabytes")]
    pub max_upload_mb: usize,
}

impl From<ServeArgs> for ServerConfig {
    fn from(value: ServeArgs) -> Self {
        ServerConfig {
            bind_addr: value.bind,
            admin_password: value.admin_password,
            session_ttl: Duration::from_secs(value.session_ttl_hours.saturating_mul(SECONDS_IN_HOUR)),
            max_upload_bytes: value.max_upload_mb.saturating_mul(BYTES_IN_MB),
        }
    }
}

#[derive(Args, Debug)]
pub struct AddImageArgs {
    pub path: PathBuf,

    #[arg(long)]
    pub title: String,

    #[arg(long)]
    pub category_id: String,

    #[arg(long)]
    pub subcategory_id: Option<String>,

    #[arg(long)]
    pub price: Option<f64>,
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let app_config = AppConfig::new(&cli.workdir)?;
    match cli.command {
        Command::Serve(args) => api::serve(app_config, args.into()).await,
        Command::AddImage(args) => add_image(app_config, args).await,
        Command::Categories => print_categories(app_config).await,
    }
}

async fn connect(app_config: &AppConfig) -> anyhow::Result<CatalogClient<FileStorage>> {
    let mut client = CatalogClient::new(FileStorage::new(app_config.db_path.clone()));
    client.connect().await.context("failed to connect to the catalog DB")?;
    Ok(client)
}

pub async fn add_image(app_config: AppConfig, args: AddImageArgs) -> anyhow::Result<()> {
    let filepath = args.path.canonicalize()
        .with_context(|| format!("file not found: {}", args.path.display()))?;
    let filename = filepath.file_name()
        .map(|x| x.to_string_lossy().to_string())
        .context("path has no file name")?;
    let new_image = NewImage::new(&args.title, &args.category_id, args.subcategory_id.as_deref(), args.price)?;

    let mut client = connect(&app_config).await?;
    client.validate_image_references(&new_image.category_id, new_image.subcategory_id.as_deref())?;

    let data = tokio::fs::read(&filepath).await
        .with_context(|| format!("failed to read {}", filepath.display()))?;
    let assets = AssetStore::new(app_config.content_root.clone());
    let asset = assets.save_image(&data, &filename).await.context("failed to store image file")?;

    match client.create_image(new_image, asset.url.clone()).await {
        Ok(image) => {
            info!(id = %image.id, code = %image.code, "image added");
            println!("{}", serde_json::to_string_pretty(&image)?);
            Ok(())
        }
        Err(err) => {
            if let Err(cleanup_err) = assets.remove(&asset.url).await {
                error!(error = ?cleanup_err, path = %asset.path.display(), "failed to remove orphaned upload");
            }
            Err(err).context("failed to create image record")
        }
    }
}

pub async fn print_categories(app_config: AppConfig) -> anyhow::Result<()> {
    let client = connect(&app_config).await?;
    let roots = client.list_categories(&CategoryFilter::roots());
    if roots.is_empty() {
        println!("No categories");
        return Ok(());
    }
    for root in roots {
        println!("{} [{}] ({})", root.category.name, root.category.id, root.category.icon);
        for child in client.list_categories(&CategoryFilter::children_of(&root.category.id)) {
            println!("  └─ {} [{}] ({})", child.category.name, child.category.id, child.category.icon);
        }
    }
    Ok(())
}
