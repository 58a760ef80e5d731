use std::{error::Error, sync::Arc};

use dotenvy::dotenv;
use tablesync::products::{PRODUCTS_SLOT, category_summary, save_products};
use tablesync::{Backend, ConfigKey, Dataset, RuntimeContext, SchemaCatalog, UrlConnector};

fn env_config() -> Vec<(ConfigKey, String)> {
    [
        (ConfigKey::Host, "TABLESYNC_HOST"),
        (ConfigKey::User, "TABLESYNC_USER"),
        (ConfigKey::Password, "TABLESYNC_PASSWORD"),
        (ConfigKey::Database, "TABLESYNC_DATABASE"),
        (ConfigKey::DefaultTable, "TABLESYNC_TABLE"),
    ]
    .into_iter()
    .filter_map(|(key, var)| std::env::var(var).ok().map(|v| (key, v)))
    .collect()
}

#[tokio::main]
pub async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    env_logger::init();

    let url = std::env::var("TABLESYNC_BACKEND").unwrap_or_else(|_| "mysql".into());
    let backend = Backend::from_url(&url).ok_or_else(|| format!("unsupported backend `{url}`"))?;

    let mut ctx = RuntimeContext::new(
        SchemaCatalog::product_catalog()?,
        Arc::new(UrlConnector::new(backend)),
    );
    let mut config = env_config();
    config.push((ConfigKey::DefaultTable, "products".into()));
    ctx.init([], None, config).await?;

    let products = ctx.refresh(PRODUCTS_SLOT, None).await?;
    println!("{}", serde_json::to_string_pretty(&products)?);

    // `TABLESYNC_IMPORT` names a JSON dataset appended to the products, then saved
    if let Ok(path) = std::env::var("TABLESYNC_IMPORT") {
        let imported: Dataset = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        let mut edited = ctx.data_get(PRODUCTS_SLOT)?;
        edited.append(imported);

        let report = save_products(&ctx, edited).await?;
        log::info!("Saved: {:?}", report);
    }

    for s in category_summary(&ctx.data_get(PRODUCTS_SLOT)?) {
        println!(
            "category {}: {} items, {} in stock, {:.2} average",
            s.id_category, s.items, s.total_stock, s.average_stock
        );
    }

    Ok(())
}
