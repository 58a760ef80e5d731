//! Product catalog workflows built on the synchronizer.
//!
//! These operate on the tables of
//! [`SchemaCatalog::product_catalog`](crate::registry::SchemaCatalog::product_catalog).
//! Products are edited with a free-text `category` column; saving resolves
//! those titles to `id_category` values, creating missing categories first.

use std::collections::{BTreeMap, HashSet};

use crate::context::RuntimeContext;
use crate::dataset::{Dataset, Row, Value};
use crate::error::Result;
use crate::sync::SyncOutcome;

pub const PRODUCTS_SLOT: &str = "products_data";
pub const CATEGORIES_SLOT: &str = "categories_data";
pub const CATEGORIES_TABLE: &str = "categories";

const CATEGORY_COLUMN: &str = "category";
const CATEGORY_ID: &str = "id_category";
const CATEGORY_TITLE: &str = "title";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveReport {
    /// `None` when the categories slot was never populated.
    pub categories: Option<SyncOutcome>,
    pub products: SyncOutcome,
}

fn titles(categories: &Dataset) -> HashSet<String> {
    categories
        .column_values(CATEGORY_TITLE)
        .into_iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect()
}

/// Queue category titles used by `products` but unknown to the cached
/// categories into the categories slot, with no id yet.
async fn stage_new_categories(ctx: &RuntimeContext, products: &Dataset) -> Result<()> {
    if !products.has_column(CATEGORY_COLUMN) {
        return Ok(());
    }

    let mut categories = if ctx.is_data_set(CATEGORIES_SLOT) {
        ctx.data_get(CATEGORIES_SLOT)?
    } else {
        ctx.fetch(Some(CATEGORIES_TABLE)).await?
    };

    let mut known = titles(&categories);
    let mut staged = 0;
    for value in products.column_values(CATEGORY_COLUMN) {
        let Some(title) = value.as_str().filter(|t| !t.is_empty()) else {
            continue;
        };
        if known.insert(title.to_string()) {
            let mut r = Row::new();
            r.insert(CATEGORY_ID.to_string(), Value::Null);
            r.insert(CATEGORY_TITLE.to_string(), Value::from(title));
            categories.push_row(r);
            staged += 1;
        }
    }

    if staged > 0 {
        log::debug!("Staged {staged} new categories");
        ctx.data_set(CATEGORIES_SLOT, categories, true);
    }
    Ok(())
}

/// Fill missing `id_category` cells from the `category` title, then drop the
/// `category` column.
pub fn resolve_category_ids(products: &mut Dataset, categories: &Dataset) {
    let by_title: BTreeMap<&str, &Value> = categories
        .rows()
        .iter()
        .filter_map(|r| {
            let title = r.get(CATEGORY_TITLE)?.as_str()?;
            let id = r.get(CATEGORY_ID).filter(|v| !v.is_null())?;
            Some((title, id))
        })
        .collect();

    products.add_column(CATEGORY_ID);
    for idx in 0..products.len() {
        if !products.value(idx, CATEGORY_ID).is_null() {
            continue;
        }
        let id = products
            .value(idx, CATEGORY_COLUMN)
            .as_str()
            .and_then(|t| by_title.get(t))
            .map(|v| (*v).clone());
        if let Some(id) = id {
            products.set_value(idx, CATEGORY_ID, id);
        }
    }
    products.drop_column(CATEGORY_COLUMN);
}

/// Persist an edited products dataset and refresh both cache slots.
pub async fn save_products(ctx: &RuntimeContext, mut products: Dataset) -> Result<SaveReport> {
    stage_new_categories(ctx, &products).await?;

    let categories = if ctx.is_data_set(CATEGORIES_SLOT) {
        let staged = ctx.data_get(CATEGORIES_SLOT)?;
        Some(ctx.synchronize(&staged, Some(CATEGORIES_TABLE)).await?)
    } else {
        None
    };

    let persisted = ctx.refresh(CATEGORIES_SLOT, Some(CATEGORIES_TABLE)).await?;
    resolve_category_ids(&mut products, &persisted);

    let outcome = ctx.synchronize(&products, None).await?;
    ctx.refresh(PRODUCTS_SLOT, None).await?;

    Ok(SaveReport {
        categories,
        products: outcome,
    })
}

/// Per-category figures behind the catalog statistics view.
#[derive(Debug, Clone, PartialEq)]
pub struct CategorySummary {
    pub id_category: i64,
    pub items: usize,
    pub total_stock: f64,
    pub average_stock: f64,
    pub average_price: Option<f64>,
}

/// Group products by `id_category`. Rows without a category id are skipped.
pub fn category_summary(products: &Dataset) -> Vec<CategorySummary> {
    #[derive(Default)]
    struct Acc {
        items: usize,
        stock: f64,
        price: f64,
        priced: usize,
    }

    let mut groups: BTreeMap<i64, Acc> = BTreeMap::new();
    for r in products.rows() {
        let Some(id) = r.get(CATEGORY_ID).and_then(Value::as_i64) else {
            continue;
        };
        let acc = groups.entry(id).or_default();
        acc.items += 1;
        acc.stock += r.get("stock_available").and_then(Value::as_f64).unwrap_or(0.0);
        if let Some(price) = r.get("selling_price").and_then(Value::as_f64) {
            acc.price += price;
            acc.priced += 1;
        }
    }

    groups
        .into_iter()
        .map(|(id_category, acc)| CategorySummary {
            id_category,
            items: acc.items,
            total_stock: acc.stock,
            average_stock: acc.stock / acc.items as f64,
            average_price: (acc.priced > 0).then(|| acc.price / acc.priced as f64),
        })
        .collect()
}
