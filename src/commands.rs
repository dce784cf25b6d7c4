pub mod category;
pub mod crawl;
pub mod recover;
pub mod schedule;
pub mod status;

use anyhow::{anyhow, Result};
use newsdesk_core::Category;
use newsdesk_storage::Storage;

/// Resolves a `--category` argument that may be a numeric id or a name.
pub async fn resolve_category(storage: &Storage, category: &str) -> Result<Category> {
    let found = if let Ok(id) = category.parse::<i64>() {
        storage.get_category_by_id(id).await?
    } else {
        storage.get_category_by_name(category).await?
    };
    found.ok_or_else(|| anyhow!("no such category: {category}"))
}
