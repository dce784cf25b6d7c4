use anyhow::{bail, Result};
use chrono::Utc;
use newsdesk_core::Category;

use crate::cli::CategoryAction;
use crate::commands::resolve_category;
use crate::context::Context;

pub async fn run(ctx: &Context, action: CategoryAction) -> Result<()> {
    match action {
        CategoryAction::Add {
            name,
            keywords,
            exclude,
            language,
            country,
            schedule_interval_minutes,
        } => add(ctx, name, keywords, exclude, language, country, schedule_interval_minutes).await,
        CategoryAction::List => list(ctx).await,
        CategoryAction::Disable { category, hours, reason } => disable(ctx, &category, hours, &reason).await,
    }
}

async fn add(
    ctx: &Context,
    name: String,
    keywords: Vec<String>,
    exclude: Vec<String>,
    language: Option<String>,
    country: Option<String>,
    schedule_interval_minutes: Option<u32>,
) -> Result<()> {
    if let Some(minutes) = schedule_interval_minutes {
        if !Category::ALLOWED_SCHEDULE_MINUTES.contains(&minutes) {
            bail!(
                "schedule_interval_minutes must be one of {:?}, got {minutes}",
                Category::ALLOWED_SCHEDULE_MINUTES
            );
        }
    }

    let exclude = exclude.into_iter().filter(|k| !k.trim().is_empty()).collect();
    let category = Category {
        id: 0,
        name,
        keywords,
        exclude_keywords: exclude,
        language: language.unwrap_or_else(Category::default_language),
        country: country.unwrap_or_else(Category::default_country),
        is_active: true,
        schedule_enabled: schedule_interval_minutes.is_some(),
        schedule_interval_minutes,
        crawl_period: None,
        last_scheduled_run_at: None,
        next_scheduled_run_at: None,
        disabled_until: None,
    };

    let saved = ctx.storage.insert_category(&category).await?;
    println!("created category {} ({})", saved.id, saved.name);
    Ok(())
}

async fn list(ctx: &Context) -> Result<()> {
    let categories = ctx.storage.list_categories().await?;
    if categories.is_empty() {
        println!("no categories");
        return Ok(());
    }
    for c in categories {
        let disabled = if c.is_disabled_now(Utc::now()) { " [disabled]" } else { "" };
        println!(
            "{:>4}  {:<24} active={:<5} schedule={:?} keywords={:?}{}",
            c.id, c.name, c.is_active, c.schedule_interval_minutes, c.keywords, disabled
        );
    }
    Ok(())
}

async fn disable(ctx: &Context, category: &str, hours: i64, reason: &str) -> Result<()> {
    let category = resolve_category(&ctx.storage, category).await?;
    let until = Utc::now() + chrono::Duration::hours(hours);
    ctx.storage.disable_category_temporarily(category.id, reason, until).await?;
    println!("disabled '{}' until {until}", category.name);
    Ok(())
}
