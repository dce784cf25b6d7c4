use anyhow::Result;

use crate::context::Context;

pub async fn run(ctx: &Context) -> Result<()> {
    let categories = ctx.storage.count_categories().await?;
    let articles = ctx.storage.count_articles().await?;
    let running = ctx.storage.count_running_jobs().await?;
    let by_status = ctx.storage.count_jobs_by_status().await?;

    println!("categories: {categories}");
    println!("articles:   {articles}");
    println!("jobs running now: {running}");
    println!("jobs by status:");
    for (status, count) in by_status {
        println!("  {status:<14} {count}");
    }

    Ok(())
}
