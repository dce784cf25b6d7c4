use anyhow::Result;
use newsdesk_core::JobType;
use uuid::Uuid;

use crate::commands::resolve_category;
use crate::context::Context;

pub async fn run(ctx: &Context, category: &str) -> Result<()> {
    let category = resolve_category(&ctx.storage, category).await?;
    let cid = Uuid::new_v4().to_string();

    if ctx.job_runner.has_running_job(category.id).await? {
        println!("category '{}' already has a job RUNNING, skipping", category.name);
        return Ok(());
    }

    let job = ctx
        .storage
        .create_job(category.id, JobType::OnDemand, &cid)
        .await?;

    ctx.job_runner.run_job(category.id, job.id, &cid).await?;

    let updated = ctx.storage.get_job(job.id).await?;
    match updated {
        Some(job) => println!(
            "job {} for '{}' finished as {:?} (found={}, saved={})",
            job.id, category.name, job.status, job.articles_found, job.articles_saved
        ),
        None => println!("job {} for '{}' submitted", job.id, category.name),
    }

    Ok(())
}
