use anyhow::Result;
use uuid::Uuid;

use crate::context::Context;

pub async fn run(ctx: &Context, dry_run: bool) -> Result<()> {
    let cid = Uuid::new_v4().to_string();
    let engine = ctx.recovery_engine();
    let plans = engine.run_automatic_recovery(dry_run, &cid).await?;

    if plans.is_empty() {
        println!("no categories needed recovery action");
        return Ok(());
    }

    for plan in plans {
        println!(
            "category {}: {:?} ({}){}",
            plan.category_id,
            plan.action,
            plan.reason,
            plan.delay_seconds
                .map(|d| format!(", retry in {d}s"))
                .unwrap_or_default(),
        );
    }

    Ok(())
}
