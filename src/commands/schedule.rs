use anyhow::Result;

use crate::context::Context;

pub async fn run(ctx: &Context) -> Result<()> {
    let scheduler = ctx.scheduler();
    scheduler.run_forever().await;
    Ok(())
}
