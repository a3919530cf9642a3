//! `recordbot summarize`: print the assistant's summary of one record.

use rb_domain::config::Config;

use crate::bootstrap;

pub async fn summarize(config: &Config, model: &str, id: i64) -> anyhow::Result<()> {
    let rt = bootstrap::build_runtime(config)?;
    let summary = rt.assistant.summarize(model, id).await?;
    println!("{summary}");
    Ok(())
}
