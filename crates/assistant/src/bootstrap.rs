//! Wiring shared by the CLI commands: validates the config and builds the
//! provider, the local record store and the thread log.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use rb_domain::config::{Config, ConfigSeverity};
use rb_domain::error::Error;
use rb_providers::{LlmProvider, OpenAiCompatProvider};
use rb_records::{MemoryRecordStore, RecordTools};
use rb_threads::ThreadLog;

use crate::assistant::Assistant;

/// A booted assistant plus the local stores behind it.
pub struct Runtime {
    pub assistant: Assistant,
    pub records: Arc<MemoryRecordStore>,
    pub threads: Arc<ThreadLog>,
    persist_records: bool,
}

impl Runtime {
    /// Write record changes back to the fixture file when enabled.
    pub fn persist(&self) -> anyhow::Result<()> {
        if self.persist_records {
            self.records.save().context("saving records file")?;
            tracing::debug!("record fixture saved");
        }
        Ok(())
    }
}

/// Validate `config` and build every component the assistant needs.
pub fn build_runtime(config: &Config) -> anyhow::Result<Runtime> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    let errors = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();
    if errors > 0 {
        anyhow::bail!("config validation failed with {errors} error(s)");
    }

    // ── LLM provider ─────────────────────────────────────────────────
    let provider = build_provider(config)?;

    // ── Record store ─────────────────────────────────────────────────
    let path = &config.storage.records_file;
    let records = if path.exists() {
        MemoryRecordStore::load(path)
            .with_context(|| format!("loading records from {}", path.display()))?
    } else {
        tracing::warn!(path = %path.display(), "records file not found, starting empty");
        MemoryRecordStore::new(Default::default())
    };
    let records = Arc::new(records);

    // ── Thread log ───────────────────────────────────────────────────
    let threads = Arc::new(
        ThreadLog::new(&config.storage.threads_dir).context("initializing thread log")?,
    );
    tracing::info!(path = %config.storage.threads_dir.display(), "thread log ready");

    let assistant = Assistant::new(
        config.assistant.clone(),
        provider,
        RecordTools::new(records.clone()),
        threads.clone(),
    );

    Ok(Runtime {
        assistant,
        records,
        threads,
        persist_records: config.storage.persist_records,
    })
}

/// The configured provider, or `None` when no API key resolves.
fn build_provider(config: &Config) -> anyhow::Result<Option<Arc<dyn LlmProvider>>> {
    let timeout = Duration::from_millis(config.llm.timeout_ms);
    match OpenAiCompatProvider::from_config(&config.llm.provider, timeout) {
        Ok(p) => {
            tracing::info!(
                provider = %config.llm.provider.id,
                base_url = %config.llm.provider.base_url,
                "LLM provider ready"
            );
            Ok(Some(Arc::new(p)))
        }
        Err(Error::Auth(reason)) => {
            tracing::warn!(%reason, "no API key; replies will ask for setup");
            Ok(None)
        }
        Err(e) => Err(e).context("initializing LLM provider"),
    }
}
