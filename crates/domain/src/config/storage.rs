use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Local host stores (CLI)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one `<thread>.jsonl` file per conversation.
    #[serde(default = "d_threads_dir")]
    pub threads_dir: PathBuf,
    /// JSON fixture describing models, fields and records.
    #[serde(default = "d_records_file")]
    pub records_file: PathBuf,
    /// Write record changes back to `records_file` after each command.
    #[serde(default)]
    pub persist_records: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            threads_dir: d_threads_dir(),
            records_file: d_records_file(),
            persist_records: false,
        }
    }
}

fn d_threads_dir() -> PathBuf {
    PathBuf::from("./data/threads")
}
fn d_records_file() -> PathBuf {
    PathBuf::from("./data/records.json")
}
