//! Append-only JSONL thread logs.
//!
//! Each thread gets a `<key>.jsonl` file under the threads directory and
//! every posted message is appended as a single JSON line. Reads go through
//! an in-memory write-through cache so history is loaded from disk once per
//! thread; file I/O runs on `spawn_blocking`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::RwLock;

use rb_domain::error::{Error, Result};
use rb_domain::thread::{NewMessage, ThreadMessage, ThreadTarget};
use rb_domain::trace::TraceEvent;

use crate::store::ThreadStore;

/// JSONL-backed [`ThreadStore`]. Built with [`ThreadLog::in_memory`] it
/// keeps everything in the cache and never touches disk.
pub struct ThreadLog {
    base_dir: Option<PathBuf>,
    cache: RwLock<HashMap<String, Vec<ThreadMessage>>>,
}

impl ThreadLog {
    /// Log rooted at `base_dir` (created if missing).
    pub fn new(base_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(base_dir).map_err(Error::Io)?;
        Ok(Self {
            base_dir: Some(base_dir.to_path_buf()),
            cache: RwLock::new(HashMap::new()),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            base_dir: None,
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn path_for(&self, key: &str) -> Option<PathBuf> {
        self.base_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.jsonl", file_stem(key))))
    }

    /// Chronological history of a thread, loading it from disk on first use.
    async fn load(&self, key: &str) -> Result<Vec<ThreadMessage>> {
        {
            let cache = self.cache.read();
            if let Some(lines) = cache.get(key) {
                return Ok(lines.clone());
            }
        }

        let lines = match self.path_for(key) {
            Some(path) => {
                let k = key.to_owned();
                tokio::task::spawn_blocking(move || read_jsonl_file(&path, &k))
                    .await
                    .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))??
            }
            None => Vec::new(),
        };

        self.cache
            .write()
            .entry(key.to_owned())
            .or_insert_with(|| lines.clone());
        Ok(lines)
    }
}

#[async_trait::async_trait]
impl ThreadStore for ThreadLog {
    async fn fetch_messages(
        &self,
        thread: &ThreadTarget,
        limit: Option<usize>,
    ) -> Result<Vec<ThreadMessage>> {
        let mut history = self.load(&thread.key()).await?;
        history.reverse();
        if let Some(n) = limit {
            history.truncate(n);
        }
        Ok(history)
    }

    async fn post_message(&self, thread: &ThreadTarget, msg: NewMessage) -> Result<ThreadMessage> {
        let key = thread.key();
        let history = self.load(&key).await?;

        let stored = ThreadMessage {
            id: history.last().map_or(1, |m| m.id + 1),
            body: msg.body,
            author_id: msg.author_id,
            message_type: msg.message_type,
            subtype: msg.subtype,
            function_payload: msg.function_payload,
            created_at: Utc::now(),
        };

        // Disk first; the cache is only updated when the write succeeded.
        if let Some(path) = self.path_for(&key) {
            let mut buf = serde_json::to_string(&stored)
                .map_err(|e| Error::Thread(format!("serializing thread message: {e}")))?;
            buf.push('\n');
            tokio::task::spawn_blocking(move || {
                use std::io::Write;
                let mut file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .map_err(Error::Io)?;
                file.write_all(buf.as_bytes()).map_err(Error::Io)
            })
            .await
            .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))??;
        }

        self.cache
            .write()
            .entry(key.clone())
            .or_default()
            .push(stored.clone());

        TraceEvent::ThreadAppend {
            thread: key,
            lines: 1,
        }
        .emit();

        Ok(stored)
    }

    async fn clear(&self, thread: &ThreadTarget) -> Result<()> {
        let key = thread.key();
        if let Some(path) = self.path_for(&key) {
            tokio::task::spawn_blocking(move || match std::fs::remove_file(&path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(Error::Io(e)),
            })
            .await
            .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))??;
        }
        self.cache.write().insert(key.clone(), Vec::new());

        TraceEvent::ThreadCleared { thread: key }.emit();
        Ok(())
    }
}

/// File-system safe form of a thread key.
fn file_stem(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn read_jsonl_file(path: &Path, key: &str) -> Result<Vec<ThreadMessage>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let raw = std::fs::read_to_string(path).map_err(Error::Io)?;
    let mut lines = Vec::new();
    for line in raw.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ThreadMessage>(line) {
            Ok(msg) => lines.push(msg),
            Err(e) => {
                tracing::warn!(thread = key, error = %e, "skipping malformed thread line");
            }
        }
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_stem_replaces_separators() {
        assert_eq!(file_stem("sale.order-7"), "sale.order-7");
        assert_eq!(file_stem("general/../x"), "general_.._x");
        assert_eq!(file_stem("chat with bot"), "chat_with_bot");
    }
}
