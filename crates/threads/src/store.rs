use rb_domain::error::Result;
use rb_domain::thread::{NewMessage, ThreadMessage, ThreadTarget};

/// Host messaging thread.
#[async_trait::async_trait]
pub trait ThreadStore: Send + Sync {
    /// Messages of `thread`, newest first. `None` returns the whole history.
    async fn fetch_messages(
        &self,
        thread: &ThreadTarget,
        limit: Option<usize>,
    ) -> Result<Vec<ThreadMessage>>;

    /// Append a message and return it as stored.
    async fn post_message(&self, thread: &ThreadTarget, msg: NewMessage) -> Result<ThreadMessage>;

    /// Remove every message of `thread`.
    async fn clear(&self, thread: &ThreadTarget) -> Result<()>;
}
