//! Persistence sink for evicted sessions.

use crate::session::SessionSnapshot;
use async_trait::async_trait;
use std::path::PathBuf;

/// Persistence collaborator for finished sessions.
///
/// Invoked fire-and-forget on eviction; a failure is fatal only to the
/// background task that called it, never to the foreground path.
#[async_trait]
pub trait Store: Send + Sync {
    async fn store(&self, snapshot: SessionSnapshot) -> anyhow::Result<()>;
}

/// Writes each session snapshot as a JSON file under a directory.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl Store for JsonFileStore {
    async fn store(&self, snapshot: SessionSnapshot) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let file = format!(
            "{}-{}.json",
            snapshot.channel.id,
            snapshot.ended_at.timestamp()
        );
        let path = self.dir.join(file);
        let body = serde_json::to_vec_pretty(&snapshot)?;
        tokio::fs::write(&path, body).await?;

        tracing::debug!(path = %path.display(), "session snapshot stored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ChatMessage, EntityRef, Session, SessionLimits};

    fn snapshot() -> SessionSnapshot {
        let session = Session::new(
            EntityRef::new("alice", "u1"),
            EntityRef::new("general", "c1"),
            EntityRef::default(),
            false,
            "Parley",
            SessionLimits::default(),
        );
        session.add_user_message("alice", "hi");
        session.snapshot()
    }

    #[tokio::test]
    async fn stores_snapshot_as_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonFileStore::new(dir.path());

        store.store(snapshot()).await.expect("store");

        let mut entries = std::fs::read_dir(dir.path())
            .expect("read dir")
            .collect::<Result<Vec<_>, _>>()
            .expect("entries");
        assert_eq!(entries.len(), 1);

        let body = std::fs::read_to_string(entries.pop().unwrap().path()).expect("read");
        let parsed: SessionSnapshot = serde_json::from_str(&body).expect("parse");
        assert_eq!(parsed.channel.id, "c1");
        assert_eq!(
            parsed.messages.first().map(|m: &ChatMessage| m.content.as_str()),
            Some("hi")
        );
    }
}
