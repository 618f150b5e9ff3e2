use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use redb::Database;
use tracing::{info, warn};

use super::sessions::SESSIONS;
use super::users::{USERS, USER_EMAILS};

/// Handle to the redb database holding sessions and identities. Cheap to
/// clone; all clones share one database.
#[derive(Clone)]
pub struct Store {
    pub(crate) db: Arc<Database>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path)
            .with_context(|| format!("open database at {}", path.display()))?;

        // Create every table up front so read transactions never miss one.
        let write_txn = db.begin_write()?;
        {
            write_txn.open_table(SESSIONS)?;
            write_txn.open_table(USERS)?;
            write_txn.open_table(USER_EMAILS)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Periodically remove expired sessions.
    pub fn spawn_sweep(self, interval: Duration) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match self.prune_sessions(now()) {
                    Ok(0) => {}
                    Ok(n) => info!(pruned = n, "swept expired sessions"),
                    Err(e) => warn!(error = %e, "session sweep failed"),
                }
            }
        });
    }
}

pub(crate) fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Store;

    pub fn temp_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("gatehouse.db")).unwrap();
        (dir, store)
    }
}
