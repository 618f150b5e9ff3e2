use anyhow::{Context, Result};
use redb::{ReadableTable, TableDefinition};

use super::model::SessionRecord;

pub(crate) const SESSIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("sessions");

impl super::db::Store {
    /// Load a live session. Expired records are reported as absent.
    pub fn load_session(&self, token: &str) -> Result<Option<SessionRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SESSIONS)?;

        let Some(guard) = table.get(token)? else {
            return Ok(None);
        };
        let (record, _): (SessionRecord, _) =
            bincode::serde::decode_from_slice(guard.value(), bincode::config::standard())
                .context("bincode decode session")?;

        if record.is_expired(super::db::now()) {
            return Ok(None);
        }
        Ok(Some(record))
    }

    /// Insert or overwrite the session stored under `token`.
    pub fn save_session(&self, token: &str, record: &SessionRecord) -> Result<()> {
        let bytes = bincode::serde::encode_to_vec(record, bincode::config::standard())
            .context("bincode encode session")?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(SESSIONS)?;
            table.insert(token, bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Delete a session. Returns true if it existed.
    pub fn delete_session(&self, token: &str) -> Result<bool> {
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut table = write_txn.open_table(SESSIONS)?;
            let existed = table.remove(token)?.is_some();
            existed
        };
        write_txn.commit()?;
        Ok(existed)
    }

    /// Remove every session expired at `now`. Returns the number removed.
    pub fn prune_sessions(&self, now: i64) -> Result<usize> {
        let write_txn = self.db.begin_write()?;
        let pruned = {
            let mut table = write_txn.open_table(SESSIONS)?;

            let mut expired = Vec::new();
            for item in table.iter()? {
                let (k, v) = item?;
                let expired_record = match bincode::serde::decode_from_slice::<SessionRecord, _>(
                    v.value(),
                    bincode::config::standard(),
                ) {
                    Ok((record, _)) => record.is_expired(now),
                    // Undecodable records can never be loaded again.
                    Err(_) => true,
                };
                if expired_record {
                    expired.push(k.value().to_owned());
                }
            }

            for token in &expired {
                table.remove(token.as_str())?;
            }
            expired.len()
        };
        write_txn.commit()?;
        Ok(pruned)
    }
}
