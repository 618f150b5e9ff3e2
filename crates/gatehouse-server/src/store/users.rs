use anyhow::{Context, Result};
use redb::{ReadableTable, TableDefinition};

use super::db::now;
use super::model::{normalize_email, NewUser, User, UserRecord};
use crate::password::{hash_password, verify_password};

pub(crate) const USERS: TableDefinition<u64, &[u8]> = TableDefinition::new("users");
pub(crate) const USER_EMAILS: TableDefinition<&str, u64> = TableDefinition::new("user_emails");

fn encode(record: &UserRecord) -> Result<Vec<u8>> {
    bincode::serde::encode_to_vec(record, bincode::config::standard())
        .context("bincode encode user")
}

fn decode(bytes: &[u8]) -> Result<UserRecord> {
    let (record, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .context("bincode decode user")?;
    Ok(record)
}

impl super::db::Store {
    /// Register a new identity. Emails are unique after normalization.
    pub fn insert_user(&self, new: NewUser) -> Result<User> {
        let email = normalize_email(&new.email);
        if email.is_empty() {
            anyhow::bail!("email must not be empty");
        }
        let password_hash = hash_password(&new.password)?;

        let write_txn = self.db.begin_write()?;
        let user = {
            let mut emails = write_txn.open_table(USER_EMAILS)?;
            if emails.get(email.as_str())?.is_some() {
                anyhow::bail!("a user with email {email} already exists");
            }

            let mut users = write_txn.open_table(USERS)?;
            let id = match users.last()? {
                Some((k, _)) => k.value() + 1,
                None => 1,
            };

            let user = User {
                id,
                first_name: new.first_name,
                last_name: new.last_name,
                email: email.clone(),
                is_admin: new.is_admin,
                avatar: None,
                created_at: now(),
            };
            let bytes = encode(&UserRecord {
                user: user.clone(),
                password_hash,
            })?;
            users.insert(id, bytes.as_slice())?;
            emails.insert(email.as_str(), id)?;
            user
        };
        write_txn.commit()?;
        Ok(user)
    }

    pub fn get_user(&self, id: u64) -> Result<Option<User>> {
        let read_txn = self.db.begin_read()?;
        let users = read_txn.open_table(USERS)?;
        match users.get(id)? {
            Some(v) => Ok(Some(decode(v.value())?.user)),
            None => Ok(None),
        }
    }

    /// Look up an identity by email and verify its password. Unknown
    /// emails and wrong passwords are both `None`.
    pub fn find_by_credentials(&self, email: &str, password: &str) -> Result<Option<User>> {
        let email = normalize_email(email);

        let record = {
            let read_txn = self.db.begin_read()?;
            let emails = read_txn.open_table(USER_EMAILS)?;
            let Some(id) = emails.get(email.as_str())?.map(|v| v.value()) else {
                return Ok(None);
            };
            let users = read_txn.open_table(USERS)?;
            match users.get(id)? {
                Some(v) => decode(v.value())?,
                None => return Ok(None),
            }
        };

        if verify_password(password, &record.password_hash)? {
            Ok(Some(record.user))
        } else {
            Ok(None)
        }
    }

    /// Point an identity's avatar at a stored upload. Returns false if the
    /// identity does not exist.
    pub fn update_avatar(&self, id: u64, filename: &str) -> Result<bool> {
        let write_txn = self.db.begin_write()?;
        let updated = {
            let mut users = write_txn.open_table(USERS)?;
            let existing = match users.get(id)? {
                Some(v) => Some(decode(v.value())?),
                None => None,
            };
            match existing {
                Some(mut record) => {
                    record.user.avatar = Some(filename.to_owned());
                    let bytes = encode(&record)?;
                    users.insert(id, bytes.as_slice())?;
                    true
                }
                None => false,
            }
        };
        write_txn.commit()?;
        Ok(updated)
    }
}
