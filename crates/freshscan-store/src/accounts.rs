//! Account rows: registration, credential lookup, profile updates and
//! cascading deletion.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::database::Database;
use crate::error::{constraint_code, not_found, Result, StoreError};
use crate::models::{conversion_err, ts_from_sql, ts_to_sql, ts_truncate, Account, Credential};

impl Database {
    /// Insert a new account. `email` must already be normalized.
    ///
    /// Fails with [`StoreError::DuplicateAccount`] when the email is taken
    /// (compared case-insensitively).
    pub fn insert_account(
        &self,
        email: &str,
        name: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Account> {
        let now = ts_truncate(now);
        let account = Account {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        };

        self.conn()
            .execute(
                "INSERT INTO accounts (id, email, name, password_hash, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    account.id.to_string(),
                    account.email,
                    account.name,
                    password_hash,
                    ts_to_sql(&account.created_at),
                    ts_to_sql(&account.updated_at),
                ],
            )
            .map_err(|e| match constraint_code(&e) {
                Some(rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE) => StoreError::DuplicateAccount,
                _ => StoreError::Sqlite(e),
            })?;

        Ok(account)
    }

    pub fn get_account(&self, id: Uuid) -> Result<Account> {
        self.get_credential(id).map(|c| c.account)
    }

    /// Look up the account and password hash for `id`.
    pub fn get_credential(&self, id: Uuid) -> Result<Credential> {
        self.conn()
            .query_row(
                "SELECT id, email, name, password_hash, created_at, updated_at
                 FROM accounts WHERE id = ?1",
                params![id.to_string()],
                row_to_credential,
            )
            .map_err(not_found)
    }

    /// Look up the account and password hash for a (normalized) email.
    pub fn find_credential_by_email(&self, email: &str) -> Result<Option<Credential>> {
        let found = self
            .conn()
            .query_row(
                "SELECT id, email, name, password_hash, created_at, updated_at
                 FROM accounts WHERE email = ?1",
                params![email],
                row_to_credential,
            )
            .optional()?;
        Ok(found)
    }

    pub fn update_account_name(&self, id: Uuid, name: &str, now: DateTime<Utc>) -> Result<Account> {
        let affected = self.conn().execute(
            "UPDATE accounts SET name = ?2, updated_at = ?3 WHERE id = ?1",
            params![id.to_string(), name, ts_to_sql(&now)],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        self.get_account(id)
    }

    /// Delete an account and, through the foreign-key cascade, every scan it
    /// owns. Runs in one transaction.
    ///
    /// Returns the blob names of the deleted scans so the caller can remove
    /// the files.
    pub fn delete_account(&mut self, id: Uuid) -> Result<Vec<String>> {
        let tx = self.conn_mut().transaction()?;

        let blob_names = {
            let mut stmt = tx.prepare("SELECT blob_name FROM scans WHERE owner_id = ?1")?;
            let rows = stmt.query_map(params![id.to_string()], |row| row.get::<_, String>(0))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        let affected = tx.execute("DELETE FROM accounts WHERE id = ?1", params![id.to_string()])?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }

        tx.commit()?;
        tracing::debug!(account = %id, scans = blob_names.len(), "deleted account");
        Ok(blob_names)
    }
}

fn row_to_credential(row: &rusqlite::Row<'_>) -> rusqlite::Result<Credential> {
    let id_str: String = row.get(0)?;
    let email: String = row.get(1)?;
    let name: String = row.get(2)?;
    let password_hash: String = row.get(3)?;
    let created_str: String = row.get(4)?;
    let updated_str: String = row.get(5)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| conversion_err(0, e))?;
    let created_at = ts_from_sql(&created_str).map_err(|e| conversion_err(4, e))?;
    let updated_at = ts_from_sql(&updated_str).map_err(|e| conversion_err(5, e))?;

    Ok(Credential {
        account: Account {
            id,
            email,
            name,
            created_at,
            updated_at,
        },
        password_hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_insert_and_get() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        let account = db
            .insert_account("alice@example.com", "Alice", "hash-a", now)
            .unwrap();

        let fetched = db.get_account(account.id).unwrap();
        assert_eq!(fetched, account);

        let cred = db
            .find_credential_by_email("alice@example.com")
            .unwrap()
            .expect("credential");
        assert_eq!(cred.password_hash, "hash-a");
        assert_eq!(cred.account.id, account.id);
    }

    #[test]
    fn test_duplicate_email_is_case_insensitive() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        db.insert_account("alice@example.com", "Alice", "hash-a", now)
            .unwrap();

        let err = db
            .insert_account("ALICE@example.com", "Mallory", "hash-m", now)
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateAccount));

        let cred = db
            .find_credential_by_email("alice@example.com")
            .unwrap()
            .unwrap();
        assert_eq!(cred.password_hash, "hash-a");
        assert_eq!(cred.account.name, "Alice");
    }

    #[test]
    fn test_unknown_email_is_none() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.find_credential_by_email("nobody@example.com").unwrap().is_none());
        assert!(matches!(
            db.get_account(Uuid::new_v4()),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn test_update_name_bumps_updated_at() {
        let db = Database::open_in_memory().unwrap();
        let created = Utc::now();
        let account = db
            .insert_account("bob@example.com", "Bob", "hash", created)
            .unwrap();

        let later = created + Duration::minutes(5);
        let updated = db.update_account_name(account.id, "Robert", later).unwrap();
        assert_eq!(updated.name, "Robert");
        assert_eq!(updated.created_at, account.created_at);
        assert!(updated.updated_at > account.updated_at);

        assert!(matches!(
            db.update_account_name(Uuid::new_v4(), "x", later),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn test_delete_missing_account() {
        let mut db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.delete_account(Uuid::new_v4()),
            Err(StoreError::NotFound)
        ));
    }
}
