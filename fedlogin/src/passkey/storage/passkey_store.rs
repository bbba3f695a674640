use chrono::{DateTime, Utc};
use sqlx::{FromRow, Pool, Postgres, Row, Sqlite, postgres::PgRow, sqlite::SqliteRow};

use crate::passkey::errors::PasskeyError;
use crate::passkey::types::{CredentialSearchField, StoredCredential};
use crate::storage::{DB_TABLE_CREDENTIALS, DB_TABLE_USERS, GENERIC_DATA_STORE};

pub(crate) struct PasskeyStore;

impl PasskeyStore {
    pub(crate) async fn init() -> Result<(), PasskeyError> {
        let store = GENERIC_DATA_STORE.lock().await;

        // Create table based on database type
        if let Some(pool) = store.as_sqlite() {
            create_tables_sqlite(pool).await
        } else if let Some(pool) = store.as_postgres() {
            create_tables_postgres(pool).await
        } else {
            Err(PasskeyError::Storage("Unsupported database type".into()))
        }
    }

    /// Insert a new credential. The credential id is globally unique; a
    /// conflicting insert fails with `DuplicateCredential` and leaves the
    /// existing row untouched.
    pub(crate) async fn store_credential(credential: StoredCredential) -> Result<(), PasskeyError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            store_credential_sqlite(pool, &credential).await
        } else if let Some(pool) = store.as_postgres() {
            store_credential_postgres(pool, &credential).await
        } else {
            Err(PasskeyError::Storage("Unsupported database type".into()))
        }
    }

    pub(crate) async fn get_credential(
        credential_id: &str,
    ) -> Result<Option<StoredCredential>, PasskeyError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            get_credential_sqlite(pool, credential_id).await
        } else if let Some(pool) = store.as_postgres() {
            get_credential_postgres(pool, credential_id).await
        } else {
            Err(PasskeyError::Storage("Unsupported database type".into()))
        }
    }

    pub(crate) async fn get_credentials_by(
        field: CredentialSearchField,
    ) -> Result<Vec<StoredCredential>, PasskeyError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            get_credentials_by_field_sqlite(pool, &field).await
        } else if let Some(pool) = store.as_postgres() {
            get_credentials_by_field_postgres(pool, &field).await
        } else {
            Err(PasskeyError::Storage("Unsupported database type".into()))
        }
    }

    /// Compare-and-set counter update.
    ///
    /// The row is only written when the stored counter still equals
    /// `expected_counter`, so two authentications racing on one credential
    /// cannot both pass a stale counter check. Returns whether the update
    /// was applied.
    pub(crate) async fn update_credential_counter(
        credential_id: &str,
        counter: u32,
        expected_counter: u32,
    ) -> Result<bool, PasskeyError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            update_credential_counter_sqlite(pool, credential_id, counter, expected_counter).await
        } else if let Some(pool) = store.as_postgres() {
            update_credential_counter_postgres(pool, credential_id, counter, expected_counter).await
        } else {
            Err(PasskeyError::Storage("Unsupported database type".into()))
        }
    }

    /// Mark a credential for manual review after a suspected cloning event.
    pub(crate) async fn flag_credential(credential_id: &str) -> Result<(), PasskeyError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            flag_credential_sqlite(pool, credential_id).await
        } else if let Some(pool) = store.as_postgres() {
            flag_credential_postgres(pool, credential_id).await
        } else {
            Err(PasskeyError::Storage("Unsupported database type".into()))
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

// SQLite implementations
async fn create_tables_sqlite(pool: &Pool<Sqlite>) -> Result<(), PasskeyError> {
    let credentials_table = DB_TABLE_CREDENTIALS.as_str();
    let users_table = DB_TABLE_USERS.as_str();

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            credential_id TEXT PRIMARY KEY NOT NULL,
            user_id TEXT NOT NULL REFERENCES {}(id),
            user_handle TEXT NOT NULL,
            username TEXT NOT NULL,
            public_key TEXT NOT NULL,
            counter INTEGER NOT NULL DEFAULT 0,
            flagged BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
        credentials_table, users_table
    ))
    .execute(pool)
    .await
    .map_err(|e| PasskeyError::Storage(e.to_string()))?;

    sqlx::query(&format!(
        r#"
        CREATE INDEX IF NOT EXISTS idx_{}_username ON {}(username);
        CREATE INDEX IF NOT EXISTS idx_{}_user_id ON {}(user_id);
        "#,
        credentials_table, credentials_table, credentials_table, credentials_table
    ))
    .execute(pool)
    .await
    .map_err(|e| PasskeyError::Storage(e.to_string()))?;

    Ok(())
}

async fn store_credential_sqlite(
    pool: &Pool<Sqlite>,
    credential: &StoredCredential,
) -> Result<(), PasskeyError> {
    let counter_i64 = credential.counter as i64;
    let credentials_table = DB_TABLE_CREDENTIALS.as_str();

    sqlx::query(&format!(
        r#"
        INSERT INTO {}
        (credential_id, user_id, user_handle, username, public_key, counter, flagged, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        credentials_table
    ))
    .bind(&credential.credential_id)
    .bind(&credential.user_id)
    .bind(&credential.user_handle)
    .bind(&credential.username)
    .bind(&credential.public_key)
    .bind(counter_i64)
    .bind(credential.flagged)
    .bind(credential.created_at)
    .bind(credential.updated_at)
    .execute(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            PasskeyError::DuplicateCredential
        } else {
            PasskeyError::Storage(e.to_string())
        }
    })?;

    Ok(())
}

async fn get_credential_sqlite(
    pool: &Pool<Sqlite>,
    credential_id: &str,
) -> Result<Option<StoredCredential>, PasskeyError> {
    sqlx::query_as::<_, StoredCredential>(&format!(
        r#"SELECT * FROM {} WHERE credential_id = ?"#,
        DB_TABLE_CREDENTIALS.as_str()
    ))
    .bind(credential_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| PasskeyError::Storage(e.to_string()))
}

async fn get_credentials_by_field_sqlite(
    pool: &Pool<Sqlite>,
    field: &CredentialSearchField,
) -> Result<Vec<StoredCredential>, PasskeyError> {
    let credentials_table = DB_TABLE_CREDENTIALS.as_str();
    let (query, value) = match field {
        CredentialSearchField::CredentialId(credential_id) => (
            format!(
                r#"SELECT * FROM {} WHERE credential_id = ?"#,
                credentials_table
            ),
            credential_id.as_str(),
        ),
        CredentialSearchField::UserId(id) => (
            format!(r#"SELECT * FROM {} WHERE user_id = ?"#, credentials_table),
            id.as_str(),
        ),
        CredentialSearchField::Username(name) => (
            format!(r#"SELECT * FROM {} WHERE username = ?"#, credentials_table),
            name.as_str(),
        ),
    };

    sqlx::query_as::<_, StoredCredential>(&query)
        .bind(value)
        .fetch_all(pool)
        .await
        .map_err(|e| PasskeyError::Storage(e.to_string()))
}

async fn update_credential_counter_sqlite(
    pool: &Pool<Sqlite>,
    credential_id: &str,
    counter: u32,
    expected_counter: u32,
) -> Result<bool, PasskeyError> {
    let result = sqlx::query(&format!(
        r#"
        UPDATE {}
        SET counter = ?, updated_at = CURRENT_TIMESTAMP
        WHERE credential_id = ? AND counter = ?
        "#,
        DB_TABLE_CREDENTIALS.as_str()
    ))
    .bind(counter as i64)
    .bind(credential_id)
    .bind(expected_counter as i64)
    .execute(pool)
    .await
    .map_err(|e| PasskeyError::Storage(e.to_string()))?;

    Ok(result.rows_affected() == 1)
}

async fn flag_credential_sqlite(
    pool: &Pool<Sqlite>,
    credential_id: &str,
) -> Result<(), PasskeyError> {
    sqlx::query(&format!(
        r#"
        UPDATE {}
        SET flagged = TRUE, updated_at = CURRENT_TIMESTAMP
        WHERE credential_id = ?
        "#,
        DB_TABLE_CREDENTIALS.as_str()
    ))
    .bind(credential_id)
    .execute(pool)
    .await
    .map_err(|e| PasskeyError::Storage(e.to_string()))?;

    Ok(())
}

// PostgreSQL implementations
async fn create_tables_postgres(pool: &Pool<Postgres>) -> Result<(), PasskeyError> {
    let credentials_table = DB_TABLE_CREDENTIALS.as_str();
    let users_table = DB_TABLE_USERS.as_str();

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            credential_id TEXT PRIMARY KEY NOT NULL,
            user_id TEXT NOT NULL REFERENCES {}(id),
            user_handle TEXT NOT NULL,
            username TEXT NOT NULL,
            public_key TEXT NOT NULL,
            counter INTEGER NOT NULL DEFAULT 0,
            flagged BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
        credentials_table, users_table
    ))
    .execute(pool)
    .await
    .map_err(|e| PasskeyError::Storage(e.to_string()))?;

    sqlx::query(&format!(
        r#"
        CREATE INDEX IF NOT EXISTS idx_{}_username ON {}(username);
        CREATE INDEX IF NOT EXISTS idx_{}_user_id ON {}(user_id);
        "#,
        credentials_table, credentials_table, credentials_table, credentials_table
    ))
    .execute(pool)
    .await
    .map_err(|e| PasskeyError::Storage(e.to_string()))?;

    Ok(())
}

async fn store_credential_postgres(
    pool: &Pool<Postgres>,
    credential: &StoredCredential,
) -> Result<(), PasskeyError> {
    let counter_i32 = credential.counter as i32;
    let credentials_table = DB_TABLE_CREDENTIALS.as_str();

    sqlx::query(&format!(
        r#"
        INSERT INTO {}
        (credential_id, user_id, user_handle, username, public_key, counter, flagged, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
        credentials_table
    ))
    .bind(&credential.credential_id)
    .bind(&credential.user_id)
    .bind(&credential.user_handle)
    .bind(&credential.username)
    .bind(&credential.public_key)
    .bind(counter_i32)
    .bind(credential.flagged)
    .bind(credential.created_at)
    .bind(credential.updated_at)
    .execute(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            PasskeyError::DuplicateCredential
        } else {
            PasskeyError::Storage(e.to_string())
        }
    })?;

    Ok(())
}

async fn get_credential_postgres(
    pool: &Pool<Postgres>,
    credential_id: &str,
) -> Result<Option<StoredCredential>, PasskeyError> {
    sqlx::query_as::<_, StoredCredential>(&format!(
        r#"SELECT * FROM {} WHERE credential_id = $1"#,
        DB_TABLE_CREDENTIALS.as_str()
    ))
    .bind(credential_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| PasskeyError::Storage(e.to_string()))
}

async fn get_credentials_by_field_postgres(
    pool: &Pool<Postgres>,
    field: &CredentialSearchField,
) -> Result<Vec<StoredCredential>, PasskeyError> {
    let credentials_table = DB_TABLE_CREDENTIALS.as_str();
    let (query, value) = match field {
        CredentialSearchField::CredentialId(credential_id) => (
            format!(
                r#"SELECT * FROM {} WHERE credential_id = $1"#,
                credentials_table
            ),
            credential_id.as_str(),
        ),
        CredentialSearchField::UserId(id) => (
            format!(r#"SELECT * FROM {} WHERE user_id = $1"#, credentials_table),
            id.as_str(),
        ),
        CredentialSearchField::Username(name) => (
            format!(r#"SELECT * FROM {} WHERE username = $1"#, credentials_table),
            name.as_str(),
        ),
    };

    sqlx::query_as::<_, StoredCredential>(&query)
        .bind(value)
        .fetch_all(pool)
        .await
        .map_err(|e| PasskeyError::Storage(e.to_string()))
}

async fn update_credential_counter_postgres(
    pool: &Pool<Postgres>,
    credential_id: &str,
    counter: u32,
    expected_counter: u32,
) -> Result<bool, PasskeyError> {
    let result = sqlx::query(&format!(
        r#"
        UPDATE {}
        SET counter = $1, updated_at = CURRENT_TIMESTAMP
        WHERE credential_id = $2 AND counter = $3
        "#,
        DB_TABLE_CREDENTIALS.as_str()
    ))
    .bind(counter as i32)
    .bind(credential_id)
    .bind(expected_counter as i32)
    .execute(pool)
    .await
    .map_err(|e| PasskeyError::Storage(e.to_string()))?;

    Ok(result.rows_affected() == 1)
}

async fn flag_credential_postgres(
    pool: &Pool<Postgres>,
    credential_id: &str,
) -> Result<(), PasskeyError> {
    sqlx::query(&format!(
        r#"
        UPDATE {}
        SET flagged = TRUE, updated_at = CURRENT_TIMESTAMP
        WHERE credential_id = $1
        "#,
        DB_TABLE_CREDENTIALS.as_str()
    ))
    .bind(credential_id)
    .execute(pool)
    .await
    .map_err(|e| PasskeyError::Storage(e.to_string()))?;

    Ok(())
}

// Implement FromRow for StoredCredential to handle counter width differences
// between the SQLite and PostgreSQL representations
impl<'r> FromRow<'r, SqliteRow> for StoredCredential {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let counter: i64 = row.try_get("counter")?;
        let created_at: DateTime<Utc> = row.try_get("created_at")?;
        let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

        Ok(StoredCredential {
            credential_id: row.try_get("credential_id")?,
            user_id: row.try_get("user_id")?,
            user_handle: row.try_get("user_handle")?,
            username: row.try_get("username")?,
            public_key: row.try_get("public_key")?,
            counter: counter as u32,
            flagged: row.try_get("flagged")?,
            created_at,
            updated_at,
        })
    }
}

impl<'r> FromRow<'r, PgRow> for StoredCredential {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let counter: i32 = row.try_get("counter")?;
        let created_at: DateTime<Utc> = row.try_get("created_at")?;
        let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

        Ok(StoredCredential {
            credential_id: row.try_get("credential_id")?,
            user_id: row.try_get("user_id")?,
            user_handle: row.try_get("user_handle")?,
            username: row.try_get("username")?,
            public_key: row.try_get("public_key")?,
            counter: counter as u32,
            flagged: row.try_get("flagged")?,
            created_at,
            updated_at,
        })
    }
}
