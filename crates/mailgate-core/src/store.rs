//! Append-only mail record storage using SQLite

use crate::model::{MailRecord, RecordKind};
use crate::normalize::format_timestamp;
use crate::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};

/// Row as stored; list columns hold JSON arrays
#[derive(Debug, Clone, sqlx::FromRow)]
struct DbRecord {
    id: String,
    kind: String,
    message_id: Option<String>,
    to_json: String,
    cc_json: String,
    bcc_json: String,
    subject: String,
    body: String,
    is_html: bool,
    created_at: String,
    sent_at: Option<String>,
    status: String,
}

impl TryFrom<DbRecord> for MailRecord {
    type Error = CoreError;

    fn try_from(row: DbRecord) -> CoreResult<Self> {
        Ok(MailRecord {
            kind: row.kind.parse()?,
            to: decode_list(&row.to_json)?,
            cc: decode_list(&row.cc_json)?,
            bcc: decode_list(&row.bcc_json)?,
            created_at: decode_time(&row.created_at)?,
            sent_at: row.sent_at.as_deref().map(decode_time).transpose()?,
            id: row.id,
            message_id: row.message_id,
            subject: row.subject,
            body: row.body,
            is_html: row.is_html,
            status: row.status,
        })
    }
}

fn encode_list(values: &[String]) -> CoreResult<String> {
    serde_json::to_string(values).map_err(|e| CoreError::DatabaseError(e.to_string()))
}

fn decode_list(raw: &str) -> CoreResult<Vec<String>> {
    serde_json::from_str(raw).map_err(|e| CoreError::DatabaseError(format!("bad address list: {}", e)))
}

fn decode_time(raw: &str) -> CoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| CoreError::DatabaseError(format!("bad timestamp {:?}: {}", raw, e)))
}

/// Table names are interpolated into SQL, so only a safe alphabet is allowed
fn validate_table_name(table: &str) -> CoreResult<()> {
    let valid = !table.is_empty()
        && table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(CoreError::DatabaseError(format!("Invalid table name: {:?}", table)))
    }
}

/// Log of mail sent or drafted through the gateway
pub struct RecordStore {
    pool: Pool<Sqlite>,
    table: String,
}

impl RecordStore {
    /// Open or create a store at the given path
    pub async fn open(path: impl AsRef<Path>, table: &str) -> CoreResult<Self> {
        validate_table_name(table)?;
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::DatabaseError(e.to_string()))?;
        }

        let db_url = format!("sqlite:{}?mode=rwc", path.display());
        info!("Opening record store at {} (table {})", path.display(), table);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;

        let store = Self {
            pool,
            table: table.to_string(),
        };
        store.initialize().await?;

        Ok(store)
    }

    /// Open an in-memory store (for testing)
    pub async fn open_memory(table: &str) -> CoreResult<Self> {
        validate_table_name(table)?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self {
            pool,
            table: table.to_string(),
        };
        store.initialize().await?;

        Ok(store)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    async fn initialize(&self) -> CoreResult<()> {
        debug!("Initializing record table {}", self.table);

        let sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS "{t}" (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                kind TEXT NOT NULL CHECK (kind IN ('draft', 'sent')),
                message_id TEXT,
                to_json TEXT NOT NULL,
                cc_json TEXT NOT NULL DEFAULT '[]',
                bcc_json TEXT NOT NULL DEFAULT '[]',
                subject TEXT NOT NULL,
                body TEXT NOT NULL,
                is_html INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                sent_at TEXT,
                status TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS "idx_{t}_kind_created" ON "{t}"(kind, created_at DESC);
            "#,
            t = self.table
        );
        sqlx::query(&sql).execute(&self.pool).await?;

        Ok(())
    }

    /// Insert a new record. Existing records are never updated.
    pub async fn append(&self, record: &MailRecord) -> CoreResult<()> {
        let sql = format!(
            r#"
            INSERT INTO "{}" (id, kind, message_id, to_json, cc_json, bcc_json,
                              subject, body, is_html, created_at, sent_at, status)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            self.table
        );

        sqlx::query(&sql)
            .bind(&record.id)
            .bind(record.kind.as_str())
            .bind(&record.message_id)
            .bind(encode_list(&record.to)?)
            .bind(encode_list(&record.cc)?)
            .bind(encode_list(&record.bcc)?)
            .bind(&record.subject)
            .bind(&record.body)
            .bind(record.is_html)
            .bind(format_timestamp(record.created_at))
            .bind(record.sent_at.map(format_timestamp))
            .bind(&record.status)
            .execute(&self.pool)
            .await?;

        debug!("Appended {} record {}", record.kind.as_str(), record.id);
        Ok(())
    }

    /// Records of one kind, newest first
    pub async fn list(&self, kind: RecordKind, limit: u32) -> CoreResult<Vec<MailRecord>> {
        let sql = format!(
            r#"
            SELECT id, kind, message_id, to_json, cc_json, bcc_json, subject, body,
                   is_html, created_at, sent_at, status
            FROM "{}"
            WHERE kind = ?
            ORDER BY created_at DESC, seq DESC
            LIMIT ?
            "#,
            self.table
        );

        let rows = sqlx::query_as::<_, DbRecord>(&sql)
            .bind(kind.as_str())
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(MailRecord::try_from).collect()
    }

    /// Draft records, newest first
    pub async fn list_drafts(&self, limit: u32) -> CoreResult<Vec<MailRecord>> {
        self.list(RecordKind::Draft, limit).await
    }

    pub async fn count(&self, kind: RecordKind) -> CoreResult<i64> {
        let sql = format!(r#"SELECT COUNT(*) FROM "{}" WHERE kind = ?"#, self.table);
        let (count,): (i64,) = sqlx::query_as(&sql)
            .bind(kind.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OutgoingMail;
    use chrono::{Duration, TimeZone};

    fn mail(subject: &str) -> OutgoingMail {
        OutgoingMail {
            to: vec!["a@example.com".into(), "Bob <bob@example.com>".into()],
            cc: vec!["c@example.com".into()],
            bcc: vec![],
            subject: subject.into(),
            body: "body".into(),
            is_html: false,
            is_draft: true,
        }
    }

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    #[test]
    fn test_table_name_alphabet() {
        assert!(validate_table_name("mailgate_emails-dev1").is_ok());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("x\"; DROP TABLE y; --").is_err());
    }

    #[tokio::test]
    async fn test_append_and_read_back() {
        let store = RecordStore::open_memory("emails").await.unwrap();
        let record = MailRecord::draft("draft-1", &mail("Hello"), at(0));
        store.append(&record).await.unwrap();

        let drafts = store.list_drafts(10).await.unwrap();
        assert_eq!(drafts, vec![record]);
        assert!(store.list(RecordKind::Sent, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_newest_first_with_insertion_tiebreak() {
        let store = RecordStore::open_memory("emails").await.unwrap();
        store.append(&MailRecord::draft("old", &mail("a"), at(0))).await.unwrap();
        store.append(&MailRecord::draft("tie-1", &mail("b"), at(5))).await.unwrap();
        store.append(&MailRecord::draft("tie-2", &mail("c"), at(5))).await.unwrap();
        store
            .append(&MailRecord::sent("s1", "ses-1", &mail("d"), at(10)))
            .await
            .unwrap();

        let ids: Vec<String> = store
            .list_drafts(10)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["tie-2", "tie-1", "old"]);

        let limited = store.list_drafts(1).await.unwrap();
        assert_eq!(limited[0].id, "tie-2");

        let sent = store.list(RecordKind::Sent, 10).await.unwrap();
        assert_eq!(sent[0].message_id.as_deref(), Some("ses-1"));
        assert_eq!(sent[0].sent_at, Some(at(10)));
        assert_eq!(sent[0].status, "sent");
    }

    #[tokio::test]
    async fn test_duplicate_id_is_rejected() {
        let store = RecordStore::open_memory("emails").await.unwrap();
        let record = MailRecord::draft("same", &mail("a"), at(0));
        store.append(&record).await.unwrap();

        assert!(matches!(
            store.append(&record).await,
            Err(CoreError::DatabaseError(_))
        ));
        assert_eq!(store.count(RecordKind::Draft).await.unwrap(), 1);
    }
}
