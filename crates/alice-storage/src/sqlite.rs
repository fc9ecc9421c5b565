//! SQLite-backed chat history and dialogue summaries

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use alice_core::{
    AliceError, ChatMessage, DialogueSummary, MessageStore, Result, Role, SummaryId, SummaryStore,
    TurnId,
};

type MessageRow = (i64, String, String, Option<String>, Option<String>);
type SummaryRow = (i64, i64, Option<i64>, String, bool, i64);

fn storage_err(e: impl std::fmt::Display) -> AliceError {
    AliceError::Storage(e.to_string())
}

/// Both stores in one database. Clones share the connection pool.
#[derive(Clone)]
pub struct SqliteChatStore {
    pool: SqlitePool,
}

impl SqliteChatStore {
    pub async fn new(path: &str) -> Result<Self> {
        let pool = Self::connect(path).await?;
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    pub async fn in_memory() -> Result<Self> {
        Self::new(":memory:").await
    }

    async fn connect(path: &str) -> Result<SqlitePool> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(storage_err)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        // An in-memory database lives only as long as its connection.
        let pool_options = if path == ":memory:" {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
        };

        pool_options
            .connect_with(options)
            .await
            .map_err(storage_err)
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chat_messages (
                turn_id INTEGER PRIMARY KEY AUTOINCREMENT,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                timestamp TEXT,
                annotation TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS dialogue_summaries (
                summary_id INTEGER PRIMARY KEY AUTOINCREMENT,
                start_turn_id INTEGER NOT NULL,
                end_turn_id INTEGER,
                summary_text TEXT NOT NULL,
                is_completed INTEGER NOT NULL DEFAULT 0,
                turns_covered INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_dialogue_summaries_range
            ON dialogue_summaries(start_turn_id, end_turn_id)
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }

    fn message_from_row(
        (turn_id, role, content, timestamp, annotation): MessageRow,
    ) -> Result<ChatMessage> {
        let role = Role::parse(&role)
            .ok_or_else(|| AliceError::Storage(format!("unknown role '{}' at turn {}", role, turn_id)))?;

        Ok(ChatMessage {
            turn_id: Some(turn_id),
            role,
            content,
            timestamp: timestamp.and_then(|t| {
                DateTime::parse_from_rfc3339(&t)
                    .map(|dt| dt.with_timezone(&Utc))
                    .ok()
            }),
            annotation: annotation.and_then(|a| serde_json::from_str(&a).ok()),
        })
    }

    fn summary_from_row(
        (summary_id, start_turn_id, end_turn_id, summary_text, is_completed, turns_covered): SummaryRow,
    ) -> DialogueSummary {
        DialogueSummary {
            summary_id: Some(summary_id),
            start_turn_id,
            end_turn_id,
            summary_text,
            is_completed,
            turns_covered: turns_covered.max(0) as usize,
        }
    }
}

#[async_trait]
impl MessageStore for SqliteChatStore {
    async fn get_window(&self, n: usize) -> Result<Vec<ChatMessage>> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            r#"
            SELECT turn_id, role, content, timestamp, annotation
            FROM chat_messages
            ORDER BY turn_id DESC
            LIMIT ?
            "#,
        )
        .bind(n as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        let mut messages = rows
            .into_iter()
            .map(Self::message_from_row)
            .collect::<Result<Vec<_>>>()?;
        messages.reverse();
        Ok(messages)
    }

    async fn get_by_id(&self, turn_id: TurnId) -> Result<Option<ChatMessage>> {
        let row: Option<MessageRow> = sqlx::query_as(
            "SELECT turn_id, role, content, timestamp, annotation FROM chat_messages WHERE turn_id = ?",
        )
        .bind(turn_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.map(Self::message_from_row).transpose()
    }

    async fn append(&self, message: ChatMessage) -> Result<TurnId> {
        let timestamp = message.timestamp.unwrap_or_else(Utc::now).to_rfc3339();
        let annotation = message
            .annotation
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(storage_err)?;

        let result = sqlx::query(
            "INSERT INTO chat_messages (role, content, timestamp, annotation) VALUES (?, ?, ?, ?)",
        )
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(&timestamp)
        .bind(&annotation)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(result.last_insert_rowid())
    }

    async fn delete_by_id(&self, turn_id: TurnId) -> Result<()> {
        sqlx::query("DELETE FROM chat_messages WHERE turn_id = ?")
            .bind(turn_id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chat_messages")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(count as usize)
    }
}

#[async_trait]
impl SummaryStore for SqliteChatStore {
    async fn get_window(&self, n: usize) -> Result<Vec<DialogueSummary>> {
        let rows: Vec<SummaryRow> = sqlx::query_as(
            r#"
            SELECT summary_id, start_turn_id, end_turn_id, summary_text, is_completed, turns_covered
            FROM dialogue_summaries
            ORDER BY summary_id DESC
            LIMIT ?
            "#,
        )
        .bind(n as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        let mut summaries: Vec<DialogueSummary> =
            rows.into_iter().map(Self::summary_from_row).collect();
        summaries.reverse();
        Ok(summaries)
    }

    async fn get_by_id(&self, summary_id: SummaryId) -> Result<Option<DialogueSummary>> {
        let row: Option<SummaryRow> = sqlx::query_as(
            r#"
            SELECT summary_id, start_turn_id, end_turn_id, summary_text, is_completed, turns_covered
            FROM dialogue_summaries
            WHERE summary_id = ?
            "#,
        )
        .bind(summary_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(row.map(Self::summary_from_row))
    }

    async fn create(&self, summary: DialogueSummary) -> Result<SummaryId> {
        let result = sqlx::query(
            r#"
            INSERT INTO dialogue_summaries
                (start_turn_id, end_turn_id, summary_text, is_completed, turns_covered)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(summary.start_turn_id)
        .bind(summary.end_turn_id)
        .bind(&summary.summary_text)
        .bind(summary.is_completed)
        .bind(summary.turns_covered as i64)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(result.last_insert_rowid())
    }

    async fn update(&self, summary: &DialogueSummary) -> Result<()> {
        let summary_id = summary
            .summary_id
            .ok_or_else(|| AliceError::Storage("cannot update a summary without an id".into()))?;

        let result = sqlx::query(
            r#"
            UPDATE dialogue_summaries
            SET summary_text = ?, end_turn_id = ?, turns_covered = ?
            WHERE summary_id = ?
            "#,
        )
        .bind(&summary.summary_text)
        .bind(summary.end_turn_id)
        .bind(summary.turns_covered as i64)
        .bind(summary_id)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        if result.rows_affected() == 0 {
            return Err(AliceError::Storage(format!(
                "summary {} not found",
                summary_id
            )));
        }
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM dialogue_summaries")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_and_window() {
        let store = SqliteChatStore::in_memory().await.unwrap();
        for i in 0..5 {
            MessageStore::append(&store, ChatMessage::user(format!("msg{}", i)))
                .await
                .unwrap();
        }

        let window = MessageStore::get_window(&store, 3).await.unwrap();
        let ids: Vec<_> = window.iter().filter_map(|m| m.turn_id).collect();
        assert_eq!(ids, vec![3, 4, 5]);
        assert_eq!(window[2].content, "msg4");
        assert_eq!(window[2].role, Role::User);
        assert_eq!(MessageStore::len(&store).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_annotation_round_trip_and_delete() {
        let store = SqliteChatStore::in_memory().await.unwrap();
        let annotation = serde_json::json!({"is_question": true});
        let id = MessageStore::append(
            &store,
            ChatMessage::assistant("answer").with_annotation(annotation.clone()),
        )
        .await
        .unwrap();

        let msg = MessageStore::get_by_id(&store, id).await.unwrap().unwrap();
        assert_eq!(msg.annotation, Some(annotation));
        assert!(msg.timestamp.is_some());

        store.delete_by_id(id).await.unwrap();
        assert!(MessageStore::get_by_id(&store, id).await.unwrap().is_none());
        let next = MessageStore::append(&store, ChatMessage::user("again"))
            .await
            .unwrap();
        assert!(next > id);
    }

    #[tokio::test]
    async fn test_summary_create_update() {
        let store = SqliteChatStore::in_memory().await.unwrap();
        let id = store
            .create(DialogueSummary::new(1, "open span"))
            .await
            .unwrap();

        let mut summary = SummaryStore::get_by_id(&store, id).await.unwrap().unwrap();
        assert_eq!(summary.end_turn_id, None);

        summary.summary_text = "closed span".into();
        summary.end_turn_id = Some(6);
        summary.turns_covered = 6;
        store.update(&summary).await.unwrap();

        let window = SummaryStore::get_window(&store, 4).await.unwrap();
        assert_eq!(window, vec![summary]);

        let mut ghost = DialogueSummary::new(1, "ghost");
        ghost.summary_id = Some(99);
        assert!(store.update(&ghost).await.is_err());
    }

    #[tokio::test]
    async fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alice.db");
        let path = path.to_str().unwrap();

        {
            let store = SqliteChatStore::new(path).await.unwrap();
            MessageStore::append(&store, ChatMessage::user("remember me"))
                .await
                .unwrap();
            store
                .create(DialogueSummary::new(1, "The user asked to be remembered.").with_end(1))
                .await
                .unwrap();
        }

        let reopened = SqliteChatStore::new(path).await.unwrap();
        assert_eq!(MessageStore::len(&reopened).await.unwrap(), 1);
        let summaries = SummaryStore::get_window(&reopened, 4).await.unwrap();
        assert_eq!(summaries[0].end_turn_id, Some(1));
    }
}
