use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    HistoryError, HistoryRecord, InstanceId, RecordId, Result, Sequence,
    store::{HistoryStore, validate_batch},
};

const UNIQUE_SEQUENCE_CONSTRAINT: &str = "unique_instance_sequence";

/// PostgreSQL-backed history store.
#[derive(Clone)]
pub struct PostgresHistoryStore {
    pool: PgPool,
}

impl PostgresHistoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to the database at `url` and wraps the pool.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the embedded migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_record(row: PgRow) -> Result<HistoryRecord> {
        Ok(HistoryRecord {
            record_id: RecordId::from_uuid(row.try_get::<Uuid, _>("id")?),
            instance_id: InstanceId::from_uuid(row.try_get::<Uuid, _>("instance_id")?),
            event_type: row.try_get("event_type")?,
            sequence: Sequence::new(row.try_get("sequence")?),
            recorded_at: row.try_get("recorded_at")?,
            payload: row.try_get("payload")?,
        })
    }
}

#[async_trait]
impl HistoryStore for PostgresHistoryStore {
    async fn append(
        &self,
        records: Vec<HistoryRecord>,
        expected: Option<Sequence>,
    ) -> Result<Sequence> {
        validate_batch(&records)?;

        let instance_id = records[0].instance_id;
        let mut tx = self.pool.begin().await?;

        let current: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(sequence) FROM lifecycle_history WHERE instance_id = $1",
        )
        .bind(instance_id.as_uuid())
        .fetch_one(&mut *tx)
        .await?;
        let current = Sequence::new(current.unwrap_or(0));

        if let Some(expected) = expected
            && current != expected
        {
            return Err(HistoryError::Conflict {
                instance_id,
                expected,
                actual: current,
            });
        }

        if records[0].sequence != current.next() {
            return Err(HistoryError::Conflict {
                instance_id,
                expected: expected.unwrap_or(current),
                actual: current,
            });
        }

        let mut last = Sequence::empty();
        for record in &records {
            sqlx::query(
                r#"
                INSERT INTO lifecycle_history (id, instance_id, event_type, sequence, recorded_at, payload)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(record.record_id.as_uuid())
            .bind(record.instance_id.as_uuid())
            .bind(&record.event_type)
            .bind(record.sequence.as_i64())
            .bind(record.recorded_at)
            .bind(&record.payload)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some(UNIQUE_SEQUENCE_CONSTRAINT)
                {
                    return HistoryError::Conflict {
                        instance_id,
                        expected: expected.unwrap_or(Sequence::empty()),
                        actual: record.sequence,
                    };
                }
                HistoryError::Database(e)
            })?;

            last = record.sequence;
        }

        tx.commit().await?;
        metrics::counter!("history_records_appended_total").increment(records.len() as u64);
        Ok(last)
    }

    async fn load(&self, instance_id: InstanceId) -> Result<Vec<HistoryRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, instance_id, event_type, sequence, recorded_at, payload
            FROM lifecycle_history
            WHERE instance_id = $1
            ORDER BY sequence ASC
            "#,
        )
        .bind(instance_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_record).collect()
    }

    async fn last_sequence(&self, instance_id: InstanceId) -> Result<Option<Sequence>> {
        let current: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(sequence) FROM lifecycle_history WHERE instance_id = $1",
        )
        .bind(instance_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;

        Ok(current.map(Sequence::new))
    }

    async fn records_of_type(&self, event_type: &str) -> Result<Vec<HistoryRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, instance_id, event_type, sequence, recorded_at, payload
            FROM lifecycle_history
            WHERE event_type = $1
            ORDER BY recorded_at ASC, sequence ASC
            "#,
        )
        .bind(event_type)
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!(event_type, count = rows.len(), "loaded records by type");
        rows.into_iter().map(Self::row_to_record).collect()
    }
}
