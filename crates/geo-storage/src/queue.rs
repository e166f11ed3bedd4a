//! Redis Streams-based job queue for background cache warming.
//!
//! The operator CLI and the admin endpoint enqueue warm jobs here when asked
//! to run asynchronously; a consumer task inside the API service claims and
//! executes them outside the request path.

use chrono::{DateTime, Utc};
use redis::{aio::MultiplexedConnection, streams::*, AsyncCommands, Client};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use geo_common::{Dataset, GeoError, GeoResult};

const STREAM_KEY: &str = "warm:jobs";
const CONSUMER_GROUP: &str = "warmers";

/// Redis Streams queue for warm jobs.
pub struct WarmQueue {
    conn: MultiplexedConnection,
}

impl WarmQueue {
    /// Connect to Redis and initialize the stream.
    pub async fn connect(redis_url: &str) -> GeoResult<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| GeoError::Queue(format!("Redis connection failed: {}", e)))?;

        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| GeoError::Queue(format!("Redis connection failed: {}", e)))?;

        // Create consumer group if it doesn't exist
        let _: Result<(), _> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(STREAM_KEY)
            .arg(CONSUMER_GROUP)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        Ok(Self { conn })
    }

    /// Enqueue a warm job. Returns the stream entry ID.
    pub async fn enqueue(&self, job: &WarmJob) -> GeoResult<String> {
        let job_json = serde_json::to_string(job)
            .map_err(|e| GeoError::Queue(format!("Serialization failed: {}", e)))?;

        let mut conn = self.conn.clone();
        let entry_id: String = redis::cmd("XADD")
            .arg(STREAM_KEY)
            .arg("*")
            .arg("job_id")
            .arg(job.id.to_string())
            .arg("data")
            .arg(&job_json)
            .query_async(&mut conn)
            .await
            .map_err(|e| GeoError::Queue(format!("Enqueue failed: {}", e)))?;

        Ok(entry_id)
    }

    /// Claim the next available job for a consumer, blocking briefly.
    ///
    /// Returns the stream entry ID alongside the job so the caller can
    /// acknowledge completion.
    pub async fn claim_next(&self, consumer_name: &str) -> GeoResult<Option<(String, WarmJob)>> {
        let opts = StreamReadOptions::default()
            .group(CONSUMER_GROUP, consumer_name)
            .count(1)
            .block(5000);

        let mut conn = self.conn.clone();
        let result: StreamReadReply = conn
            .xread_options(&[STREAM_KEY], &[">"], &opts)
            .await
            .map_err(|e| GeoError::Queue(format!("Read failed: {}", e)))?;

        for stream_key in result.keys {
            for entry in stream_key.ids {
                if let Some(data) = entry.map.get("data") {
                    let bytes: Vec<u8> = redis::from_redis_value(data)
                        .map_err(|e| GeoError::Queue(format!("Parse failed: {}", e)))?;
                    let job: WarmJob = serde_json::from_slice(&bytes)
                        .map_err(|e| GeoError::Queue(format!("Deserialize failed: {}", e)))?;
                    return Ok(Some((entry.id, job)));
                }
            }
        }

        Ok(None)
    }

    /// Acknowledge a completed job.
    pub async fn ack(&self, entry_id: &str) -> GeoResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("XACK")
            .arg(STREAM_KEY)
            .arg(CONSUMER_GROUP)
            .arg(entry_id)
            .query_async(&mut conn)
            .await
            .map_err(|e| GeoError::Queue(format!("Ack failed: {}", e)))?;

        Ok(())
    }

    /// Get queue depth (pending jobs).
    pub async fn depth(&self) -> GeoResult<u64> {
        let mut conn = self.conn.clone();
        let info: StreamInfoStreamReply = conn
            .xinfo_stream(STREAM_KEY)
            .await
            .map_err(|e| GeoError::Queue(format!("XINFO failed: {}", e)))?;

        Ok(info.length as u64)
    }
}

/// A cache warm request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarmJob {
    pub id: Uuid,
    pub datasets: Vec<Dataset>,
    pub created_at: DateTime<Utc>,
}

impl WarmJob {
    pub fn new(datasets: Vec<Dataset>) -> Self {
        Self {
            id: Uuid::new_v4(),
            datasets,
            created_at: Utc::now(),
        }
    }

    /// A job covering every dataset.
    pub fn all() -> Self {
        Self::new(Dataset::ALL.to_vec())
    }
}
