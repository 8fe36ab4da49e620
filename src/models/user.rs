use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Cumulative activity counts that achievement criteria are evaluated against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, FromRow)]
pub struct ActivitySnapshot {
    pub topics_created: i64,
    pub comments_made: i64,
    pub votes_cast: i64,
    pub karma: i64,
}

#[derive(Debug, Serialize)]
pub struct KarmaResponse {
    pub user_id: Uuid,
    pub karma: i64,
    pub activity: ActivitySnapshot,
}
