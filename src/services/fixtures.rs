//! Rows for the database-backed service tests.

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::TopicKind;

pub async fn user(db: &PgPool, username: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, username) VALUES ($1, $2)")
        .bind(id)
        .bind(username)
        .execute(db)
        .await
        .unwrap();
    id
}

pub async fn users(db: &PgPool, prefix: &str, count: usize) -> Vec<Uuid> {
    let mut ids = Vec::with_capacity(count);
    for n in 0..count {
        ids.push(user(db, &format!("{prefix}{n}")).await);
    }
    ids
}

/// Active topic without a voting window. Returns the topic id and option ids
/// in position order.
pub async fn topic(
    db: &PgPool,
    author_id: Uuid,
    kind: TopicKind,
    max_choices: i32,
    labels: &[&str],
) -> (Uuid, Vec<Uuid>) {
    let topic_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO topics (id, title, author_id, kind, status, max_choices)
        VALUES ($1, 'Which editor?', $2, $3, 'active', $4)
        "#,
    )
    .bind(topic_id)
    .bind(author_id)
    .bind(kind)
    .bind(max_choices)
    .execute(db)
    .await
    .unwrap();

    let mut option_ids = Vec::with_capacity(labels.len());
    for (position, label) in labels.iter().enumerate() {
        let option_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO topic_options (id, topic_id, label, position) VALUES ($1, $2, $3, $4)",
        )
        .bind(option_id)
        .bind(topic_id)
        .bind(*label)
        .bind(position as i32)
        .execute(db)
        .await
        .unwrap();
        option_ids.push(option_id);
    }

    (topic_id, option_ids)
}

pub async fn comment(db: &PgPool, topic_id: Uuid, author_id: Uuid) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO comments (id, topic_id, author_id, content) VALUES ($1, $2, $3, 'hi')")
        .bind(id)
        .bind(topic_id)
        .bind(author_id)
        .execute(db)
        .await
        .unwrap();
    id
}

/// (score, upvotes, downvotes) as stored, next to what the vote rows imply.
pub async fn comment_tally(db: &PgPool, comment_id: Uuid) -> ((i32, i32, i32), (i64, i64, i64)) {
    let stored: (i32, i32, i32) =
        sqlx::query_as("SELECT score, upvotes, downvotes FROM comments WHERE id = $1")
            .bind(comment_id)
            .fetch_one(db)
            .await
            .unwrap();

    let derived: (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COALESCE(SUM(value), 0)::BIGINT,
            COUNT(*) FILTER (WHERE value = 1),
            COUNT(*) FILTER (WHERE value = -1)
        FROM comment_votes
        WHERE comment_id = $1
        "#,
    )
    .bind(comment_id)
    .fetch_one(db)
    .await
    .unwrap();

    (stored, derived)
}

pub async fn option_counts(db: &PgPool, topic_id: Uuid) -> Vec<i32> {
    sqlx::query_scalar("SELECT vote_count FROM topic_options WHERE topic_id = $1 ORDER BY position")
        .bind(topic_id)
        .fetch_all(db)
        .await
        .unwrap()
}

pub async fn voter_count(db: &PgPool, topic_id: Uuid) -> i32 {
    sqlx::query_scalar("SELECT voter_count FROM topics WHERE id = $1")
        .bind(topic_id)
        .fetch_one(db)
        .await
        .unwrap()
}
