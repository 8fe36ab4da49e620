use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::{CommentResponse, CreateCommentRequest},
};

const COMMENT_RESPONSE_SELECT: &str = r#"
    SELECT
        c.id, c.topic_id, c.content, c.status, c.upvotes, c.downvotes, c.score,
        c.author_id, u.username AS author_username, c.created_at, c.updated_at,
        cv.value AS user_vote
    FROM comments c
    JOIN users u ON c.author_id = u.id
    LEFT JOIN comment_votes cv ON c.id = cv.comment_id AND cv.user_id = $1
"#;

pub async fn get_comment(
    db: &PgPool,
    comment_id: Uuid,
    viewer_id: Option<Uuid>,
) -> Result<Option<CommentResponse>> {
    let query = format!(
        "{} WHERE c.id = $2 AND c.status != 'deleted'",
        COMMENT_RESPONSE_SELECT
    );

    let comment = sqlx::query_as::<_, CommentResponse>(&query)
        .bind(viewer_id)
        .bind(comment_id)
        .fetch_optional(db)
        .await?;

    Ok(comment)
}

/// Inserts the comment and bumps the topic's comment counter in one transaction.
pub async fn create_comment(
    db: &PgPool,
    author_id: Uuid,
    topic_id: Uuid,
    request: &CreateCommentRequest,
) -> Result<CommentResponse> {
    let comment_id = Uuid::new_v4();
    let now = Utc::now();

    let mut tx = db.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO comments (id, topic_id, author_id, content, status, created_at, updated_at)
        VALUES ($1, $2, $3, $4, 'active', $5, $5)
        "#,
    )
    .bind(comment_id)
    .bind(topic_id)
    .bind(author_id)
    .bind(&request.content)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE topics SET comment_count = comment_count + 1 WHERE id = $1")
        .bind(topic_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    get_comment(db, comment_id, Some(author_id))
        .await?
        .ok_or_else(|| AppError::Internal("Failed to retrieve created comment".to_string()))
}

pub async fn get_topic_comments(
    db: &PgPool,
    topic_id: Uuid,
    viewer_id: Option<Uuid>,
    limit: u32,
    offset: u32,
) -> Result<Vec<CommentResponse>> {
    let query = format!(
        r#"{}
        WHERE c.topic_id = $2 AND c.status = 'active'
        ORDER BY c.score DESC, c.created_at ASC
        LIMIT $3 OFFSET $4
        "#,
        COMMENT_RESPONSE_SELECT
    );

    let comments = sqlx::query_as::<_, CommentResponse>(&query)
        .bind(viewer_id)
        .bind(topic_id)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(db)
        .await?;

    Ok(comments)
}
