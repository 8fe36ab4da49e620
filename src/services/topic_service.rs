use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::{CreateTopicRequest, Topic, TopicKind, TopicResponse},
    services::vote_service,
};

pub async fn get_topic_by_id_raw(db: &PgPool, topic_id: Uuid) -> Result<Option<Topic>> {
    let topic = sqlx::query_as::<_, Topic>("SELECT * FROM topics WHERE id = $1")
        .bind(topic_id)
        .fetch_optional(db)
        .await?;

    Ok(topic)
}

/// Effective `max_choices` for a new topic, checked against the configured cap.
pub fn resolve_max_choices(request: &CreateTopicRequest, cap: i32) -> Result<i32> {
    match request.kind {
        TopicKind::Single => Ok(1),
        TopicKind::Multiple => {
            let limit = cap.min(request.options.len() as i32);
            let requested = request.max_choices.unwrap_or(limit);
            if requested < 1 || requested > limit {
                return Err(AppError::Validation(format!(
                    "max_choices must be between 1 and {}",
                    limit
                )));
            }
            Ok(requested)
        }
    }
}

pub fn validate_topic_request(request: &CreateTopicRequest) -> Result<()> {
    if let (Some(starts_at), Some(ends_at)) = (request.starts_at, request.ends_at) {
        if ends_at <= starts_at {
            return Err(AppError::Validation(
                "ends_at must be after starts_at".to_string(),
            ));
        }
    }

    if request
        .options
        .iter()
        .any(|label| label.trim().is_empty() || label.chars().count() > 200)
    {
        return Err(AppError::Validation(
            "Option labels must be between 1 and 200 characters".to_string(),
        ));
    }

    Ok(())
}

pub async fn create_topic(
    db: &PgPool,
    author_id: Uuid,
    request: &CreateTopicRequest,
    max_choices_cap: i32,
) -> Result<TopicResponse> {
    validate_topic_request(request)?;
    let max_choices = resolve_max_choices(request, max_choices_cap)?;

    let topic_id = Uuid::new_v4();
    let now = Utc::now();

    let mut tx = db.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO topics (
            id, title, description, author_id, kind, status, max_choices,
            starts_at, ends_at, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, 'active', $6, $7, $8, $9, $9)
        "#,
    )
    .bind(topic_id)
    .bind(request.title.trim())
    .bind(&request.description)
    .bind(author_id)
    .bind(request.kind)
    .bind(max_choices)
    .bind(request.starts_at)
    .bind(request.ends_at)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    for (position, label) in request.options.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO topic_options (id, topic_id, label, position, vote_count)
            VALUES ($1, $2, $3, $4, 0)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(topic_id)
        .bind(label.trim())
        .bind(position as i32)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!(%topic_id, %author_id, "topic created");

    get_topic(db, topic_id, Some(author_id))
        .await?
        .ok_or_else(|| AppError::Internal("Failed to retrieve created topic".to_string()))
}

pub async fn get_topic(
    db: &PgPool,
    topic_id: Uuid,
    viewer_id: Option<Uuid>,
) -> Result<Option<TopicResponse>> {
    let Some(topic) = get_topic_by_id_raw(db, topic_id).await? else {
        return Ok(None);
    };

    let mut conn = db.acquire().await?;
    let options = vote_service::load_tallies(&mut conn, topic_id).await?;
    drop(conn);

    let user_selection = match viewer_id {
        Some(viewer_id) => vote_service::get_topic_selection(db, viewer_id, topic_id).await?,
        None => Vec::new(),
    };

    Ok(Some(TopicResponse {
        id: topic.id,
        title: topic.title,
        description: topic.description,
        author_id: topic.author_id,
        kind: topic.kind,
        status: topic.status,
        max_choices: topic.max_choices,
        voter_count: topic.voter_count,
        comment_count: topic.comment_count,
        starts_at: topic.starts_at,
        ends_at: topic.ends_at,
        created_at: topic.created_at,
        options,
        user_selection,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn request(kind: TopicKind, options: usize, max_choices: Option<i32>) -> CreateTopicRequest {
        CreateTopicRequest {
            title: "Where should the meetup be?".to_string(),
            description: None,
            kind,
            options: (0..options).map(|i| format!("Venue {i}")).collect(),
            max_choices,
            starts_at: None,
            ends_at: None,
        }
    }

    #[test]
    fn single_choice_always_resolves_to_one() {
        let req = request(TopicKind::Single, 4, Some(3));
        assert_eq!(resolve_max_choices(&req, 10).unwrap(), 1);
    }

    #[test]
    fn multi_choice_defaults_to_option_count_under_cap() {
        assert_eq!(
            resolve_max_choices(&request(TopicKind::Multiple, 4, None), 10).unwrap(),
            4
        );
        assert_eq!(
            resolve_max_choices(&request(TopicKind::Multiple, 12, None), 10).unwrap(),
            10
        );
    }

    #[test]
    fn multi_choice_rejects_out_of_range() {
        for max in [0, 5, 11] {
            assert!(matches!(
                resolve_max_choices(&request(TopicKind::Multiple, 4, Some(max)), 10),
                Err(AppError::Validation(_))
            ));
        }
    }

    #[test]
    fn window_must_be_ordered() {
        let now = Utc::now();
        let mut req = request(TopicKind::Single, 2, None);
        req.starts_at = Some(now);
        req.ends_at = Some(now - Duration::minutes(5));
        assert!(validate_topic_request(&req).is_err());

        req.ends_at = Some(now + Duration::days(1));
        assert!(validate_topic_request(&req).is_ok());
    }

    #[test]
    fn blank_option_labels_are_rejected() {
        let mut req = request(TopicKind::Single, 2, None);
        req.options[1] = "   ".to_string();
        assert!(validate_topic_request(&req).is_err());
    }
}
