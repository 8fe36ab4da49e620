use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;
use validator::Validate;

use crate::{
    AppState,
    auth::{AuthUser, OptionalAuthUser},
    error::{AppError, Result},
    models::{
        CommentResponse, CommentVoteRequest, CommentVoteResponse, CreateCommentRequest,
        KarmaReason, TopicStatus, VoteValue,
    },
    services::{
        comment_service, karma_service, topic_service,
        vote_service::{self, VoteTransition},
    },
};

#[derive(Debug, Deserialize)]
pub struct GetCommentsQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

pub async fn create_comment(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(topic_id): Path<Uuid>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<Json<CommentResponse>> {
    payload.validate()?;

    // Check rate limiting
    let rate_limit_key = format!("comment_create:user:{}", auth_user.user_id);
    if !state
        .redis
        .check_rate_limit(&rate_limit_key, 10, 60)
        .await?
    {
        return Err(AppError::RateLimit);
    }

    let topic = topic_service::get_topic_by_id_raw(&state.db, topic_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Topic not found".to_string()))?;

    if topic.status != TopicStatus::Active {
        return Err(AppError::Authorization(
            "Cannot comment on an inactive topic".to_string(),
        ));
    }

    let comment =
        comment_service::create_comment(&state.db, auth_user.user_id, topic_id, &payload).await?;

    karma_service::record_activity(
        &state.db,
        &state.config.karma,
        auth_user.user_id,
        KarmaReason::CommentCreated,
    )
    .await;

    Ok(Json(comment))
}

pub async fn get_topic_comments(
    State(state): State<AppState>,
    Path(topic_id): Path<Uuid>,
    Query(params): Query<GetCommentsQuery>,
    auth_user: OptionalAuthUser,
) -> Result<Json<Value>> {
    // Verify topic exists
    let _topic = topic_service::get_topic_by_id_raw(&state.db, topic_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Topic not found".to_string()))?;

    let limit = params.limit.unwrap_or(50).min(200);
    let offset = params.offset.unwrap_or(0);

    let comments = comment_service::get_topic_comments(
        &state.db,
        topic_id,
        auth_user.user_id(),
        limit,
        offset,
    )
    .await?;

    Ok(Json(json!({
        "comments": comments,
        "topic_id": topic_id
    })))
}

pub async fn get_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
    auth_user: OptionalAuthUser,
) -> Result<Json<CommentResponse>> {
    let comment = comment_service::get_comment(&state.db, comment_id, auth_user.user_id())
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

    Ok(Json(comment))
}

pub async fn vote_comment(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(comment_id): Path<Uuid>,
    Json(payload): Json<CommentVoteRequest>,
) -> Result<Json<CommentVoteResponse>> {
    let value = VoteValue::try_from(payload.value).map_err(AppError::Validation)?;

    // Check rate limiting
    let rate_limit_key = format!("comment_vote:user:{}", auth_user.user_id);
    if !state
        .redis
        .check_rate_limit(&rate_limit_key, 30, 60)
        .await?
    {
        return Err(AppError::RateLimit);
    }

    let outcome =
        vote_service::cast_comment_vote(&state.db, auth_user.user_id, comment_id, value).await?;

    if outcome.transition == VoteTransition::Insert(VoteValue::Up) {
        karma_service::record_activity(
            &state.db,
            &state.config.karma,
            outcome.author_id,
            KarmaReason::VoteReceived,
        )
        .await;
    }

    Ok(Json(outcome.into()))
}
