use axum::{
    extract::{Path, State},
    response::Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    AppState,
    auth::{AuthUser, OptionalAuthUser},
    error::{AppError, Result},
    models::{CreateTopicRequest, KarmaReason, TopicResponse, TopicVoteRequest, TopicVoteResponse},
    services::{karma_service, topic_service, vote_service},
};

pub async fn create_topic(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateTopicRequest>,
) -> Result<Json<TopicResponse>> {
    payload.validate()?;

    let rate_limit_key = format!("topic_create:user:{}", auth_user.user_id);
    if !state
        .redis
        .check_rate_limit(&rate_limit_key, 5, 3600)
        .await?
    {
        return Err(AppError::RateLimit);
    }

    let topic = topic_service::create_topic(
        &state.db,
        auth_user.user_id,
        &payload,
        state.config.topic_max_choices,
    )
    .await?;

    karma_service::record_activity(
        &state.db,
        &state.config.karma,
        auth_user.user_id,
        KarmaReason::TopicCreated,
    )
    .await;

    Ok(Json(topic))
}

pub async fn get_topic(
    State(state): State<AppState>,
    Path(topic_id): Path<Uuid>,
    auth_user: OptionalAuthUser,
) -> Result<Json<TopicResponse>> {
    let topic = topic_service::get_topic(&state.db, topic_id, auth_user.user_id())
        .await?
        .ok_or_else(|| AppError::NotFound("Topic not found".to_string()))?;

    Ok(Json(topic))
}

pub async fn vote_topic(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(topic_id): Path<Uuid>,
    Json(payload): Json<TopicVoteRequest>,
) -> Result<Json<TopicVoteResponse>> {
    payload.validate()?;

    let rate_limit_key = format!("topic_vote:user:{}", auth_user.user_id);
    if !state
        .redis
        .check_rate_limit(&rate_limit_key, 30, 60)
        .await?
    {
        return Err(AppError::RateLimit);
    }

    let outcome =
        vote_service::cast_topic_vote(&state.db, auth_user.user_id, topic_id, &payload.option_ids)
            .await?;

    // Only the first ballot on a topic earns karma; changing it does not.
    if outcome.first_vote {
        karma_service::record_activity(
            &state.db,
            &state.config.karma,
            auth_user.user_id,
            KarmaReason::TopicVoteCast,
        )
        .await;

        if outcome.author_id != auth_user.user_id {
            karma_service::record_activity(
                &state.db,
                &state.config.karma,
                outcome.author_id,
                KarmaReason::VoteReceived,
            )
            .await;
        }
    }

    Ok(Json(outcome.into()))
}

pub async fn retract_topic_vote(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(topic_id): Path<Uuid>,
) -> Result<Json<TopicVoteResponse>> {
    let outcome = vote_service::retract_topic_vote(&state.db, auth_user.user_id, topic_id).await?;

    Ok(Json(outcome.into()))
}
