use axum::{extract::State, response::Json};
use serde_json::{Value, json};

use crate::{
    AppState,
    auth::AuthUser,
    error::Result,
    models::KarmaResponse,
    services::achievement_service,
};

pub async fn get_my_karma(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<KarmaResponse>> {
    let activity = achievement_service::load_snapshot(&state.db, auth_user.user_id).await?;

    Ok(Json(KarmaResponse {
        user_id: auth_user.user_id,
        karma: activity.karma,
        activity,
    }))
}

pub async fn get_my_achievements(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<Value>> {
    let achievements =
        achievement_service::list_user_achievements(&state.db, auth_user.user_id).await?;

    Ok(Json(json!({
        "achievements": achievements,
        "username": auth_user.username
    })))
}

pub async fn list_achievements(State(state): State<AppState>) -> Result<Json<Value>> {
    let catalog = achievement_service::load_catalog(&state.db).await?;

    Ok(Json(json!({
        "achievements": catalog.entries()
    })))
}
