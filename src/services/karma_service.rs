use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::{KarmaReason, KarmaTable},
    services::achievement_service,
};

/// Adds the table's points for `reason` and returns the new total.
pub async fn award_karma(
    db: &PgPool,
    table: &KarmaTable,
    user_id: Uuid,
    reason: KarmaReason,
) -> Result<i32> {
    let karma = award_points(db, user_id, table.points(reason)).await?;
    tracing::debug!(%user_id, ?reason, karma, "karma awarded");
    Ok(karma)
}

/// Karma only ever grows, so non-positive awards are rejected.
pub async fn award_points(db: &PgPool, user_id: Uuid, points: i32) -> Result<i32> {
    ensure_positive(points)?;

    let karma = sqlx::query_scalar(
        r#"
        UPDATE users SET karma = karma + $2, updated_at = NOW()
        WHERE id = $1
        RETURNING karma
        "#,
    )
    .bind(user_id)
    .bind(points)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(karma)
}

/// Awards karma for a committed action and re-checks achievements.
///
/// The triggering write has already been committed, so failures are logged
/// instead of being reported to the client.
pub async fn record_activity(db: &PgPool, table: &KarmaTable, user_id: Uuid, reason: KarmaReason) {
    if let Err(e) = award_karma(db, table, user_id, reason).await {
        tracing::warn!(%user_id, ?reason, "failed to award karma: {}", e);
    }

    refresh_achievements(db, user_id).await;
}

/// Re-checks achievements after an activity count changed without a karma award.
pub async fn refresh_achievements(db: &PgPool, user_id: Uuid) {
    match achievement_service::evaluate_achievements(db, user_id).await {
        Ok(unlocked) => {
            for achievement in unlocked {
                tracing::info!(%user_id, key = %achievement.key, "achievement unlocked");
            }
        }
        Err(e) => tracing::warn!(%user_id, "failed to evaluate achievements: {}", e),
    }
}

fn ensure_positive(points: i32) -> Result<()> {
    if points <= 0 {
        return Err(AppError::Validation(format!(
            "Karma awards must be positive, got {}",
            points
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fixtures;

    #[test]
    fn rejects_zero_and_negative_awards() {
        assert!(matches!(ensure_positive(0), Err(AppError::Validation(_))));
        assert!(matches!(ensure_positive(-3), Err(AppError::Validation(_))));
        assert!(ensure_positive(1).is_ok());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn awards_accumulate(db: PgPool) {
        let user = fixtures::user(&db, "ada").await;
        let table = KarmaTable::default();

        assert_eq!(award_points(&db, user, 3).await.unwrap(), 3);
        let karma = award_karma(&db, &table, user, KarmaReason::TopicCreated)
            .await
            .unwrap();
        assert_eq!(karma, 3 + table.points(KarmaReason::TopicCreated));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn rejected_awards_leave_karma_untouched(db: PgPool) {
        let user = fixtures::user(&db, "ada").await;

        let err = award_points(&db, user, 0).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = award_points(&db, Uuid::new_v4(), 5).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let karma: i32 = sqlx::query_scalar("SELECT karma FROM users WHERE id = $1")
            .bind(user)
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(karma, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn crossing_a_karma_threshold_unlocks_its_achievement(db: PgPool) {
        let user = fixtures::user(&db, "ada").await;
        award_points(&db, user, 99).await.unwrap();

        record_activity(&db, &KarmaTable::default(), user, KarmaReason::VoteReceived).await;

        let keys: Vec<String> = achievement_service::list_user_achievements(&db, user)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.key)
            .collect();
        assert_eq!(keys, vec!["rising_star".to_string()]);
    }
}
