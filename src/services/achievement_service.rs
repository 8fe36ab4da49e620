use std::collections::HashSet;

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::{Achievement, AchievementCatalog, ActivitySnapshot, UnlockedAchievement},
};

pub async fn load_snapshot(db: &PgPool, user_id: Uuid) -> Result<ActivitySnapshot> {
    sqlx::query_as::<_, ActivitySnapshot>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM topics WHERE author_id = u.id AND status != 'removed') AS topics_created,
            (SELECT COUNT(*) FROM comments WHERE author_id = u.id AND status != 'deleted') AS comments_made,
            (SELECT COUNT(DISTINCT topic_id) FROM topic_votes WHERE user_id = u.id) AS votes_cast,
            u.karma::BIGINT AS karma
        FROM users u
        WHERE u.id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

pub async fn load_catalog(db: &PgPool) -> Result<AchievementCatalog> {
    let entries = sqlx::query_as::<_, Achievement>(
        "SELECT * FROM achievements ORDER BY tier ASC, threshold ASC, key ASC",
    )
    .fetch_all(db)
    .await?;

    Ok(AchievementCatalog::new(entries))
}

pub async fn unlocked_keys(db: &PgPool, user_id: Uuid) -> Result<HashSet<String>> {
    let keys: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT a.key
        FROM user_achievements ua
        JOIN achievements a ON a.id = ua.achievement_id
        WHERE ua.user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;

    Ok(keys.into_iter().collect())
}

/// Unlocks every achievement whose criterion the user now meets.
///
/// Returns only the achievements unlocked by this call. Safe to run
/// repeatedly and concurrently: an unlock that already exists is skipped, and
/// a failing insert does not prevent the remaining unlocks.
pub async fn evaluate_achievements(db: &PgPool, user_id: Uuid) -> Result<Vec<Achievement>> {
    let snapshot = load_snapshot(db, user_id).await?;
    let catalog = load_catalog(db).await?;
    let unlocked = unlocked_keys(db, user_id).await?;

    let mut newly_unlocked = Vec::new();
    for achievement in catalog.pending(&snapshot, &unlocked) {
        match unlock(db, user_id, achievement.id).await {
            Ok(true) => newly_unlocked.push(achievement.clone()),
            Ok(false) => {
                tracing::debug!(%user_id, key = %achievement.key, "achievement already unlocked");
            }
            Err(e) => {
                tracing::warn!(
                    %user_id,
                    key = %achievement.key,
                    "skipping achievement unlock: {}",
                    e
                );
            }
        }
    }

    Ok(newly_unlocked)
}

// Ok(false) when another evaluation got there first.
async fn unlock(db: &PgPool, user_id: Uuid, achievement_id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO user_achievements (id, user_id, achievement_id, unlocked_at)
        VALUES ($1, $2, $3, NOW())
        ON CONFLICT (user_id, achievement_id) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(achievement_id)
    .execute(db)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn list_user_achievements(
    db: &PgPool,
    user_id: Uuid,
) -> Result<Vec<UnlockedAchievement>> {
    let achievements = sqlx::query_as::<_, UnlockedAchievement>(
        r#"
        SELECT a.key, a.name, a.description, a.tier, ua.unlocked_at
        FROM user_achievements ua
        JOIN achievements a ON a.id = ua.achievement_id
        WHERE ua.user_id = $1
        ORDER BY ua.unlocked_at DESC, a.key ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;

    Ok(achievements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TopicKind;
    use crate::services::fixtures;

    async fn unlock_count(db: &PgPool, user_id: Uuid) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM user_achievements WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(db)
            .await
            .unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn second_evaluation_unlocks_nothing(db: PgPool) {
        let user = fixtures::user(&db, "ada").await;
        fixtures::topic(&db, user, TopicKind::Single, 1, &["a", "b"]).await;
        sqlx::query("UPDATE users SET karma = 150 WHERE id = $1")
            .bind(user)
            .execute(&db)
            .await
            .unwrap();

        let mut first: Vec<String> = evaluate_achievements(&db, user)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.key)
            .collect();
        first.sort();
        assert_eq!(first, vec!["debate_starter", "rising_star"]);
        assert_eq!(unlock_count(&db, user).await, 2);

        assert!(evaluate_achievements(&db, user).await.unwrap().is_empty());
        assert_eq!(unlock_count(&db, user).await, 2);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn duplicate_unlock_is_a_no_op(db: PgPool) {
        let user = fixtures::user(&db, "ada").await;
        let catalog = load_catalog(&db).await.unwrap();
        let achievement = catalog.get("first_ballot").unwrap();

        assert!(unlock(&db, user, achievement.id).await.unwrap());
        assert!(!unlock(&db, user, achievement.id).await.unwrap());
        assert_eq!(unlock_count(&db, user).await, 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn snapshot_of_unknown_user_is_not_found(db: PgPool) {
        let err = evaluate_achievements(&db, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn seeded_catalog_matches_builtin(db: PgPool) {
        let seeded = load_catalog(&db).await.unwrap();
        let builtin = AchievementCatalog::builtin();

        assert_eq!(seeded.entries().len(), builtin.entries().len());
        for entry in builtin.entries() {
            let row = seeded.get(&entry.key).unwrap();
            assert_eq!(row.criterion(), entry.criterion());
            assert_eq!(row.tier, entry.tier);
        }
    }
}
