use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::ActivitySnapshot;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, PartialOrd, Ord)]
#[sqlx(type_name = "achievement_tier", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AchievementTier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "activity_metric", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActivityMetric {
    TopicsCreated,
    CommentsMade,
    VotesCast,
    Karma,
}

/// Threshold predicate: holds once the metric reaches `threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Criterion {
    pub metric: ActivityMetric,
    pub threshold: i64,
}

impl Criterion {
    pub fn is_met(&self, snapshot: &ActivitySnapshot) -> bool {
        snapshot.metric(self.metric) >= self.threshold
    }
}

impl ActivitySnapshot {
    pub fn metric(&self, metric: ActivityMetric) -> i64 {
        match metric {
            ActivityMetric::TopicsCreated => self.topics_created,
            ActivityMetric::CommentsMade => self.comments_made,
            ActivityMetric::VotesCast => self.votes_cast,
            ActivityMetric::Karma => self.karma,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Achievement {
    pub id: Uuid,
    pub key: String,
    pub name: String,
    pub description: String,
    pub tier: AchievementTier,
    pub metric: ActivityMetric,
    pub threshold: i64,
    pub created_at: DateTime<Utc>,
}

impl Achievement {
    pub fn criterion(&self) -> Criterion {
        Criterion {
            metric: self.metric,
            threshold: self.threshold,
        }
    }
}

#[derive(Debug, Serialize, FromRow)]
pub struct UnlockedAchievement {
    pub key: String,
    pub name: String,
    pub description: String,
    pub tier: AchievementTier,
    pub unlocked_at: DateTime<Utc>,
}

/// The achievement rule table. Entries are data; adding a threshold badge
/// only needs a new row in `achievements`.
#[derive(Debug, Clone, Default)]
pub struct AchievementCatalog {
    entries: Vec<Achievement>,
}

impl AchievementCatalog {
    pub fn new(entries: Vec<Achievement>) -> Self {
        Self { entries }
    }

    /// Mirrors the rows seeded by the initial migration.
    pub fn builtin() -> Self {
        use AchievementTier::*;
        use ActivityMetric::*;

        #[rustfmt::skip]
        let rules = [
            ("debate_starter", "Debate Starter", "Create your first topic", Bronze, TopicsCreated, 1),
            ("topic_creator", "Topic Creator", "Create 5 topics", Silver, TopicsCreated, 5),
            ("first_words", "First Words", "Post your first comment", Bronze, CommentsMade, 1),
            ("commentator", "Commentator", "Post 25 comments", Silver, CommentsMade, 25),
            ("first_ballot", "First Ballot", "Vote on your first topic", Bronze, VotesCast, 1),
            ("civic_duty", "Civic Duty", "Vote on 50 topics", Gold, VotesCast, 50),
            ("rising_star", "Rising Star", "Reach 100 karma", Gold, Karma, 100),
            ("pillar", "Pillar of the Community", "Reach 1000 karma", Platinum, Karma, 1000),
        ];

        let now = Utc::now();
        let entries = rules
            .into_iter()
            .map(
                |(key, name, description, tier, metric, threshold)| Achievement {
                    id: Uuid::new_v4(),
                    key: key.to_string(),
                    name: name.to_string(),
                    description: description.to_string(),
                    tier,
                    metric,
                    threshold,
                    created_at: now,
                },
            )
            .collect();

        Self { entries }
    }

    pub fn entries(&self) -> &[Achievement] {
        &self.entries
    }

    pub fn get(&self, key: &str) -> Option<&Achievement> {
        self.entries.iter().find(|entry| entry.key == key)
    }

    /// Entries not yet unlocked whose criterion holds for `snapshot`.
    pub fn pending<'a>(
        &'a self,
        snapshot: &ActivitySnapshot,
        unlocked: &HashSet<String>,
    ) -> Vec<&'a Achievement> {
        self.entries
            .iter()
            .filter(|entry| !unlocked.contains(&entry.key))
            .filter(|entry| entry.criterion().is_met(snapshot))
            .collect()
    }
}
