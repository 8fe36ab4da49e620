use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::models::OptionTally;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "topic_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TopicKind {
    Single,
    Multiple,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "topic_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TopicStatus {
    Draft,
    Active,
    Closed,
    Removed,
}

/// Why a topic refuses votes right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VotingWindow {
    Open,
    Inactive,
    NotStarted,
    Ended,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Topic {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub author_id: Uuid,
    pub kind: TopicKind,
    pub status: TopicStatus,
    pub max_choices: i32,
    pub voter_count: i32,
    pub comment_count: i32,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Topic {
    pub fn voting_window(&self, now: DateTime<Utc>) -> VotingWindow {
        if self.status != TopicStatus::Active {
            return VotingWindow::Inactive;
        }
        if self.starts_at.is_some_and(|starts_at| now < starts_at) {
            return VotingWindow::NotStarted;
        }
        if self.ends_at.is_some_and(|ends_at| now >= ends_at) {
            return VotingWindow::Ended;
        }
        VotingWindow::Open
    }

    /// Single-choice topics always allow exactly one selection.
    pub fn allowed_choices(&self) -> usize {
        match self.kind {
            TopicKind::Single => 1,
            TopicKind::Multiple => self.max_choices.max(1) as usize,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TopicOption {
    pub id: Uuid,
    pub topic_id: Uuid,
    pub label: String,
    pub position: i32,
    pub vote_count: i32,
}

// Create topic request
#[derive(Debug, Validate, Deserialize)]
pub struct CreateTopicRequest {
    #[validate(length(min = 3, max = 300))]
    pub title: String,
    #[validate(length(max = 10000))]
    pub description: Option<String>,
    pub kind: TopicKind,
    #[validate(length(min = 2, max = 50, message = "A topic needs between 2 and 50 options"))]
    pub options: Vec<String>,
    pub max_choices: Option<i32>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

// Topic response with tallies
#[derive(Debug, Serialize)]
pub struct TopicResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub author_id: Uuid,
    pub kind: TopicKind,
    pub status: TopicStatus,
    pub max_choices: i32,
    pub voter_count: i32,
    pub comment_count: i32,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub options: Vec<OptionTally>,
    pub user_selection: Vec<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn topic(status: TopicStatus) -> Topic {
        let now = Utc::now();
        Topic {
            id: Uuid::new_v4(),
            title: "Tabs or spaces?".to_string(),
            description: None,
            author_id: Uuid::new_v4(),
            kind: TopicKind::Single,
            status,
            max_choices: 1,
            voter_count: 0,
            comment_count: 0,
            starts_at: None,
            ends_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn unbounded_active_topic_is_open() {
        assert_eq!(
            topic(TopicStatus::Active).voting_window(Utc::now()),
            VotingWindow::Open
        );
    }

    #[test]
    fn closed_or_draft_topic_is_inactive() {
        for status in [TopicStatus::Closed, TopicStatus::Draft, TopicStatus::Removed] {
            assert_eq!(topic(status).voting_window(Utc::now()), VotingWindow::Inactive);
        }
    }

    #[test]
    fn respects_time_window_bounds() {
        let now = Utc::now();
        let mut t = topic(TopicStatus::Active);
        t.starts_at = Some(now + Duration::hours(1));
        assert_eq!(t.voting_window(now), VotingWindow::NotStarted);

        t.starts_at = Some(now - Duration::hours(2));
        t.ends_at = Some(now);
        assert_eq!(t.voting_window(now), VotingWindow::Ended);
        assert_eq!(
            t.voting_window(now - Duration::minutes(1)),
            VotingWindow::Open
        );
    }

    #[test]
    fn single_choice_ignores_max_choices() {
        let mut t = topic(TopicStatus::Active);
        t.max_choices = 4;
        assert_eq!(t.allowed_choices(), 1);
        t.kind = TopicKind::Multiple;
        assert_eq!(t.allowed_choices(), 4);
    }
}
