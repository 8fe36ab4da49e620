use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Direction of a comment vote. Absence of a row means "no vote", so there is no zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i16", into = "i16")]
pub enum VoteValue {
    Up,
    Down,
}

impl VoteValue {
    pub fn as_i16(self) -> i16 {
        match self {
            VoteValue::Up => 1,
            VoteValue::Down => -1,
        }
    }

    pub fn as_i32(self) -> i32 {
        i32::from(self.as_i16())
    }
}

impl TryFrom<i16> for VoteValue {
    type Error = String;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(VoteValue::Up),
            -1 => Ok(VoteValue::Down),
            other => Err(format!("Invalid vote value {}, expected 1 or -1", other)),
        }
    }
}

impl From<VoteValue> for i16 {
    fn from(value: VoteValue) -> Self {
        value.as_i16()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CommentVote {
    pub id: Uuid,
    pub user_id: Uuid,
    pub comment_id: Uuid,
    pub value: i16, // -1 for downvote, 1 for upvote
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Comment vote request
#[derive(Debug, Deserialize)]
pub struct CommentVoteRequest {
    pub value: i16, // repeating the current value retracts the vote
}

// Comment vote response
#[derive(Debug, Serialize)]
pub struct CommentVoteResponse {
    pub comment_id: Uuid,
    pub user_vote: Option<i16>,
    pub upvotes: i32,
    pub downvotes: i32,
    pub score: i32,
}

// Topic vote request
#[derive(Debug, Validate, Deserialize)]
pub struct TopicVoteRequest {
    #[validate(length(min = 1, max = 50, message = "Select at least one option"))]
    pub option_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OptionTally {
    pub option_id: Uuid,
    pub label: String,
    pub vote_count: i32,
}

// Topic vote response
#[derive(Debug, Serialize)]
pub struct TopicVoteResponse {
    pub topic_id: Uuid,
    pub selection: Vec<Uuid>,
    pub voter_count: i32,
    pub options: Vec<OptionTally>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_only_unit_values() {
        assert_eq!(VoteValue::try_from(1), Ok(VoteValue::Up));
        assert_eq!(VoteValue::try_from(-1), Ok(VoteValue::Down));
        assert!(VoteValue::try_from(0).is_err());
        assert!(VoteValue::try_from(2).is_err());
        assert!(VoteValue::try_from(-5).is_err());
    }

    #[test]
    fn serializes_as_signed_integer() {
        assert_eq!(serde_json::to_string(&VoteValue::Down).unwrap(), "-1");
        let parsed: VoteValue = serde_json::from_str("1").unwrap();
        assert_eq!(parsed, VoteValue::Up);
        assert!(serde_json::from_str::<VoteValue>("0").is_err());
    }
}
