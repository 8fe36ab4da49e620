use serde::Serialize;

/// Qualifying actions that earn karma.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KarmaReason {
    TopicCreated,
    CommentCreated,
    TopicVoteCast,
    VoteReceived,
}

/// Points per qualifying action. Every entry is positive; karma never goes down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KarmaTable {
    pub topic_created: i32,
    pub comment_created: i32,
    pub topic_vote_cast: i32,
    pub vote_received: i32,
}

impl KarmaTable {
    pub fn points(&self, reason: KarmaReason) -> i32 {
        match reason {
            KarmaReason::TopicCreated => self.topic_created,
            KarmaReason::CommentCreated => self.comment_created,
            KarmaReason::TopicVoteCast => self.topic_vote_cast,
            KarmaReason::VoteReceived => self.vote_received,
        }
    }
}

impl Default for KarmaTable {
    fn default() -> Self {
        Self {
            topic_created: 10,
            comment_created: 2,
            topic_vote_cast: 1,
            vote_received: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_is_positive() {
        let table = KarmaTable::default();
        for reason in [
            KarmaReason::TopicCreated,
            KarmaReason::CommentCreated,
            KarmaReason::TopicVoteCast,
            KarmaReason::VoteReceived,
        ] {
            assert!(table.points(reason) > 0, "{reason:?}");
        }
        assert_eq!(table.points(KarmaReason::TopicCreated), 10);
    }
}
