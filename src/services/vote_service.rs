use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::{
        Comment, CommentStatus, CommentVote, CommentVoteResponse, OptionTally, Topic, TopicOption,
        TopicVoteResponse, VoteValue, VotingWindow,
    },
};

/// Row mutation implied by a vote click, given the voter's current vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteTransition {
    Insert(VoteValue),
    Update { from: VoteValue, to: VoteValue },
    Delete(VoteValue),
}

impl VoteTransition {
    /// Repeating the current value retracts it; the opposite value flips it.
    pub fn plan(existing: Option<VoteValue>, requested: VoteValue) -> Self {
        match existing {
            None => VoteTransition::Insert(requested),
            Some(current) if current == requested => VoteTransition::Delete(current),
            Some(current) => VoteTransition::Update {
                from: current,
                to: requested,
            },
        }
    }

    pub fn score_delta(&self) -> i32 {
        match *self {
            VoteTransition::Insert(value) => value.as_i32(),
            VoteTransition::Update { from, to } => to.as_i32() - from.as_i32(),
            VoteTransition::Delete(value) => -value.as_i32(),
        }
    }

    pub fn upvote_delta(&self) -> i32 {
        self.count_delta(VoteValue::Up)
    }

    pub fn downvote_delta(&self) -> i32 {
        self.count_delta(VoteValue::Down)
    }

    /// The voter's vote after the transition is applied.
    pub fn resulting_vote(&self) -> Option<VoteValue> {
        match *self {
            VoteTransition::Insert(value) => Some(value),
            VoteTransition::Update { to, .. } => Some(to),
            VoteTransition::Delete(_) => None,
        }
    }

    fn count_delta(&self, direction: VoteValue) -> i32 {
        let before = match *self {
            VoteTransition::Insert(_) => None,
            VoteTransition::Update { from, .. } => Some(from),
            VoteTransition::Delete(value) => Some(value),
        };
        let after = self.resulting_vote();
        i32::from(after == Some(direction)) - i32::from(before == Some(direction))
    }
}

#[derive(Debug, Clone)]
pub struct CommentVoteOutcome {
    pub comment_id: Uuid,
    pub author_id: Uuid,
    pub score: i32,
    pub upvotes: i32,
    pub downvotes: i32,
    pub transition: VoteTransition,
}

impl From<CommentVoteOutcome> for CommentVoteResponse {
    fn from(outcome: CommentVoteOutcome) -> Self {
        Self {
            comment_id: outcome.comment_id,
            user_vote: outcome.transition.resulting_vote().map(VoteValue::as_i16),
            upvotes: outcome.upvotes,
            downvotes: outcome.downvotes,
            score: outcome.score,
        }
    }
}

/// Casts, flips or retracts a comment vote in its own transaction.
pub async fn cast_comment_vote(
    db: &PgPool,
    user_id: Uuid,
    comment_id: Uuid,
    value: VoteValue,
) -> Result<CommentVoteOutcome> {
    let mut tx = db.begin().await?;
    let outcome = cast_comment_vote_in(&mut tx, user_id, comment_id, value).await?;
    tx.commit().await?;

    tracing::debug!(
        %user_id,
        %comment_id,
        transition = ?outcome.transition,
        score = outcome.score,
        "comment vote applied"
    );

    Ok(outcome)
}

/// Same as [`cast_comment_vote`] inside a caller-owned unit of work.
/// Nothing is persisted unless the caller commits.
pub async fn cast_comment_vote_in(
    conn: &mut PgConnection,
    user_id: Uuid,
    comment_id: Uuid,
    value: VoteValue,
) -> Result<CommentVoteOutcome> {
    let comment = sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE id = $1")
        .bind(comment_id)
        .fetch_optional(&mut *conn)
        .await?
        .filter(|comment| comment.status == CommentStatus::Active)
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

    let author_id = comment.author_id;
    if author_id == user_id {
        return Err(AppError::Authorization(
            "Cannot vote on your own comment".to_string(),
        ));
    }

    let existing = sqlx::query_as::<_, CommentVote>(
        "SELECT * FROM comment_votes WHERE user_id = $1 AND comment_id = $2 FOR UPDATE",
    )
    .bind(user_id)
    .bind(comment_id)
    .fetch_optional(&mut *conn)
    .await?
    .map(|vote| VoteValue::try_from(vote.value))
    .transpose()
    .map_err(AppError::Internal)?;

    let transition = VoteTransition::plan(existing, value);

    match transition {
        VoteTransition::Insert(value) => {
            // A concurrent first vote trips the (user_id, comment_id) constraint -> Conflict
            sqlx::query(
                r#"
                INSERT INTO comment_votes (id, user_id, comment_id, value, created_at, updated_at)
                VALUES ($1, $2, $3, $4, NOW(), NOW())
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(comment_id)
            .bind(value.as_i16())
            .execute(&mut *conn)
            .await?;
        }
        VoteTransition::Update { to, .. } => {
            sqlx::query(
                r#"
                UPDATE comment_votes SET value = $3, updated_at = NOW()
                WHERE user_id = $1 AND comment_id = $2
                "#,
            )
            .bind(user_id)
            .bind(comment_id)
            .bind(to.as_i16())
            .execute(&mut *conn)
            .await?;
        }
        VoteTransition::Delete(_) => {
            sqlx::query("DELETE FROM comment_votes WHERE user_id = $1 AND comment_id = $2")
                .bind(user_id)
                .bind(comment_id)
                .execute(&mut *conn)
                .await?;
        }
    }

    let tally: Option<(i32, i32, i32)> = sqlx::query_as(
        r#"
        UPDATE comments
        SET score = score + $2,
            upvotes = upvotes + $3,
            downvotes = downvotes + $4,
            updated_at = NOW()
        WHERE id = $1
        RETURNING score, upvotes, downvotes
        "#,
    )
    .bind(comment_id)
    .bind(transition.score_delta())
    .bind(transition.upvote_delta())
    .bind(transition.downvote_delta())
    .fetch_optional(&mut *conn)
    .await?;

    let (score, upvotes, downvotes) =
        tally.ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

    Ok(CommentVoteOutcome {
        comment_id,
        author_id,
        score,
        upvotes,
        downvotes,
        transition,
    })
}

/// Options to drop and to add when replacing a topic selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionDiff {
    pub removed: Vec<Uuid>,
    pub added: Vec<Uuid>,
}

impl SelectionDiff {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

pub fn reconcile_selection(previous: &[Uuid], next: &[Uuid]) -> SelectionDiff {
    let previous_set: HashSet<&Uuid> = previous.iter().collect();
    let next_set: HashSet<&Uuid> = next.iter().collect();

    SelectionDiff {
        removed: previous
            .iter()
            .filter(|id| !next_set.contains(id))
            .copied()
            .collect(),
        added: next
            .iter()
            .filter(|id| !previous_set.contains(id))
            .copied()
            .collect(),
    }
}

pub fn ensure_voting_open(topic: &Topic, now: DateTime<Utc>) -> Result<()> {
    match topic.voting_window(now) {
        VotingWindow::Open => Ok(()),
        VotingWindow::Inactive => Err(AppError::Authorization(
            "Topic is not open for voting".to_string(),
        )),
        VotingWindow::NotStarted => Err(AppError::Authorization(
            "Voting has not started yet".to_string(),
        )),
        VotingWindow::Ended => Err(AppError::Authorization("Voting has ended".to_string())),
    }
}

pub fn validate_selection(
    topic: &Topic,
    options: &[TopicOption],
    selection: &[Uuid],
) -> Result<()> {
    if selection.is_empty() {
        return Err(AppError::Validation(
            "Select at least one option".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(selection.len());
    if !selection.iter().all(|id| seen.insert(*id)) {
        return Err(AppError::Validation(
            "An option may only be selected once".to_string(),
        ));
    }

    let allowed = topic.allowed_choices();
    if selection.len() > allowed {
        return Err(AppError::Validation(format!(
            "At most {} option(s) may be selected",
            allowed
        )));
    }

    let known: HashSet<Uuid> = options
        .iter()
        .filter(|option| option.topic_id == topic.id)
        .map(|option| option.id)
        .collect();
    if let Some(unknown) = selection.iter().find(|id| !known.contains(*id)) {
        return Err(AppError::Validation(format!(
            "Option {} does not belong to this topic",
            unknown
        )));
    }

    Ok(())
}

#[derive(Debug, Clone)]
pub struct TopicVoteOutcome {
    pub topic_id: Uuid,
    pub author_id: Uuid,
    pub selection: Vec<Uuid>,
    pub voter_count: i32,
    pub options: Vec<OptionTally>,
    pub first_vote: bool,
}

impl From<TopicVoteOutcome> for TopicVoteResponse {
    fn from(outcome: TopicVoteOutcome) -> Self {
        Self {
            topic_id: outcome.topic_id,
            selection: outcome.selection,
            voter_count: outcome.voter_count,
            options: outcome.options,
        }
    }
}

/// Replaces the voter's selection on a topic in its own transaction.
pub async fn cast_topic_vote(
    db: &PgPool,
    user_id: Uuid,
    topic_id: Uuid,
    selection: &[Uuid],
) -> Result<TopicVoteOutcome> {
    let mut tx = db.begin().await?;
    let outcome = cast_topic_vote_in(&mut tx, user_id, topic_id, selection, Utc::now()).await?;
    tx.commit().await?;

    tracing::debug!(
        %user_id,
        %topic_id,
        first_vote = outcome.first_vote,
        "topic vote applied"
    );

    Ok(outcome)
}

pub async fn cast_topic_vote_in(
    conn: &mut PgConnection,
    user_id: Uuid,
    topic_id: Uuid,
    selection: &[Uuid],
    now: DateTime<Utc>,
) -> Result<TopicVoteOutcome> {
    let topic = lock_topic_for_voting(conn, user_id, topic_id, now).await?;

    let options = sqlx::query_as::<_, TopicOption>(
        "SELECT * FROM topic_options WHERE topic_id = $1 ORDER BY position ASC",
    )
    .bind(topic_id)
    .fetch_all(&mut *conn)
    .await?;

    validate_selection(&topic, &options, selection)?;

    let previous = current_selection(conn, user_id, topic_id).await?;
    let diff = reconcile_selection(&previous, selection);

    let touched: Vec<Uuid> = diff.removed.iter().chain(&diff.added).copied().collect();
    lock_options(conn, &touched).await?;

    if !diff.removed.is_empty() {
        sqlx::query(
            "DELETE FROM topic_votes WHERE user_id = $1 AND topic_id = $2 AND option_id = ANY($3)",
        )
        .bind(user_id)
        .bind(topic_id)
        .bind(&diff.removed)
        .execute(&mut *conn)
        .await?;

        adjust_option_counts(conn, &diff.removed, -1).await?;
    }

    if !diff.added.is_empty() {
        let ids: Vec<Uuid> = diff.added.iter().map(|_| Uuid::new_v4()).collect();
        sqlx::query(
            r#"
            INSERT INTO topic_votes (id, user_id, topic_id, option_id, created_at)
            SELECT id, $2, $3, option_id, NOW()
            FROM UNNEST($1::uuid[], $4::uuid[]) AS t(id, option_id)
            "#,
        )
        .bind(&ids)
        .bind(user_id)
        .bind(topic_id)
        .bind(&diff.added)
        .execute(&mut *conn)
        .await?;

        adjust_option_counts(conn, &diff.added, 1).await?;
    }

    let first_vote = previous.is_empty();
    let voter_count = if first_vote {
        adjust_voter_count(conn, topic_id, 1).await?
    } else {
        topic.voter_count
    };

    let options = load_tallies(conn, topic_id).await?;

    Ok(TopicVoteOutcome {
        topic_id,
        author_id: topic.author_id,
        selection: selection.to_vec(),
        voter_count,
        options,
        first_vote,
    })
}

/// Removes the voter's whole selection on a topic.
pub async fn retract_topic_vote(
    db: &PgPool,
    user_id: Uuid,
    topic_id: Uuid,
) -> Result<TopicVoteOutcome> {
    let mut tx = db.begin().await?;
    let now = Utc::now();
    let topic = lock_topic_for_voting(&mut tx, user_id, topic_id, now).await?;

    let previous = current_selection(&mut tx, user_id, topic_id).await?;
    if previous.is_empty() {
        return Err(AppError::NotFound(
            "You have not voted on this topic".to_string(),
        ));
    }

    lock_options(&mut tx, &previous).await?;

    sqlx::query("DELETE FROM topic_votes WHERE user_id = $1 AND topic_id = $2")
        .bind(user_id)
        .bind(topic_id)
        .execute(&mut *tx)
        .await?;

    adjust_option_counts(&mut tx, &previous, -1).await?;
    let voter_count = adjust_voter_count(&mut tx, topic_id, -1).await?;
    let options = load_tallies(&mut tx, topic_id).await?;

    tx.commit().await?;

    tracing::debug!(%user_id, %topic_id, "topic vote retracted");

    Ok(TopicVoteOutcome {
        topic_id,
        author_id: topic.author_id,
        selection: Vec::new(),
        voter_count,
        options,
        first_vote: false,
    })
}

pub async fn get_topic_selection(
    db: &PgPool,
    user_id: Uuid,
    topic_id: Uuid,
) -> Result<Vec<Uuid>> {
    let mut conn = db.acquire().await?;
    current_selection(&mut conn, user_id, topic_id).await
}

// Serializes concurrent ballots of the same voter on the same topic while
// leaving other voters free to proceed. FOR KEY SHARE keeps the topic from
// being deleted but does not block the voter_count update of other voters.
async fn lock_topic_for_voting(
    conn: &mut PgConnection,
    user_id: Uuid,
    topic_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Topic> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(format!("topic_vote:{}:{}", topic_id, user_id))
        .execute(&mut *conn)
        .await?;

    let topic = sqlx::query_as::<_, Topic>("SELECT * FROM topics WHERE id = $1 FOR KEY SHARE")
        .bind(topic_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Topic not found".to_string()))?;

    ensure_voting_open(&topic, now)?;

    Ok(topic)
}

async fn current_selection(
    conn: &mut PgConnection,
    user_id: Uuid,
    topic_id: Uuid,
) -> Result<Vec<Uuid>> {
    let selection = sqlx::query_scalar(
        r#"
        SELECT tv.option_id
        FROM topic_votes tv
        JOIN topic_options o ON o.id = tv.option_id
        WHERE tv.user_id = $1 AND tv.topic_id = $2
        ORDER BY o.position ASC
        "#,
    )
    .bind(user_id)
    .bind(topic_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(selection)
}

// Option rows are locked in id order so that voters moving between the same
// options in opposite directions cannot deadlock.
async fn lock_options(conn: &mut PgConnection, option_ids: &[Uuid]) -> Result<()> {
    if option_ids.is_empty() {
        return Ok(());
    }

    sqlx::query("SELECT id FROM topic_options WHERE id = ANY($1) ORDER BY id FOR NO KEY UPDATE")
        .bind(option_ids)
        .fetch_all(&mut *conn)
        .await?;

    Ok(())
}

async fn adjust_option_counts(
    conn: &mut PgConnection,
    option_ids: &[Uuid],
    delta: i32,
) -> Result<()> {
    sqlx::query("UPDATE topic_options SET vote_count = vote_count + $2 WHERE id = ANY($1)")
        .bind(option_ids)
        .bind(delta)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

async fn adjust_voter_count(conn: &mut PgConnection, topic_id: Uuid, delta: i32) -> Result<i32> {
    let voter_count = sqlx::query_scalar(
        r#"
        UPDATE topics SET voter_count = voter_count + $2, updated_at = NOW()
        WHERE id = $1
        RETURNING voter_count
        "#,
    )
    .bind(topic_id)
    .bind(delta)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Topic not found".to_string()))?;

    Ok(voter_count)
}

pub(crate) async fn load_tallies(
    conn: &mut PgConnection,
    topic_id: Uuid,
) -> Result<Vec<OptionTally>> {
    let tallies = sqlx::query_as::<_, OptionTally>(
        r#"
        SELECT id AS option_id, label, vote_count
        FROM topic_options
        WHERE topic_id = $1
        ORDER BY position ASC
        "#,
    )
    .bind(topic_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(tallies)
}
