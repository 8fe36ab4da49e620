pub mod achievement_service;
pub mod comment_service;
pub mod karma_service;
pub mod topic_service;
pub mod vote_service;

#[cfg(test)]
pub(crate) mod fixtures;
