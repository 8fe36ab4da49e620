pub mod achievement;
pub mod comment;
pub mod karma;
pub mod topic;
pub mod user;
pub mod vote;

pub use achievement::*;
pub use comment::*;
pub use karma::*;
pub use topic::*;
pub use user::*;
pub use vote::*;
