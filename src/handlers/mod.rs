pub mod comments;
pub mod topics;
pub mod users;
