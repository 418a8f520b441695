pub mod counters;
pub mod db;
pub mod hasher;
pub mod mailer;

pub use counters::FileCounterStore;
pub use db::DbAdapter;
pub use hasher::Argon2Hasher;
pub use mailer::{LogMailer, PostmarkMailer};
