pub mod db;
pub mod model;
pub mod sessions;
pub mod users;

pub use db::Store;
pub use model::{NewUser, SessionRecord, User, UserRecord};
