pub mod connection;
pub(crate) mod helpers;
mod migrations;
pub mod repositories;

pub use connection::Database;
pub use repositories::StoredPhoto;
