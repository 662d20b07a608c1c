pub mod sqlite_store;

pub use sqlite_store::{DATABASE_FILE_NAME, SqliteStore};
