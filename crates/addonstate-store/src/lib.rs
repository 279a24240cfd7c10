mod atomic_write;
mod database_file;
mod layout;
mod save_scheduler;

pub use atomic_write::{clear_rebuild_marker, write_database_atomic, write_rebuild_marker};
pub use database_file::{
    load_database, parse_database, DatabaseSnapshot, LoadError, LoadedDatabase, DB_SCHEMA,
};
pub use layout::ProfileLayout;
pub use save_scheduler::{SaveError, SaveScheduler, DEFAULT_SAVE_DELAY};
