//! Users and posts, kept in memory and written through to a JSON snapshot on every change.
pub mod database;
pub mod shared;
pub mod snapshot;
pub mod structs;

pub use database::{Database, RestoreStatus};
pub use shared::SharedStore;
