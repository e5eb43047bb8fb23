//! Script module: persisted recordings and their storage.

pub mod schema;
pub mod store;

pub use schema::Script;
pub use store::ScriptStore;
