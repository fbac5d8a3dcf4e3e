//! repokeep core library: database types, the working-root store, errors,
//! and the command/confirmation ports shared by every engine.
//!
//! - [`types`]: [`RepoEntry`] and [`Database`]
//! - [`store`]: [`Store`] paths and atomic persistence
//! - [`command`]: [`CommandRunner`] and [`Confirm`]
//! - [`error`]: [`StoreError`]

pub mod command;
pub mod error;
pub mod store;
pub mod types;

pub use command::{CommandOutput, CommandRunner, Confirm, SystemRunner};
pub use error::StoreError;
pub use store::{write_json_atomic, Store};
pub use types::{owner_and_name, timestamp, Database, RepoEntry, NEVER};
