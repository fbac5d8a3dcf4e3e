//! # repokeep-fetch
//!
//! The per-repository half of a batch update.
//!
//! [`fetch::fetch_repo`] runs one fetch and classifies its output,
//! [`shard`] partitions repo lists and reads/writes the job and result
//! documents, and [`worker::run_worker`] processes one shard end to end.

pub mod error;
pub mod fetch;
pub mod shard;
pub mod worker;

pub use error::FetchError;
pub use fetch::{classify, fetch_repo, FetchOutcome};
pub use shard::{
    aggregate, partition, read_job, read_result, write_job, write_result, Aggregate, ShardJob,
    ShardResult, UpdatedRepo,
};
pub use worker::{run_worker, WorkerOutcome};
