//! Reconciliation of the database against the mirrors on disk.
//!
//! [`repair`] brings `database.json` and `<root>/repos` back in agreement:
//! untracked clones are imported, entries for vanished clones are removed
//! (after confirmation), and every entry is healed to the canonical field set.
//! [`add_url`] mirror-clones and tracks a single new repository.

pub mod discover;
pub mod error;
pub mod import;
pub mod reconcile;

pub use discover::{discover_repos, Discovery};
pub use error::RepairError;
pub use import::{add_url, configure_mirror, read_origin_url};
pub use reconcile::{repair, RepairOptions, RepairReport};
