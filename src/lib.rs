// Base modules
pub mod config;
pub mod consts;
pub mod error;
pub mod feed;

// Pipeline core
pub mod store;     // per-type durable digest tables
pub mod schedule;  // window math + pending checks
pub mod snapshot;  // aggregate document writer
pub mod retention; // index rebuild + pruning
pub mod pipeline;  // run orchestration

// Collaborator adapters and plumbing
pub mod adapters;
pub mod cli;
pub mod lock;
pub mod util;

// Convenience re-exports
pub use config::Config;
pub use error::{FeedError, RunError, StoreError};
pub use feed::{digest_identifier, FeedRow, FeedSource, FeedType, RawRow, RowTokenizer};
pub use pipeline::{run, RunOutcome, RunReport};
pub use schedule::{due_windows, Window, WindowKind};
pub use store::HashStore;
