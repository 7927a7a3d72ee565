//! Command-line subcommands other than `run`.

pub mod dry_run;

pub use dry_run::{DryRunArgs, DryRunError};
