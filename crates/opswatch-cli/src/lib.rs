//! # opswatch-cli
//!
//! Opswatch command-line interface.
//!
//! Provides commands for:
//! - Service health overview and live watching
//! - Service, user and settings management
//! - Alert resolve/verify actions
//!
//! # Architecture
//!
//! Commands read through an [`opswatch_client::SyncCache`] backed by the
//! REST repository and write through the mutation pipeline, so every
//! command sees the same invalidation behavior as any other client.
//!
//! ```text
//! ┌──────────────┐   SyncCache / MutationPipeline   ┌──────────────┐
//! │ opswatch-cli │◄────────────────────────────────►│ Opswatch API │
//! └──────────────┘            (REST/JSON)           └──────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;

pub use cli::{Cli, Commands, Format};
pub use error::CliError;
pub use output::OutputFormat;
