//! Coordination core for a plausibly-deniable storage environment: backing
//! pages striped into an MD RAID-0 array, an innocuous safe-zone
//! filesystem on its leading region, and a vault of detached LUKS1 headers
//! that can be opened against it at a caller-chosen offset.
//!
//! Every public operation re-derives its view of the world from the
//! filesystem and the kernel rather than trusting cached state; see
//! [`state::status`] for the aggregate view and [`environment::Environment`]
//! for the facade `freedomctl` drives.

pub mod config;
pub mod environment;
pub mod error;
pub mod exe;
pub mod headers;
pub mod keys;
pub mod mapper;
pub mod mdarray;
pub mod pages;
pub mod probe;
pub mod safezone;
pub mod state;
pub mod tool;

pub use config::Config;
pub use environment::Environment;
pub use error::{CoreError, CoreResult};
