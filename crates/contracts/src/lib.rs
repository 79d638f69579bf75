//! # Contracts
//!
//! Frozen interface contracts (ICD), defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - All timestamps are signed nanoseconds (`i64`) from a device-local monotonic ticker
//! - A `ClockOffset` maps local nanoseconds into the leader's time domain
//! - Sensor timestamps are start-of-exposure times in the local domain

mod blueprint;
mod bundle;
mod command;
mod control;
mod error;
mod frame;
mod member;
mod offset;
mod sink;
mod source;

pub use blueprint::*;
pub use bundle::*;
pub use command::SyncCommand;
pub use control::CaptureControl;
pub use error::*;
pub use frame::*;
pub use member::*;
pub use offset::ClockOffset;
pub use sink::{BundleSink, TriggerTicket};
pub use source::{FrameSource, ImageCallback, MetadataCallback};
