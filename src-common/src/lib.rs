//! IPTV Recorder Common Library
//!
//! Shared types for the launcher and the scheduler: the recording request,
//! its command-line wire contract, time-of-day handling, playlist parsing and
//! destination naming.

pub mod handoff;
pub mod logging;
pub mod naming;
pub mod notify;
pub mod playlist;
pub mod request;
pub mod tags;
pub mod time;
pub mod types;

pub use request::RecordingRequest;
pub use time::TimeOfDay;
pub use types::*;
