//! uwsgi-wait: block until every worker behind a uWSGI stats socket is idle.
//!
//! The stats server answers each connection with one JSON document. This
//! crate fetches it, counts workers per status, and keeps polling until all
//! of them report `idle` or a timeout passes.

pub mod config;
pub mod error;
pub mod poller;
pub mod source;
pub mod stats;

pub use config::Config;
pub use error::{Result, WaitError};
pub use poller::{wait_for_idle, PollOutcome, Poller};
pub use source::{StatsSource, UnixSocketSource};
pub use stats::{StatsSnapshot, StatusTally, WorkerRecord};
