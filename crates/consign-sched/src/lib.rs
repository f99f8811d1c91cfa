//! consign-sched
//!
//! The logical clock and the keyed deadline scheduler (C1). Timer firings
//! are delivered to a consumer channel; the consumer performs a versioned
//! read-modify-write and no-ops when it lost the race, which together with
//! at-least-once delivery yields exactly-once logical timeouts.

pub mod clock;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use timer::{Scheduler, TimerKey};
