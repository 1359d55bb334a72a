pub mod compose;
pub mod dispatch;
pub mod process_job;
pub mod progression;
pub mod rate_limit;
pub mod schedule;
pub mod thread_gate;
