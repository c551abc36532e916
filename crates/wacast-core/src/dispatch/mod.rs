//! Dispatch Module - Single-message send with bounded retries

mod worker;

pub use worker::{retry_delay, DispatchOutcome, DispatchWorker};
