//! Throttle-gated order dispatch for the omx venue gateway.
//!
//! A single consumer thread drains the admitted-request queue into
//! per-cycle batches, gates each request on its throttle domain, and
//! forwards secured requests to the exchange-facing engine. Outcomes
//! (timeout, throttled, sent) are reported to the completion handler in
//! original arrival order.

pub mod engine;
pub mod error;
pub mod executor;
pub mod queue;

pub use engine::ExchangeEngine;
pub use error::{ExecutorError, ExecutorResult};
pub use executor::{
    spawn_executor, CompletionHandler, DispatchMode, ExecutorChild, ExecutorConfig, OrderExecutor,
    WARMUP_THROTTLE_CAPACITY,
};
pub use queue::{EnqueueResult, RequestQueue};
