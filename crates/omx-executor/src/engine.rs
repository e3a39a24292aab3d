//! Exchange-facing engine seam.
//!
//! The dispatcher hands secured requests to the engine; everything
//! behind it (encoding, session, transport) lives outside this
//! workspace. The trait exists for dependency injection in tests as
//! much as for the production wiring.

use omx_core::OrderRequest;

use crate::error::ExecutorResult;

/// Exchange-facing engine: accepts abstract order requests.
///
/// Called only from the dispatcher thread; implementations do not need
/// interior queuing of their own.
#[cfg_attr(test, mockall::automock)]
pub trait ExchangeEngine: Send + Sync {
    /// Forward one request to the exchange session.
    fn send_order_request(&self, request: &OrderRequest) -> ExecutorResult<()>;
}
