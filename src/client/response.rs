//! Caller-facing handles bound to one request ticket.
//!
//! [`Response`] wraps a single-response request (snapshot, URI search);
//! [`StepResponse`] wraps a multi-response request (range, stream). Both
//! borrow nothing from the connection object itself; they share the
//! connection core, so they stay valid for as long as data can arrive.

use std::sync::Arc;

use crate::client::multiplexer::ResultSlot;
use crate::client::ConnectionCore;
use crate::error::{RequestError, Result};

/// Handle for a request answered exactly once.
#[derive(Clone)]
pub struct Response {
    core: Arc<ConnectionCore>,
    ticket: u32,
}

impl Response {
    pub(crate) fn new(core: Arc<ConnectionCore>, ticket: u32) -> Self {
        Self { core, ticket }
    }

    /// Ticket correlating this request with its responses.
    pub fn ticket(&self) -> u32 {
        self.ticket
    }

    /// Suspend until the result or an error arrives, then return it.
    ///
    /// A second call fails with `NoData`: the one result has already been
    /// handed out and the ticket's state erased.
    pub async fn get(&self) -> Result<ResultSlot> {
        self.core.mux.next_slot(self.ticket).await
    }

    /// Non-blocking peek: is the result buffered?
    pub fn ready(&self) -> bool {
        self.core.mux.has_next(self.ticket)
    }

    /// Non-blocking peek: has an error been recorded?
    pub fn is_error(&self) -> bool {
        self.core.mux.has_error(self.ticket)
    }

    /// Copy of the recorded error, if any.
    pub fn get_error(&self) -> Option<RequestError> {
        self.core.mux.get_error(self.ticket)
    }

    /// Ask the server to stop servicing this request.
    pub fn cancel(&self) {
        self.core.cancel_request(self.ticket);
    }
}

/// Handle for a request answered in steps: a lazy, forward-only,
/// non-restartable sequence of result slots.
#[derive(Clone)]
pub struct StepResponse {
    core: Arc<ConnectionCore>,
    ticket: u32,
}

impl StepResponse {
    pub(crate) fn new(core: Arc<ConnectionCore>, ticket: u32) -> Self {
        Self { core, ticket }
    }

    /// Ticket correlating this request with its responses.
    pub fn ticket(&self) -> u32 {
        self.ticket
    }

    /// Suspend until the next step or an error arrives, then return it.
    ///
    /// Callable repeatedly; steps come back in exactly the order the
    /// server sent them. Once the stream is complete and drained, further
    /// calls fail with `NoData`.
    pub async fn next(&self) -> Result<ResultSlot> {
        self.core.mux.next_slot(self.ticket).await
    }

    /// Non-blocking peek: is at least one step buffered?
    pub fn has_next(&self) -> bool {
        self.core.mux.has_next(self.ticket)
    }

    /// True once the server has signaled end-of-stream (or the request was
    /// cancelled or fully drained).
    pub fn is_complete(&self) -> bool {
        self.core.mux.is_complete(self.ticket)
    }

    /// Non-blocking peek: has an error been recorded?
    pub fn is_error(&self) -> bool {
        self.core.mux.has_error(self.ticket)
    }

    /// Copy of the recorded error, if any.
    pub fn get_error(&self) -> Option<RequestError> {
        self.core.mux.get_error(self.ticket)
    }

    /// Ask the server to stop the stream. Buffered steps stay readable;
    /// later frames for this ticket are dropped.
    pub fn cancel(&self) {
        self.core.cancel_request(self.ticket);
    }
}
