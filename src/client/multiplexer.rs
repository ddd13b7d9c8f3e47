//! Request multiplexer: the shared state behind one client connection.
//!
//! Many logical requests run over one socket at a time, each identified by
//! a ticket. The multiplexer owns the per-ticket result queues, the FIFO
//! order list for URI searches (which carry no ticket on the wire), and the
//! per-ticket error table. One mutex guards all of it; there is exactly one
//! shared structure and no nested locking.
//!
//! The background reader calls the `on_*` methods; caller tasks poll or
//! block through [`next_slot`](RequestMultiplexer::next_slot). Blocking
//! never holds the lock: each pass registers for notification, checks state
//! under the lock, releases it, and only then suspends.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use tokio::sync::Notify;

use crate::error::{GrailError, RequestError, Result};
use crate::types::{Attribute, DataBundle};

/// One buffered result unit: URI → attribute list.
pub type ResultSlot = HashMap<String, Vec<Attribute>>;

/// State for one outstanding request.
#[derive(Debug)]
struct PendingRequest {
    /// FIFO queue of result slots; `None` is the terminal marker.
    slots: VecDeque<Option<ResultSlot>>,
    /// Single-response requests accumulate into one slot; multi-response
    /// requests get a fresh slot after every data frame.
    single_response: bool,
    /// Cancelled tickets drop incoming data but stay drainable.
    cancelled: bool,
}

impl PendingRequest {
    fn new(single_response: bool) -> Self {
        let mut slots = VecDeque::new();
        slots.push_back(Some(ResultSlot::new()));
        Self {
            slots,
            single_response,
            cancelled: false,
        }
    }

    fn is_complete(&self) -> bool {
        matches!(self.slots.back(), Some(None))
    }

    fn push_terminal(&mut self) {
        if !self.is_complete() {
            self.slots.push_back(None);
        }
    }
}

#[derive(Default)]
struct MuxState {
    next_ticket: u32,
    pending: HashMap<u32, PendingRequest>,
    /// Issue order of outstanding URI searches; responses match this order.
    search_order: VecDeque<u32>,
    errors: HashMap<u32, RequestError>,
}

/// Ticket allocation, frame routing, and completion tracking for one
/// connection.
pub struct RequestMultiplexer {
    state: Mutex<MuxState>,
    notify: Notify,
}

impl RequestMultiplexer {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MuxState::default()),
            notify: Notify::new(),
        }
    }

    /// Issue one request: reserve the next ticket, seed its tracking
    /// state, encode the request with that ticket, and enqueue it.
    ///
    /// All of it happens in one critical section, so the reader can never
    /// observe a half-initialized ticket, and URI-search wire order always
    /// matches order-list order. Tickets start at 0 and are never reused;
    /// a failed encode or enqueue rolls back the tracking state but still
    /// consumes the ticket number.
    pub fn issue<E, S>(
        &self,
        single_response: bool,
        uri_search: bool,
        encode: E,
        enqueue: S,
    ) -> Result<u32>
    where
        E: FnOnce(u32) -> Result<Vec<u8>>,
        S: FnOnce(Vec<u8>) -> Result<()>,
    {
        let mut state = self.lock();
        let ticket = state.next_ticket;
        state.next_ticket += 1;
        state
            .pending
            .insert(ticket, PendingRequest::new(single_response));
        if uri_search {
            state.search_order.push_back(ticket);
        }

        let result = encode(ticket).and_then(enqueue);
        if let Err(error) = result {
            state.pending.remove(&ticket);
            if uri_search {
                state.search_order.pop_back();
            }
            return Err(error);
        }
        Ok(ticket)
    }

    /// REQUEST_COMPLETE: append the terminal marker.
    pub fn on_complete(&self, ticket: u32) {
        {
            let mut state = self.lock();
            if let Some(request) = state.pending.get_mut(&ticket) {
                request.push_terminal();
            }
        }
        self.notify.notify_waiters();
    }

    /// DATA_RESPONSE: store attributes into the ticket's last slot.
    ///
    /// Frames for unknown or cancelled tickets are dropped silently; the
    /// server may keep sending briefly after a cancel.
    pub fn on_data(&self, bundle: DataBundle) {
        {
            let mut state = self.lock();
            let Some(request) = state.pending.get_mut(&bundle.ticket) else {
                tracing::debug!(ticket = bundle.ticket, "data for untracked ticket dropped");
                return;
            };
            if request.cancelled {
                return;
            }
            let Some(Some(slot)) = request.slots.back_mut() else {
                tracing::debug!(ticket = bundle.ticket, "data after completion dropped");
                return;
            };
            slot.insert(bundle.uri, bundle.attributes);
            if !request.single_response {
                // Each step accumulates separately.
                request.slots.push_back(Some(ResultSlot::new()));
            }
        }
        self.notify.notify_waiters();
    }

    /// URI_RESPONSE: correlate with the oldest outstanding search.
    ///
    /// Each name becomes an entry with an empty attribute list; the search
    /// is then complete (always single-response).
    pub fn on_uri_response(&self, uris: Vec<String>) {
        {
            let mut state = self.lock();
            let Some(ticket) = state.search_order.pop_front() else {
                tracing::warn!("URI response with no outstanding search");
                return;
            };
            if let Some(request) = state.pending.get_mut(&ticket) {
                if !request.cancelled {
                    if let Some(Some(slot)) = request.slots.back_mut() {
                        for uri in uris {
                            slot.insert(uri, Vec::new());
                        }
                    }
                }
                request.push_terminal();
            }
        }
        self.notify.notify_waiters();
    }

    /// Record a failure against one ticket.
    pub fn record_error(&self, ticket: u32, error: RequestError) {
        {
            let mut state = self.lock();
            if !state.pending.contains_key(&ticket) {
                return;
            }
            state.errors.insert(ticket, error);
        }
        self.notify.notify_waiters();
    }

    /// The connection died: fail every pending ticket and wake all waiters.
    pub fn fail_all(&self, error: RequestError) {
        {
            let mut state = self.lock();
            let tickets: Vec<u32> = state.pending.keys().copied().collect();
            for ticket in tickets {
                state.errors.entry(ticket).or_insert_with(|| error.clone());
            }
        }
        self.notify.notify_waiters();
    }

    /// Mark a ticket cancelled: stop accepting data and let the next poll
    /// observe "complete, no more data". Buffered slots stay drainable.
    pub fn cancel(&self, ticket: u32) {
        {
            let mut state = self.lock();
            if let Some(request) = state.pending.get_mut(&ticket) {
                request.cancelled = true;
                request.push_terminal();
            }
        }
        self.notify.notify_waiters();
    }

    /// True if the ticket is unknown (already drained) or its queue ends
    /// with the terminal marker; false while results may still arrive.
    pub fn is_complete(&self, ticket: u32) -> bool {
        let state = self.lock();
        match state.pending.get(&ticket) {
            None => true,
            Some(request) => request.is_complete(),
        }
    }

    /// True iff at least one fully buffered, non-terminal slot is ready.
    pub fn has_next(&self, ticket: u32) -> bool {
        let state = self.lock();
        state
            .pending
            .get(&ticket)
            .map_or(false, |request| request.slots.len() > 1)
    }

    /// Pop the oldest buffered slot, or fail with `NoData`.
    ///
    /// Draining the last slot of a completed ticket erases its tracking
    /// state and any stored error; the ticket is never reused.
    pub fn take_next(&self, ticket: u32) -> Result<ResultSlot> {
        let mut state = self.lock();
        Self::take_next_locked(&mut state, ticket)
    }

    fn take_next_locked(state: &mut MuxState, ticket: u32) -> Result<ResultSlot> {
        let Some(request) = state.pending.get_mut(&ticket) else {
            return Err(GrailError::NoData(ticket));
        };
        if request.slots.len() < 2 {
            return Err(GrailError::NoData(ticket));
        }

        // The terminal marker only ever sits at the back, so the front of a
        // queue longer than one is always a real slot.
        let slot = request
            .slots
            .pop_front()
            .flatten()
            .expect("terminal marker at queue front");

        if request.is_complete() && request.slots.len() == 1 {
            state.pending.remove(&ticket);
            state.errors.remove(&ticket);
        }
        Ok(slot)
    }

    /// Non-blocking error peek.
    pub fn has_error(&self, ticket: u32) -> bool {
        self.lock().errors.contains_key(&ticket)
    }

    /// Copy of the stored error, if any.
    pub fn get_error(&self, ticket: u32) -> Option<RequestError> {
        self.lock().errors.get(&ticket).cloned()
    }

    /// Suspend until a slot, an error, or exhaustion is observed for this
    /// ticket, then consume it.
    ///
    /// This is the blocking primitive behind both futures and streams. A
    /// stored error wins over buffered data; a drained ticket fails with
    /// `NoData` instead of blocking forever.
    pub async fn next_slot(&self, ticket: u32) -> Result<ResultSlot> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a dispatch between the check and
            // the await still wakes us.
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if let Some(error) = state.errors.get(&ticket) {
                    return Err(error.clone().into());
                }
                let (tracked, ready) = match state.pending.get(&ticket) {
                    None => (false, false),
                    Some(request) => (true, request.slots.len() > 1),
                };
                if !tracked {
                    return Err(GrailError::NoData(ticket));
                }
                if ready {
                    return Self::take_next_locked(&mut state, ticket);
                }
            }

            notified.as_mut().await;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MuxState> {
        self.state.lock().expect("multiplexer lock poisoned")
    }
}

impl Default for RequestMultiplexer {
    fn default() -> Self {
        Self::new()
    }
}
