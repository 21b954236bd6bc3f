//! Debounced re-querying as the map viewport moves.
//!
//! [`ViewportController`] is a synchronous state machine over explicit instants: it
//! decides when a requery is due, which responses are still current, and which viewport
//! events were caused by its own camera moves. [`ViewportSession`] drives it on tokio.
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::model::{BoundingBox, SearchQuery, SearchResult};

mod session;

pub use session::{ViewportCommand, ViewportHandle, ViewportSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    SearchIssued,
    AwaitingViewportSettle,
}

/// What started a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOrigin {
    User { fit_view: bool },
    Requery,
}

/// Identifies one issued search; completions carry it back to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchTicket {
    pub generation: u64,
    pub origin: SearchOrigin,
}

/// How a viewport-change event was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewportEvent {
    /// Dropped because it echoed the controller's own camera fit.
    Suppressed,
    /// Dropped because nothing has been searched yet.
    Ignored,
    /// A requery is due at the deadline unless another event arrives first.
    Scheduled { deadline: Instant },
}

/// A search result that is still current, ready to show.
#[derive(Debug, Clone)]
pub struct ViewportUpdate {
    pub generation: u64,
    pub origin: SearchOrigin,
    pub result: SearchResult,
    /// Whether the view should be fitted to the results. Requeries never recenter.
    pub recenter: bool,
}

#[derive(Debug, Clone)]
pub struct ViewportController {
    quiet_period: Duration,
    state: ControllerState,
    generation: u64,
    last_query: Option<SearchQuery>,
    suppress_next_event: bool,
    pending: Option<(BoundingBox, Instant)>,
    /// Generation of the latest user search, until it completes.
    user_in_flight: Option<u64>,
    /// Generation of the last issued requery, until it completes, even once superseded.
    requery_in_flight: Option<u64>,
}

impl ViewportController {
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            state: ControllerState::Idle,
            generation: 0,
            last_query: None,
            suppress_next_event: false,
            pending: None,
            user_in_flight: None,
            requery_in_flight: None,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Record a user-initiated search. Any pending or in-flight requery is superseded.
    pub fn begin_search(&mut self, query: &SearchQuery, fit_view: bool) -> SearchTicket {
        self.generation += 1;
        self.last_query = Some(query.clone());
        self.pending = None;
        self.user_in_flight = Some(self.generation);
        self.state = ControllerState::SearchIssued;
        debug!(generation = self.generation, keyword = %query.keyword, "User search issued");
        SearchTicket {
            generation: self.generation,
            origin: SearchOrigin::User { fit_view },
        }
    }

    /// Feed a pan/zoom event.
    pub fn on_viewport_change(&mut self, bbox: BoundingBox, now: Instant) -> ViewportEvent {
        if self.suppress_next_event {
            self.suppress_next_event = false;
            debug!(bbox = %bbox, "Suppressed viewport event from camera fit");
            return ViewportEvent::Suppressed;
        }
        if self.last_query.is_none() {
            return ViewportEvent::Ignored;
        }
        let deadline = now + self.quiet_period;
        self.pending = Some((bbox, deadline));
        if self.state == ControllerState::Idle {
            self.state = ControllerState::AwaitingViewportSettle;
        }
        ViewportEvent::Scheduled { deadline }
    }

    /// When the pending requery should be polled, if one can fire.
    ///
    /// `None` while a user search or an earlier requery is still running, so a requery
    /// never overlaps another requery and never supersedes the user's own search.
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.user_in_flight.is_some() || self.requery_in_flight.is_some() {
            return None;
        }
        self.pending.map(|(_, deadline)| deadline)
    }

    /// Issue the debounced requery once its quiet period has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<(SearchTicket, SearchQuery)> {
        let deadline = self.next_deadline()?;
        if now < deadline {
            return None;
        }
        let (bbox, _) = self.pending.take()?;
        let query = self.last_query.as_ref()?.requery(bbox);

        self.generation += 1;
        self.requery_in_flight = Some(self.generation);
        self.state = ControllerState::SearchIssued;
        debug!(generation = self.generation, bbox = %bbox, "Viewport requery issued");
        Some((
            SearchTicket {
                generation: self.generation,
                origin: SearchOrigin::Requery,
            },
            query,
        ))
    }

    /// Accept a finished search, or drop it when a newer search has been issued since.
    pub fn complete(&mut self, ticket: SearchTicket, result: SearchResult) -> Option<ViewportUpdate> {
        self.release(ticket);
        if ticket.generation != self.generation {
            debug!(
                stale = ticket.generation,
                current = self.generation,
                "Discarding stale search response"
            );
            return None;
        }

        let recenter = match ticket.origin {
            SearchOrigin::User { fit_view } => fit_view && !result.pois.is_empty(),
            SearchOrigin::Requery => false,
        };
        if recenter {
            // The fit moves the camera away from any box panned to while searching.
            self.suppress_next_event = true;
            self.pending = None;
        }
        self.settle();

        Some(ViewportUpdate {
            generation: ticket.generation,
            origin: ticket.origin,
            result,
            recenter,
        })
    }

    /// Forget a search whose task ended without a result.
    pub fn abandon(&mut self, ticket: SearchTicket) {
        self.release(ticket);
        if ticket.generation == self.generation {
            warn!(generation = ticket.generation, "Current search was abandoned");
            self.settle();
        }
    }

    fn release(&mut self, ticket: SearchTicket) {
        let slot = match ticket.origin {
            SearchOrigin::User { .. } => &mut self.user_in_flight,
            SearchOrigin::Requery => &mut self.requery_in_flight,
        };
        if *slot == Some(ticket.generation) {
            *slot = None;
        }
    }

    fn settle(&mut self) {
        self.state = if self.pending.is_some() {
            ControllerState::AwaitingViewportSettle
        } else {
            ControllerState::Idle
        };
    }
}
