//! Module for the provider-facing business services.
//!
//! Each service talks to the backend through the `adapters` ports: live truck
//! tracking for drivers, ward tickets and fleet overviews for supervisors,
//! and contact actions shared by both.

use adapters::{Document, Subscription};

pub mod contact;
pub mod fleet;
pub mod location_tracker;
pub mod tickets;

pub use contact::{ContactError, ContactService};
pub use fleet::{available_drivers, filter_trucks, FleetService, TruckSummary};
pub use location_tracker::{RouteStatus, TrackingError, TrackingStatus, TruckTracker};
pub use tickets::{
    filter_tickets, format_time_ago, recent, Ticket, TicketError, TicketService, TicketStatus,
};

/// Typed view over a live collection subscription.
///
/// Every backend snapshot is converted with the feed's mapping function.
/// Dropping the feed unsubscribes.
pub struct Feed<T> {
    inner: Subscription<Vec<Document>>,
    map: fn(Vec<Document>) -> T,
}

impl<T> Feed<T> {
    pub(crate) fn new(inner: Subscription<Vec<Document>>, map: fn(Vec<Document>) -> T) -> Self {
        Self { inner, map }
    }

    /// Next snapshot, or `None` once the backend has closed the subscription.
    pub async fn next(&mut self) -> Option<T> {
        self.inner.recv().await.map(self.map)
    }
}
