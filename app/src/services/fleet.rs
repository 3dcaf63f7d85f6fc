//! Supervisor view of the trucks they manage.

use std::sync::Arc;

use adapters::{Document, DocumentStore};

use crate::auth::models::SupervisorProfile;

use super::location_tracker::RouteStatus;
use super::Feed;

#[derive(Debug, Clone, PartialEq)]
pub struct TruckSummary {
    pub truck_id: String,
    pub driver_name: String,
    pub number_plate: String,
    pub phone_number: Option<String>,
    pub route_status: RouteStatus,
}

impl TruckSummary {
    pub fn from_document(document: &Document) -> Self {
        let route_status = match document.str_field("routeStatus") {
            None => RouteStatus::Idle,
            Some(raw) => RouteStatus::parse(raw).unwrap_or_else(|| {
                tracing::warn!(truck = document.id(), status = raw, "unknown route status");
                RouteStatus::Idle
            }),
        };
        Self {
            truck_id: document.id().to_string(),
            driver_name: document
                .str_field("driverName")
                .unwrap_or("Unnamed Driver")
                .to_string(),
            number_plate: document
                .str_field("numberPlate")
                .unwrap_or("No Plate")
                .to_string(),
            phone_number: document.str_field("phoneNumber").map(str::to_string),
            route_status,
        }
    }
}

fn to_summaries(documents: Vec<Document>) -> Vec<TruckSummary> {
    documents.iter().map(TruckSummary::from_document).collect()
}

#[derive(Clone)]
pub struct FleetService {
    docs: Arc<dyn DocumentStore>,
}

impl FleetService {
    pub fn new(docs: Arc<dyn DocumentStore>) -> Self {
        Self { docs }
    }

    /// Live list of the supervisor's trucks.
    pub fn subscribe_trucks(&self, supervisor: &SupervisorProfile) -> Feed<Vec<TruckSummary>> {
        Feed::new(self.docs.subscribe(&supervisor.trucks()), to_summaries)
    }
}

/// Trucks that can still take a ticket.
pub fn available_drivers(trucks: &[TruckSummary]) -> Vec<TruckSummary> {
    trucks
        .iter()
        .filter(|truck| truck.route_status != RouteStatus::Completed)
        .cloned()
        .collect()
}

/// Case-insensitive search over driver name, truck id and number plate.
pub fn filter_trucks(
    trucks: &[TruckSummary],
    query: &str,
    status: Option<RouteStatus>,
) -> Vec<TruckSummary> {
    let query = query.trim().to_lowercase();
    trucks
        .iter()
        .filter(|truck| {
            query.is_empty()
                || [&truck.driver_name, &truck.truck_id, &truck.number_plate]
                    .into_iter()
                    .any(|field| field.to_lowercase().contains(&query))
        })
        .filter(|truck| status.map_or(true, |status| truck.route_status == status))
        .cloned()
        .collect()
}
