//! Ward tickets raised by residents and handled by supervisors.

use std::cmp::Reverse;
use std::sync::Arc;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use adapters::{AdapterError, Document, DocumentStore, Fields};

use crate::auth::models::{SupervisorProfile, WardRef};

use super::fleet::TruckSummary;
use super::Feed;

pub const UNKNOWN_SUPERVISOR: &str = "Unknown Supervisor";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Pending,
    Assigned,
    Resolved,
    Cancelled,
}

impl TicketStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(TicketStatus::Pending),
            "assigned" => Some(TicketStatus::Assigned),
            "resolved" => Some(TicketStatus::Resolved),
            "cancelled" => Some(TicketStatus::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Pending => "pending",
            TicketStatus::Assigned => "assigned",
            TicketStatus::Resolved => "resolved",
            TicketStatus::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(self, next: TicketStatus) -> bool {
        use TicketStatus::*;
        matches!(
            (self, next),
            (Pending, Assigned) | (Pending, Cancelled) | (Assigned, Resolved) | (Assigned, Cancelled)
        )
    }
}

#[derive(Debug, Error)]
pub enum TicketError {
    #[error("ticket `{0}` not found")]
    NotFound(String),

    #[error("unknown ticket status `{0}`")]
    UnknownStatus(String),

    #[error("cannot move ticket from {} to {}", .from.as_str(), .to.as_str())]
    InvalidTransition { from: TicketStatus, to: TicketStatus },

    #[error("ticket update failed: {0}")]
    Backend(#[from] AdapterError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ticket {
    pub id: String,
    pub status: TicketStatus,
    pub user_name: Option<String>,
    pub waste_type: Option<String>,
    pub issue_type: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub assigned_to: Option<String>,
    pub assigned_driver: Option<String>,
    /// The full ticket document.
    pub data: Fields,
}

impl Ticket {
    /// A missing status reads as pending.
    pub fn from_document(document: &Document) -> Result<Self, TicketError> {
        let status = match document.str_field("status") {
            None => TicketStatus::Pending,
            Some(raw) => {
                TicketStatus::parse(raw).ok_or_else(|| TicketError::UnknownStatus(raw.to_string()))?
            }
        };
        let text = |key: &str| document.str_field(key).map(str::to_string);
        let time = |key: &str| document.data.get(key).and_then(parse_time);

        Ok(Self {
            id: document.id().to_string(),
            status,
            user_name: text("userName"),
            waste_type: text("wasteType"),
            issue_type: text("issueType"),
            created_at: time("createdAt"),
            updated_at: time("updatedAt"),
            resolved_at: time("resolvedAt"),
            assigned_to: text("assignedTo"),
            assigned_driver: text("assignedDriver"),
            data: document.data.clone(),
        })
    }
}

fn parse_time(value: &Value) -> Option<DateTime<Utc>> {
    let raw = value.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Newest first; tickets without `createdAt` go last.
fn to_sorted_tickets(documents: Vec<Document>) -> Vec<Ticket> {
    let mut tickets: Vec<Ticket> = documents
        .iter()
        .filter_map(|document| match Ticket::from_document(document) {
            Ok(ticket) => Some(ticket),
            Err(err) => {
                tracing::warn!(path = %document.path, error = %err, "skipping malformed ticket");
                None
            }
        })
        .collect();
    tickets.sort_by_key(|ticket| Reverse(ticket.created_at));
    tickets
}

fn count_pending(documents: Vec<Document>) -> usize {
    to_sorted_tickets(documents)
        .iter()
        .filter(|ticket| ticket.status == TicketStatus::Pending)
        .count()
}

#[derive(Clone)]
pub struct TicketService {
    docs: Arc<dyn DocumentStore>,
}

impl TicketService {
    pub fn new(docs: Arc<dyn DocumentStore>) -> Self {
        Self { docs }
    }

    /// Live ticket list for `ward`, newest first.
    pub fn subscribe(&self, ward: &WardRef) -> Feed<Vec<Ticket>> {
        Feed::new(self.docs.subscribe(&ward.tickets()), to_sorted_tickets)
    }

    /// Live pending-ticket count for `ward`, for badge display.
    pub fn subscribe_pending_count(&self, ward: &WardRef) -> Feed<usize> {
        Feed::new(self.docs.subscribe(&ward.tickets()), count_pending)
    }

    /// Number of pending tickets in `ward`. Lookup failures count as zero.
    pub async fn pending_count(&self, ward: &WardRef) -> usize {
        match self.docs.list(&ward.tickets()).await {
            Ok(documents) => count_pending(documents),
            Err(err) => {
                tracing::error!(error = %err, "error fetching pending tickets count");
                0
            }
        }
    }

    pub async fn get(&self, ward: &WardRef, ticket_id: &str) -> Result<Ticket, TicketError> {
        let path = ward.tickets().doc(ticket_id);
        let document = self
            .docs
            .get(&path)
            .await?
            .ok_or_else(|| TicketError::NotFound(ticket_id.to_string()))?;
        Ticket::from_document(&document)
    }

    /// Assign a pending ticket to `driver` on behalf of `supervisor`.
    pub async fn assign(
        &self,
        ward: &WardRef,
        ticket_id: &str,
        driver: &TruckSummary,
        supervisor: &SupervisorProfile,
    ) -> Result<(), TicketError> {
        let ticket = self.get(ward, ticket_id).await?;
        check_transition(ticket.status, TicketStatus::Assigned)?;

        let now = now_rfc3339();
        let mut fields = Fields::new();
        fields.insert("status".into(), json!(TicketStatus::Assigned.as_str()));
        fields.insert("assignedTo".into(), json!(driver.truck_id));
        fields.insert("assignedDriver".into(), json!(driver.driver_name));
        fields.insert(
            "assignedByName".into(),
            json!(supervisor.name().unwrap_or(UNKNOWN_SUPERVISOR)),
        );
        fields.insert("assignedBySupervisorId".into(), json!(supervisor.supervisor_id));
        fields.insert("assignedAt".into(), json!(now));
        fields.insert("updatedAt".into(), json!(now));

        self.docs.update(&ward.tickets().doc(ticket_id), fields).await?;
        tracing::info!(ticket = ticket_id, truck = %driver.truck_id, "ticket assigned");
        Ok(())
    }

    pub async fn update_status(
        &self,
        ward: &WardRef,
        ticket_id: &str,
        next: TicketStatus,
    ) -> Result<(), TicketError> {
        let ticket = self.get(ward, ticket_id).await?;
        check_transition(ticket.status, next)?;

        let now = now_rfc3339();
        let mut fields = Fields::new();
        fields.insert("status".into(), json!(next.as_str()));
        fields.insert("updatedAt".into(), json!(now));
        if next == TicketStatus::Resolved {
            fields.insert("resolvedAt".into(), json!(now));
        }
        self.docs.update(&ward.tickets().doc(ticket_id), fields).await?;
        tracing::info!(ticket = ticket_id, status = next.as_str(), "ticket status updated");
        Ok(())
    }
}

fn check_transition(from: TicketStatus, to: TicketStatus) -> Result<(), TicketError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(TicketError::InvalidTransition { from, to })
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Case-insensitive search over user name, waste type and issue type,
/// optionally narrowed to one status.
pub fn filter_tickets(tickets: &[Ticket], query: &str, status: Option<TicketStatus>) -> Vec<Ticket> {
    let query = query.trim().to_lowercase();
    tickets
        .iter()
        .filter(|ticket| {
            query.is_empty()
                || [&ticket.user_name, &ticket.waste_type, &ticket.issue_type]
                    .into_iter()
                    .flatten()
                    .any(|field| field.to_lowercase().contains(&query))
        })
        .filter(|ticket| status.map_or(true, |status| ticket.status == status))
        .cloned()
        .collect()
}

/// Tickets created in the 24 hours before `now`.
pub fn recent(tickets: &[Ticket], now: DateTime<Utc>) -> Vec<Ticket> {
    let cutoff = now - Duration::hours(24);
    tickets
        .iter()
        .filter(|ticket| ticket.created_at.is_some_and(|created| created > cutoff))
        .cloned()
        .collect()
}

pub fn format_time_ago(timestamp: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(timestamp) = timestamp else {
        return String::new();
    };
    let millis = (now - timestamp).num_milliseconds();
    let seconds = (millis as f64 / 1000.0).round() as i64;
    if seconds < 60 {
        return "just now".to_string();
    }
    let minutes = seconds / 60;
    if minutes < 60 {
        return format!("{minutes}m ago");
    }
    let hours = minutes / 60;
    if hours < 24 {
        return format!("{hours}h ago");
    }
    let days = hours / 24;
    if days < 30 {
        return format!("{days}d ago");
    }
    format!("{}mo ago", days / 30)
}
