//! Data structures for authentication-related entities.
//!
//! This module defines the provider roles, the role-specific profiles and the
//! persisted [`SessionRecord`]. A record always carries a profile matching its
//! role; it can only be deserialized through [`super::validator::validate`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use adapters::{DocPath, Fields};

use super::errors::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Supervisor,
    Driver,
}

impl Role {
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "supervisor" => Some(Role::Supervisor),
            "driver" => Some(Role::Driver),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Supervisor => "supervisor",
            Role::Driver => "driver",
        }
    }

    /// Required prefix of the role's login identifier.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Role::Supervisor => "SUP",
            Role::Driver => "TRUCK",
        }
    }

    /// Profile field holding the role's login identifier.
    pub fn id_field(&self) -> &'static str {
        match self {
            Role::Supervisor => "supervisorId",
            Role::Driver => "truckId",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Council / district / ward triple addressing a ward in the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WardRef {
    pub municipal_council: String,
    pub district: String,
    pub ward: String,
}

impl WardRef {
    /// `municipalCouncils/{council}/Districts/{district}/Wards/{ward}`
    pub fn doc_path(&self) -> DocPath {
        DocPath::collection("municipalCouncils")
            .doc(&self.municipal_council)
            .sub("Districts")
            .doc(&self.district)
            .sub("Wards")
            .doc(&self.ward)
    }

    pub fn tickets(&self) -> DocPath {
        self.doc_path().sub("tickets")
    }

    pub fn supervisor(&self, supervisor_id: &str) -> DocPath {
        self.doc_path().sub("supervisors").doc(supervisor_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupervisorProfile {
    pub supervisor_id: String,
    pub municipal_council: String,
    pub district: String,
    pub ward: String,
    /// Any further fields of the supervisor document (name, phone, ...).
    #[serde(flatten)]
    pub extra: Fields,
}

impl SupervisorProfile {
    pub fn ward_ref(&self) -> WardRef {
        WardRef {
            municipal_council: self.municipal_council.clone(),
            district: self.district.clone(),
            ward: self.ward.clone(),
        }
    }

    pub fn doc_path(&self) -> DocPath {
        self.ward_ref().supervisor(&self.supervisor_id)
    }

    pub fn trucks(&self) -> DocPath {
        self.doc_path().sub("trucks")
    }

    pub fn name(&self) -> Option<&str> {
        self.extra.get("name").and_then(|v| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverProfile {
    pub truck_id: String,
    pub municipal_council: String,
    pub district: String,
    pub ward: String,
    /// Supervisor owning the truck.
    pub supervisor_id: String,
    #[serde(flatten)]
    pub extra: Fields,
}

impl DriverProfile {
    pub fn ward_ref(&self) -> WardRef {
        WardRef {
            municipal_council: self.municipal_council.clone(),
            district: self.district.clone(),
            ward: self.ward.clone(),
        }
    }

    /// `.../supervisors/{supervisor}/trucks/{truck}`
    pub fn truck_path(&self) -> DocPath {
        self.ward_ref()
            .supervisor(&self.supervisor_id)
            .sub("trucks")
            .doc(&self.truck_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ProviderProfile {
    Supervisor(SupervisorProfile),
    Driver(DriverProfile),
}

impl ProviderProfile {
    pub fn role(&self) -> Role {
        match self {
            ProviderProfile::Supervisor(_) => Role::Supervisor,
            ProviderProfile::Driver(_) => Role::Driver,
        }
    }

    pub fn ward_ref(&self) -> WardRef {
        match self {
            ProviderProfile::Supervisor(p) => p.ward_ref(),
            ProviderProfile::Driver(p) => p.ward_ref(),
        }
    }

    /// The login identifier (`SUP...` or `TRUCK...`).
    pub fn provider_id(&self) -> &str {
        match self {
            ProviderProfile::Supervisor(p) => &p.supervisor_id,
            ProviderProfile::Driver(p) => &p.truck_id,
        }
    }
}

/// The single locally persisted "who is logged in" record.
///
/// Wire layout: `{uid, email, userType, profile, timestamp}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "serde_json::Value")]
pub struct SessionRecord {
    uid: String,
    email: String,
    profile: ProviderProfile,
    timestamp: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(
        uid: impl Into<String>,
        email: impl Into<String>,
        profile: ProviderProfile,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            uid: uid.into(),
            email: email.into(),
            profile,
            timestamp,
        }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn role(&self) -> Role {
        self.profile.role()
    }

    pub fn profile(&self) -> &ProviderProfile {
        &self.profile
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn supervisor(&self) -> Option<&SupervisorProfile> {
        match &self.profile {
            ProviderProfile::Supervisor(p) => Some(p),
            ProviderProfile::Driver(_) => None,
        }
    }

    pub fn driver(&self) -> Option<&DriverProfile> {
        match &self.profile {
            ProviderProfile::Driver(p) => Some(p),
            ProviderProfile::Supervisor(_) => None,
        }
    }
}

impl Serialize for SessionRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut record = serializer.serialize_struct("SessionRecord", 5)?;
        record.serialize_field("uid", &self.uid)?;
        record.serialize_field("email", &self.email)?;
        record.serialize_field("userType", &self.role())?;
        record.serialize_field("profile", &self.profile)?;
        record.serialize_field("timestamp", &self.timestamp)?;
        record.end()
    }
}

impl TryFrom<serde_json::Value> for SessionRecord {
    type Error = ValidationError;

    fn try_from(raw: serde_json::Value) -> Result<Self, Self::Error> {
        super::validator::validate(&raw)
    }
}
