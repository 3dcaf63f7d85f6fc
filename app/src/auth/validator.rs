//! Shape checks for persisted session records.
//!
//! Pure functions: no I/O, no mutation. A field counts as present only when
//! it is a non-empty string.

use chrono::{DateTime, Utc};
use serde_json::Value;

use adapters::Fields;

use super::errors::ValidationError;
use super::models::{DriverProfile, ProviderProfile, Role, SessionRecord, SupervisorProfile};

pub const SUPERVISOR_FIELDS: [&str; 4] = ["supervisorId", "municipalCouncil", "district", "ward"];

pub const DRIVER_FIELDS: [&str; 5] = [
    "truckId",
    "municipalCouncil",
    "district",
    "ward",
    "supervisorId",
];

/// Validate a raw stored record and convert it into a [`SessionRecord`].
pub fn validate(raw: &Value) -> Result<SessionRecord, ValidationError> {
    let record = raw.as_object().ok_or(ValidationError::NotAnObject)?;

    let uid = required(record, "uid")?;
    let email = required(record, "email")?;
    let tag = required(record, "userType")?;
    let role = Role::parse(tag).ok_or_else(|| ValidationError::UnknownRole(tag.to_string()))?;
    let profile = record
        .get("profile")
        .and_then(Value::as_object)
        .ok_or(ValidationError::MissingField("profile"))?;
    let profile = validate_profile(role, profile)?;
    let timestamp = parse_timestamp(required(record, "timestamp")?)?;

    Ok(SessionRecord::new(uid, email, profile, timestamp))
}

/// Check `fields` against the required set for `role` and split off the
/// extra fields.
pub fn validate_profile(role: Role, fields: &Fields) -> Result<ProviderProfile, ValidationError> {
    let id = required(fields, role.id_field())?;
    if !id.starts_with(role.id_prefix()) {
        return Err(ValidationError::BadIdentifier {
            field: role.id_field(),
            value: id.to_string(),
            prefix: role.id_prefix(),
        });
    }

    let profile = match role {
        Role::Supervisor => {
            if fields.contains_key("truckId") {
                return Err(ValidationError::RoleMismatch {
                    role,
                    field: "truckId",
                });
            }
            ProviderProfile::Supervisor(SupervisorProfile {
                supervisor_id: id.to_string(),
                municipal_council: required(fields, "municipalCouncil")?.to_string(),
                district: required(fields, "district")?.to_string(),
                ward: required(fields, "ward")?.to_string(),
                extra: extra_fields(fields, &SUPERVISOR_FIELDS),
            })
        }
        Role::Driver => ProviderProfile::Driver(DriverProfile {
            truck_id: id.to_string(),
            municipal_council: required(fields, "municipalCouncil")?.to_string(),
            district: required(fields, "district")?.to_string(),
            ward: required(fields, "ward")?.to_string(),
            supervisor_id: required(fields, "supervisorId")?.to_string(),
            extra: extra_fields(fields, &DRIVER_FIELDS),
        }),
    };
    Ok(profile)
}

fn required<'a>(fields: &'a Fields, key: &'static str) -> Result<&'a str, ValidationError> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or(ValidationError::MissingField(key))
}

fn extra_fields(fields: &Fields, known: &[&str]) -> Fields {
    fields
        .iter()
        .filter(|(key, _)| !known.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ValidationError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| ValidationError::BadTimestamp(raw.to_string()))
}
