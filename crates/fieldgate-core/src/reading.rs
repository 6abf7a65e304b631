// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Point readings.
//!
//! A [`PointReading`] is one property-set snapshot of a single controller
//! point. Readings are produced by the read cascade, handed to the point
//! store, and later serialized for upload by [`crate::wire`].
//!
//! Scalar properties are normalized to strings with [`normalize_value`].
//! Structured properties (status flags, priority arrays, bit fields,
//! timestamp arrays, object references) are kept as JSON text with
//! [`encode_json`] so that the stored form stays flat; the wire layer parses
//! them back.
//!
//! # Example
//!
//! ```rust,ignore
//! let reading = ReadingBuilder::new(identity).from_properties(&properties)?;
//! assert!(reading.error().is_none());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{DriverError, ReadingError};
use crate::types::{ControllerAddress, DeviceInstance, ObjectId, PropertyId, PropertyMap};

/// Stage name recorded on readings that fell back to a present-value-only read.
pub const PROPERTY_READ_STAGE: &str = "property_read";

// =============================================================================
// Value normalization
// =============================================================================

/// Normalizes a raw property value into its stored string form.
///
/// Strings are kept verbatim, numbers and booleans use their display form,
/// arrays and objects become compact JSON, and `null` yields `None`.
///
/// # Examples
///
/// ```
/// use fieldgate_core::reading::normalize_value;
/// use serde_json::json;
///
/// assert_eq!(normalize_value(&json!(21.5)), Some("21.5".to_string()));
/// assert_eq!(normalize_value(&json!([1, 0, 0, 0])), Some("[1,0,0,0]".to_string()));
/// assert_eq!(normalize_value(&json!(null)), None);
/// ```
pub fn normalize_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

/// Encodes a structured property value as JSON text.
///
/// Unlike [`normalize_value`] a string stays quoted, so the stored form
/// always parses back.
///
/// # Examples
///
/// ```
/// use fieldgate_core::reading::encode_json;
/// use serde_json::json;
///
/// assert_eq!(encode_json(&json!("binary-value:3")), Some("\"binary-value:3\"".to_string()));
/// assert_eq!(encode_json(&json!([1, 0])), Some("[1,0]".to_string()));
/// assert_eq!(encode_json(&json!(null)), None);
/// ```
pub fn encode_json(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        _ => Some(value.to_string()),
    }
}

fn as_flag(property: PropertyId, value: &Value) -> Result<Option<bool>, ReadingError> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(*b)),
        Value::Number(n) => match n.as_u64() {
            Some(0) => Ok(Some(false)),
            Some(1) => Ok(Some(true)),
            _ => Err(invalid(property, "expected boolean")),
        },
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "active" | "1" => Ok(Some(true)),
            "false" | "inactive" | "0" => Ok(Some(false)),
            _ => Err(invalid(property, "expected boolean")),
        },
        _ => Err(invalid(property, "expected boolean")),
    }
}

fn invalid(property: PropertyId, reason: &str) -> ReadingError {
    ReadingError::InvalidProperty {
        property: property.as_str().to_string(),
        reason: reason.to_string(),
    }
}

// =============================================================================
// Reading parts
// =============================================================================

/// Which point a reading belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointIdentity {
    /// Controller device instance.
    pub controller: DeviceInstance,
    /// Controller network address.
    pub address: ControllerAddress,
    /// Object type and instance.
    pub object: ObjectId,
    /// External point ID.
    pub iot_point_id: Uuid,
}

/// Health block of a reading.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointHealth {
    /// JSON-encoded status flags array.
    pub status_flags: Option<String>,
    /// Event state.
    pub event_state: Option<String>,
    /// Out-of-service flag.
    pub out_of_service: Option<bool>,
    /// Reliability code.
    pub reliability: Option<String>,
}

/// Optional-property block of a reading.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedProperties {
    /// High limit.
    pub high_limit: Option<String>,
    /// Low limit.
    pub low_limit: Option<String>,
    /// Deadband.
    pub deadband: Option<String>,
    /// JSON-encoded bit field.
    pub limit_enable: Option<String>,
    /// JSON-encoded 16-slot array.
    pub priority_array: Option<String>,
    /// Relinquish default.
    pub relinquish_default: Option<String>,
    /// Notification class.
    pub notification_class: Option<String>,
    /// Notify type.
    pub notify_type: Option<String>,
    /// JSON-encoded bit field.
    pub event_enable: Option<String>,
    /// JSON-encoded bit field.
    pub acked_transitions: Option<String>,
    /// JSON-encoded timestamp array.
    pub event_time_stamps: Option<String>,
    /// JSON-encoded string array.
    pub event_message_texts: Option<String>,
    /// Event algorithm inhibit.
    pub event_algorithm_inhibit: Option<bool>,
    /// JSON-encoded object reference.
    pub event_algorithm_inhibit_ref: Option<String>,
    /// Event detection enable.
    pub event_detection_enable: Option<bool>,
    /// Time delay.
    pub time_delay: Option<String>,
    /// Time delay normal.
    pub time_delay_normal: Option<String>,
    /// COV increment.
    pub cov_increment: Option<String>,
    /// Engineering units.
    pub units: Option<String>,
}

impl ExtendedProperties {
    /// Returns `true` if no optional property is set.
    pub fn is_empty(&self) -> bool {
        self == &ExtendedProperties::default()
    }
}

/// Structured record of why a reading is partial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadAnnotation {
    /// Stage that failed.
    pub stage: String,
    /// Rendered failure.
    pub message: String,
    /// Failure kind.
    pub kind: String,
}

impl ReadAnnotation {
    /// Builds an annotation for a failed driver call at `stage`.
    pub fn from_driver_error(stage: &str, error: &DriverError) -> Self {
        Self {
            stage: stage.to_string(),
            message: error.to_string(),
            kind: error.error_type().to_string(),
        }
    }
}

// =============================================================================
// PointReading
// =============================================================================

/// One property-set snapshot of a controller point.
///
/// Readings are immutable once built; use [`ReadingBuilder`] to create them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointReading {
    id: Uuid,
    identity: PointIdentity,
    present_value: Option<String>,
    health: PointHealth,
    extended: ExtendedProperties,
    error: Option<ReadAnnotation>,
    read_at: DateTime<Utc>,
}

impl PointReading {
    /// Unique reading ID.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Point identity.
    pub fn identity(&self) -> &PointIdentity {
        &self.identity
    }

    /// String-normalized present value.
    pub fn present_value(&self) -> Option<&str> {
        self.present_value.as_deref()
    }

    /// Health block.
    pub fn health(&self) -> &PointHealth {
        &self.health
    }

    /// Optional-property block.
    pub fn extended(&self) -> &ExtendedProperties {
        &self.extended
    }

    /// Error annotation, if the reading is partial.
    pub fn error(&self) -> Option<&ReadAnnotation> {
        self.error.as_ref()
    }

    /// When the reading was taken.
    pub fn read_at(&self) -> DateTime<Utc> {
        self.read_at
    }
}

// =============================================================================
// ReadingBuilder
// =============================================================================

/// Builds [`PointReading`]s for one point.
#[derive(Debug, Clone)]
pub struct ReadingBuilder {
    identity: PointIdentity,
    read_at: DateTime<Utc>,
}

impl ReadingBuilder {
    /// Creates a builder stamped with the current time.
    pub fn new(identity: PointIdentity) -> Self {
        Self {
            identity,
            read_at: Utc::now(),
        }
    }

    /// Overrides the timestamp.
    pub fn read_at(mut self, read_at: DateTime<Utc>) -> Self {
        self.read_at = read_at;
        self
    }

    /// Builds a full reading from a raw property map.
    ///
    /// Fails if the map has no present-value entry or a flag property has
    /// a value that cannot be read as a boolean.
    pub fn from_properties(self, properties: &PropertyMap) -> Result<PointReading, ReadingError> {
        let present = properties.get(&PropertyId::PresentValue).ok_or_else(|| {
            ReadingError::MissingPresentValue {
                object: self.identity.object.to_string(),
            }
        })?;

        let text = |id: PropertyId| properties.get(&id).and_then(normalize_value);
        let encoded = |id: PropertyId| properties.get(&id).and_then(encode_json);
        let flag = |id: PropertyId| match properties.get(&id) {
            Some(v) => as_flag(id, v),
            None => Ok(None),
        };

        let health = PointHealth {
            status_flags: encoded(PropertyId::StatusFlags),
            event_state: text(PropertyId::EventState),
            out_of_service: flag(PropertyId::OutOfService)?,
            reliability: text(PropertyId::Reliability),
        };

        let extended = ExtendedProperties {
            high_limit: text(PropertyId::HighLimit),
            low_limit: text(PropertyId::LowLimit),
            deadband: text(PropertyId::Deadband),
            limit_enable: encoded(PropertyId::LimitEnable),
            priority_array: encoded(PropertyId::PriorityArray),
            relinquish_default: text(PropertyId::RelinquishDefault),
            notification_class: text(PropertyId::NotificationClass),
            notify_type: text(PropertyId::NotifyType),
            event_enable: encoded(PropertyId::EventEnable),
            acked_transitions: encoded(PropertyId::AckedTransitions),
            event_time_stamps: encoded(PropertyId::EventTimeStamps),
            event_message_texts: encoded(PropertyId::EventMessageTexts),
            event_algorithm_inhibit: flag(PropertyId::EventAlgorithmInhibit)?,
            event_algorithm_inhibit_ref: encoded(PropertyId::EventAlgorithmInhibitRef),
            event_detection_enable: flag(PropertyId::EventDetectionEnable)?,
            time_delay: text(PropertyId::TimeDelay),
            time_delay_normal: text(PropertyId::TimeDelayNormal),
            cov_increment: text(PropertyId::CovIncrement),
            units: text(PropertyId::Units),
        };

        Ok(PointReading {
            id: Uuid::now_v7(),
            identity: self.identity,
            present_value: normalize_value(present),
            health,
            extended,
            error: None,
            read_at: self.read_at,
        })
    }

    /// Builds a partial reading from a present-value-only read.
    ///
    /// The optional-property block is left empty and the reading records
    /// why the typed property read failed.
    pub fn present_value_only(self, value: &Value, failure: &DriverError) -> PointReading {
        PointReading {
            id: Uuid::now_v7(),
            identity: self.identity,
            present_value: normalize_value(value),
            health: PointHealth::default(),
            extended: ExtendedProperties::default(),
            error: Some(ReadAnnotation::from_driver_error(PROPERTY_READ_STAGE, failure)),
            read_at: self.read_at,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
