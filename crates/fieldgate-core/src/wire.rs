// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Upload wire format.
//!
//! Readings are stored flat, with structured properties as JSON strings.
//! [`serialize_reading`] parses those strings back into nested values for
//! upload. A field whose stored JSON is malformed, or has the wrong shape,
//! becomes `null` and a warning is logged; the rest of the reading still
//! serializes.
//!
//! [`serialize_devices`] renders a discovery snapshot as the camel-cased
//! device/object/property tree the config upload endpoint expects.

use serde_json::{json, Map, Value};
use tracing::warn;

use crate::reading::PointReading;
use crate::types::{DiscoveredDevice, PropertyId};

/// Number of slots in a priority array.
pub const PRIORITY_SLOTS: usize = 16;

const STATUS_FLAG_NAMES: [&str; 4] = ["inAlarm", "fault", "overridden", "outOfService"];
const LIMIT_ENABLE_NAMES: [&str; 2] = ["lowLimitEnable", "highLimitEnable"];
const TRANSITION_NAMES: [&str; 3] = ["toOffnormal", "toFault", "toNormal"];

// =============================================================================
// Field decoders
// =============================================================================

fn parse_json(field: &str, raw: &str, reading: &PointReading) -> Option<Value> {
    match serde_json::from_str::<Value>(raw) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(
                point = %reading.identity().object,
                field,
                error = %e,
                "Malformed stored JSON, emitting null"
            );
            None
        }
    }
}

fn bit(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_u64().map(|n| n != 0),
        _ => None,
    }
}

/// Turns a bit array into an object with named members.
///
/// Objects pass through; anything else is rejected.
fn bit_field(value: Value, names: &[&str]) -> Option<Value> {
    match value {
        Value::Object(_) => Some(value),
        Value::Array(items) if items.len() == names.len() => {
            let mut out = Map::new();
            for (name, item) in names.iter().zip(&items) {
                out.insert((*name).to_string(), Value::Bool(bit(item)?));
            }
            Some(Value::Object(out))
        }
        _ => None,
    }
}

fn structured(
    field: &str,
    stored: &Option<String>,
    reading: &PointReading,
    shape: impl FnOnce(Value) -> Option<Value>,
) -> Value {
    let Some(raw) = stored else {
        return Value::Null;
    };
    let Some(parsed) = parse_json(field, raw, reading) else {
        return Value::Null;
    };
    match shape(embedded(parsed)) {
        Some(v) => v,
        None => {
            warn!(point = %reading.identity().object, field, "Unexpected shape for stored value, emitting null");
            Value::Null
        }
    }
}

/// Devices sometimes deliver an array or object as its JSON text.
fn embedded(value: Value) -> Value {
    match value {
        Value::String(s) => match serde_json::from_str::<Value>(&s) {
            Ok(inner @ (Value::Array(_) | Value::Object(_))) => inner,
            _ => Value::String(s),
        },
        other => other,
    }
}

fn priority_array(value: Value) -> Option<Value> {
    let Value::Array(mut slots) = value else {
        return None;
    };
    if slots.len() > PRIORITY_SLOTS {
        return None;
    }
    slots.resize(PRIORITY_SLOTS, Value::Null);
    Some(Value::Array(slots))
}

fn array(value: Value) -> Option<Value> {
    value.is_array().then_some(value)
}

/// Numbers stored as strings go out as numbers when they parse.
/// Integers stay integers.
fn numeric(stored: &Option<String>) -> Value {
    let Some(s) = stored else {
        return Value::Null;
    };
    if let Ok(n) = s.parse::<i64>() {
        return json!(n);
    }
    if let Ok(n) = s.parse::<u64>() {
        return json!(n);
    }
    match s.parse::<f64>() {
        Ok(n) if n.is_finite() => json!(n),
        _ => Value::String(s.clone()),
    }
}

fn text(stored: &Option<String>) -> Value {
    stored.clone().map(Value::String).unwrap_or(Value::Null)
}

// =============================================================================
// Readings
// =============================================================================

/// Serializes one reading for upload.
///
/// # Examples
///
/// ```rust,ignore
/// let body = serialize_reading(&reading);
/// assert_eq!(body["health"]["statusFlags"]["inAlarm"], true);
/// ```
pub fn serialize_reading(reading: &PointReading) -> Value {
    let identity = reading.identity();
    let health = reading.health();
    let ext = reading.extended();

    let status_flags = structured("statusFlags", &health.status_flags, reading, |v| {
        bit_field(v, &STATUS_FLAG_NAMES)
    });

    let properties = json!({
        "highLimit": numeric(&ext.high_limit),
        "lowLimit": numeric(&ext.low_limit),
        "deadband": numeric(&ext.deadband),
        "limitEnable": structured("limitEnable", &ext.limit_enable, reading, |v| bit_field(v, &LIMIT_ENABLE_NAMES)),
        "priorityArray": structured("priorityArray", &ext.priority_array, reading, priority_array),
        "relinquishDefault": text(&ext.relinquish_default),
        "notificationClass": numeric(&ext.notification_class),
        "notifyType": text(&ext.notify_type),
        "eventEnable": structured("eventEnable", &ext.event_enable, reading, |v| bit_field(v, &TRANSITION_NAMES)),
        "ackedTransitions": structured("ackedTransitions", &ext.acked_transitions, reading, |v| bit_field(v, &TRANSITION_NAMES)),
        "eventTimeStamps": structured("eventTimeStamps", &ext.event_time_stamps, reading, array),
        "eventMessageTexts": structured("eventMessageTexts", &ext.event_message_texts, reading, array),
        "eventAlgorithmInhibit": ext.event_algorithm_inhibit,
        "eventAlgorithmInhibitRef": structured("eventAlgorithmInhibitRef", &ext.event_algorithm_inhibit_ref, reading, Some),
        "eventDetectionEnable": ext.event_detection_enable,
        "timeDelay": numeric(&ext.time_delay),
        "timeDelayNormal": numeric(&ext.time_delay_normal),
        "covIncrement": numeric(&ext.cov_increment),
        "units": text(&ext.units),
    });

    let error = reading.error().map(|e| {
        json!({
            "stage": e.stage,
            "message": e.message,
            "kind": e.kind,
        })
    });

    json!({
        "id": reading.id(),
        "iotPointId": identity.iot_point_id,
        "controllerId": identity.controller.value(),
        "controllerAddress": identity.address.as_str(),
        "objectType": identity.object.object_type.as_str(),
        "objectInstance": identity.object.instance,
        "presentValue": reading.present_value(),
        "readAt": reading.read_at().to_rfc3339(),
        "health": {
            "statusFlags": status_flags,
            "eventState": text(&health.event_state),
            "outOfService": health.out_of_service,
            "reliability": text(&health.reliability),
        },
        "properties": properties,
        "error": error,
    })
}

/// Serializes a batch of readings as `{"points": [...]}`.
pub fn serialize_readings(readings: &[PointReading]) -> Value {
    json!({ "points": readings.iter().map(serialize_reading).collect::<Vec<_>>() })
}

// =============================================================================
// Devices
// =============================================================================

/// Returns the camelCase form of a property name.
pub fn camel_case(property: PropertyId) -> String {
    let mut out = String::new();
    let mut upper = false;
    for c in property.as_str().chars() {
        if c == '-' {
            upper = true;
        } else if upper {
            out.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Serializes a discovery snapshot for config upload.
pub fn serialize_devices(devices: &[DiscoveredDevice]) -> Value {
    let devices: Vec<Value> = devices
        .iter()
        .map(|device| {
            let objects: Vec<Value> = device
                .objects
                .iter()
                .map(|obj| {
                    let properties: Map<String, Value> = obj
                        .properties
                        .iter()
                        .map(|(id, value)| (camel_case(*id), value.clone()))
                        .collect();
                    json!({
                        "objectType": obj.object.object_type.as_str(),
                        "objectTypeId": obj.object.object_type.type_id(),
                        "objectInstance": obj.object.instance,
                        "iotPointId": obj.iot_point_id,
                        "properties": properties,
                    })
                })
                .collect();
            json!({
                "deviceId": device.identity.instance.value(),
                "address": device.identity.address.as_str(),
                "vendorId": device.identity.vendor_id,
                "vendorName": device.identity.vendor_name,
                "objects": objects,
            })
        })
        .collect();
    json!({ "devices": devices })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::{PointIdentity, ReadingBuilder};
    use crate::types::{
        iot_point_id, ControllerAddress, DeviceIdentity, DeviceInstance, DiscoveredObject,
        ObjectId, ObjectType, PropertyMap,
    };

    fn reading(props: PropertyMap) -> PointReading {
        let controller = DeviceInstance::new(9);
        let object = ObjectId::new(ObjectType::AnalogOutput, 2);
        ReadingBuilder::new(PointIdentity {
            controller,
            address: ControllerAddress::new("10.0.0.9"),
            object,
            iot_point_id: iot_point_id(controller, object),
        })
        .from_properties(&props)
        .unwrap()
    }

    #[test]
    fn test_priority_array_round_trip() {
        let mut slots = vec![Value::Null; PRIORITY_SLOTS];
        slots[2] = json!(25.0);
        slots[15] = json!(20.0);

        let mut props = PropertyMap::new();
        props.insert(PropertyId::PresentValue, json!(25.0));
        props.insert(PropertyId::PriorityArray, Value::Array(slots.clone()));

        let wire = serialize_reading(&reading(props));
        let out = wire["properties"]["priorityArray"].as_array().unwrap();
        assert_eq!(out.len(), PRIORITY_SLOTS);
        assert_eq!(out, &slots);
        assert!(out.iter().enumerate().all(|(i, v)| v.is_null() == !(i == 2 || i == 15)));
    }

    #[test]
    fn test_status_flags_become_named_bits() {
        let mut props = PropertyMap::new();
        props.insert(PropertyId::PresentValue, json!("active"));
        props.insert(PropertyId::StatusFlags, json!([1, 0, 0, 0]));

        let wire = serialize_reading(&reading(props));
        let flags = &wire["health"]["statusFlags"];
        assert_eq!(flags["inAlarm"], json!(true));
        assert_eq!(flags["outOfService"], json!(false));
        assert_eq!(wire["presentValue"], json!("active"));
        assert!(wire["error"].is_null());
    }

    #[test]
    fn test_malformed_json_degrades_to_null() {
        let mut props = PropertyMap::new();
        props.insert(PropertyId::PresentValue, json!(1));
        props.insert(PropertyId::Units, json!("percent"));
        let mut stored = serde_json::to_value(reading(props)).unwrap();
        stored["extended"]["priority_array"] = json!("[1, 2,");
        let stored: PointReading = serde_json::from_value(stored).unwrap();

        let wire = serialize_reading(&stored);
        assert!(wire["properties"]["priorityArray"].is_null());
        assert_eq!(wire["properties"]["units"], json!("percent"));
    }

    #[test]
    fn test_numeric_strings_go_out_as_numbers() {
        let mut props = PropertyMap::new();
        props.insert(PropertyId::PresentValue, json!(1));
        props.insert(PropertyId::HighLimit, json!(80.5));
        props.insert(PropertyId::NotificationClass, json!(5));
        props.insert(PropertyId::TimeDelay, json!(30));
        props.insert(PropertyId::CovIncrement, json!("n/a"));

        let wire = serialize_reading(&reading(props));
        let properties = &wire["properties"];
        assert_eq!(properties["highLimit"], json!(80.5));
        assert_eq!(properties["notificationClass"], json!(5));
        assert!(properties["notificationClass"].is_u64());
        assert!(properties["timeDelay"].is_u64());
        assert_eq!(properties["timeDelay"].to_string(), "30");
        assert_eq!(properties["covIncrement"], json!("n/a"));
    }

    #[test]
    fn test_bit_fields_become_named_members() {
        let mut props = PropertyMap::new();
        props.insert(PropertyId::PresentValue, json!(50.0));
        props.insert(PropertyId::LimitEnable, json!([0, 1]));
        props.insert(PropertyId::EventEnable, json!([true, false, true]));
        props.insert(PropertyId::AckedTransitions, json!("[1,1,0]"));

        let wire = serialize_reading(&reading(props));
        let properties = &wire["properties"];
        assert_eq!(
            properties["limitEnable"],
            json!({"lowLimitEnable": false, "highLimitEnable": true})
        );
        assert_eq!(
            properties["eventEnable"],
            json!({"toOffnormal": true, "toFault": false, "toNormal": true})
        );
        assert_eq!(
            properties["ackedTransitions"],
            json!({"toOffnormal": true, "toFault": true, "toNormal": false})
        );
    }

    #[test]
    fn test_bit_field_with_wrong_length_degrades_to_null() {
        let mut props = PropertyMap::new();
        props.insert(PropertyId::PresentValue, json!(50.0));
        props.insert(PropertyId::LimitEnable, json!([1, 0, 1]));
        props.insert(PropertyId::EventEnable, json!([1, 1]));
        props.insert(PropertyId::Units, json!("percent"));

        let wire = serialize_reading(&reading(props));
        assert!(wire["properties"]["limitEnable"].is_null());
        assert!(wire["properties"]["eventEnable"].is_null());
        assert_eq!(wire["properties"]["units"], json!("percent"));
    }

    #[test]
    fn test_event_time_stamps_stay_an_array() {
        let stamps = json!([
            "2025-03-01T08:00:00Z",
            null,
            "2025-03-01T08:05:30Z"
        ]);
        let mut props = PropertyMap::new();
        props.insert(PropertyId::PresentValue, json!(50.0));
        props.insert(PropertyId::EventTimeStamps, stamps.clone());
        props.insert(PropertyId::EventMessageTexts, json!(["high", "", "normal"]));

        let wire = serialize_reading(&reading(props));
        assert_eq!(wire["properties"]["eventTimeStamps"], stamps);
        assert_eq!(wire["properties"]["eventMessageTexts"][2], json!("normal"));

        let mut props = PropertyMap::new();
        props.insert(PropertyId::PresentValue, json!(50.0));
        props.insert(PropertyId::EventTimeStamps, json!({"time": "08:00"}));
        let wire = serialize_reading(&reading(props));
        assert!(wire["properties"]["eventTimeStamps"].is_null());
    }

    #[test]
    fn test_object_reference_string_survives() {
        let mut props = PropertyMap::new();
        props.insert(PropertyId::PresentValue, json!("inactive"));
        props.insert(PropertyId::EventAlgorithmInhibitRef, json!("binary-value:3"));

        let wire = serialize_reading(&reading(props));
        assert_eq!(
            wire["properties"]["eventAlgorithmInhibitRef"],
            json!("binary-value:3")
        );
    }

    #[test]
    fn test_serialize_devices_camel_cases_properties() {
        let identity = DeviceIdentity::new(1001, "192.168.1.10").with_vendor(5, "Acme");
        let mut props = PropertyMap::new();
        props.insert(PropertyId::ObjectName, json!("Zone Temp"));
        props.insert(PropertyId::CovIncrement, json!(0.2));
        let device = DiscoveredDevice {
            objects: vec![DiscoveredObject::new(
                identity.instance,
                ObjectId::new(ObjectType::AnalogInput, 3),
                props,
            )],
            identity,
        };

        let wire = serialize_devices(&[device]);
        let object = &wire["devices"][0]["objects"][0];
        assert_eq!(wire["devices"][0]["deviceId"], json!(1001));
        assert_eq!(object["objectType"], json!("analog-input"));
        assert_eq!(object["properties"]["objectName"], json!("Zone Temp"));
        assert_eq!(object["properties"]["covIncrement"], json!(0.2));
    }

    #[test]
    fn test_camel_case() {
        assert_eq!(camel_case(PropertyId::EventAlgorithmInhibitRef), "eventAlgorithmInhibitRef");
        assert_eq!(camel_case(PropertyId::Units), "units");
    }
}
