// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Property availability resolution.
//!
//! Decides which properties to request for a point, based on the property
//! values stored for it at discovery time.

use crate::types::{PropertyId, PropertyMap};

/// Optional properties that are requested when a point has them configured.
///
/// The order here is the order they appear in read requests.
pub const OPTIONAL_PROPERTIES: &[PropertyId] = &[
    PropertyId::StatusFlags,
    PropertyId::EventState,
    PropertyId::OutOfService,
    PropertyId::Reliability,
    PropertyId::Units,
    PropertyId::HighLimit,
    PropertyId::LowLimit,
    PropertyId::Deadband,
    PropertyId::LimitEnable,
    PropertyId::PriorityArray,
    PropertyId::RelinquishDefault,
    PropertyId::NotificationClass,
    PropertyId::NotifyType,
    PropertyId::EventEnable,
    PropertyId::AckedTransitions,
    PropertyId::EventTimeStamps,
    PropertyId::EventMessageTexts,
    PropertyId::EventAlgorithmInhibit,
    PropertyId::EventAlgorithmInhibitRef,
    PropertyId::EventDetectionEnable,
    PropertyId::TimeDelay,
    PropertyId::TimeDelayNormal,
    PropertyId::CovIncrement,
];

/// Returns the properties worth requesting for a point.
///
/// The present value always comes first, followed by every allow-listed
/// property that is present and non-null in `stored`.
///
/// # Examples
///
/// ```
/// use fieldgate_core::properties::resolve_available;
/// use fieldgate_core::types::{PropertyId, PropertyMap};
/// use serde_json::json;
///
/// let mut stored = PropertyMap::new();
/// stored.insert(PropertyId::Units, json!("percent"));
/// stored.insert(PropertyId::HighLimit, json!(null));
///
/// assert_eq!(
///     resolve_available(&stored),
///     vec![PropertyId::PresentValue, PropertyId::Units]
/// );
/// ```
pub fn resolve_available(stored: &PropertyMap) -> Vec<PropertyId> {
    let mut out = Vec::with_capacity(OPTIONAL_PROPERTIES.len() + 1);
    out.push(PropertyId::PresentValue);
    out.extend(
        OPTIONAL_PROPERTIES
            .iter()
            .copied()
            .filter(|p| stored.get(p).is_some_and(|v| !v.is_null())),
    );
    out
}
