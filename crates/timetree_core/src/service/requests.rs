//! Typed requests accepted by the service layer.
//!
//! Optional resolution and timezone fall back to `TimeTreeSettings`; an
//! absent root selects the process-wide tree.

use crate::config::TimeTreeSettings;
use crate::model::graph::{Direction, NodeId};
use crate::model::resolution::Resolution;
use crate::model::time::{TimeResult, TimeValue, TimezoneId};
use crate::service::root::RootStrategy;
use serde::Deserialize;
use std::collections::BTreeSet;

/// Time coordinates shared by every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct TimeSpec {
    #[serde(default)]
    pub resolution: Option<Resolution>,
    #[serde(default)]
    pub timezone: Option<TimezoneId>,
    #[serde(default)]
    pub root: Option<NodeId>,
}

impl TimeSpec {
    pub fn time_at(&self, epoch_millis: i64, settings: &TimeTreeSettings) -> TimeResult<TimeValue> {
        TimeValue::new(
            epoch_millis,
            self.timezone.unwrap_or(settings.default_timezone),
            self.resolution.unwrap_or(settings.default_resolution),
        )
    }

    pub fn root_strategy(&self) -> RootStrategy {
        RootStrategy::from_optional(self.root)
    }
}

/// Single instant lookup or creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct InstantRequest {
    pub epoch_millis: i64,
    #[serde(flatten)]
    pub spec: TimeSpec,
}

impl InstantRequest {
    pub fn new(epoch_millis: i64) -> Self {
        Self {
            epoch_millis,
            spec: TimeSpec::default(),
        }
    }
}

/// Instant range lookup or creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RangeRequest {
    pub start_epoch_millis: i64,
    pub end_epoch_millis: i64,
    #[serde(flatten)]
    pub spec: TimeSpec,
}

impl RangeRequest {
    pub fn new(start_epoch_millis: i64, end_epoch_millis: i64) -> Self {
        Self {
            start_epoch_millis,
            end_epoch_millis,
            spec: TimeSpec::default(),
        }
    }

    pub fn bounds(&self, settings: &TimeTreeSettings) -> TimeResult<(TimeValue, TimeValue)> {
        Ok((
            self.spec.time_at(self.start_epoch_millis, settings)?,
            self.spec.time_at(self.end_epoch_millis, settings)?,
        ))
    }
}

/// Attach one entity at an instant.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AttachEventRequest {
    #[serde(default)]
    pub entity: Option<NodeId>,
    pub relationship_type: String,
    #[serde(default)]
    pub direction: Option<Direction>,
    pub epoch_millis: i64,
    #[serde(flatten)]
    pub spec: TimeSpec,
}

impl AttachEventRequest {
    pub fn new(entity: NodeId, relationship_type: impl Into<String>, epoch_millis: i64) -> Self {
        Self {
            entity: Some(entity),
            relationship_type: relationship_type.into(),
            direction: None,
            epoch_millis,
            spec: TimeSpec::default(),
        }
    }
}

/// Events at one instant, or across a range when `end_epoch_millis` is set.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EventQuery {
    pub start_epoch_millis: i64,
    #[serde(default)]
    pub end_epoch_millis: Option<i64>,
    /// Empty admits every type.
    #[serde(default)]
    pub relationship_types: BTreeSet<String>,
    #[serde(default)]
    pub direction: Option<Direction>,
    #[serde(flatten)]
    pub spec: TimeSpec,
}

impl EventQuery {
    pub fn at(epoch_millis: i64) -> Self {
        Self {
            start_epoch_millis: epoch_millis,
            end_epoch_millis: None,
            relationship_types: BTreeSet::new(),
            direction: None,
            spec: TimeSpec::default(),
        }
    }

    pub fn between(start_epoch_millis: i64, end_epoch_millis: i64) -> Self {
        Self {
            end_epoch_millis: Some(end_epoch_millis),
            ..Self::at(start_epoch_millis)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AttachEventRequest, EventQuery, InstantRequest};
    use crate::config::TimeTreeSettings;
    use crate::model::graph::Direction;
    use crate::model::resolution::Resolution;

    #[test]
    fn instant_request_defaults_to_day_utc() {
        let request: InstantRequest = serde_json::from_str(r#"{"epoch_millis": 0}"#).unwrap();
        let time = request
            .spec
            .time_at(request.epoch_millis, &TimeTreeSettings::default())
            .unwrap();
        assert_eq!(time.resolution(), Resolution::Day);
        assert_eq!(time.timezone().name(), "UTC");
        assert!(request.spec.root.is_none());
    }

    #[test]
    fn flattened_time_fields_are_read_from_the_same_map() {
        let request: InstantRequest = serde_json::from_str(
            r#"{"epoch_millis": 0, "resolution": "minute", "timezone": "Europe/Berlin"}"#,
        )
        .unwrap();
        assert_eq!(request.spec.resolution, Some(Resolution::Minute));
        assert_eq!(request.spec.timezone.map(|tz| tz.name()), Some("Europe/Berlin"));
    }

    #[test]
    fn attach_request_leaves_direction_unset() {
        let request: AttachEventRequest =
            serde_json::from_str(r#"{"relationship_type": "SENT_ON", "epoch_millis": 5}"#)
                .unwrap();
        assert!(request.entity.is_none());
        assert!(request.direction.is_none());
    }

    #[test]
    fn event_query_parses_type_filter_and_direction() {
        let query: EventQuery = serde_json::from_str(
            r#"{"start_epoch_millis": 1, "end_epoch_millis": 2,
                "relationship_types": ["A", "B"], "direction": "outgoing"}"#,
        )
        .unwrap();
        assert_eq!(query.relationship_types.len(), 2);
        assert_eq!(query.direction, Some(Direction::Outgoing));
        assert_eq!(EventQuery::between(1, 2).end_epoch_millis, Some(2));
    }
}
