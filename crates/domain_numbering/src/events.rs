//! Domain events for the policy series aggregate
//!
//! Every persisted change to a series is committed together with exactly one
//! event. The events form:
//! - the issuance log (who owned the series when a number was issued)
//! - the administrative audit trail (creation, edits, reassignment, extension)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{AuditEventId, DealerId, SeriesId};

/// Domain events emitted by the PolicySeries aggregate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SeriesEvent {
    /// Series has been created
    SeriesCreated {
        series_id: SeriesId,
        series: String,
        dealer_id: DealerId,
        start_number: i64,
        end_number: i64,
        initiated_by: String,
        timestamp: DateTime<Utc>,
    },

    /// A number has been issued
    NumberIssued(Issuance),

    /// Series ownership moved to another dealer
    DealerReassigned {
        series_id: SeriesId,
        from: DealerId,
        to: DealerId,
        initiated_by: String,
        timestamp: DateTime<Utc>,
    },

    /// End number has been raised
    RangeExtended {
        series_id: SeriesId,
        previous_end: i64,
        new_end: i64,
        reason: String,
        initiated_by: String,
        timestamp: DateTime<Utc>,
    },

    /// Metadata has been edited
    SeriesUpdated {
        series_id: SeriesId,
        series: String,
        start_number: i64,
        end_number: i64,
        initiated_by: String,
        timestamp: DateTime<Utc>,
    },

    /// Series has been deleted
    SeriesDeleted {
        series_id: SeriesId,
        soft: bool,
        initiated_by: String,
        timestamp: DateTime<Utc>,
    },
}

/// Immutable issuance log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issuance {
    pub series_id: SeriesId,
    pub issued_number: i64,
    pub dealer_id_at_issuance: DealerId,
    pub issued_at: DateTime<Utc>,
}

impl Issuance {
    /// Returns true if `recorded` is this issuance as persisted
    pub fn same_issuance(&self, recorded: &Issuance) -> bool {
        self.series_id == recorded.series_id
            && self.issued_number == recorded.issued_number
            && self.dealer_id_at_issuance == recorded.dealer_id_at_issuance
            && self.issued_at.timestamp_micros() == recorded.issued_at.timestamp_micros()
    }
}

impl SeriesEvent {
    /// Returns the series the event belongs to
    pub fn series_id(&self) -> SeriesId {
        match self {
            SeriesEvent::SeriesCreated { series_id, .. }
            | SeriesEvent::DealerReassigned { series_id, .. }
            | SeriesEvent::RangeExtended { series_id, .. }
            | SeriesEvent::SeriesUpdated { series_id, .. }
            | SeriesEvent::SeriesDeleted { series_id, .. } => *series_id,
            SeriesEvent::NumberIssued(issuance) => issuance.series_id,
        }
    }

    /// Returns the event timestamp
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            SeriesEvent::SeriesCreated { timestamp, .. }
            | SeriesEvent::DealerReassigned { timestamp, .. }
            | SeriesEvent::RangeExtended { timestamp, .. }
            | SeriesEvent::SeriesUpdated { timestamp, .. }
            | SeriesEvent::SeriesDeleted { timestamp, .. } => *timestamp,
            SeriesEvent::NumberIssued(issuance) => issuance.issued_at,
        }
    }

    /// Returns the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            SeriesEvent::SeriesCreated { .. } => "series_created",
            SeriesEvent::NumberIssued(_) => "number_issued",
            SeriesEvent::DealerReassigned { .. } => "dealer_reassigned",
            SeriesEvent::RangeExtended { .. } => "range_extended",
            SeriesEvent::SeriesUpdated { .. } => "series_updated",
            SeriesEvent::SeriesDeleted { .. } => "series_deleted",
        }
    }

    /// Returns the issuance if this event records one
    pub fn as_issuance(&self) -> Option<&Issuance> {
        match self {
            SeriesEvent::NumberIssued(issuance) => Some(issuance),
            _ => None,
        }
    }
}

/// A stored event with its audit identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedEvent {
    pub id: AuditEventId,
    pub event: SeriesEvent,
}

impl RecordedEvent {
    pub fn new(event: SeriesEvent) -> Self {
        Self {
            id: AuditEventId::new_v7(),
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issuance_serializes_with_type_tag() {
        let event = SeriesEvent::NumberIssued(Issuance {
            series_id: SeriesId::new(),
            issued_number: 1003,
            dealer_id_at_issuance: DealerId::new(),
            issued_at: Utc::now(),
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "number_issued");
        assert_eq!(json["issued_number"], 1003);

        let back: SeriesEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
        assert_eq!(back.event_type(), "number_issued");
        assert!(back.as_issuance().is_some());
    }
}
