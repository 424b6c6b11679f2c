//! Series DTOs
//!
//! Range bounds are checked by the domain so that bad ranges surface as
//! `invalid_range` rather than a generic validation error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::{DealerId, SeriesId};
use domain_numbering::{
    DeletionOutcome, DepletionThreshold, Issuance, IssuedPolicyNumber, NewSeries, PolicySeries,
    SeriesQuery, SeriesRecord, SeriesState, SeriesUpdate,
};

/// Most series returned by one list call
pub const MAX_PAGE_SIZE: u32 = 500;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSeriesRequest {
    #[validate(length(min = 1, max = 20))]
    pub series: String,
    pub dealer_id: DealerId,
    #[validate(length(max = 255))]
    pub description: Option<String>,
    pub start_number: i64,
    pub end_number: i64,
}

impl From<CreateSeriesRequest> for NewSeries {
    fn from(request: CreateSeriesRequest) -> Self {
        NewSeries {
            series: request.series,
            dealer_id: request.dealer_id,
            description: request.description,
            start_number: request.start_number,
            end_number: request.end_number,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSeriesRequest {
    #[validate(length(min = 1, max = 20))]
    pub series: Option<String>,
    pub start_number: Option<i64>,
    pub end_number: Option<i64>,
    #[validate(length(max = 255))]
    pub description: Option<String>,
}

impl From<UpdateSeriesRequest> for SeriesUpdate {
    fn from(request: UpdateSeriesRequest) -> Self {
        SeriesUpdate {
            series: request.series,
            start_number: request.start_number,
            end_number: request.end_number,
            description: request.description,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AssignDealerRequest {
    pub dealer_id: DealerId,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ExtendRangeRequest {
    pub new_end_number: i64,
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ListSeriesParams {
    pub dealer_id: Option<DealerId>,
    #[serde(default)]
    pub include_deleted: bool,
    #[validate(range(min = 1, max = 500))]
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ListSeriesParams {
    pub fn into_query(self) -> SeriesQuery {
        SeriesQuery {
            dealer_id: self.dealer_id,
            include_deleted: self.include_deleted,
            limit: Some(self.limit.unwrap_or(MAX_PAGE_SIZE)),
            offset: self.offset,
        }
    }
}

/// A series with its derived usage figures
#[derive(Debug, Serialize, Deserialize)]
pub struct SeriesResponse {
    #[serde(flatten)]
    pub record: SeriesRecord,
    pub remaining: i64,
    pub state: SeriesState,
}

impl SeriesResponse {
    pub fn from_series(series: &PolicySeries, threshold: &DepletionThreshold) -> Self {
        Self {
            record: series.to_record(),
            remaining: series.remaining(),
            state: series.state(threshold),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NextNumberResponse {
    pub series_id: SeriesId,
    pub number: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PolicyNumberResponse {
    pub series_id: SeriesId,
    pub series: String,
    pub number: i64,
    pub policy_number: String,
}

impl From<IssuedPolicyNumber> for PolicyNumberResponse {
    fn from(issued: IssuedPolicyNumber) -> Self {
        Self {
            series_id: issued.series_id,
            series: issued.series,
            number: issued.issued_number,
            policy_number: issued.policy_number,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub series_id: SeriesId,
    pub outcome: DeletionOutcome,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResolvedPolicyNumberResponse {
    pub policy_number: String,
    pub series_id: SeriesId,
    pub number: i64,
    pub dealer_id: DealerId,
    pub issued_at: DateTime<Utc>,
}

impl ResolvedPolicyNumberResponse {
    pub fn new(policy_number: String, issuance: Issuance) -> Self {
        Self {
            policy_number,
            series_id: issuance.series_id,
            number: issuance.issued_number,
            dealer_id: issuance.dealer_id_at_issuance,
            issued_at: issuance.issued_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_params_cap_page_size() {
        let query = ListSeriesParams::default().into_query();
        assert_eq!(query.limit, Some(MAX_PAGE_SIZE));
        assert!(!query.include_deleted);

        let oversized = ListSeriesParams {
            limit: Some(MAX_PAGE_SIZE + 1),
            ..Default::default()
        };
        assert!(oversized.validate().is_err());
    }

    #[test]
    fn test_extend_requires_reason() {
        let request = ExtendRangeRequest {
            new_end_number: 2000,
            reason: String::new(),
        };
        assert!(request.validate().is_err());
    }
}
