//! Principals and the checkout correlation that points back at them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};

use super::plan::{BillingInterval, Plan};
use crate::domain::foundation::{CommunityId, Timestamp, UserId};

/// Kind of record that owns a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalType {
    User,
    Community,
}

impl PrincipalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalType::User => "user",
            PrincipalType::Community => "community",
        }
    }
}

/// Reference to the user or community owning a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PrincipalRef {
    User(UserId),
    Community(CommunityId),
}

impl PrincipalRef {
    pub fn principal_type(&self) -> PrincipalType {
        match self {
            PrincipalRef::User(_) => PrincipalType::User,
            PrincipalRef::Community(_) => PrincipalType::Community,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            PrincipalRef::User(id) => id.as_str(),
            PrincipalRef::Community(id) => id.as_str(),
        }
    }

    pub fn as_user(&self) -> Option<&UserId> {
        match self {
            PrincipalRef::User(id) => Some(id),
            PrincipalRef::Community(_) => None,
        }
    }
}

impl fmt::Display for PrincipalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.principal_type().as_str(), self.id())
    }
}

/// Metadata keys carried on provider checkout sessions.
pub mod metadata_keys {
    pub const PRINCIPAL_ID: &str = "principalId";
    pub const PRINCIPAL_TYPE: &str = "principalType";
    pub const TIER: &str = "tier";
    pub const BILLING_INTERVAL: &str = "billingInterval";
    pub const INITIATED_BY: &str = "initiatedBy";
    pub const DURATION_MONTHS: &str = "durationMonths";
    pub const EXPIRATION_DATE: &str = "expirationDate";
}

/// Failure to read a correlation back out of provider metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorrelationError {
    Missing(&'static str),
    Invalid { field: &'static str, reason: String },
}

/// Correlation round-tripped through the provider's session metadata.
///
/// Built by the session factory, echoed back on `checkout.session.completed`,
/// never persisted on our side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutCorrelation {
    pub principal: PrincipalRef,
    /// Tier the customer picked. Informational: the written plan always
    /// comes from the price catalog.
    pub tier: Option<Plan>,
    pub billing_interval: Option<BillingInterval>,
    /// User who started the checkout (community purchases).
    pub initiated_by: Option<UserId>,
    pub duration_months: Option<u32>,
    pub expiration_date: Option<Timestamp>,
}

impl CheckoutCorrelation {
    /// Serializes into the flat string map providers accept as metadata.
    pub fn to_metadata(&self) -> HashMap<String, String> {
        use metadata_keys::*;

        let mut map = HashMap::new();
        map.insert(PRINCIPAL_ID.to_string(), self.principal.id().to_string());
        map.insert(
            PRINCIPAL_TYPE.to_string(),
            self.principal.principal_type().as_str().to_string(),
        );
        if let Some(tier) = self.tier {
            map.insert(TIER.to_string(), tier.as_str().to_string());
        }
        if let Some(interval) = self.billing_interval {
            map.insert(BILLING_INTERVAL.to_string(), interval.as_str().to_string());
        }
        if let Some(user) = &self.initiated_by {
            map.insert(INITIATED_BY.to_string(), user.to_string());
        }
        if let Some(months) = self.duration_months {
            map.insert(DURATION_MONTHS.to_string(), months.to_string());
        }
        if let Some(expiration) = self.expiration_date {
            map.insert(
                EXPIRATION_DATE.to_string(),
                expiration.as_datetime().to_rfc3339(),
            );
        }
        map
    }

    /// Reads a correlation back from provider metadata.
    ///
    /// `principalId` and `principalType` are required; the rest is optional
    /// and ignored when unparseable, except `durationMonths` and
    /// `expirationDate` which feed date arithmetic and must be well formed.
    pub fn from_metadata(metadata: &HashMap<String, String>) -> Result<Self, CorrelationError> {
        use metadata_keys::*;

        let principal_id = non_empty(metadata, PRINCIPAL_ID)
            .ok_or(CorrelationError::Missing(PRINCIPAL_ID))?;
        let principal_type = non_empty(metadata, PRINCIPAL_TYPE)
            .ok_or(CorrelationError::Missing(PRINCIPAL_TYPE))?;

        let principal = match principal_type.to_ascii_lowercase().as_str() {
            "user" => PrincipalRef::User(UserId::new(principal_id).map_err(|e| {
                CorrelationError::Invalid {
                    field: PRINCIPAL_ID,
                    reason: e.to_string(),
                }
            })?),
            "community" => PrincipalRef::Community(CommunityId::new(principal_id).map_err(
                |e| CorrelationError::Invalid {
                    field: PRINCIPAL_ID,
                    reason: e.to_string(),
                },
            )?),
            other => {
                return Err(CorrelationError::Invalid {
                    field: PRINCIPAL_TYPE,
                    reason: format!("unsupported principal type '{}'", other),
                })
            }
        };

        let duration_months = match non_empty(metadata, DURATION_MONTHS) {
            Some(raw) => Some(raw.parse::<u32>().map_err(|_| CorrelationError::Invalid {
                field: DURATION_MONTHS,
                reason: format!("'{}' is not a month count", raw),
            })?),
            None => None,
        };

        let expiration_date = match non_empty(metadata, EXPIRATION_DATE) {
            Some(raw) => Some(parse_metadata_date(raw).ok_or_else(|| {
                CorrelationError::Invalid {
                    field: EXPIRATION_DATE,
                    reason: format!("'{}' is not a date", raw),
                }
            })?),
            None => None,
        };

        Ok(Self {
            principal,
            tier: non_empty(metadata, TIER).and_then(|s| s.parse().ok()),
            billing_interval: non_empty(metadata, BILLING_INTERVAL).and_then(|s| s.parse().ok()),
            initiated_by: non_empty(metadata, INITIATED_BY).and_then(|s| UserId::new(s).ok()),
            duration_months,
            expiration_date,
        })
    }
}

fn non_empty<'a>(metadata: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    metadata
        .get(key)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

/// Accepts RFC 3339 or Unix seconds.
fn parse_metadata_date(raw: &str) -> Option<Timestamp> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(Timestamp::from_datetime(dt.with_timezone(&Utc)));
    }
    raw.parse::<i64>().ok().and_then(Timestamp::from_unix_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn correlation_round_trips_through_metadata() {
        let correlation = CheckoutCorrelation {
            principal: PrincipalRef::Community(CommunityId::new("c-1").unwrap()),
            tier: Some(Plan::Standard),
            billing_interval: Some(BillingInterval::Month),
            initiated_by: Some(UserId::new("u-9").unwrap()),
            duration_months: Some(3),
            expiration_date: Timestamp::from_unix_secs(1_800_000_000),
        };

        let parsed = CheckoutCorrelation::from_metadata(&correlation.to_metadata()).unwrap();

        assert_eq!(parsed, correlation);
    }

    #[test]
    fn missing_principal_id_is_reported() {
        let result = CheckoutCorrelation::from_metadata(&metadata(&[("principalType", "user")]));
        assert_eq!(result, Err(CorrelationError::Missing("principalId")));
    }

    #[test]
    fn unknown_principal_type_is_invalid() {
        let result = CheckoutCorrelation::from_metadata(&metadata(&[
            ("principalId", "x"),
            ("principalType", "team"),
        ]));
        assert!(matches!(
            result,
            Err(CorrelationError::Invalid { field: "principalType", .. })
        ));
    }

    #[test]
    fn unparseable_tier_is_dropped_not_rejected() {
        let parsed = CheckoutCorrelation::from_metadata(&metadata(&[
            ("principalId", "u-1"),
            ("principalType", "USER"),
            ("tier", "gold"),
        ]))
        .unwrap();

        assert_eq!(parsed.tier, None);
        assert_eq!(parsed.principal.principal_type(), PrincipalType::User);
    }

    #[test]
    fn expiration_accepts_unix_seconds() {
        let parsed = CheckoutCorrelation::from_metadata(&metadata(&[
            ("principalId", "c-1"),
            ("principalType", "community"),
            ("expirationDate", "1800000000"),
        ]))
        .unwrap();

        assert_eq!(parsed.expiration_date.unwrap().as_unix_secs(), 1_800_000_000);
    }

    #[test]
    fn malformed_duration_is_invalid() {
        let result = CheckoutCorrelation::from_metadata(&metadata(&[
            ("principalId", "c-1"),
            ("principalType", "community"),
            ("durationMonths", "six"),
        ]));
        assert!(matches!(
            result,
            Err(CorrelationError::Invalid { field: "durationMonths", .. })
        ));
    }

    #[test]
    fn principal_display_includes_type() {
        let principal = PrincipalRef::User(UserId::new("abc").unwrap());
        assert_eq!(principal.to_string(), "user:abc");
    }
}
