//! Token validity window (`wst:Lifetime`)
//!
//! The lifetime asserted in the response envelope is advisory metadata: a
//! missing or unparseable window degrades to "no lifetime known" instead of
//! failing the sign-in. Trust decisions belong to the token validator.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::protocol::{CREATED_LN, EXPIRES_LN, WSU_NS};
use crate::xml::XmlElement;

/// Validity window of an issued token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lifetime {
    /// Start of validity (`wsu:Created`)
    pub created: Option<DateTime<Utc>>,
    /// End of validity (`wsu:Expires`)
    pub expires: Option<DateTime<Utc>>,
}

/// Outcome of checking a lifetime against the clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifetimeStatus {
    /// Inside the validity window
    Current,
    /// Validity window has ended
    Expired,
    /// Validity window has not started
    NotYetValid,
    /// Not evaluated: detection disabled or no lifetime asserted
    #[default]
    Unchecked,
}

impl LifetimeStatus {
    /// Whether the status represents a lifetime violation
    pub fn is_violation(self) -> bool {
        matches!(self, Self::Expired | Self::NotYetValid)
    }
}

impl Lifetime {
    /// Create a lifetime with both bounds set
    pub fn new(created: DateTime<Utc>, expires: DateTime<Utc>) -> Self {
        Self {
            created: Some(created),
            expires: Some(expires),
        }
    }

    /// Extract the validity window from a `Lifetime` element.
    ///
    /// Returns `None` when `wsu:Created` or `wsu:Expires` is missing or does
    /// not hold an `xsd:dateTime`.
    pub fn extract(element: &XmlElement) -> Option<Self> {
        let created = Self::timestamp(element, CREATED_LN)?;
        let expires = Self::timestamp(element, EXPIRES_LN)?;
        Some(Self::new(created, expires))
    }

    fn timestamp(element: &XmlElement, local_name: &str) -> Option<DateTime<Utc>> {
        let Some(child) = element.first_child_with_name(WSU_NS, local_name) else {
            debug!(element = local_name, "Lifetime is missing a timestamp");
            return None;
        };
        let text = child.text_content();
        match parse_xsd_date_time(text.trim()) {
            Ok(timestamp) => Some(timestamp),
            Err(e) => {
                debug!(element = local_name, value = %text, error = %e, "Unparseable lifetime timestamp");
                None
            }
        }
    }

    /// Evaluate the window at `now`, tolerating `skew` on both bounds.
    ///
    /// Expiry is checked first, so a window that is both ended and not yet
    /// started (created after expires) reports [`LifetimeStatus::Expired`].
    /// A bound shifted by `skew` beyond the representable range is unbounded.
    pub fn evaluate(&self, now: DateTime<Utc>, skew: Duration) -> LifetimeStatus {
        if let Some(expires) = self.expires
            && expires
                .checked_add_signed(skew)
                .is_some_and(|latest| now > latest)
        {
            return LifetimeStatus::Expired;
        }
        if let Some(created) = self.created
            && created
                .checked_sub_signed(skew)
                .is_some_and(|earliest| now < earliest)
        {
            return LifetimeStatus::NotYetValid;
        }
        LifetimeStatus::Current
    }
}

/// Parse an `xsd:dateTime` value (`2024-01-01T00:00:00Z`,
/// `2024-01-01T00:00:00.000Z`, or with a numeric offset) into UTC.
///
/// # Errors
///
/// Returns the `chrono` parse error when `value` is not an RFC 3339 timestamp.
pub fn parse_xsd_date_time(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|ts| ts.with_timezone(&Utc))
}
