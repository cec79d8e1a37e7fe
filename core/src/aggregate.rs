//! Aggregate identification types.
//!
//! Every event belongs to exactly one aggregate (an instance, an organization, ...)
//! and every aggregate lives inside one instance (the tenant). Projection rows and
//! sequence watermarks are keyed by these identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for identifier parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid identifier: {0}")]
pub struct ParseIdError(String);

/// Unique identifier of an aggregate whose changes form one ordered event stream.
///
/// # Validation
///
/// - `FromStr::from_str()`: Rejects empty strings (use for external input)
/// - `From::from()` and `new()`: No validation (trusted input such as the event store)
///
/// # Examples
///
/// ```
/// use iam_projection_core::aggregate::AggregateId;
///
/// let id = AggregateId::new("org-123");
/// assert_eq!(id.as_str(), "org-123");
///
/// let parsed: AggregateId = "org-456".parse().unwrap();
/// assert_eq!(parsed, AggregateId::new("org-456"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AggregateId(String);

impl AggregateId {
    /// Create a new `AggregateId` from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert the identifier into its inner `String`.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for AggregateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AggregateId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseIdError("Aggregate ID cannot be empty".to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<String> for AggregateId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AggregateId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for AggregateId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier of the instance (tenant) an aggregate belongs to.
///
/// ```
/// use iam_projection_core::aggregate::InstanceId;
///
/// let id = InstanceId::new("instance-1");
/// assert_eq!(id.to_string(), "instance-1");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(String);

impl InstanceId {
    /// Create a new `InstanceId` from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for InstanceId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseIdError("Instance ID cannot be empty".to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<String> for InstanceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for InstanceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for InstanceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// An `(aggregate type, event type)` pair naming one kind of event.
///
/// Projections register the keys they react to; the consumption loop uses them
/// to filter the event stream and to decide whether an event is ignored.
///
/// ```
/// use iam_projection_core::aggregate::EventKey;
///
/// let key = EventKey::new("org", "org.domain.added");
/// assert_eq!(key.to_string(), "org/org.domain.added");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EventKey {
    /// Aggregate type tag (e.g. `"instance"`)
    pub aggregate_type: &'static str,
    /// Event type tag (e.g. `"instance.added"`)
    pub event_type: &'static str,
}

impl EventKey {
    /// Create a new event key.
    #[must_use]
    pub const fn new(aggregate_type: &'static str, event_type: &'static str) -> Self {
        Self {
            aggregate_type,
            event_type,
        }
    }

    /// Check whether the given type tags name this key.
    #[must_use]
    pub fn matches(&self, aggregate_type: &str, event_type: &str) -> bool {
        self.aggregate_type == aggregate_type && self.event_type == event_type
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.aggregate_type, self.event_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_aggregate_id_is_rejected() {
        assert!("".parse::<AggregateId>().is_err());
        assert!("".parse::<InstanceId>().is_err());
    }

    #[test]
    fn event_key_matches_both_tags() {
        let key = EventKey::new("instance", "instance.removed");
        assert!(key.matches("instance", "instance.removed"));
        assert!(!key.matches("org", "instance.removed"));
        assert!(!key.matches("instance", "instance.added"));
    }
}
