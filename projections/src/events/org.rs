//! Events of the `org` aggregate that concern its domains.

use iam_projection_core::event::EventMapper;
use serde::Deserialize;
use thiserror::Error;

/// Aggregate type tag of organization events.
pub const AGGREGATE_TYPE: &str = "org";

/// `org.domain.added`
pub const DOMAIN_ADDED: &str = "org.domain.added";
/// `org.domain.verification.added`
pub const DOMAIN_VERIFICATION_ADDED: &str = "org.domain.verification.added";
/// `org.domain.verified`
pub const DOMAIN_VERIFIED: &str = "org.domain.verified";
/// `org.domain.primary.set`
pub const DOMAIN_PRIMARY_SET: &str = "org.domain.primary.set";
/// `org.domain.removed`
pub const DOMAIN_REMOVED: &str = "org.domain.removed";
/// `org.removed`
pub const REMOVED: &str = "org.removed";

/// Unknown numeric validation type in a payload.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("unknown domain validation type {0}")]
pub struct UnknownValidationType(pub u8);

/// How ownership of a domain is proven.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "u8")]
pub enum OrgDomainValidationType {
    /// Not chosen yet
    #[default]
    Unspecified,
    /// Token served over HTTP
    Http,
    /// Token in a DNS TXT record
    Dns,
}

impl OrgDomainValidationType {
    /// Stored code of this validation type.
    #[must_use]
    pub const fn code(self) -> i16 {
        match self {
            Self::Unspecified => 0,
            Self::Http => 1,
            Self::Dns => 2,
        }
    }
}

impl TryFrom<u8> for OrgDomainValidationType {
    type Error = UnknownValidationType;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Unspecified),
            1 => Ok(Self::Http),
            2 => Ok(Self::Dns),
            other => Err(UnknownValidationType(other)),
        }
    }
}

/// A domain was added to the organization.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct DomainAdded {
    /// Domain name
    pub domain: String,
}

impl EventMapper for DomainAdded {
    const AGGREGATE_TYPE: &'static str = AGGREGATE_TYPE;
    const EVENT_TYPE: &'static str = DOMAIN_ADDED;
}

/// A domain verification was started.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct DomainVerificationAdded {
    /// Domain name
    pub domain: String,
    /// Chosen validation method
    #[serde(rename = "validationType")]
    pub validation_type: Option<OrgDomainValidationType>,
}

impl EventMapper for DomainVerificationAdded {
    const AGGREGATE_TYPE: &'static str = AGGREGATE_TYPE;
    const EVENT_TYPE: &'static str = DOMAIN_VERIFICATION_ADDED;
}

/// Ownership of a domain was proven.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct DomainVerified {
    /// Domain name
    pub domain: String,
}

impl EventMapper for DomainVerified {
    const AGGREGATE_TYPE: &'static str = AGGREGATE_TYPE;
    const EVENT_TYPE: &'static str = DOMAIN_VERIFIED;
}

/// A domain became the organization's primary domain.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct DomainPrimarySet {
    /// Domain name
    pub domain: String,
}

impl EventMapper for DomainPrimarySet {
    const AGGREGATE_TYPE: &'static str = AGGREGATE_TYPE;
    const EVENT_TYPE: &'static str = DOMAIN_PRIMARY_SET;
}

/// A domain was removed from the organization.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct DomainRemoved {
    /// Domain name
    pub domain: String,
}

impl EventMapper for DomainRemoved {
    const AGGREGATE_TYPE: &'static str = AGGREGATE_TYPE;
    const EVENT_TYPE: &'static str = DOMAIN_REMOVED;
}

/// The organization was removed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct OrgRemoved {}

impl EventMapper for OrgRemoved {
    const AGGREGATE_TYPE: &'static str = AGGREGATE_TYPE;
    const EVENT_TYPE: &'static str = REMOVED;
}
