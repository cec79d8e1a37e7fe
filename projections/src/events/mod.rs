//! Domain events consumed by the projections in this crate.
//!
//! [`DomainEvent`] is the closed set of every event kind the engine understands.
//! Decoding routes a raw event by its `(aggregate type, event type)` tags to
//! exactly one mapper; each projection then matches the union exhaustively.

pub mod instance;
pub mod org;

use iam_projection_core::aggregate::EventKey;
use iam_projection_core::error::{ProjectionError, Result};
use iam_projection_core::event::{DecodeEvent, Event, EventHeader, EventMapper, RawEvent};

pub use instance::{
    ConsoleSet, DefaultLanguageSet, DefaultOrgSet, IamProjectSet, InstanceAdded, InstanceRemoved,
};
pub use org::{
    DomainAdded, DomainPrimarySet, DomainRemoved, DomainVerificationAdded, DomainVerified,
    OrgDomainValidationType, OrgRemoved,
};

/// Every event kind known to the engine.
#[derive(Clone, Debug, PartialEq)]
pub enum DomainEvent {
    /// `instance.added`
    InstanceAdded(Event<InstanceAdded>),
    /// `instance.removed`
    InstanceRemoved(Event<InstanceRemoved>),
    /// `instance.default.org.set`
    InstanceDefaultOrgSet(Event<DefaultOrgSet>),
    /// `instance.iam.project.set`
    InstanceIamProjectSet(Event<IamProjectSet>),
    /// `instance.iam.console.set`
    InstanceConsoleSet(Event<ConsoleSet>),
    /// `instance.default.language.set`
    InstanceDefaultLanguageSet(Event<DefaultLanguageSet>),
    /// `org.domain.added`
    OrgDomainAdded(Event<DomainAdded>),
    /// `org.domain.verification.added`
    OrgDomainVerificationAdded(Event<DomainVerificationAdded>),
    /// `org.domain.verified`
    OrgDomainVerified(Event<DomainVerified>),
    /// `org.domain.primary.set`
    OrgDomainPrimarySet(Event<DomainPrimarySet>),
    /// `org.domain.removed`
    OrgDomainRemoved(Event<DomainRemoved>),
    /// `org.removed`
    OrgRemoved(Event<OrgRemoved>),
}

impl DomainEvent {
    /// Keys of every event kind in the union.
    pub const KEYS: [EventKey; 12] = [
        EventKey::new(instance::AGGREGATE_TYPE, instance::ADDED),
        EventKey::new(instance::AGGREGATE_TYPE, instance::REMOVED),
        EventKey::new(instance::AGGREGATE_TYPE, instance::DEFAULT_ORG_SET),
        EventKey::new(instance::AGGREGATE_TYPE, instance::IAM_PROJECT_SET),
        EventKey::new(instance::AGGREGATE_TYPE, instance::CONSOLE_SET),
        EventKey::new(instance::AGGREGATE_TYPE, instance::DEFAULT_LANGUAGE_SET),
        EventKey::new(org::AGGREGATE_TYPE, org::DOMAIN_ADDED),
        EventKey::new(org::AGGREGATE_TYPE, org::DOMAIN_VERIFICATION_ADDED),
        EventKey::new(org::AGGREGATE_TYPE, org::DOMAIN_VERIFIED),
        EventKey::new(org::AGGREGATE_TYPE, org::DOMAIN_PRIMARY_SET),
        EventKey::new(org::AGGREGATE_TYPE, org::DOMAIN_REMOVED),
        EventKey::new(org::AGGREGATE_TYPE, org::REMOVED),
    ];

    /// The error a reducer for `P` returns when handed this event instead.
    #[must_use]
    pub fn mismatch<P: EventMapper>(&self) -> ProjectionError {
        ProjectionError::invalid_argument(P::key().to_string(), self.header().kind())
    }
}

impl DecodeEvent for DomainEvent {
    fn decode(raw: &RawEvent) -> Result<Self> {
        let event = match (raw.aggregate_type.as_str(), raw.event_type.as_str()) {
            (instance::AGGREGATE_TYPE, instance::ADDED) => Self::InstanceAdded(Event::map(raw)?),
            (instance::AGGREGATE_TYPE, instance::REMOVED) => {
                Self::InstanceRemoved(Event::map(raw)?)
            }
            (instance::AGGREGATE_TYPE, instance::DEFAULT_ORG_SET) => {
                Self::InstanceDefaultOrgSet(Event::map(raw)?)
            }
            (instance::AGGREGATE_TYPE, instance::IAM_PROJECT_SET) => {
                Self::InstanceIamProjectSet(Event::map(raw)?)
            }
            (instance::AGGREGATE_TYPE, instance::CONSOLE_SET) => {
                Self::InstanceConsoleSet(Event::map(raw)?)
            }
            (instance::AGGREGATE_TYPE, instance::DEFAULT_LANGUAGE_SET) => {
                Self::InstanceDefaultLanguageSet(Event::map(raw)?)
            }
            (org::AGGREGATE_TYPE, org::DOMAIN_ADDED) => Self::OrgDomainAdded(Event::map(raw)?),
            (org::AGGREGATE_TYPE, org::DOMAIN_VERIFICATION_ADDED) => {
                Self::OrgDomainVerificationAdded(Event::map(raw)?)
            }
            (org::AGGREGATE_TYPE, org::DOMAIN_VERIFIED) => {
                Self::OrgDomainVerified(Event::map(raw)?)
            }
            (org::AGGREGATE_TYPE, org::DOMAIN_PRIMARY_SET) => {
                Self::OrgDomainPrimarySet(Event::map(raw)?)
            }
            (org::AGGREGATE_TYPE, org::DOMAIN_REMOVED) => Self::OrgDomainRemoved(Event::map(raw)?),
            (org::AGGREGATE_TYPE, org::REMOVED) => Self::OrgRemoved(Event::map(raw)?),
            (aggregate_type, event_type) => {
                return Err(ProjectionError::UnknownEventType {
                    aggregate_type: aggregate_type.to_string(),
                    event_type: event_type.to_string(),
                });
            }
        };
        Ok(event)
    }

    fn header(&self) -> &EventHeader {
        match self {
            Self::InstanceAdded(e) => &e.header,
            Self::InstanceRemoved(e) => &e.header,
            Self::InstanceDefaultOrgSet(e) => &e.header,
            Self::InstanceIamProjectSet(e) => &e.header,
            Self::InstanceConsoleSet(e) => &e.header,
            Self::InstanceDefaultLanguageSet(e) => &e.header,
            Self::OrgDomainAdded(e) => &e.header,
            Self::OrgDomainVerificationAdded(e) => &e.header,
            Self::OrgDomainVerified(e) => &e.header,
            Self::OrgDomainPrimarySet(e) => &e.header,
            Self::OrgDomainRemoved(e) => &e.header,
            Self::OrgRemoved(e) => &e.header,
        }
    }
}
