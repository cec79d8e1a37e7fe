//! The `org_domains` projection: one row per (instance, organization, domain).
//!
//! At most one domain per organization is primary. Setting a primary domain
//! therefore yields two statements committed together: clear the flag on
//! whichever row currently holds it, then set it on the target row.

use crate::cascade::InstanceRemovedCascade;
use crate::catalog::{Catalog, OrgDomainCatalog};
use crate::events::{
    DomainAdded, DomainEvent, DomainPrimarySet, DomainRemoved, DomainVerificationAdded,
    DomainVerified, OrgDomainValidationType, OrgRemoved, instance, org,
};
use iam_projection_core::aggregate::EventKey;
use iam_projection_core::error::Result;
use iam_projection_core::event::EventHeader;
use iam_projection_core::projection::{Projection, Reducer};
use iam_projection_core::statement::{Column, Condition, Statement, StatementBatch, Statements};
use std::sync::Arc;

/// Name of the organization domains projection.
pub const ORG_DOMAIN_PROJECTION: &str = "org_domains";

const SUBSCRIPTIONS: [EventKey; 7] = [
    EventKey::new(org::AGGREGATE_TYPE, org::DOMAIN_ADDED),
    EventKey::new(org::AGGREGATE_TYPE, org::DOMAIN_VERIFICATION_ADDED),
    EventKey::new(org::AGGREGATE_TYPE, org::DOMAIN_VERIFIED),
    EventKey::new(org::AGGREGATE_TYPE, org::DOMAIN_PRIMARY_SET),
    EventKey::new(org::AGGREGATE_TYPE, org::DOMAIN_REMOVED),
    EventKey::new(org::AGGREGATE_TYPE, org::REMOVED),
    EventKey::new(instance::AGGREGATE_TYPE, instance::REMOVED),
];

/// Maintains `org_domains` from organization and instance events.
#[derive(Clone, Debug)]
pub struct OrgDomainProjection {
    catalog: Arc<Catalog>,
    instance_removed: InstanceRemovedCascade,
}

impl OrgDomainProjection {
    /// Create the projection over the catalog's `org_domains` table.
    #[must_use]
    pub fn new(catalog: Arc<Catalog>) -> Self {
        let instance_removed = InstanceRemovedCascade::new(
            catalog.org_domains().table(),
            OrgDomainCatalog::INSTANCE_ID,
        );
        Self {
            catalog,
            instance_removed,
        }
    }

    fn table(&self) -> &str {
        self.catalog.org_domains().table()
    }

    /// `org.domain.added`: insert an unverified, non-primary domain.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for any other event.
    pub fn reduce_domain_added(&self, event: &DomainEvent) -> Result<StatementBatch> {
        let DomainEvent::OrgDomainAdded(e) = event else {
            return Err(event.mismatch::<DomainAdded>());
        };
        let header = &e.header;
        let statement = Statement::insert(
            self.table(),
            vec![
                Column::new(OrgDomainCatalog::CREATION_DATE, header.creation_date),
                Column::new(OrgDomainCatalog::CHANGE_DATE, header.creation_date),
                Column::new(OrgDomainCatalog::SEQUENCE, header.sequence),
                Column::new(OrgDomainCatalog::DOMAIN, e.payload.domain.as_str()),
                Column::new(OrgDomainCatalog::ORG_ID, header.aggregate_id.as_str()),
                Column::new(OrgDomainCatalog::INSTANCE_ID, header.instance_id.as_str()),
                Column::new(OrgDomainCatalog::IS_VERIFIED, false),
                Column::new(OrgDomainCatalog::IS_PRIMARY, false),
                Column::new(
                    OrgDomainCatalog::VALIDATION_TYPE,
                    OrgDomainValidationType::Unspecified.code(),
                ),
            ],
        )?;
        Ok(StatementBatch::single(header.clone(), statement))
    }

    /// `org.domain.verification.added`: record the validation method.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for any other event.
    pub fn reduce_domain_verification_added(&self, event: &DomainEvent) -> Result<StatementBatch> {
        let DomainEvent::OrgDomainVerificationAdded(e) = event else {
            return Err(event.mismatch::<DomainVerificationAdded>());
        };
        let mut columns = change_columns(&e.header);
        if let Some(validation_type) = e.payload.validation_type {
            columns.push(Column::new(
                OrgDomainCatalog::VALIDATION_TYPE,
                validation_type.code(),
            ));
        }
        let statement = Statement::update(
            self.table(),
            columns,
            domain_conditions(&e.header, &e.payload.domain),
        )?;
        Ok(StatementBatch::single(e.header.clone(), statement))
    }

    /// `org.domain.verified`
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for any other event.
    pub fn reduce_domain_verified(&self, event: &DomainEvent) -> Result<StatementBatch> {
        let DomainEvent::OrgDomainVerified(e) = event else {
            return Err(event.mismatch::<DomainVerified>());
        };
        let mut columns = change_columns(&e.header);
        columns.push(Column::new(OrgDomainCatalog::IS_VERIFIED, true));
        let statement = Statement::update(
            self.table(),
            columns,
            domain_conditions(&e.header, &e.payload.domain),
        )?;
        Ok(StatementBatch::single(e.header.clone(), statement))
    }

    /// `org.domain.primary.set`: clear the current primary, then set the new one.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for any other event.
    pub fn reduce_primary_domain_set(&self, event: &DomainEvent) -> Result<StatementBatch> {
        let DomainEvent::OrgDomainPrimarySet(e) = event else {
            return Err(event.mismatch::<DomainPrimarySet>());
        };
        let header = &e.header;

        let mut clear_columns = change_columns(header);
        clear_columns.push(Column::new(OrgDomainCatalog::IS_PRIMARY, false));
        let clear = Statement::update(
            self.table(),
            clear_columns,
            vec![
                Condition::eq(OrgDomainCatalog::ORG_ID, header.aggregate_id.as_str()),
                Condition::eq(OrgDomainCatalog::IS_PRIMARY, true),
                Condition::eq(OrgDomainCatalog::INSTANCE_ID, header.instance_id.as_str()),
            ],
        )?;

        let mut set_columns = change_columns(header);
        set_columns.push(Column::new(OrgDomainCatalog::IS_PRIMARY, true));
        let set = Statement::update(
            self.table(),
            set_columns,
            domain_conditions(header, &e.payload.domain),
        )?;

        let mut statements = Statements::new();
        statements.push(clear);
        statements.push(set);
        Ok(StatementBatch::new(header.clone(), statements))
    }

    /// `org.domain.removed`
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for any other event.
    pub fn reduce_domain_removed(&self, event: &DomainEvent) -> Result<StatementBatch> {
        let DomainEvent::OrgDomainRemoved(e) = event else {
            return Err(event.mismatch::<DomainRemoved>());
        };
        let statement =
            Statement::delete(self.table(), domain_conditions(&e.header, &e.payload.domain))?;
        Ok(StatementBatch::single(e.header.clone(), statement))
    }

    /// `org.removed`: delete every domain of the organization.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for any other event.
    pub fn reduce_org_removed(&self, event: &DomainEvent) -> Result<StatementBatch> {
        let DomainEvent::OrgRemoved(e) = event else {
            return Err(event.mismatch::<OrgRemoved>());
        };
        let statement = Statement::delete(
            self.table(),
            vec![
                Condition::eq(OrgDomainCatalog::ORG_ID, e.header.aggregate_id.as_str()),
                Condition::eq(OrgDomainCatalog::INSTANCE_ID, e.header.instance_id.as_str()),
            ],
        )?;
        Ok(StatementBatch::single(e.header.clone(), statement))
    }

    /// `instance.removed`: delete every domain of the instance.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for any other event.
    pub fn reduce_instance_removed(&self, event: &DomainEvent) -> Result<StatementBatch> {
        self.instance_removed.reduce(event)
    }
}

fn change_columns(header: &EventHeader) -> Vec<Column> {
    vec![
        Column::new(OrgDomainCatalog::CHANGE_DATE, header.creation_date),
        Column::new(OrgDomainCatalog::SEQUENCE, header.sequence),
    ]
}

fn domain_conditions(header: &EventHeader, domain: &str) -> Vec<Condition> {
    vec![
        Condition::eq(OrgDomainCatalog::DOMAIN, domain),
        Condition::eq(OrgDomainCatalog::ORG_ID, header.aggregate_id.as_str()),
        Condition::eq(OrgDomainCatalog::INSTANCE_ID, header.instance_id.as_str()),
    ]
}

impl Projection for OrgDomainProjection {
    type Event = DomainEvent;

    fn name(&self) -> &str {
        ORG_DOMAIN_PROJECTION
    }

    fn subscriptions(&self) -> &[EventKey] {
        &SUBSCRIPTIONS
    }

    fn reduce(&self, event: &DomainEvent) -> Result<Option<StatementBatch>> {
        match event {
            DomainEvent::OrgDomainAdded(_) => self.reduce_domain_added(event).map(Some),
            DomainEvent::OrgDomainVerificationAdded(_) => {
                self.reduce_domain_verification_added(event).map(Some)
            }
            DomainEvent::OrgDomainVerified(_) => self.reduce_domain_verified(event).map(Some),
            DomainEvent::OrgDomainPrimarySet(_) => self.reduce_primary_domain_set(event).map(Some),
            DomainEvent::OrgDomainRemoved(_) => self.reduce_domain_removed(event).map(Some),
            DomainEvent::OrgRemoved(_) => self.reduce_org_removed(event).map(Some),
            DomainEvent::InstanceRemoved(_) => self.reduce_instance_removed(event).map(Some),
            DomainEvent::InstanceAdded(_)
            | DomainEvent::InstanceDefaultOrgSet(_)
            | DomainEvent::InstanceIamProjectSet(_)
            | DomainEvent::InstanceConsoleSet(_)
            | DomainEvent::InstanceDefaultLanguageSet(_) => Ok(None),
        }
    }
}
