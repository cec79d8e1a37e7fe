//! The `instances` projection: one row per instance (tenant).
//!
//! Rows are keyed by the event's instance id. Field-set events whose payload
//! omits the field only touch `change_date` and `sequence`.

use crate::cascade::InstanceRemovedCascade;
use crate::catalog::{Catalog, InstanceCatalog};
use crate::events::{
    ConsoleSet, DefaultLanguageSet, DefaultOrgSet, DomainEvent, IamProjectSet, InstanceAdded,
    instance,
};
use iam_projection_core::aggregate::EventKey;
use iam_projection_core::error::Result;
use iam_projection_core::event::EventHeader;
use iam_projection_core::projection::{Projection, Reducer};
use iam_projection_core::statement::{Column, Condition, Statement, StatementBatch};
use std::sync::Arc;

/// Name of the instances projection.
pub const INSTANCE_PROJECTION: &str = "instances";

const SUBSCRIPTIONS: [EventKey; 6] = [
    EventKey::new(instance::AGGREGATE_TYPE, instance::ADDED),
    EventKey::new(instance::AGGREGATE_TYPE, instance::REMOVED),
    EventKey::new(instance::AGGREGATE_TYPE, instance::DEFAULT_ORG_SET),
    EventKey::new(instance::AGGREGATE_TYPE, instance::IAM_PROJECT_SET),
    EventKey::new(instance::AGGREGATE_TYPE, instance::CONSOLE_SET),
    EventKey::new(instance::AGGREGATE_TYPE, instance::DEFAULT_LANGUAGE_SET),
];

/// Maintains `instances` from instance events.
#[derive(Clone, Debug)]
pub struct InstanceProjection {
    catalog: Arc<Catalog>,
    removed: InstanceRemovedCascade,
}

impl InstanceProjection {
    /// Create the projection over the catalog's `instances` table.
    #[must_use]
    pub fn new(catalog: Arc<Catalog>) -> Self {
        let removed =
            InstanceRemovedCascade::new(catalog.instances().table(), InstanceCatalog::ID);
        Self { catalog, removed }
    }

    fn table(&self) -> &str {
        self.catalog.instances().table()
    }

    /// `instance.added`: insert the full initial row.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for any other event.
    pub fn reduce_instance_added(&self, event: &DomainEvent) -> Result<StatementBatch> {
        let DomainEvent::InstanceAdded(e) = event else {
            return Err(event.mismatch::<InstanceAdded>());
        };
        let header = &e.header;
        let statement = Statement::insert(
            self.table(),
            vec![
                Column::new(InstanceCatalog::ID, header.instance_id.as_str()),
                Column::new(InstanceCatalog::CREATION_DATE, header.creation_date),
                Column::new(InstanceCatalog::CHANGE_DATE, header.creation_date),
                Column::new(InstanceCatalog::SEQUENCE, header.sequence),
                Column::new(InstanceCatalog::NAME, e.payload.name.as_str()),
            ],
        )?;
        Ok(StatementBatch::single(header.clone(), statement))
    }

    /// `instance.removed`: delete the instance row.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for any other event.
    pub fn reduce_instance_removed(&self, event: &DomainEvent) -> Result<StatementBatch> {
        self.removed.reduce(event)
    }

    /// `instance.default.org.set`
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for any other event.
    pub fn reduce_default_org_set(&self, event: &DomainEvent) -> Result<StatementBatch> {
        let DomainEvent::InstanceDefaultOrgSet(e) = event else {
            return Err(event.mismatch::<DefaultOrgSet>());
        };
        self.set_fields(
            &e.header,
            [(InstanceCatalog::DEFAULT_ORG_ID, e.payload.org_id.as_deref())],
        )
    }

    /// `instance.iam.project.set`
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for any other event.
    pub fn reduce_iam_project_set(&self, event: &DomainEvent) -> Result<StatementBatch> {
        let DomainEvent::InstanceIamProjectSet(e) = event else {
            return Err(event.mismatch::<IamProjectSet>());
        };
        self.set_fields(
            &e.header,
            [(InstanceCatalog::IAM_PROJECT_ID, e.payload.project_id.as_deref())],
        )
    }

    /// `instance.iam.console.set`
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for any other event.
    pub fn reduce_console_set(&self, event: &DomainEvent) -> Result<StatementBatch> {
        let DomainEvent::InstanceConsoleSet(e) = event else {
            return Err(event.mismatch::<ConsoleSet>());
        };
        self.set_fields(
            &e.header,
            [
                (InstanceCatalog::CONSOLE_CLIENT_ID, e.payload.client_id.as_deref()),
                (InstanceCatalog::CONSOLE_APP_ID, e.payload.app_id.as_deref()),
            ],
        )
    }

    /// `instance.default.language.set`
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for any other event.
    pub fn reduce_default_language_set(&self, event: &DomainEvent) -> Result<StatementBatch> {
        let DomainEvent::InstanceDefaultLanguageSet(e) = event else {
            return Err(event.mismatch::<DefaultLanguageSet>());
        };
        self.set_fields(
            &e.header,
            [(InstanceCatalog::DEFAULT_LANGUAGE, e.payload.language.as_deref())],
        )
    }

    /// Update `change_date`, `sequence` and every present field of the instance row.
    fn set_fields<const N: usize>(
        &self,
        header: &EventHeader,
        fields: [(&'static str, Option<&str>); N],
    ) -> Result<StatementBatch> {
        let mut columns = vec![
            Column::new(InstanceCatalog::CHANGE_DATE, header.creation_date),
            Column::new(InstanceCatalog::SEQUENCE, header.sequence),
        ];
        columns.extend(
            fields
                .into_iter()
                .filter_map(|(name, value)| value.map(|v| Column::new(name, v))),
        );

        let statement = Statement::update(
            self.table(),
            columns,
            vec![Condition::eq(InstanceCatalog::ID, header.instance_id.as_str())],
        )?;
        Ok(StatementBatch::single(header.clone(), statement))
    }
}

impl Projection for InstanceProjection {
    type Event = DomainEvent;

    fn name(&self) -> &str {
        INSTANCE_PROJECTION
    }

    fn subscriptions(&self) -> &[EventKey] {
        &SUBSCRIPTIONS
    }

    fn reduce(&self, event: &DomainEvent) -> Result<Option<StatementBatch>> {
        match event {
            DomainEvent::InstanceAdded(_) => self.reduce_instance_added(event).map(Some),
            DomainEvent::InstanceRemoved(_) => self.reduce_instance_removed(event).map(Some),
            DomainEvent::InstanceDefaultOrgSet(_) => self.reduce_default_org_set(event).map(Some),
            DomainEvent::InstanceIamProjectSet(_) => self.reduce_iam_project_set(event).map(Some),
            DomainEvent::InstanceConsoleSet(_) => self.reduce_console_set(event).map(Some),
            DomainEvent::InstanceDefaultLanguageSet(_) => {
                self.reduce_default_language_set(event).map(Some)
            }
            DomainEvent::OrgDomainAdded(_)
            | DomainEvent::OrgDomainVerificationAdded(_)
            | DomainEvent::OrgDomainVerified(_)
            | DomainEvent::OrgDomainPrimarySet(_)
            | DomainEvent::OrgDomainRemoved(_)
            | DomainEvent::OrgRemoved(_) => Ok(None),
        }
    }
}
