//! Read-model projections for the IAM event log.
//!
//! # Overview
//!
//! This crate provides the concrete side of the projection engine:
//! - **Events**: the [`DomainEvent`] union and its per-type payload mappers
//! - **Projections**: [`InstanceProjection`] and [`OrgDomainProjection`]
//! - **Consumption loop**: [`ProjectionHandler`] with watermarks, retries and shutdown
//! - **`PostgreSQL`**: [`PostgresExecuter`], one transaction per event
//!
//! # CQRS Separation
//!
//! Projection tables live in the read-side database:
//!
//! ```text
//! Event Log (Write)  →  EventSource  →  ProjectionHandler  →  Projection DB (Read)
//! ```
//!
//! # Running Projections
//!
//! ```ignore
//! use iam_projections::*;
//! use std::sync::Arc;
//!
//! let config = ProjectionConfig::from_env()?;
//! let catalog = Arc::new(config.catalog());
//! let executer = Arc::new(PostgresExecuter::connect(&config, Arc::clone(&catalog)).await?);
//! executer.migrate().await?;
//! register_metrics();
//!
//! let (instances, stop_instances) = ProjectionHandler::new(
//!     InstanceProjection::new(Arc::clone(&catalog)),
//!     Arc::clone(&source),
//!     executer.clone(),
//! );
//! let (domains, stop_domains) = ProjectionHandler::new(
//!     OrgDomainProjection::new(catalog),
//!     source,
//!     executer,
//! );
//!
//! let tasks = [
//!     instances.with_config(&config).spawn(),
//!     domains.with_config(&config).spawn(),
//! ];
//! ```

pub mod cascade;
pub mod catalog;
pub mod config;
pub mod events;
pub mod handler;
pub mod instance;
pub mod metrics;
pub mod org_domain;
pub mod postgres;
pub mod retry;

// Re-export main types for convenience
pub use cascade::InstanceRemovedCascade;
pub use catalog::{Catalog, InstanceCatalog, OrgDomainCatalog};
pub use config::{ConfigError, ProjectionConfig};
pub use events::DomainEvent;
pub use handler::{Outcome, ProjectionHandler};
pub use instance::{INSTANCE_PROJECTION, InstanceProjection};
pub use metrics::register_metrics;
pub use org_domain::{ORG_DOMAIN_PROJECTION, OrgDomainProjection};
pub use postgres::PostgresExecuter;
pub use retry::RetryPolicy;
