//! Table and column layout of the projection tables.
//!
//! Reducers refer to columns through the constants here instead of string
//! literals. The [`Catalog`] itself is built once from the configured schema and
//! shared by every projection through an `Arc`.

/// Default schema holding the projection tables.
pub const DEFAULT_SCHEMA: &str = "projections";

/// Layout of the `instances` table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstanceCatalog {
    table: String,
}

impl InstanceCatalog {
    /// Unqualified table name.
    pub const TABLE: &'static str = "instances";

    /// Instance id (primary key)
    pub const ID: &'static str = "id";
    /// Creation timestamp
    pub const CREATION_DATE: &'static str = "creation_date";
    /// Last change timestamp
    pub const CHANGE_DATE: &'static str = "change_date";
    /// Sequence of the last applied event
    pub const SEQUENCE: &'static str = "sequence";
    /// Display name
    pub const NAME: &'static str = "name";
    /// Default organization
    pub const DEFAULT_ORG_ID: &'static str = "default_org_id";
    /// Management project
    pub const IAM_PROJECT_ID: &'static str = "iam_project_id";
    /// Console client id
    pub const CONSOLE_CLIENT_ID: &'static str = "console_client_id";
    /// Console application id
    pub const CONSOLE_APP_ID: &'static str = "console_app_id";
    /// Default language tag
    pub const DEFAULT_LANGUAGE: &'static str = "default_language";

    /// Every column in table order.
    pub const COLUMNS: [&'static str; 10] = [
        Self::ID,
        Self::CREATION_DATE,
        Self::CHANGE_DATE,
        Self::SEQUENCE,
        Self::NAME,
        Self::DEFAULT_ORG_ID,
        Self::IAM_PROJECT_ID,
        Self::CONSOLE_CLIENT_ID,
        Self::CONSOLE_APP_ID,
        Self::DEFAULT_LANGUAGE,
    ];

    fn new(schema: &str) -> Self {
        Self {
            table: format!("{schema}.{}", Self::TABLE),
        }
    }

    /// Schema-qualified table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }
}

/// Layout of the `org_domains` table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrgDomainCatalog {
    table: String,
}

impl OrgDomainCatalog {
    /// Unqualified table name.
    pub const TABLE: &'static str = "org_domains";

    /// Creation timestamp
    pub const CREATION_DATE: &'static str = "creation_date";
    /// Last change timestamp
    pub const CHANGE_DATE: &'static str = "change_date";
    /// Sequence of the last applied event
    pub const SEQUENCE: &'static str = "sequence";
    /// Domain name
    pub const DOMAIN: &'static str = "domain";
    /// Owning organization
    pub const ORG_ID: &'static str = "org_id";
    /// Owning instance
    pub const INSTANCE_ID: &'static str = "instance_id";
    /// Whether ownership was proven
    pub const IS_VERIFIED: &'static str = "is_verified";
    /// Whether this is the organization's primary domain
    pub const IS_PRIMARY: &'static str = "is_primary";
    /// Validation method code
    pub const VALIDATION_TYPE: &'static str = "validation_type";

    /// Every column in table order.
    pub const COLUMNS: [&'static str; 9] = [
        Self::CREATION_DATE,
        Self::CHANGE_DATE,
        Self::SEQUENCE,
        Self::DOMAIN,
        Self::ORG_ID,
        Self::INSTANCE_ID,
        Self::IS_VERIFIED,
        Self::IS_PRIMARY,
        Self::VALIDATION_TYPE,
    ];

    fn new(schema: &str) -> Self {
        Self {
            table: format!("{schema}.{}", Self::TABLE),
        }
    }

    /// Schema-qualified table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }
}

/// Layouts of every table the engine writes, qualified by one schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Catalog {
    schema: String,
    instances: InstanceCatalog,
    org_domains: OrgDomainCatalog,
    current_sequences: String,
}

impl Catalog {
    /// Unqualified name of the watermark table.
    pub const CURRENT_SEQUENCES: &'static str = "current_sequences";

    /// Build the catalog for tables living in `schema`.
    ///
    /// The schema is not validated here; [`ProjectionConfig`](crate::config::ProjectionConfig)
    /// rejects names that are not plain identifiers.
    #[must_use]
    pub fn new(schema: impl Into<String>) -> Self {
        let schema = schema.into();
        Self {
            instances: InstanceCatalog::new(&schema),
            org_domains: OrgDomainCatalog::new(&schema),
            current_sequences: format!("{schema}.{}", Self::CURRENT_SEQUENCES),
            schema,
        }
    }

    /// Schema holding every table.
    #[must_use]
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// The `instances` table.
    #[must_use]
    pub const fn instances(&self) -> &InstanceCatalog {
        &self.instances
    }

    /// The `org_domains` table.
    #[must_use]
    pub const fn org_domains(&self) -> &OrgDomainCatalog {
        &self.org_domains
    }

    /// Schema-qualified watermark table.
    #[must_use]
    pub fn current_sequences(&self) -> &str {
        &self.current_sequences
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(DEFAULT_SCHEMA)
    }
}
