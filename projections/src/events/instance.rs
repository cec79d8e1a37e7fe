//! Events of the `instance` aggregate.

use iam_projection_core::event::EventMapper;
use serde::Deserialize;

/// Aggregate type tag of instance events.
pub const AGGREGATE_TYPE: &str = "instance";

/// `instance.added`
pub const ADDED: &str = "instance.added";
/// `instance.removed`
pub const REMOVED: &str = "instance.removed";
/// `instance.default.org.set`
pub const DEFAULT_ORG_SET: &str = "instance.default.org.set";
/// `instance.iam.project.set`
pub const IAM_PROJECT_SET: &str = "instance.iam.project.set";
/// `instance.iam.console.set`
pub const CONSOLE_SET: &str = "instance.iam.console.set";
/// `instance.default.language.set`
pub const DEFAULT_LANGUAGE_SET: &str = "instance.default.language.set";

/// A new instance (tenant) was created.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct InstanceAdded {
    /// Display name
    pub name: String,
}

impl EventMapper for InstanceAdded {
    const AGGREGATE_TYPE: &'static str = AGGREGATE_TYPE;
    const EVENT_TYPE: &'static str = ADDED;
}

/// The instance was removed, together with everything scoped to it.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct InstanceRemoved {
    /// Name at removal time; informational only
    pub name: Option<String>,
}

impl EventMapper for InstanceRemoved {
    const AGGREGATE_TYPE: &'static str = AGGREGATE_TYPE;
    const EVENT_TYPE: &'static str = REMOVED;
}

/// The instance's default organization changed.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct DefaultOrgSet {
    /// New default organization
    #[serde(rename = "orgId")]
    pub org_id: Option<String>,
}

impl EventMapper for DefaultOrgSet {
    const AGGREGATE_TYPE: &'static str = AGGREGATE_TYPE;
    const EVENT_TYPE: &'static str = DEFAULT_ORG_SET;
}

/// The project holding the instance's own management applications was set.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct IamProjectSet {
    /// Management project
    #[serde(rename = "iamProjectId")]
    pub project_id: Option<String>,
}

impl EventMapper for IamProjectSet {
    const AGGREGATE_TYPE: &'static str = AGGREGATE_TYPE;
    const EVENT_TYPE: &'static str = IAM_PROJECT_SET;
}

/// The management console application was registered.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ConsoleSet {
    /// OIDC client id of the console
    #[serde(rename = "clientId")]
    pub client_id: Option<String>,
    /// Application id of the console
    #[serde(rename = "appId")]
    pub app_id: Option<String>,
}

impl EventMapper for ConsoleSet {
    const AGGREGATE_TYPE: &'static str = AGGREGATE_TYPE;
    const EVENT_TYPE: &'static str = CONSOLE_SET;
}

/// The instance's default language changed.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct DefaultLanguageSet {
    /// Language tag, e.g. `en`
    pub language: Option<String>,
}

impl EventMapper for DefaultLanguageSet {
    const AGGREGATE_TYPE: &'static str = AGGREGATE_TYPE;
    const EVENT_TYPE: &'static str = DEFAULT_LANGUAGE_SET;
}
