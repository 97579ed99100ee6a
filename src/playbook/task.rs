//! Task definitions.
//!
//! A [`Task`] pairs a host selection with a resource body. The body is
//! validated when the task is built; a task whose type is unknown or whose
//! parameters are invalid is still kept, carrying the error, so that the
//! failure is reported for each targeted host at dispatch time and the other
//! tasks still run.

use serde::Deserialize;
use serde_yaml::Mapping;

use crate::error::{Error, Result};
use crate::inventory::Inventory;
use crate::modules::{de_scalar, Resource, ResourceType};

/// Sentinel host name that selects the whole inventory
pub const ALL_HOSTS: &str = "all";

/// Which inventory hosts a task targets
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HostSelection {
    /// Every inventory host, live or not
    #[default]
    All,
    /// Explicit host names, in the order given
    Named(Vec<String>),
}

impl HostSelection {
    /// Build a selection from host names.
    ///
    /// An empty list, or one containing `"all"`, selects every host.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut named: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if name == ALL_HOSTS {
                return HostSelection::All;
            }
            if !named.contains(&name) {
                named.push(name);
            }
        }

        if named.is_empty() {
            HostSelection::All
        } else {
            HostSelection::Named(named)
        }
    }

    /// Resolve to host names. `All` expands to the inventory in its order.
    pub fn resolve(&self, inventory: &Inventory) -> Vec<String> {
        match self {
            HostSelection::All => inventory.host_names(),
            HostSelection::Named(names) => names.clone(),
        }
    }
}

/// `hosts:` may be a single name or a list
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HostsField {
    One(String),
    Many(Vec<String>),
}

/// Raw task as it appears in the playbook
#[derive(Debug, Deserialize)]
pub(crate) struct TaskDocument {
    #[serde(default, deserialize_with = "de_scalar")]
    name: Option<String>,
    /// Absent reads as an empty tag, which no resource type matches
    #[serde(rename = "type", default, deserialize_with = "de_scalar")]
    resource_type: Option<String>,
    #[serde(default)]
    hosts: Option<HostsField>,
    /// Everything else is resource-specific
    #[serde(flatten)]
    params: Mapping,
}

/// One declarative intent of a playbook
#[derive(Debug)]
pub struct Task {
    /// Free text, only used in logs
    pub name: String,
    /// Resource type tag as written in the playbook
    pub resource_type: String,
    pub hosts: HostSelection,
    /// Validated body, or why it could not be validated
    pub resource: Result<Resource>,
}

impl Task {
    /// Build a task from an already validated resource
    pub fn new(name: impl Into<String>, hosts: HostSelection, resource: Resource) -> Self {
        Self {
            name: name.into(),
            resource_type: resource.kind().to_string(),
            hosts,
            resource: Ok(resource),
        }
    }

    /// Build a task from a type tag and raw parameters
    pub fn from_parts(
        name: impl Into<String>,
        resource_type: impl Into<String>,
        hosts: HostSelection,
        params: &Mapping,
    ) -> Self {
        let resource_type = resource_type.into();
        let resource = resource_type
            .parse::<ResourceType>()
            .and_then(|kind| Resource::parse(kind, params).map_err(Error::from));
        Self {
            name: name.into(),
            resource_type,
            hosts,
            resource,
        }
    }

    pub(crate) fn from_document(document: TaskDocument, index: usize) -> Self {
        let resource_type = document.resource_type.unwrap_or_default();
        let name = document.name.unwrap_or_else(|| match resource_type.as_str() {
            "" => format!("task #{}", index + 1),
            tag => format!("{} #{}", tag, index + 1),
        });
        let hosts = match document.hosts {
            None => HostSelection::All,
            Some(HostsField::One(name)) => HostSelection::from_names([name]),
            Some(HostsField::Many(names)) => HostSelection::from_names(names),
        };
        Self::from_parts(name, resource_type, hosts, &document.params)
    }

    /// Host names this task should be applied to, in visiting order
    pub fn target_hosts(&self, inventory: &Inventory) -> Vec<String> {
        self.hosts.resolve(inventory)
    }

    /// Whether the body validated
    pub fn is_valid(&self) -> bool {
        self.resource.is_ok()
    }
}
