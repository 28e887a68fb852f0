use std::fmt;

/// Identifies a namespaced resource.
///
/// Ordered by namespace, then name. This order is what the pod reconciler
/// uses to break ties between services that set the same label.
#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct ResourceId {
    pub namespace: String,
    pub name: String,
}

pub type ServiceKey = ResourceId;
pub type WorkloadKey = ResourceId;
pub type PodKey = ResourceId;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid resource key {0:?}: expected <namespace>/<name>")]
pub struct KeyError(String);

impl ResourceId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl std::str::FromStr for ResourceId {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((ns, name)) if !ns.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok(Self::new(ns, name))
            }
            _ => Err(KeyError(s.to_string())),
        }
    }
}
