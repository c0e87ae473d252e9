//! Cross-namespace access control for source references

use planner_common::{Error, ObjectKey};

/// Policy for references that leave the referencing object's namespace
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    deny_cross_namespace: bool,
}

impl AccessPolicy {
    /// Create a policy; `deny_cross_namespace` forbids references into other namespaces
    pub fn new(deny_cross_namespace: bool) -> Self {
        Self {
            deny_cross_namespace,
        }
    }

    /// Whether cross-namespace references are rejected
    pub fn denies_cross_namespace(&self) -> bool {
        self.deny_cross_namespace
    }

    /// Check that an object in `owner_namespace` may reference `kind` at `target`
    pub fn check(&self, owner_namespace: &str, kind: &str, target: &ObjectKey) -> Result<(), Error> {
        if self.deny_cross_namespace && target.namespace != owner_namespace {
            return Err(Error::access_denied(format!(
                "cannot access {kind}/{target}, cross-namespace references have been disabled"
            )));
        }
        Ok(())
    }
}
