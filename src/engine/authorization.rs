use std::collections::HashSet;
use std::fmt;
use tracing::warn;

/// Mutating actions that require permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    ApproveDeviation,
    CancelApproval,
    ForceAdjust,
    DeleteRecord,
    Reconcile,
    Sync,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::ApproveDeviation => "approve deviations",
            Capability::CancelApproval => "cancel approvals",
            Capability::ForceAdjust => "force adjustments",
            Capability::DeleteRecord => "delete attendance records",
            Capability::Reconcile => "reconcile attendance",
            Capability::Sync => "synchronise punches",
        }
    }

    /// Manager-only capabilities. Officers may do everything else.
    fn requires_manager(&self) -> bool {
        matches!(
            self,
            Capability::ApproveDeviation | Capability::CancelApproval | Capability::DeleteRecord
        )
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait Authorizer: Send + Sync {
    fn allows(&self, actor: &str, capability: Capability) -> bool;
}

/// Grants capabilities by membership in the managers or officers group.
#[derive(Debug, Clone, Default)]
pub struct GroupAuthorizer {
    managers: HashSet<String>,
    officers: HashSet<String>,
    permissive: bool,
}

impl GroupAuthorizer {
    pub fn new(managers: &[String], officers: &[String]) -> Self {
        let permissive = managers.is_empty() && officers.is_empty();
        if permissive {
            warn!("No attendance managers or officers configured, every user may perform every action");
        }

        Self {
            managers: managers.iter().cloned().collect(),
            officers: officers.iter().cloned().collect(),
            permissive,
        }
    }

    /// Everyone is allowed everything. Used for local runs and tests.
    pub fn permissive() -> Self {
        Self {
            permissive: true,
            ..Self::default()
        }
    }
}

impl Authorizer for GroupAuthorizer {
    fn allows(&self, actor: &str, capability: Capability) -> bool {
        if self.permissive || self.managers.contains(actor) {
            return true;
        }
        !capability.requires_manager() && self.officers.contains(actor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn managers_can_do_everything() {
        let auth = GroupAuthorizer::new(&names(&["amira"]), &names(&["omar"]));
        assert!(auth.allows("amira", Capability::ApproveDeviation));
        assert!(auth.allows("amira", Capability::DeleteRecord));
        assert!(auth.allows("amira", Capability::Sync));
    }

    #[test]
    fn officers_cannot_approve_or_delete() {
        let auth = GroupAuthorizer::new(&names(&["amira"]), &names(&["omar"]));
        assert!(auth.allows("omar", Capability::ForceAdjust));
        assert!(auth.allows("omar", Capability::Reconcile));
        assert!(!auth.allows("omar", Capability::ApproveDeviation));
        assert!(!auth.allows("omar", Capability::CancelApproval));
        assert!(!auth.allows("omar", Capability::DeleteRecord));
    }

    #[test]
    fn strangers_are_refused() {
        let auth = GroupAuthorizer::new(&names(&["amira"]), &[]);
        assert!(!auth.allows("guest", Capability::Reconcile));
    }

    #[test]
    fn no_groups_means_open_access() {
        let auth = GroupAuthorizer::new(&[], &[]);
        assert!(auth.allows("anyone", Capability::ApproveDeviation));
        assert!(GroupAuthorizer::permissive().allows("anyone", Capability::DeleteRecord));
    }
}
