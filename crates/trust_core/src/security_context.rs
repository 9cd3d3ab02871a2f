//! Immutable per-request security context.
//!
//! Mirrors the original `SecurityContext` dataclass: a request materializes
//! exactly one of these at ingress and threads it explicitly through every
//! Repository and Row Guard call. There is no implicit or thread-local
//! identity anywhere in this crate — see [`Principal::in_process`] in the
//! semantic-OS teacher crate for the same discipline applied to actors.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::error::TrustError;

/// Immutable caller identity and permission set for one request.
///
/// "With" methods return a new context; nothing here is mutated in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityContext {
    pub user_id: Option<Uuid>,
    pub tenant_id: Option<Uuid>,
    pub scope: Option<String>,
    pub permissions: HashSet<String>,
    pub metadata: HashMap<String, String>,
}

impl SecurityContext {
    pub fn new(
        user_id: Option<Uuid>,
        tenant_id: Option<Uuid>,
        scope: Option<String>,
        permissions: HashSet<String>,
        metadata: HashMap<String, String>,
    ) -> Self {
        Self {
            user_id,
            tenant_id,
            scope,
            permissions,
            metadata,
        }
    }

    pub fn user(user_id: Uuid) -> Self {
        Self::new(Some(user_id), None, None, HashSet::new(), HashMap::new())
    }

    pub fn tenant(tenant_id: Uuid) -> Self {
        Self::new(None, Some(tenant_id), None, HashSet::new(), HashMap::new())
    }

    pub fn dual(user_id: Uuid, tenant_id: Uuid) -> Self {
        Self::new(
            Some(user_id),
            Some(tenant_id),
            None,
            HashSet::new(),
            HashMap::new(),
        )
    }

    pub fn has_user_context(&self) -> bool {
        self.user_id.is_some()
    }

    pub fn has_tenant_context(&self) -> bool {
        self.tenant_id.is_some()
    }

    pub fn requires_user_context(&self) -> Result<Uuid, TrustError> {
        self.user_id.ok_or_else(|| {
            TrustError::SecurityContextInvalid("user context required but absent".into())
        })
    }

    pub fn requires_tenant_context(&self) -> Result<Uuid, TrustError> {
        self.tenant_id.ok_or_else(|| {
            TrustError::SecurityContextInvalid("tenant context required but absent".into())
        })
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    pub fn requires_permission(&self, permission: &str) -> Result<(), TrustError> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            Err(TrustError::SecurityContextInvalid(format!(
                "missing required permission: {permission}"
            )))
        }
    }

    pub fn with_user(&self, user_id: Uuid) -> Self {
        let mut next = self.clone();
        next.user_id = Some(user_id);
        next
    }

    pub fn with_tenant(&self, tenant_id: Uuid) -> Self {
        let mut next = self.clone();
        next.tenant_id = Some(tenant_id);
        next
    }

    pub fn with_scope(&self, scope: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.scope = Some(scope.into());
        next
    }

    /// Neither user nor tenant identity: only system-managed operations may
    /// be carried out under such a context.
    pub fn is_empty(&self) -> bool {
        self.user_id.is_none() && self.tenant_id.is_none() && self.scope.is_none()
    }
}

impl Default for SecurityContext {
    fn default() -> Self {
        Self::new(None, None, None, HashSet::new(), HashMap::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_context_round_trips() {
        let id = Uuid::new_v4();
        let ctx = SecurityContext::user(id);
        assert!(ctx.has_user_context());
        assert!(!ctx.has_tenant_context());
        assert_eq!(ctx.requires_user_context().unwrap(), id);
    }

    #[test]
    fn missing_tenant_context_is_invalid() {
        let ctx = SecurityContext::user(Uuid::new_v4());
        assert!(ctx.requires_tenant_context().is_err());
    }

    #[test]
    fn with_methods_do_not_mutate_original() {
        let base = SecurityContext::default();
        let derived = base.with_user(Uuid::new_v4());
        assert!(!base.has_user_context());
        assert!(derived.has_user_context());
    }

    #[test]
    fn empty_context_has_no_identity() {
        assert!(SecurityContext::default().is_empty());
        assert!(!SecurityContext::user(Uuid::new_v4()).is_empty());
    }
}
