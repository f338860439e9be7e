//! The identity and authorization collaborator.
//!
//! Authentication and session management live outside this core; the
//! service only needs to know who is acting, whether they hold a given
//! role, and whether an anonymous caller's CAPTCHA token checks out.
use std::collections::BTreeSet;

use crate::newtypes::PrincipalId;

/// The caller-identity boundary consumed by the verification service.
pub trait IdentityContext {
    /// The authenticated principal on whose behalf the operation runs.
    fn current_principal(&self) -> PrincipalId;

    /// Whether the current principal holds `role`.
    fn is_in_role(&self, role: &str) -> bool;

    /// Whether a CAPTCHA token from an anonymous caller is valid.
    fn validate_captcha(&self, token: &str) -> bool;
}

/// A fixed identity for tests and scripted demos.
#[derive(Debug, Clone)]
pub struct StaticIdentity {
    principal: PrincipalId,
    roles: BTreeSet<String>,
    captcha_ok: bool,
}

impl StaticIdentity {
    /// An identity with no roles that passes every CAPTCHA challenge.
    pub fn new(principal: PrincipalId) -> Self {
        Self {
            principal,
            roles: BTreeSet::new(),
            captcha_ok: true,
        }
    }

    /// Grants `role` to this identity.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    /// Makes every CAPTCHA challenge fail.
    #[must_use]
    pub fn failing_captcha(mut self) -> Self {
        self.captcha_ok = false;
        self
    }
}

impl IdentityContext for StaticIdentity {
    fn current_principal(&self) -> PrincipalId {
        self.principal.clone()
    }

    fn is_in_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    fn validate_captcha(&self, _token: &str) -> bool {
        self.captcha_ok
    }
}
