//! Request session and role-based access flags for params.

use crate::config::{AccessMode, AccessRuleConfig};

/// Request-scoped caller identity.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Session {
    pub user_id: Option<String>,
    pub roles: Vec<String>,
}

impl Session {
    pub fn new<I, S>(user_id: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Session {
            user_id: Some(user_id.into()),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    pub fn anonymous() -> Self {
        Session::default()
    }

    pub fn has_any_role(&self, roles: &[String]) -> bool {
        roles.iter().any(|r| self.roles.iter().any(|own| own == r))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccessFlags {
    pub visible: bool,
    pub enabled: bool,
}

impl AccessFlags {
    pub const OPEN: AccessFlags = AccessFlags {
        visible: true,
        enabled: true,
    };

    /// Apply a param's rules under the flags inherited from its parent.
    /// The most restrictive matching rule wins; restrictions never loosen downward.
    pub fn restrict(self, rules: &[AccessRuleConfig], session: &Session) -> AccessFlags {
        let matching = rules.iter().filter(|r| session.has_any_role(&r.when_authorities));
        let mode = matching.map(|r| r.mode).max_by_key(|m| match m {
            AccessMode::Read => 1,
            AccessMode::Hidden => 2,
        });
        match mode {
            Some(AccessMode::Hidden) => AccessFlags {
                visible: false,
                enabled: false,
            },
            Some(AccessMode::Read) => AccessFlags {
                visible: self.visible,
                enabled: false,
            },
            None => self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(role: &str, mode: AccessMode) -> AccessRuleConfig {
        AccessRuleConfig {
            when_authorities: vec![role.to_string()],
            mode,
        }
    }

    #[test]
    fn hidden_beats_read() {
        let session = Session::new("u1", ["clerk", "auditor"]);
        let rules = [rule("clerk", AccessMode::Read), rule("auditor", AccessMode::Hidden)];
        assert_eq!(
            AccessFlags::OPEN.restrict(&rules, &session),
            AccessFlags { visible: false, enabled: false }
        );
    }

    #[test]
    fn read_disables_but_keeps_visible() {
        let session = Session::new("u1", ["clerk"]);
        let rules = [rule("clerk", AccessMode::Read), rule("admin", AccessMode::Hidden)];
        assert_eq!(
            AccessFlags::OPEN.restrict(&rules, &session),
            AccessFlags { visible: true, enabled: false }
        );
    }

    #[test]
    fn unmatched_rules_inherit_parent() {
        let parent = AccessFlags { visible: true, enabled: false };
        assert_eq!(parent.restrict(&[rule("admin", AccessMode::Hidden)], &Session::anonymous()), parent);
    }
}
