//! Commands: action verb + addressed path (prefix, domain alias, nested segments) + criteria.
//!
//! Textual form: `/<prefix>/p/<domainAlias>[:<refId>]/<nested>/<_action>?<params>`.

use crate::error::AppError;
use crate::search::SearchCriteria;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Segment that precedes the domain alias in a command URI.
pub const DOMAIN_MARKER: &str = "p";
/// Query parameter naming a custom function handler.
pub const FUNCTION_PARAM: &str = "fn";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Get,
    New,
    Search,
}

impl Action {
    pub fn code(&self) -> &'static str {
        match self {
            Action::Get => "_get",
            Action::New => "_new",
            Action::Search => "_search",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Action {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "_get" => Ok(Action::Get),
            "_new" => Ok(Action::New),
            "_search" => Ok(Action::Search),
            _ => Err(AppError::BadRequest(format!("unsupported action: {}", s))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Command {
    prefix: Vec<String>,
    domain_alias: String,
    ref_id: Option<String>,
    nested: Vec<String>,
    action: Action,
    function: Option<String>,
    criteria: SearchCriteria,
}

impl Command {
    pub fn builder(domain_alias: impl Into<String>) -> CommandBuilder {
        CommandBuilder {
            cmd: Command {
                prefix: Vec::new(),
                domain_alias: domain_alias.into(),
                ref_id: None,
                nested: Vec::new(),
                action: Action::Get,
                function: None,
                criteria: SearchCriteria::default(),
            },
        }
    }

    /// Parse a command URI plus its query parameters.
    pub fn parse(uri: &str, params: &HashMap<String, String>) -> Result<Self, AppError> {
        let segments: Vec<&str> = uri
            .split('?')
            .next()
            .unwrap_or("")
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        let marker = segments
            .iter()
            .position(|s| *s == DOMAIN_MARKER)
            .ok_or_else(|| AppError::BadRequest(format!("no domain segment in '{}'", uri)))?;
        let (action_seg, rest) = segments
            .split_last()
            .filter(|(last, _)| last.starts_with('_'))
            .ok_or_else(|| AppError::BadRequest(format!("no action in '{}'", uri)))?;
        let action: Action = action_seg.parse()?;

        let domain = rest
            .get(marker + 1)
            .ok_or_else(|| AppError::BadRequest(format!("no domain alias in '{}'", uri)))?;
        let (alias, ref_id) = match domain.split_once(':') {
            Some((a, r)) => (a, Some(r).filter(|r| !r.is_empty())),
            None => (*domain, None),
        };
        if alias.is_empty() {
            return Err(AppError::BadRequest(format!("blank domain alias in '{}'", uri)));
        }

        let mut builder = Command::builder(alias)
            .prefix(rest[..marker].iter().copied())
            .nested(rest[marker + 2..].iter().copied())
            .action(action)
            .criteria(SearchCriteria::from_params(params)?);
        if let Some(r) = ref_id {
            builder = builder.ref_id(r);
        }
        if let Some(f) = params.get(FUNCTION_PARAM).filter(|f| !f.trim().is_empty()) {
            builder = builder.function(f.trim());
        }
        Ok(builder.build())
    }

    pub fn domain_alias(&self) -> &str {
        &self.domain_alias
    }

    pub fn ref_id(&self) -> Option<&str> {
        self.ref_id.as_deref()
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn prefix(&self) -> &[String] {
        &self.prefix
    }

    pub fn nested(&self) -> &[String] {
        &self.nested
    }

    /// Nested path relative to the domain root, e.g. "/address/city"; empty for the root.
    pub fn nested_path(&self) -> String {
        self.nested.iter().map(|s| format!("/{}", s)).collect()
    }

    pub fn function(&self) -> Option<&str> {
        self.function.as_deref()
    }

    pub fn criteria(&self) -> &SearchCriteria {
        &self.criteria
    }

    pub fn absolute_uri(&self) -> String {
        let mut uri = String::new();
        for p in &self.prefix {
            uri.push('/');
            uri.push_str(p);
        }
        uri.push('/');
        uri.push_str(DOMAIN_MARKER);
        uri.push('/');
        uri.push_str(&self.domain_alias);
        if let Some(r) = &self.ref_id {
            uri.push(':');
            uri.push_str(r);
        }
        uri.push_str(&self.nested_path());
        uri.push('/');
        uri.push_str(self.action.code());
        uri
    }

    /// Command addressing the root of `alias` with the same prefix, action and ref id.
    /// Nested segments, handler and criteria are not carried over.
    pub fn derive_for(&self, alias: &str) -> Command {
        Command {
            prefix: self.prefix.clone(),
            domain_alias: alias.to_string(),
            ref_id: self.ref_id.clone(),
            nested: Vec::new(),
            action: self.action,
            function: None,
            criteria: SearchCriteria::default(),
        }
    }

    pub fn with_ref_id(&self, ref_id: impl Into<String>) -> Command {
        Command {
            ref_id: Some(ref_id.into()),
            ..self.clone()
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.absolute_uri())
    }
}

pub struct CommandBuilder {
    cmd: Command,
}

impl CommandBuilder {
    pub fn prefix<I, S>(mut self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cmd.prefix = segments.into_iter().map(Into::into).collect();
        self
    }

    pub fn ref_id(mut self, ref_id: impl Into<String>) -> Self {
        self.cmd.ref_id = Some(ref_id.into());
        self
    }

    pub fn nested<I, S>(mut self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cmd.nested = segments.into_iter().map(Into::into).collect();
        self
    }

    pub fn action(mut self, action: Action) -> Self {
        self.cmd.action = action;
        self
    }

    pub fn function(mut self, name: impl Into<String>) -> Self {
        self.cmd.function = Some(name.into());
        self
    }

    pub fn criteria(mut self, criteria: SearchCriteria) -> Self {
        self.cmd.criteria = criteria;
        self
    }

    pub fn build(self) -> Command {
        self.cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prefix_alias_ref_nested_and_action() {
        let cmd = Command::parse("/acme/portal/p/widget:7/home/city/_get", &HashMap::new()).unwrap();
        assert_eq!(cmd.prefix(), ["acme", "portal"]);
        assert_eq!(cmd.domain_alias(), "widget");
        assert_eq!(cmd.ref_id(), Some("7"));
        assert_eq!(cmd.nested_path(), "/home/city");
        assert_eq!(cmd.action(), Action::Get);
        assert_eq!(cmd.absolute_uri(), "/acme/portal/p/widget:7/home/city/_get");
    }

    #[test]
    fn parses_function_param() {
        let params = HashMap::from([("fn".to_string(), "summary".to_string())]);
        let cmd = Command::parse("/p/widget/_get", &params).unwrap();
        assert_eq!(cmd.function(), Some("summary"));
        assert_eq!(cmd.ref_id(), None);
        assert_eq!(cmd.nested_path(), "");
    }

    #[test]
    fn rejects_missing_marker_or_action() {
        assert!(Command::parse("/acme/widget/_get", &HashMap::new()).is_err());
        assert!(Command::parse("/p/widget", &HashMap::new()).is_err());
        assert!(Command::parse("/p/widget/_delete", &HashMap::new()).is_err());
    }

    #[test]
    fn derived_command_keeps_prefix_action_and_ref_id() {
        let cmd = Command::builder("widgetView")
            .prefix(["acme"])
            .ref_id("7")
            .nested(["name"])
            .function("summary")
            .build();
        let derived = cmd.derive_for("widget");
        assert_eq!(derived.absolute_uri(), "/acme/p/widget:7/_get");
        assert_eq!(derived.action(), cmd.action());
        assert_eq!(derived.function(), None);
    }
}
