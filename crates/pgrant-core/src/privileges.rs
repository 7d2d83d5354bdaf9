//! Privilege token collections and the inputs they are built from.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Normalise a raw privilege token (trimmed, upper-cased).
pub fn normalize_token(token: &str) -> String {
    token.trim().to_ascii_uppercase()
}

/// Unordered set of privilege tokens held by one principal on one object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrivilegeSet(BTreeSet<String>);

impl PrivilegeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.0.contains(&normalize_token(token))
    }

    /// True when every token of `tokens` is held.
    pub fn contains_all<S: AsRef<str>>(&self, tokens: &[S]) -> bool {
        tokens.iter().all(|t| self.contains(t.as_ref()))
    }

    pub fn insert(&mut self, token: &str) -> bool {
        let token = normalize_token(token);
        if token.is_empty() {
            return false;
        }
        self.0.insert(token)
    }

    pub fn remove(&mut self, token: &str) -> bool {
        self.0.remove(&normalize_token(token))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl<S: AsRef<str>> FromIterator<S> for PrivilegeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = PrivilegeSet::new();
        for token in iter {
            set.insert(token.as_ref());
        }
        set
    }
}

/// A principal record carrying its privileges under the conventional
/// `pgPrivileges` field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalPrivileges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "pgPrivileges", alias = "pg_privileges", default)]
    pub pg_privileges: Vec<String>,
}

/// Where a set of tokens to classify comes from.
///
/// Deserialises from either a bare JSON array of tokens or an object with a
/// `pgPrivileges` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TokenSource {
    Tokens(Vec<String>),
    Principal(PrincipalPrivileges),
}

impl TokenSource {
    pub fn to_privilege_set(&self) -> PrivilegeSet {
        match self {
            TokenSource::Tokens(tokens) => tokens.iter().collect(),
            TokenSource::Principal(p) => p.pg_privileges.iter().collect(),
        }
    }
}

impl From<Vec<String>> for TokenSource {
    fn from(tokens: Vec<String>) -> Self {
        TokenSource::Tokens(tokens)
    }
}

impl From<PrincipalPrivileges> for TokenSource {
    fn from(p: PrincipalPrivileges) -> Self {
        TokenSource::Principal(p)
    }
}
