//! Declarative tag rules deciding which relations seed an extract.
//!
//! A rule set maps a tag key to a [`Matcher`]. Rules combine with logical
//! OR: tags match when any rule's key is present and its matcher accepts the
//! value. Rule files are usually YAML:
//!
//! ```yaml
//! boundary: true
//! route: [hiking, foot]
//! name: Central Park
//! disused: false
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

use crate::entity::{Entity, Tags};

/// Test applied to the value of one tag key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawMatcher")]
pub enum Matcher {
    /// Accepts any value when `true`; never accepts when `false`.
    Present(bool),
    /// Accepts exactly this value.
    Exact(String),
    /// Accepts any value in the set.
    OneOf(BTreeSet<String>),
}

impl Matcher {
    /// Whether the matcher accepts a present tag value.
    pub fn accepts(&self, value: &str) -> bool {
        match self {
            Self::Present(enabled) => *enabled,
            Self::Exact(expected) => expected == value,
            Self::OneOf(accepted) => accepted.contains(value),
        }
    }
}

#[derive(Deserialize)]
#[serde(
    untagged,
    expecting = "a matcher: true or false, a tag value, or a list of tag values"
)]
enum RawMatcher {
    Flag(bool),
    Value(Scalar),
    Values(Vec<Scalar>),
}

// Tag values are strings, but rule files commonly spell numeric values
// (`admin_level: 8`) without quotes.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Integer(i64),
}

impl From<Scalar> for String {
    fn from(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Text(text) => text,
            Scalar::Integer(number) => number.to_string(),
        }
    }
}

impl From<RawMatcher> for Matcher {
    fn from(raw: RawMatcher) -> Self {
        match raw {
            RawMatcher::Flag(enabled) => Self::Present(enabled),
            RawMatcher::Value(value) => Self::Exact(value.into()),
            RawMatcher::Values(values) => Self::OneOf(values.into_iter().map(String::from).collect()),
        }
    }
}

/// A set of tag rules combined with logical OR.
///
/// # Examples
/// ```
/// use sieve_core::{Matcher, Tags, TagRules};
///
/// let rules = TagRules::from_iter([
///     ("boundary", Matcher::Present(true)),
///     ("name", Matcher::Exact("Central Park".into())),
/// ]);
/// let tags = Tags::from([("name".into(), "Central Park".into())]);
/// assert!(rules.matches(&tags));
/// assert!(!rules.matches(&Tags::new()));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct TagRules {
    rules: BTreeMap<String, Matcher>,
}

impl TagRules {
    /// Whether any rule accepts the given tags.
    pub fn matches(&self, tags: &Tags) -> bool {
        self.rules.iter().any(|(key, matcher)| {
            tags.get(key)
                .is_some_and(|value| matcher.accepts(value))
        })
    }

    /// Whether an entity is selected directly by the rules.
    ///
    /// Only relations are evaluated. Nodes and ways never match on their own
    /// tags and enter an extract solely as members of a selected relation.
    pub fn selects(&self, entity: &Entity) -> bool {
        match entity {
            Entity::Relation(relation) => self.matches(&relation.tags),
            Entity::Node(_) | Entity::Way(_) => false,
        }
    }

    /// Number of configured rules, including disabled ones.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether no rules are configured.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<K> FromIterator<(K, Matcher)> for TagRules
where
    K: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, Matcher)>>(iter: I) -> Self {
        Self {
            rules: iter
                .into_iter()
                .map(|(key, matcher)| (key.into(), matcher))
                .collect(),
        }
    }
}
