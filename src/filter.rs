//! Inclusion/exclusion rules deciding which action traces get indexed.
//!
//! A rule is `receiver[:action[:actor]]`. An empty or missing action/actor
//! token matches anything. Every trace is tested against four patterns of
//! increasing specificity: `(receiver, *, *)`, `(receiver, action, *)`,
//! `(receiver, *, actor)` and `(receiver, action, actor)`, with the actor
//! ranging over the trace's authorizations.

use crate::error::{HistoryError, Result};
use crate::types::{ActionTrace, Name};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// One component of a rule: a concrete name or a wildcard.
///
/// The wildcard sorts before every name and is never equal to one, so an
/// empty name in a trace cannot be mistaken for it.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FilterField {
    Any,
    Exact(Name),
}

impl FilterField {
    fn parse(token: &str) -> Self {
        if token.is_empty() {
            FilterField::Any
        } else {
            FilterField::Exact(Name::from(token))
        }
    }
}

impl fmt::Debug for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterField::Any => f.write_str("*"),
            FilterField::Exact(name) => write!(f, "{name}"),
        }
    }
}

/// A single include or exclude rule.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FilterEntry {
    pub receiver: Name,
    pub action: FilterField,
    pub actor: FilterField,
}

impl FilterEntry {
    pub fn new(receiver: impl Into<Name>, action: FilterField, actor: FilterField) -> Self {
        Self {
            receiver: receiver.into(),
            action,
            actor,
        }
    }
}

impl FromStr for FilterEntry {
    type Err = HistoryError;

    fn from_str(rule: &str) -> Result<Self> {
        let invalid = |reason: &str| HistoryError::InvalidFilterRule {
            rule: rule.to_string(),
            reason: reason.to_string(),
        };

        let tokens: Vec<&str> = rule.split(':').map(str::trim).collect();
        if tokens.len() > 3 {
            return Err(invalid("expected receiver[:action[:actor]]"));
        }
        let receiver = tokens[0];
        if receiver.is_empty() {
            return Err(invalid("receiver may not be blank"));
        }

        Ok(FilterEntry {
            receiver: Name::from(receiver),
            action: FilterField::parse(tokens.get(1).copied().unwrap_or("")),
            actor: FilterField::parse(tokens.get(2).copied().unwrap_or("")),
        })
    }
}

/// Immutable rule sets shared by the indexing and query paths.
#[derive(Clone, Debug, Default)]
pub struct ActionFilter {
    include: BTreeSet<FilterEntry>,
    exclude: BTreeSet<FilterEntry>,
    bypass: bool,
}

impl ActionFilter {
    /// Build from parsed rule sets. No include rules means include everything.
    pub fn new(include: BTreeSet<FilterEntry>, exclude: BTreeSet<FilterEntry>) -> Self {
        let bypass = include.is_empty();
        Self {
            include,
            exclude,
            bypass,
        }
    }

    /// Parse `receiver[:action[:actor]]` rule strings.
    pub fn from_rules<I, E>(include: I, exclude: E) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        let include = include
            .into_iter()
            .map(|r| r.as_ref().parse())
            .collect::<Result<BTreeSet<_>>>()?;
        let exclude = exclude
            .into_iter()
            .map(|r| r.as_ref().parse())
            .collect::<Result<BTreeSet<_>>>()?;
        Ok(Self::new(include, exclude))
    }

    /// Accept every action.
    pub fn pass_all() -> Self {
        Self::new(BTreeSet::new(), BTreeSet::new())
    }

    pub fn is_bypass(&self) -> bool {
        self.bypass
    }

    pub fn include_rules(&self) -> usize {
        self.include.len()
    }

    pub fn exclude_rules(&self) -> usize {
        self.exclude.len()
    }

    /// Whether `trace` gets an action log entry.
    pub fn should_index(&self, trace: &ActionTrace) -> bool {
        let actors = || trace.act.authorization.iter().map(|a| &a.actor);

        let pass_on = self.bypass
            || matches_receiver_or_action(&self.include, trace)
            || actors().any(|actor| matches_actor(&self.include, trace, actor));
        if !pass_on {
            return false;
        }

        !(matches_receiver_or_action(&self.exclude, trace)
            || actors().any(|actor| matches_actor(&self.exclude, trace, actor)))
    }

    /// Accounts whose history records `trace`: the receiver, plus each
    /// authorizing actor that is included and not excluded on its own.
    pub fn involved_accounts(&self, trace: &ActionTrace) -> BTreeSet<Name> {
        let mut result = BTreeSet::new();
        result.insert(trace.receiver().clone());

        for auth in &trace.act.authorization {
            let actor = &auth.actor;
            let included = self.bypass
                || matches_receiver_or_action(&self.include, trace)
                || matches_actor(&self.include, trace, actor);
            let excluded = matches_receiver_or_action(&self.exclude, trace)
                || matches_actor(&self.exclude, trace, actor);

            if included && !excluded {
                result.insert(actor.clone());
            }
        }
        result
    }
}

/// `(receiver, *, *)` or `(receiver, action, *)`.
fn matches_receiver_or_action(set: &BTreeSet<FilterEntry>, trace: &ActionTrace) -> bool {
    let receiver = trace.receiver();
    set.contains(&FilterEntry::new(
        receiver.clone(),
        FilterField::Any,
        FilterField::Any,
    )) || set.contains(&FilterEntry::new(
        receiver.clone(),
        FilterField::Exact(trace.act.name.clone()),
        FilterField::Any,
    ))
}

/// `(receiver, *, actor)` or `(receiver, action, actor)`.
fn matches_actor(set: &BTreeSet<FilterEntry>, trace: &ActionTrace, actor: &Name) -> bool {
    let receiver = trace.receiver();
    set.contains(&FilterEntry::new(
        receiver.clone(),
        FilterField::Any,
        FilterField::Exact(actor.clone()),
    )) || set.contains(&FilterEntry::new(
        receiver.clone(),
        FilterField::Exact(trace.act.name.clone()),
        FilterField::Exact(actor.clone()),
    ))
}
