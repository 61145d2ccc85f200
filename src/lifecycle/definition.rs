//! Lifecycle Definition
//!
//! An ordered sequence of named states with one designated official
//! position. The official position is the release point: objects reaching
//! it are handed to the organization and can no longer be demoted.
//!
//! Definitions are immutable once constructed. Every query is pure.

use serde::{Deserialize, Serialize};

use super::errors::{Direction, LifecycleError, LifecycleResult};
use super::role::Role;

/// Serialized form of a lifecycle, validated on conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleSpec {
    pub name: String,
    pub states: Vec<String>,
    pub official: String,
}

/// An ordered sequence of states with an official position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LifecycleSpec", into = "LifecycleSpec")]
pub struct LifecycleDefinition {
    name: String,
    states: Vec<String>,
    official: usize,
}

impl LifecycleDefinition {
    /// Build a definition from a flat ordered list and the official state name.
    ///
    /// Fails with `InvalidDefinition` when the list has fewer than two
    /// entries, contains an empty or duplicate name, or does not contain
    /// `official`.
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        states: impl IntoIterator<Item = S>,
        official: &str,
    ) -> LifecycleResult<Self> {
        let name = name.into();
        let states: Vec<String> = states.into_iter().map(Into::into).collect();

        if name.trim().is_empty() {
            return Err(LifecycleError::invalid(&name, "lifecycle name is empty"));
        }
        if states.len() < 2 {
            return Err(LifecycleError::invalid(
                &name,
                format!("needs at least two states, got {}", states.len()),
            ));
        }
        for (i, state) in states.iter().enumerate() {
            if state.trim().is_empty() {
                return Err(LifecycleError::invalid(&name, format!("state #{} is empty", i)));
            }
            if states[..i].contains(state) {
                return Err(LifecycleError::invalid(
                    &name,
                    format!("duplicate state '{}'", state),
                ));
            }
        }
        let official = states.iter().position(|s| s == official).ok_or_else(|| {
            LifecycleError::invalid(&name, format!("official state '{}' is not listed", official))
        })?;

        Ok(Self {
            name,
            states,
            official,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn states(&self) -> &[String] {
        &self.states
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Always false: a valid definition has at least two states.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Position of `state` in the sequence.
    pub fn position(&self, state: &str) -> LifecycleResult<usize> {
        self.states
            .iter()
            .position(|s| s == state)
            .ok_or_else(|| self.unknown(state))
    }

    pub fn contains(&self, state: &str) -> bool {
        self.states.iter().any(|s| s == state)
    }

    /// State following `state`.
    pub fn next(&self, state: &str) -> LifecycleResult<&str> {
        let position = self.position(state)?;
        self.states
            .get(position + 1)
            .map(String::as_str)
            .ok_or_else(|| self.no_transition(state, Direction::Forward))
    }

    /// State preceding `state`.
    pub fn previous(&self, state: &str) -> LifecycleResult<&str> {
        let position = self.position(state)?;
        if position == 0 {
            return Err(self.no_transition(state, Direction::Backward));
        }
        Ok(&self.states[position - 1])
    }

    pub fn is_official(&self, state: &str) -> bool {
        self.states.get(self.official).map(|s| s == state).unwrap_or(false)
    }

    pub fn official_state(&self) -> &str {
        &self.states[self.official]
    }

    pub fn official_position(&self) -> usize {
        self.official
    }

    pub fn first_state(&self) -> &str {
        &self.states[0]
    }

    pub fn last_state(&self) -> &str {
        &self.states[self.states.len() - 1]
    }

    pub fn is_last(&self, state: &str) -> bool {
        self.last_state() == state
    }

    /// True for states strictly before the official position.
    pub fn is_editable(&self, state: &str) -> bool {
        matches!(self.position(state), Ok(p) if p < self.official)
    }

    /// The signer role that governs the transition out of `state`.
    pub fn signer_role_for(&self, state: &str) -> LifecycleResult<Role> {
        self.position(state).map(Role::signer)
    }

    /// Signer roles of every transition, in order.
    pub fn signer_roles(&self) -> impl Iterator<Item = Role> {
        (0..self.states.len() - 1).map(Role::signer)
    }

    fn unknown(&self, state: &str) -> LifecycleError {
        LifecycleError::UnknownState {
            lifecycle: self.name.clone(),
            state: state.to_string(),
        }
    }

    fn no_transition(&self, state: &str, direction: Direction) -> LifecycleError {
        LifecycleError::NoSuchTransition {
            lifecycle: self.name.clone(),
            state: state.to_string(),
            direction,
        }
    }
}

impl TryFrom<LifecycleSpec> for LifecycleDefinition {
    type Error = LifecycleError;

    fn try_from(raw: LifecycleSpec) -> Result<Self, Self::Error> {
        LifecycleDefinition::new(raw.name, raw.states, &raw.official)
    }
}

impl From<LifecycleDefinition> for LifecycleSpec {
    fn from(def: LifecycleDefinition) -> Self {
        let official = def.states[def.official].clone();
        LifecycleSpec {
            name: def.name,
            states: def.states,
            official,
        }
    }
}
