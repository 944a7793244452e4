//! Rule-based message filters.
//!
//! A [`MessageFilter`] pairs a compiled [`Condition`] with an ordered list of
//! vetted [`Action`]s and the names of the connections it watches. Unknown
//! actions, invalid clauses and unknown connections are rejected when the
//! filter is built, never when it runs.

mod action;
mod condition;

pub use action::{Action, Target};
pub use condition::{Clause, Condition, Operator};

use serde::Deserialize;
use serde_json::Value;

use crate::config::FilterConfig;
use crate::connection::ConnectionGroup;
use crate::message::Message;
use crate::{Error, Result};

/// A compiled filter.
#[derive(Debug, Clone)]
pub struct MessageFilter {
    name: String,
    connections: Vec<String>,
    condition: Condition,
    actions: Vec<Action>,
}

impl MessageFilter {
    /// Creates a filter from compiled parts.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        connections: Vec<String>,
        condition: Condition,
        actions: Vec<Action>,
    ) -> Self {
        Self {
            name: name.into(),
            connections,
            condition,
            actions,
        }
    }

    /// Builds the filter entry `name` of the `filters` section.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Construction`] naming `filter: <name>` if `actions`
    /// is missing, a connection is not in `group`, a clause is invalid or
    /// an action is not vetted.
    pub fn from_config(name: &str, value: &Value, group: &ConnectionGroup) -> Result<Self> {
        let section = format!("filter: {name}");
        let config =
            FilterConfig::deserialize(value).map_err(|e| Error::construction(&section, e))?;

        let actions = config
            .actions
            .ok_or_else(|| Error::construction(&section, "missing required field `actions`"))?;
        if let Some(unknown) = config.connections.iter().find(|c| !group.contains(c)) {
            return Err(Error::construction(
                &section,
                format!("unknown connection `{unknown}`"),
            ));
        }

        let condition = Condition::from_config(&section, &config.condition)?;
        let actions = actions
            .iter()
            .map(|text| Action::parse(&section, text, group))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(filter = name, %condition, actions = actions.len(), "Filter compiled");
        Ok(Self::new(name, config.connections, condition, actions))
    }

    /// Filter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names of the watched connections.
    #[must_use]
    pub fn connections(&self) -> &[String] {
        &self.connections
    }

    /// Returns true if the filter watches the named connection.
    #[must_use]
    pub fn watches(&self, connection: &str) -> bool {
        self.connections.iter().any(|name| name == connection)
    }

    /// The compiled actions, in order.
    #[must_use]
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Tests a message. An evaluation error is logged and reads as no
    /// match.
    #[must_use]
    pub fn applies_to(&self, message: &Message) -> bool {
        match self.condition.evaluate(message) {
            Ok(matched) => matched,
            Err(attribute) => {
                tracing::warn!(
                    filter = %self.name,
                    attribute = %attribute,
                    email = %message,
                    "Attribute unavailable, treating as no match"
                );
                false
            }
        }
    }

    /// Runs every action on the message, in order, whatever the condition
    /// says.
    ///
    /// # Errors
    ///
    /// Returns the first failing action's error. Actions already applied
    /// are not rolled back.
    pub async fn apply_unconditionally(
        &self,
        message: &Message,
        group: &mut ConnectionGroup,
    ) -> Result<()> {
        for action in &self.actions {
            tracing::info!(filter = %self.name, %action, email = %message, "Applying action");
            action.apply(message, group).await?;
        }
        Ok(())
    }
}
