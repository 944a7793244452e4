//! Condition language.
//!
//! A condition is a disjunction of conjunctions of clauses. A clause reads
//! `attribute:OPargument`, where `OP` is one of the [`Operator`] symbols:
//!
//! ```text
//! from_address:=notify@example.com or subject:~<[notify] and is_read:=false
//! ```

use std::fmt;

use regex::Regex;

use crate::config::ConditionConfig;
use crate::message::Message;
use crate::{Error, Result};

/// How a clause compares an attribute with its argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `=~`: the whole value matches a regex.
    FullMatch,
    /// `~~`: a regex matches somewhere in the value.
    Search,
    /// `~<`: the value starts with the argument.
    Prefix,
    /// `~>`: the value ends with the argument.
    Suffix,
    /// `=`: the value equals the argument.
    Equals,
    /// `~`: the value contains the argument.
    Contains,
}

impl Operator {
    /// Every operator, longest symbol first.
    pub const ALL: [Self; 6] = [
        Self::FullMatch,
        Self::Search,
        Self::Prefix,
        Self::Suffix,
        Self::Equals,
        Self::Contains,
    ];

    /// Symbol in the condition language.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::FullMatch => "=~",
            Self::Search => "~~",
            Self::Prefix => "~<",
            Self::Suffix => "~>",
            Self::Equals => "=",
            Self::Contains => "~",
        }
    }

    /// Splits a leading operator symbol off `text`.
    #[must_use]
    pub fn split(text: &str) -> Option<(Self, &str)> {
        Self::ALL
            .into_iter()
            .find_map(|op| text.strip_prefix(op.symbol()).map(|rest| (op, rest)))
    }
}

#[derive(Debug, Clone)]
enum Test {
    Equals(String),
    FullMatch(Regex),
    Search(Regex),
    Prefix(String),
    Suffix(String),
    Contains(String),
}

/// One `attribute:OPargument` comparison.
#[derive(Debug, Clone)]
pub struct Clause {
    attribute: String,
    operator: Operator,
    argument: String,
    test: Test,
}

impl Clause {
    /// Parses and compiles a clause.
    ///
    /// # Errors
    ///
    /// Returns a message describing the defect: a missing `:`, an empty
    /// attribute, an unknown operator or an invalid regex.
    pub fn parse(text: &str) -> std::result::Result<Self, String> {
        let text = text.trim();
        let (attribute, rest) = text
            .split_once(':')
            .ok_or_else(|| format!("clause `{text}` has no `:`"))?;
        let attribute = attribute.trim();
        if attribute.is_empty() {
            return Err(format!("clause `{text}` names no attribute"));
        }
        let (operator, argument) =
            Operator::split(rest).ok_or_else(|| format!("clause `{text}` has no operator"))?;

        let regex = |pattern: String| {
            Regex::new(&pattern).map_err(|e| format!("clause `{text}`: invalid regex: {e}"))
        };
        let test = match operator {
            Operator::FullMatch => Test::FullMatch(regex(format!("^(?:{argument})$"))?),
            Operator::Search => Test::Search(regex(argument.to_string())?),
            Operator::Prefix => Test::Prefix(argument.to_string()),
            Operator::Suffix => Test::Suffix(argument.to_string()),
            Operator::Equals => Test::Equals(argument.to_string()),
            Operator::Contains => Test::Contains(argument.to_string()),
        };

        Ok(Self {
            attribute: attribute.to_string(),
            operator,
            argument: argument.to_string(),
            test,
        })
    }

    /// Attribute name.
    #[must_use]
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Operator.
    #[must_use]
    pub const fn operator(&self) -> Operator {
        self.operator
    }

    /// Tests a message. Fails with the attribute name if the message has no
    /// such attribute.
    fn evaluate(&self, message: &Message) -> std::result::Result<bool, &str> {
        let value = message.attribute(&self.attribute).ok_or(self.attribute.as_str())?;
        Ok(match &self.test {
            Test::Equals(argument) => value == *argument,
            Test::FullMatch(regex) | Test::Search(regex) => regex.is_match(&value),
            Test::Prefix(argument) => value.starts_with(argument.as_str()),
            Test::Suffix(argument) => value.ends_with(argument.as_str()),
            Test::Contains(argument) => value.contains(argument.as_str()),
        })
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}{}", self.attribute, self.operator.symbol(), self.argument)
    }
}

/// A compiled condition. The empty condition matches nothing.
#[derive(Debug, Clone, Default)]
pub struct Condition {
    any: Vec<Vec<Clause>>,
}

impl Condition {
    /// Compiles a configured condition.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Construction`] naming `section` if a clause is
    /// invalid.
    pub fn from_config(section: &str, config: &ConditionConfig) -> Result<Self> {
        let groups: Vec<Vec<&str>> = match config {
            ConditionConfig::Text(text) => split_text(text),
            ConditionConfig::Clauses(groups) => groups
                .iter()
                .map(|group| group.iter().map(String::as_str).collect())
                .collect(),
        };

        let any = groups
            .into_iter()
            .filter(|group| !group.is_empty())
            .map(|group| {
                group
                    .into_iter()
                    .map(Clause::parse)
                    .collect::<std::result::Result<Vec<_>, _>>()
            })
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|reason| Error::construction(section, reason))?;

        Ok(Self { any })
    }

    /// Compiles a condition string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Construction`] naming `section` if a clause is
    /// invalid.
    pub fn parse(section: &str, text: &str) -> Result<Self> {
        Self::from_config(section, &ConditionConfig::Text(text.to_string()))
    }

    /// Returns true if no clause was given.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.any.is_empty()
    }

    /// Evaluates the condition. Fails with the name of the first attribute
    /// the message lacks.
    pub(crate) fn evaluate(&self, message: &Message) -> std::result::Result<bool, String> {
        for all in &self.any {
            let mut matched = true;
            for clause in all {
                if !clause.evaluate(message).map_err(str::to_string)? {
                    matched = false;
                    break;
                }
            }
            if matched {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self
            .any
            .iter()
            .map(|all| {
                all.iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" and ")
            })
            .collect::<Vec<_>>()
            .join(" or ");
        f.write_str(&text)
    }
}

fn split_text(text: &str) -> Vec<Vec<&str>> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    text.split(" or ")
        .map(|any| any.split(" and ").map(str::trim).collect())
        .collect()
}
