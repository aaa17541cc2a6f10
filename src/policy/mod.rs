//! IAM policy documents.
//!
//! Constructs describe the permissions CloudFormation needs to manage their resources as a [PolicyDocument]; a stack
//! sums the documents of its constructs with `+`.

mod action;
mod condition;
mod principal;
mod resource;
mod statement;

pub use {
    action::{Action, ActionList},
    condition::{Condition, ConditionMap, ConditionOp},
    principal::{AwsPrincipal, Principal, SpecifiedPrincipal, SpecifiedPrincipalBuilder, SpecifiedPrincipalBuilderError},
    resource::{ResourcePattern, ResourcePatternList},
    statement::{Effect, Statement, StatementBuilder, StatementBuilderError},
};

use {
    crate::{display_json, from_str_json, serutil::StringLikeList},
    log::trace,
    serde::{
        de::{self, Deserializer, MapAccess, Visitor},
        ser::{SerializeMap, Serializer},
        Deserialize, Serialize,
    },
    std::{
        fmt::{Formatter, Result as FmtResult},
        iter::{FromIterator, Sum},
        ops::{Add, AddAssign, Index},
        slice::Iter,
    },
};

/// The only policy language version that supports policy variables; always emitted.
pub const POLICY_VERSION: &str = "2012-10-17";

/// An ordered, duplicate-free collection of policy statements.
///
/// Combining documents with `+` keeps every statement of the left operand followed by the statements of the right
/// operand that the left does not already contain. This makes `+` associative with [PolicyDocument::new] as its
/// identity.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PolicyDocument {
    statements: Vec<Statement>,
}

impl PolicyDocument {
    /// Create an empty policy document.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a policy document from a sequence of statements. Repeated statements are kept once, at their first
    /// position.
    pub fn from_statements<I: IntoIterator<Item = Statement>>(statements: I) -> Self {
        let mut result = Self::new();
        result.extend(statements);
        result
    }

    /// Append a statement unless an equal statement is already present. Returns whether it was added.
    pub fn push(&mut self, statement: Statement) -> bool {
        if self.statements.contains(&statement) {
            trace!("Dropping duplicate policy statement: {:?}", statement);
            false
        } else {
            self.statements.push(statement);
            true
        }
    }

    #[inline]
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    #[inline]
    pub fn iter(&self) -> Iter<'_, Statement> {
        self.statements.iter()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.statements.len()
    }
}

impl Add for PolicyDocument {
    type Output = PolicyDocument;

    fn add(mut self, other: PolicyDocument) -> PolicyDocument {
        self += other;
        self
    }
}

impl AddAssign for PolicyDocument {
    fn add_assign(&mut self, other: PolicyDocument) {
        self.extend(other.statements);
    }
}

impl Sum for PolicyDocument {
    fn sum<I: Iterator<Item = PolicyDocument>>(iter: I) -> Self {
        iter.fold(PolicyDocument::new(), Add::add)
    }
}

impl Extend<Statement> for PolicyDocument {
    fn extend<I: IntoIterator<Item = Statement>>(&mut self, iter: I) {
        for statement in iter {
            self.push(statement);
        }
    }
}

impl FromIterator<Statement> for PolicyDocument {
    fn from_iter<I: IntoIterator<Item = Statement>>(iter: I) -> Self {
        Self::from_statements(iter)
    }
}

impl From<Statement> for PolicyDocument {
    fn from(statement: Statement) -> Self {
        Self {
            statements: vec![statement],
        }
    }
}

impl Index<usize> for PolicyDocument {
    type Output = Statement;

    fn index(&self, index: usize) -> &Statement {
        &self.statements[index]
    }
}

impl<'a> IntoIterator for &'a PolicyDocument {
    type Item = &'a Statement;
    type IntoIter = Iter<'a, Statement>;

    fn into_iter(self) -> Self::IntoIter {
        self.statements.iter()
    }
}

display_json!(PolicyDocument);
from_str_json!(PolicyDocument);

impl Serialize for PolicyDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_map(Some(2))?;
        state.serialize_entry("Version", POLICY_VERSION)?;
        state.serialize_entry("Statement", &self.statements)?;
        state.end()
    }
}

struct PolicyDocumentVisitor;

impl<'de> Visitor<'de> for PolicyDocumentVisitor {
    type Value = PolicyDocument;

    fn expecting(&self, f: &mut Formatter) -> FmtResult {
        f.write_str("policy document")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut version_seen = false;
        let mut statements: Option<StringLikeList<Statement>> = None;

        while let Some(key) = access.next_key::<String>()? {
            match key.as_str() {
                "Version" => {
                    if version_seen {
                        return Err(de::Error::duplicate_field("Version"));
                    }
                    version_seen = true;
                    let version = access.next_value::<String>()?;
                    if version != POLICY_VERSION {
                        return Err(de::Error::invalid_value(de::Unexpected::Str(&version), &POLICY_VERSION));
                    }
                }
                "Statement" => {
                    if statements.is_some() {
                        return Err(de::Error::duplicate_field("Statement"));
                    }
                    statements = Some(access.next_value()?);
                }
                _ => return Err(de::Error::unknown_field(&key, &["Version", "Statement"])),
            }
        }

        match statements {
            None => Err(de::Error::missing_field("Statement")),
            Some(StringLikeList::Single(statement)) => Ok(PolicyDocument::from(statement)),
            Some(StringLikeList::List(statements)) => Ok(PolicyDocument::from_statements(statements)),
        }
    }
}

impl<'de> Deserialize<'de> for PolicyDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(PolicyDocumentVisitor)
    }
}
