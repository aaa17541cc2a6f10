use {
    crate::{from_str_json, serutil::StringLikeList, CfnError},
    log::debug,
    serde::{de, de::Deserializer, ser::Serializer, Deserialize, Serialize},
    std::{
        borrow::Borrow,
        collections::{btree_map::Iter, BTreeMap},
        fmt::{Display, Formatter, Result as FmtResult},
        str::FromStr,
    },
};

const BASE_OPERATORS: &[&str] = &[
    "ArnEquals",
    "ArnLike",
    "ArnNotEquals",
    "ArnNotLike",
    "BinaryEquals",
    "Bool",
    "DateEquals",
    "DateGreaterThan",
    "DateGreaterThanEquals",
    "DateLessThan",
    "DateLessThanEquals",
    "DateNotEquals",
    "IpAddress",
    "NotIpAddress",
    "Null",
    "NumericEquals",
    "NumericGreaterThan",
    "NumericGreaterThanEquals",
    "NumericLessThan",
    "NumericLessThanEquals",
    "NumericNotEquals",
    "StringEquals",
    "StringEqualsIgnoreCase",
    "StringLike",
    "StringNotEquals",
    "StringNotEqualsIgnoreCase",
    "StringNotLike",
];

const SET_QUALIFIERS: &[&str] = &["ForAllValues:", "ForAnyValue:"];

/// An operator for a condition clause, e.g. `StringEquals`, `BoolIfExists`, or `ForAnyValue:StringLike`.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ConditionOp(String);

impl ConditionOp {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ConditionOp {
    type Err = CfnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unqualified = SET_QUALIFIERS.iter().find_map(|q| s.strip_prefix(q)).unwrap_or(s);
        let base = match unqualified.strip_suffix("IfExists") {
            Some("Null") => None,
            Some(base) => Some(base),
            None => Some(unqualified),
        };

        match base {
            Some(base) if BASE_OPERATORS.contains(&base) => Ok(Self(s.to_string())),
            _ => {
                debug!("Unknown condition operator: {}", s);
                Err(CfnError::InvalidConditionOperator(s.to_string()))
            }
        }
    }
}

impl Borrow<str> for ConditionOp {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Display for ConditionOp {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ConditionOp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        ConditionOp::from_str(&value).map_err(de::Error::custom)
    }
}

impl Serialize for ConditionOp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Condition keys to the values they are compared against.
pub type ConditionMap = BTreeMap<String, StringLikeList<String>>;

/// The `Condition` element of a policy statement.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Condition {
    map: BTreeMap<ConditionOp, ConditionMap>,
}

from_str_json!(Condition);

impl Condition {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a comparison, e.g. `with("Bool", "aws:SecureTransport", "false")`.
    pub fn with<V: Into<StringLikeList<String>>>(mut self, op: &str, key: &str, values: V) -> Result<Self, CfnError> {
        let op = ConditionOp::from_str(op)?;
        self.map.entry(op).or_default().insert(key.to_string(), values.into());
        Ok(self)
    }

    #[inline]
    pub fn get(&self, op: &str) -> Option<&ConditionMap> {
        self.map.get(op)
    }

    #[inline]
    pub fn iter(&self) -> Iter<'_, ConditionOp, ConditionMap> {
        self.map.iter()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = BTreeMap::deserialize(deserializer)?;

        Ok(Self {
            map,
        })
    }
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.map.serialize(serializer)
    }
}
