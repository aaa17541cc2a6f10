use {
    crate::{serutil::StringLikeList, CfnError},
    log::debug,
    serde::{
        de::{self, value::MapAccessDeserializer, Deserializer, MapAccess, Visitor},
        ser::Serializer,
        Deserialize, Serialize,
    },
    serde_json::{Map, Value},
    std::{
        fmt::{Display, Formatter, Result as FmtResult},
        str::FromStr,
    },
};

pub type ResourcePatternList = StringLikeList<ResourcePattern>;

/// The `Resource` element of a policy statement.
///
/// Policies embedded in a template frequently name resources that do not exist yet, so besides literal ARN patterns
/// this also accepts an intrinsic function object (`{"Fn::Sub": ...}`, `{"Fn::GetAtt": ...}`) that CloudFormation
/// resolves at deploy time.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ResourcePattern {
    Any,
    Arn(String),
    Intrinsic(Value),
}

impl ResourcePattern {
    /// Create an ARN pattern from its components. Components may contain `*` and `?` wildcards.
    pub fn arn(partition: &str, service: &str, region: &str, account_id: &str, resource: &str) -> Self {
        Self::Arn(format!("arn:{}:{}:{}:{}:{}", partition, service, region, account_id, resource))
    }

    /// Wrap an intrinsic function. Fails unless `value` is a single-key object naming `Ref` or an `Fn::` function.
    pub fn intrinsic(value: Value) -> Result<Self, CfnError> {
        match &value {
            Value::Object(map) if is_intrinsic(map) => Ok(Self::Intrinsic(value)),
            _ => Err(CfnError::InvalidResource(value.to_string())),
        }
    }

    #[inline]
    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }
}

fn is_intrinsic(map: &Map<String, Value>) -> bool {
    map.len() == 1 && map.keys().all(|k| k == "Ref" || k.starts_with("Fn::"))
}

impl FromStr for ResourcePattern {
    type Err = CfnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "*" {
            return Ok(Self::Any);
        }

        let parts: Vec<&str> = s.splitn(6, ':').collect();
        if parts.len() != 6 || parts[0] != "arn" || parts[1].is_empty() || parts[2].is_empty() {
            debug!("Failed to parse resource as ARN pattern: {}", s);
            return Err(CfnError::InvalidResource(s.to_string()));
        }

        Ok(Self::Arn(s.to_string()))
    }
}

impl Display for ResourcePattern {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::Any => f.write_str("*"),
            Self::Arn(arn) => f.write_str(arn),
            Self::Intrinsic(value) => write!(f, "{}", value),
        }
    }
}

struct ResourcePatternVisitor;

impl<'de> Visitor<'de> for ResourcePatternVisitor {
    type Value = ResourcePattern;

    fn expecting(&self, f: &mut Formatter) -> FmtResult {
        f.write_str("ARN pattern, \"*\", or intrinsic function")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        ResourcePattern::from_str(v).map_err(E::custom)
    }

    fn visit_map<A: MapAccess<'de>>(self, access: A) -> Result<Self::Value, A::Error> {
        let value = Value::deserialize(MapAccessDeserializer::new(access))?;
        ResourcePattern::intrinsic(value).map_err(de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for ResourcePattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ResourcePatternVisitor)
    }
}

impl Serialize for ResourcePattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Any => serializer.serialize_str("*"),
            Self::Arn(arn) => serializer.serialize_str(arn),
            Self::Intrinsic(value) => value.serialize(serializer),
        }
    }
}
