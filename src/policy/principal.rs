use {
    crate::{display_json, from_str_json, serutil::StringLikeList, CfnError},
    derive_builder::Builder,
    lazy_static::lazy_static,
    log::debug,
    regex::Regex,
    serde::{
        de::{self, value::MapAccessDeserializer, Deserializer, MapAccess, Unexpected, Visitor},
        ser::Serializer,
        Deserialize, Serialize,
    },
    serde_json::Value,
    std::{
        fmt::{Display, Formatter, Result as FmtResult},
        str::FromStr,
    },
};

lazy_static! {
    static ref AWS_ACCOUNT_ID: Regex = Regex::new(r"^\d{12}$").unwrap();
    static ref IAM_ARN: Regex = Regex::new(r"^arn:[a-z][a-z0-9-]*:(iam|sts)::(\d{12}|\*)?:.+$").unwrap();
}

/// The `Principal` element of a policy statement.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Principal {
    Any,
    Specified(SpecifiedPrincipal),
}

impl From<SpecifiedPrincipal> for Principal {
    fn from(sp: SpecifiedPrincipal) -> Self {
        Self::Specified(sp)
    }
}

impl Principal {
    /// A principal naming a single AWS service, e.g. `config.amazonaws.com`.
    pub fn service<S: Into<String>>(service: S) -> Self {
        Self::Specified(SpecifiedPrincipal {
            service: Some(StringLikeList::Single(service.into())),
            ..Default::default()
        })
    }

    /// `{"AWS": "*"}`, which differs from the bare `"*"` in that it excludes anonymous callers.
    pub fn any_aws() -> Self {
        Self::Specified(SpecifiedPrincipal {
            aws: Some(StringLikeList::Single(AwsPrincipal::Any)),
            ..Default::default()
        })
    }
}

struct PrincipalVisitor;

impl<'de> Visitor<'de> for PrincipalVisitor {
    type Value = Principal;

    fn expecting(&self, f: &mut Formatter) -> FmtResult {
        f.write_str("map of principal types to values or \"*\"")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        if v == "*" {
            Ok(Principal::Any)
        } else {
            Err(E::invalid_value(Unexpected::Str(v), &self))
        }
    }

    fn visit_map<A: MapAccess<'de>>(self, access: A) -> Result<Self::Value, A::Error> {
        let specified = SpecifiedPrincipal::deserialize(MapAccessDeserializer::new(access))?;
        if specified.is_empty() {
            debug!("Principal map names no principals");
            return Err(de::Error::custom(CfnError::InvalidPrincipal("{}".to_string())));
        }
        Ok(Principal::Specified(specified))
    }
}

impl<'de> Deserialize<'de> for Principal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(PrincipalVisitor)
    }
}

impl Serialize for Principal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Any => serializer.serialize_str("*"),
            Self::Specified(specified) => specified.serialize(serializer),
        }
    }
}

display_json!(Principal);
from_str_json!(Principal);

#[derive(Builder, Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[builder(build_fn(validate = "Self::validate"))]
#[serde(deny_unknown_fields)]
pub struct SpecifiedPrincipal {
    #[builder(setter(into, strip_option), default)]
    #[serde(rename = "AWS", skip_serializing_if = "Option::is_none")]
    aws: Option<StringLikeList<AwsPrincipal>>,

    #[builder(setter(into, strip_option), default)]
    #[serde(rename = "CanonicalUser", skip_serializing_if = "Option::is_none")]
    canonical_user: Option<StringLikeList<String>>,

    #[builder(setter(into, strip_option), default)]
    #[serde(rename = "Federated", skip_serializing_if = "Option::is_none")]
    federated: Option<StringLikeList<String>>,

    #[builder(setter(into, strip_option), default)]
    #[serde(rename = "Service", skip_serializing_if = "Option::is_none")]
    service: Option<StringLikeList<String>>,
}

display_json!(SpecifiedPrincipal);

impl SpecifiedPrincipal {
    #[inline]
    pub fn builder() -> SpecifiedPrincipalBuilder {
        SpecifiedPrincipalBuilder::default()
    }

    #[inline]
    pub fn aws(&self) -> Option<&StringLikeList<AwsPrincipal>> {
        self.aws.as_ref()
    }

    #[inline]
    pub fn canonical_user(&self) -> Option<&StringLikeList<String>> {
        self.canonical_user.as_ref()
    }

    #[inline]
    pub fn federated(&self) -> Option<&StringLikeList<String>> {
        self.federated.as_ref()
    }

    #[inline]
    pub fn service(&self) -> Option<&StringLikeList<String>> {
        self.service.as_ref()
    }

    fn is_empty(&self) -> bool {
        self.aws.is_none() && self.canonical_user.is_none() && self.federated.is_none() && self.service.is_none()
    }
}

impl SpecifiedPrincipalBuilder {
    fn validate(&self) -> Result<(), SpecifiedPrincipalBuilderError> {
        if matches!(self.aws, Some(Some(_)))
            || matches!(self.canonical_user, Some(Some(_)))
            || matches!(self.federated, Some(Some(_)))
            || matches!(self.service, Some(Some(_)))
        {
            Ok(())
        } else {
            Err(SpecifiedPrincipalBuilderError::ValidationError(
                "At least one of AWS, CanonicalUser, Federated, or Service must be set.".to_string(),
            ))
        }
    }
}

/// A value of the `AWS` principal key.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AwsPrincipal {
    Any,
    Account(String),
    Arn(String),
    Intrinsic(Value),
}

impl Display for AwsPrincipal {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::Any => f.write_str("*"),
            Self::Account(account_id) => f.write_str(account_id),
            Self::Arn(arn) => f.write_str(arn),
            Self::Intrinsic(value) => write!(f, "{}", value),
        }
    }
}

impl FromStr for AwsPrincipal {
    type Err = CfnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "*" {
            Ok(Self::Any)
        } else if AWS_ACCOUNT_ID.is_match(s) {
            Ok(Self::Account(s.to_string()))
        } else if IAM_ARN.is_match(s) {
            Ok(Self::Arn(s.to_string()))
        } else {
            debug!("Invalid AWS principal: {}", s);
            Err(CfnError::InvalidPrincipal(s.to_string()))
        }
    }
}

struct AwsPrincipalVisitor;

impl<'de> Visitor<'de> for AwsPrincipalVisitor {
    type Value = AwsPrincipal;

    fn expecting(&self, f: &mut Formatter) -> FmtResult {
        f.write_str("AWS account ID, ARN, \"*\", or intrinsic function")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        AwsPrincipal::from_str(v).map_err(E::custom)
    }

    fn visit_map<A: MapAccess<'de>>(self, access: A) -> Result<Self::Value, A::Error> {
        Value::deserialize(MapAccessDeserializer::new(access)).map(AwsPrincipal::Intrinsic)
    }
}

impl<'de> Deserialize<'de> for AwsPrincipal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(AwsPrincipalVisitor)
    }
}

impl Serialize for AwsPrincipal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Intrinsic(value) => value.serialize(serializer),
            _ => serializer.collect_str(self),
        }
    }
}
