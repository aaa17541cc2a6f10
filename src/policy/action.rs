use {
    crate::{serutil::StringLikeList, CfnError},
    log::debug,
    serde::{
        de::{self, Deserializer, Visitor},
        ser::Serializer,
        Deserialize, Serialize,
    },
    std::{
        fmt::{Display, Formatter, Result as FmtResult},
        str::FromStr,
    },
};

pub type ActionList = StringLikeList<Action>;

/// An IAM action: `*` or `service:Operation`, where the operation may contain `*` and `?` wildcards.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Action {
    Any,
    Specific {
        service: String,
        action: String,
    },
}

impl Action {
    pub fn new<S: Into<String>, A: Into<String>>(service: S, action: A) -> Result<Self, CfnError> {
        let service = service.into();
        let action = action.into();
        let invalid = || CfnError::InvalidAction(format!("{}:{}", service, action));

        if service.is_empty() || action.is_empty() {
            debug!("Action '{service}:{action}' has an empty component.");
            return Err(invalid());
        }

        for (i, c) in service.bytes().enumerate() {
            if !(c.is_ascii_lowercase() || c.is_ascii_digit() || (i > 0 && i < service.len() - 1 && c == b'-')) {
                debug!("Action '{service}:{action}' has an invalid service.");
                return Err(invalid());
            }
        }

        for c in action.bytes() {
            if !(c.is_ascii_alphanumeric() || c == b'*' || c == b'?' || c == b'-' || c == b'_') {
                debug!("Action '{service}:{action}' has an invalid action.");
                return Err(invalid());
            }
        }

        Ok(Self::Specific {
            service,
            action,
        })
    }

    #[inline]
    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    #[inline]
    pub fn service(&self) -> &str {
        match self {
            Self::Any => "*",
            Self::Specific {
                service,
                ..
            } => service,
        }
    }

    #[inline]
    pub fn action(&self) -> &str {
        match self {
            Self::Any => "*",
            Self::Specific {
                action,
                ..
            } => action,
        }
    }
}

impl FromStr for Action {
    type Err = CfnError;

    fn from_str(v: &str) -> Result<Self, Self::Err> {
        if v == "*" {
            return Ok(Self::Any);
        }

        match v.split_once(':') {
            Some((service, action)) if !action.contains(':') => Action::new(service, action),
            _ => Err(CfnError::InvalidAction(v.to_string())),
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::Any => f.write_str("*"),
            Self::Specific {
                service,
                action,
            } => write!(f, "{}:{}", service, action),
        }
    }
}

struct ActionVisitor;

impl<'de> Visitor<'de> for ActionVisitor {
    type Value = Action;

    fn expecting(&self, f: &mut Formatter) -> FmtResult {
        f.write_str("service:action or \"*\"")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Action::from_str(v).map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(ActionVisitor)
    }
}

impl Serialize for Action {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use {
        crate::{Action, ActionList, CfnError},
        pretty_assertions::assert_eq,
        std::str::FromStr,
    };

    #[test_log::test]
    fn test_parse() {
        assert_eq!(Action::from_str("*").unwrap(), Action::Any);

        let a = Action::from_str("lambda:CreateFunction").unwrap();
        assert_eq!(a.service(), "lambda");
        assert_eq!(a.action(), "CreateFunction");
        assert!(!a.is_any());
        assert_eq!(a.to_string(), "lambda:CreateFunction");

        let a = Action::from_str("apigateway:*").unwrap();
        assert_eq!(a.action(), "*");

        let a = Action::from_str("s3:Get?bject*").unwrap();
        assert_eq!(a.to_string(), "s3:Get?bject*");
    }

    #[test_log::test]
    fn test_bad_actions() {
        for bad in ["", "s3", "s3:", ":GetObject", "S3:GetObject", "-s3:GetObject", "s3:Get:Object", "s3:Get Object"] {
            assert_eq!(Action::from_str(bad).unwrap_err(), CfnError::InvalidAction(bad.to_string()), "{}", bad);
        }
    }

    #[test_log::test]
    fn test_serde() {
        let al: ActionList = serde_json::from_str(r#"["logs:CreateLogGroup", "logs:DeleteLogGroup"]"#).unwrap();
        assert_eq!(al.len(), 2);
        assert_eq!(al[1].action(), "DeleteLogGroup");
        assert_eq!(serde_json::to_string(&al).unwrap(), r#"["logs:CreateLogGroup","logs:DeleteLogGroup"]"#);

        let e = serde_json::from_str::<ActionList>(r#""ec2:""#).unwrap_err();
        assert!(e.to_string().starts_with("Invalid action: ec2: at line 1 column"));
    }
}
