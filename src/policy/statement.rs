use {
    crate::{display_json, from_str_json, ActionList, Condition, Principal, ResourcePatternList},
    derive_builder::Builder,
    serde::{
        de::{self, Deserializer, MapAccess, Visitor},
        Deserialize, Serialize,
    },
    std::fmt::{Display, Formatter, Result as FmtResult},
};

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Effect {
    Allow,
    Deny,
}

impl Display for Effect {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::Allow => f.write_str("Allow"),
            Self::Deny => f.write_str("Deny"),
        }
    }
}

/// A single policy statement.
///
/// Equality is structural: two statements are the same statement when every element matches, including `Sid`. A
/// [PolicyDocument][crate::PolicyDocument] never holds two equal statements.
#[derive(Builder, Clone, Debug, Eq, PartialEq, Serialize)]
#[builder(build_fn(validate = "Self::validate"))]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    #[builder(setter(into, strip_option), default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    sid: Option<String>,

    effect: Effect,

    #[builder(setter(into, strip_option), default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    principal: Option<Principal>,

    #[builder(setter(into, strip_option), default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    not_principal: Option<Principal>,

    #[builder(setter(into, strip_option), default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    action: Option<ActionList>,

    #[builder(setter(into, strip_option), default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    not_action: Option<ActionList>,

    #[builder(setter(into, strip_option), default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    resource: Option<ResourcePatternList>,

    #[builder(setter(into, strip_option), default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    not_resource: Option<ResourcePatternList>,

    #[builder(setter(into, strip_option), default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    condition: Option<Condition>,
}

impl Statement {
    pub fn builder() -> StatementBuilder {
        StatementBuilder::default()
    }

    #[inline]
    pub fn sid(&self) -> Option<&str> {
        self.sid.as_deref()
    }

    #[inline]
    pub fn effect(&self) -> &Effect {
        &self.effect
    }

    #[inline]
    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    #[inline]
    pub fn not_principal(&self) -> Option<&Principal> {
        self.not_principal.as_ref()
    }

    #[inline]
    pub fn action(&self) -> Option<&ActionList> {
        self.action.as_ref()
    }

    #[inline]
    pub fn not_action(&self) -> Option<&ActionList> {
        self.not_action.as_ref()
    }

    #[inline]
    pub fn resource(&self) -> Option<&ResourcePatternList> {
        self.resource.as_ref()
    }

    #[inline]
    pub fn not_resource(&self) -> Option<&ResourcePatternList> {
        self.not_resource.as_ref()
    }

    #[inline]
    pub fn condition(&self) -> Option<&Condition> {
        self.condition.as_ref()
    }
}

display_json!(Statement);
from_str_json!(Statement);

const STATEMENT_FIELDS: &[&str] =
    &["Sid", "Effect", "Principal", "NotPrincipal", "Action", "NotAction", "Resource", "NotResource", "Condition"];

impl<'de> Deserialize<'de> for Statement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(StatementVisitor)
    }
}

struct StatementVisitor;

impl<'de> Visitor<'de> for StatementVisitor {
    type Value = Statement;

    fn expecting(&self, f: &mut Formatter) -> FmtResult {
        f.write_str("a map of statement properties")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Statement, A::Error> {
        let mut builder = Statement::builder();
        let mut seen = [false; 9];

        while let Some(key) = access.next_key::<String>()? {
            let index = match STATEMENT_FIELDS.iter().position(|f| *f == key) {
                Some(index) => index,
                None => return Err(de::Error::unknown_field(&key, STATEMENT_FIELDS)),
            };

            if seen[index] {
                return Err(de::Error::duplicate_field(STATEMENT_FIELDS[index]));
            }
            seen[index] = true;

            match index {
                0 => builder.sid(access.next_value::<String>()?),
                1 => builder.effect(access.next_value::<Effect>()?),
                2 => builder.principal(access.next_value::<Principal>()?),
                3 => builder.not_principal(access.next_value::<Principal>()?),
                4 => builder.action(access.next_value::<ActionList>()?),
                5 => builder.not_action(access.next_value::<ActionList>()?),
                6 => builder.resource(access.next_value::<ResourcePatternList>()?),
                7 => builder.not_resource(access.next_value::<ResourcePatternList>()?),
                _ => builder.condition(access.next_value::<Condition>()?),
            };
        }

        builder.build().map_err(|e| match e {
            StatementBuilderError::ValidationError(s) => {
                let msg = s.replace('.', ";").trim_end_matches(';').to_string();
                de::Error::custom(StatementBuilderError::ValidationError(msg))
            }
            _ => de::Error::custom(e),
        })
    }
}

impl StatementBuilder {
    fn validate(&self) -> Result<(), StatementBuilderError> {
        let mut errors = Vec::with_capacity(4);
        if self.effect.is_none() {
            errors.push("Effect must be set.");
        }

        match (&self.action, &self.not_action) {
            (Some(Some(_)), Some(Some(_))) => errors.push("Action and NotAction cannot both be set."),
            (None | Some(None), None | Some(None)) => errors.push("Either Action or NotAction must be set."),
            _ => (),
        }

        match (&self.resource, &self.not_resource) {
            (Some(Some(_)), Some(Some(_))) => errors.push("Resource and NotResource cannot both be set."),
            (None | Some(None), None | Some(None)) => errors.push("Either Resource or NotResource must be set."),
            _ => (),
        }

        if let (Some(Some(_)), Some(Some(_))) = (&self.principal, &self.not_principal) {
            errors.push("Principal and NotPrincipal cannot both be set.");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(StatementBuilderError::ValidationError(errors.join(" ")))
        }
    }
}
