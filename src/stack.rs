use {
    crate::{
        construct::{DataDir, StagingClaims},
        display_json, from_str_json,
        naming::validate_stack_name,
        name_to_id, CfnError, CollisionPolicy, Construct, Element, PolicyDocument, Resource, StackItem, Template,
    },
    derive_builder::Builder,
    log::debug,
    serde::{Deserialize, Serialize},
    serde_json::{Map, Value},
    std::{collections::HashSet, ops::Index, path::Path, sync::Arc},
};

/// The only CloudFormation template format version.
pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// A CloudFormation stack under construction.
///
/// A stack keeps two views of what has been added to it: the provenance log of items exactly as they were added
/// ([Stack::constructs]) and the template of expanded resources keyed by logical id ([Stack::template]). Constructs
/// are expanded once, when added; the provenance log is what another stack replays when this stack is added to it.
#[derive(Builder, Clone, Debug)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct Stack {
    #[builder(setter(into))]
    name: String,

    #[builder(setter(into, strip_option), default)]
    description: Option<String>,

    /// Role CloudFormation assumes to manage the stack's resources.
    #[builder(setter(into, strip_option), default)]
    cfn_role_arn: Option<String>,

    /// Bucket that staged data is uploaded to.
    #[builder(setter(into, strip_option), default)]
    s3_bucket: Option<String>,

    /// Key prefix for staged data within `s3_bucket`.
    #[builder(setter(into), default)]
    s3_key: String,

    #[builder(default)]
    on_collision: CollisionPolicy,

    #[builder(setter(skip))]
    constructs: Vec<StackItem>,

    #[builder(setter(skip))]
    template: Template,

    #[builder(setter(skip))]
    sealed: bool,
}

impl StackBuilder {
    fn validate(&self) -> Result<(), StackBuilderError> {
        match &self.name {
            Some(name) => validate_stack_name(name).map_err(|e| StackBuilderError::ValidationError(e.to_string())),
            None => Ok(()),
        }
    }
}

impl Stack {
    /// Create an empty stack with default settings.
    pub fn new<S: Into<String>>(name: S) -> Result<Self, CfnError> {
        let name = name.into();
        validate_stack_name(&name)?;
        Ok(Self {
            name,
            description: None,
            cfn_role_arn: None,
            s3_bucket: None,
            s3_key: String::new(),
            on_collision: CollisionPolicy::default(),
            constructs: Vec::new(),
            template: Template::new(),
            sealed: false,
        })
    }

    pub fn builder() -> StackBuilder {
        StackBuilder::default()
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[inline]
    pub fn cfn_role_arn(&self) -> Option<&str> {
        self.cfn_role_arn.as_deref()
    }

    #[inline]
    pub fn s3_bucket(&self) -> Option<&str> {
        self.s3_bucket.as_deref()
    }

    #[inline]
    pub fn s3_key(&self) -> &str {
        &self.s3_key
    }

    #[inline]
    pub fn on_collision(&self) -> CollisionPolicy {
        self.on_collision
    }

    /// The items added to this stack, in the order they were added.
    #[inline]
    pub fn constructs(&self) -> &[StackItem] {
        &self.constructs
    }

    #[inline]
    pub fn template(&self) -> &Template {
        &self.template
    }

    /// The number of resources in the template.
    #[inline]
    pub fn len(&self) -> usize {
        self.template.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.template.is_empty()
    }

    /// Add a resource, a construct, or the contents of another stack.
    ///
    /// Everything being added is recorded in the provenance log before expansion starts. Constructs are expanded in
    /// order against this stack; if one fails, resources inserted before the failure stay in the template.
    pub fn add<E: Into<Element>>(&mut self, element: E) -> Result<&mut Self, CfnError> {
        if self.sealed {
            return Err(CfnError::StackSealed(self.name.clone()));
        }

        let batch = match element.into() {
            Element::Resource(resource) => vec![StackItem::Resource(resource)],
            Element::Construct(construct) => vec![StackItem::Construct(construct)],
            Element::Stack(other) => {
                debug!("Merging {} items from stack {} into {}", other.constructs.len(), other.name, self.name);
                other.constructs
            }
        };

        self.constructs.extend(batch.iter().cloned());

        for item in batch {
            match item {
                StackItem::Resource(resource) => self.template.insert(resource, self.on_collision)?,
                StackItem::Construct(construct) => {
                    debug!("Expanding construct {} in stack {}", construct.name(), self.name);
                    let resources = construct.resources(self)?;
                    for resource in resources {
                        self.template.insert(resource, self.on_collision)?;
                    }
                }
            }
        }

        Ok(self)
    }

    /// Add a construct by value.
    pub fn add_construct<C: Construct + 'static>(&mut self, construct: C) -> Result<&mut Self, CfnError> {
        let construct: Arc<dyn Construct> = Arc::new(construct);
        self.add(construct)
    }

    /// Prevent further additions.
    pub fn seal(&mut self) -> &mut Self {
        self.sealed = true;
        self
    }

    #[inline]
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// The permissions needed to manage every construct in the stack, merged in the order the constructs were added.
    /// Raw resources contribute nothing.
    pub fn cfn_policy_document(&self) -> PolicyDocument {
        self.constructs
            .iter()
            .filter_map(StackItem::as_construct)
            .map(|construct| construct.cfn_policy_document(self))
            .sum()
    }

    /// Find a resource by its human-readable name (or logical id).
    pub fn lookup(&self, name: &str) -> Result<&Resource, CfnError> {
        let logical_id = name_to_id(name)?;
        self.template.get(&logical_id).ok_or_else(|| CfnError::NotFound(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<&Resource> {
        name_to_id(name).ok().and_then(|logical_id| self.template.get(&logical_id))
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// The CloudFormation template document for this stack.
    pub fn export(&self) -> Value {
        let mut document = Map::new();
        document.insert("AWSTemplateFormatVersion".to_string(), Value::String(TEMPLATE_FORMAT_VERSION.to_string()));
        if let Some(description) = &self.description {
            document.insert("Description".to_string(), Value::String(description.clone()));
        }
        document.insert("Resources".to_string(), self.template.to_value());
        Value::Object(document)
    }

    /// The template document as pretty-printed JSON.
    pub fn export_json(&self) -> String {
        format!("{:#}", self.export())
    }

    /// The template document as YAML.
    pub fn export_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self.export())
    }

    /// Stage local data for every construct under `root`, one directory per construct. A construct that appears more
    /// than once in the provenance log is staged once.
    pub fn create_data_dir(&self, root: &Path) -> Result<(), CfnError> {
        let claims = StagingClaims::default();
        let mut staged = HashSet::new();

        for construct in self.constructs.iter().filter_map(StackItem::as_construct) {
            let owner = Arc::as_ptr(construct) as *const () as usize;
            if !staged.insert(owner) {
                debug!("Construct {} is already staged", construct.name());
                continue;
            }

            let namespace = name_to_id(construct.name())?;
            let data_dir = DataDir::new(root, namespace, owner, &claims);
            construct.create_data_dir(&data_dir)?;
            if data_dir.is_created() {
                debug!("Staged data for construct {} in {}", construct.name(), data_dir.namespace());
            }
        }

        Ok(())
    }

    /// The S3 key that `file` staged by the named construct is uploaded to.
    pub fn s3_data_key(&self, construct_name: &str, file: &str) -> Result<String, CfnError> {
        if self.s3_bucket.is_none() {
            return Err(CfnError::MissingS3Bucket(construct_name.to_string()));
        }

        Ok(format!("{}{}/{}", self.s3_key, name_to_id(construct_name)?, file))
    }
}

impl Index<&str> for Stack {
    type Output = Resource;

    fn index(&self, name: &str) -> &Resource {
        match self.get(name) {
            Some(resource) => resource,
            None => panic!("Resource not found: {}", name),
        }
    }
}

/// Stack settings as read from a JSON document.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct StackConfig {
    pub stack_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cfn_role_arn: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3_bucket: Option<String>,

    #[serde(default)]
    pub s3_key: String,

    #[serde(default)]
    pub on_collision: CollisionPolicy,
}

display_json!(StackConfig);
from_str_json!(StackConfig);

impl StackConfig {
    /// Create an empty stack with these settings.
    pub fn to_stack(&self) -> Result<Stack, CfnError> {
        validate_stack_name(&self.stack_name)?;

        let mut builder = Stack::builder();
        builder.name(self.stack_name.as_str()).s3_key(self.s3_key.as_str()).on_collision(self.on_collision);
        if let Some(description) = &self.description {
            builder.description(description.as_str());
        }
        if let Some(cfn_role_arn) = &self.cfn_role_arn {
            builder.cfn_role_arn(cfn_role_arn.as_str());
        }
        if let Some(s3_bucket) = &self.s3_bucket {
            builder.s3_bucket(s3_bucket.as_str());
        }

        builder.build().map_err(|_| CfnError::InvalidStackName(self.stack_name.clone()))
    }
}

impl TryFrom<StackConfig> for Stack {
    type Error = CfnError;

    fn try_from(config: StackConfig) -> Result<Self, Self::Error> {
        config.to_stack()
    }
}

#[cfg(test)]
mod tests;
