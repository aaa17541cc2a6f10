use {
    crate::{intrinsic, name_to_id, serutil::StringLikeList, CfnError},
    log::{trace, warn},
    serde::{
        ser::{SerializeMap, Serializer},
        Deserialize, Serialize,
    },
    serde_json::{Map, Value},
    std::{
        collections::HashMap,
        fmt::{Display, Formatter, Result as FmtResult},
        slice::Iter,
    },
};

/// What CloudFormation does with a resource's physical object when the resource leaves the stack.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum DeletionPolicy {
    Delete,
    Retain,
    Snapshot,
}

impl Display for DeletionPolicy {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::Delete => f.write_str("Delete"),
            Self::Retain => f.write_str("Retain"),
            Self::Snapshot => f.write_str("Snapshot"),
        }
    }
}

/// A typed CloudFormation resource with a property bag.
///
/// Property values are arbitrary JSON and are not checked against the resource type's schema.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Resource {
    name: String,
    logical_id: String,
    resource_type: String,
    properties: Map<String, Value>,
    depends_on: Option<StringLikeList<String>>,
    condition: Option<String>,
    deletion_policy: Option<DeletionPolicy>,
}

impl Resource {
    /// Create a resource with no properties. Fails if `name` has no alphanumeric characters.
    pub fn new<N: Into<String>, T: Into<String>>(name: N, resource_type: T) -> Result<Self, CfnError> {
        let name = name.into();
        let logical_id = name_to_id(&name)?;
        Ok(Self {
            name,
            logical_id,
            resource_type: resource_type.into(),
            properties: Map::new(),
            depends_on: None,
            condition: None,
            deletion_policy: None,
        })
    }

    /// Set a property. Setting the same key again replaces its value but keeps its position.
    pub fn property<K: Into<String>, V: Into<Value>>(mut self, key: K, value: V) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Set a property only when a value is present.
    pub fn property_opt<K: Into<String>, V: Into<Value>>(self, key: K, value: Option<V>) -> Self {
        match value {
            Some(value) => self.property(key, value),
            None => self,
        }
    }

    /// Merge a map of properties into the bag.
    pub fn properties(mut self, properties: Map<String, Value>) -> Self {
        self.properties.extend(properties);
        self
    }

    pub fn depends_on<D: Into<StringLikeList<String>>>(mut self, depends_on: D) -> Self {
        self.depends_on = Some(depends_on.into());
        self
    }

    pub fn condition<C: Into<String>>(mut self, condition: C) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn deletion_policy(mut self, deletion_policy: DeletionPolicy) -> Self {
        self.deletion_policy = Some(deletion_policy);
        self
    }

    /// The human-readable name the resource was created with.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    #[inline]
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    #[inline]
    pub fn get_properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    #[inline]
    pub fn get_property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    #[inline]
    pub fn get_depends_on(&self) -> Option<&StringLikeList<String>> {
        self.depends_on.as_ref()
    }

    #[inline]
    pub fn get_condition(&self) -> Option<&str> {
        self.condition.as_deref()
    }

    #[inline]
    pub fn get_deletion_policy(&self) -> Option<DeletionPolicy> {
        self.deletion_policy
    }

    /// The template body of this resource: `Type`, then `Properties` (omitted when empty), `DependsOn`, `Condition`,
    /// and `DeletionPolicy` when set.
    pub fn to_value(&self) -> Value {
        let mut body = Map::new();
        body.insert("Type".to_string(), Value::String(self.resource_type.clone()));
        if !self.properties.is_empty() {
            body.insert("Properties".to_string(), Value::Object(self.properties.clone()));
        }
        if let Some(depends_on) = &self.depends_on {
            let depends_on = match depends_on {
                StringLikeList::Single(id) => Value::String(id.clone()),
                StringLikeList::List(ids) => ids.iter().cloned().map(Value::String).collect(),
            };
            body.insert("DependsOn".to_string(), depends_on);
        }
        if let Some(condition) = &self.condition {
            body.insert("Condition".to_string(), Value::String(condition.clone()));
        }
        if let Some(deletion_policy) = self.deletion_policy {
            body.insert("DeletionPolicy".to_string(), Value::String(deletion_policy.to_string()));
        }
        Value::Object(body)
    }

    /// `{"Ref": <logical id>}`.
    pub fn reference(&self) -> Value {
        intrinsic::reference(&self.logical_id)
    }

    /// `{"Fn::GetAtt": [<logical id>, attribute]}`.
    pub fn get_att(&self, attribute: &str) -> Value {
        intrinsic::get_att(&self.logical_id, attribute)
    }
}

impl Serialize for Resource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// How a [Template] treats a resource whose logical id is already taken.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum CollisionPolicy {
    /// Fail with [CfnError::NamingCollision].
    #[default]
    Reject,

    /// Replace the earlier resource, keeping its position in the template.
    Overwrite,
}

/// Resources keyed by logical id, in insertion order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Template {
    resources: Vec<Resource>,
    index: HashMap<String, usize>,
}

impl Template {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, resource: Resource, policy: CollisionPolicy) -> Result<(), CfnError> {
        match self.index.get(resource.logical_id()) {
            None => {
                trace!("Adding resource {} ({})", resource.logical_id(), resource.resource_type());
                self.index.insert(resource.logical_id().to_string(), self.resources.len());
                self.resources.push(resource);
                Ok(())
            }
            Some(&pos) => {
                let existing = &self.resources[pos];
                match policy {
                    CollisionPolicy::Reject => Err(CfnError::NamingCollision {
                        logical_id: resource.logical_id().to_string(),
                        existing: existing.name().to_string(),
                        new: resource.name().to_string(),
                    }),
                    CollisionPolicy::Overwrite => {
                        warn!(
                            "Resource {:?} replaces {:?} at logical id {}",
                            resource.name(),
                            existing.name(),
                            resource.logical_id()
                        );
                        self.resources[pos] = resource;
                        Ok(())
                    }
                }
            }
        }
    }

    /// Look up a resource by logical id.
    pub fn get(&self, logical_id: &str) -> Option<&Resource> {
        self.index.get(logical_id).map(|&pos| &self.resources[pos])
    }

    #[inline]
    pub fn contains(&self, logical_id: &str) -> bool {
        self.index.contains_key(logical_id)
    }

    #[inline]
    pub fn iter(&self) -> Iter<'_, Resource> {
        self.resources.iter()
    }

    /// The `Resources` section of a template, in insertion order.
    pub fn to_value(&self) -> Value {
        Value::Object(self.resources.iter().map(|r| (r.logical_id().to_string(), r.to_value())).collect())
    }

    pub fn logical_ids(&self) -> Vec<&str> {
        self.resources.iter().map(Resource::logical_id).collect()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.resources.len()
    }
}

impl<'a> IntoIterator for &'a Template {
    type Item = &'a Resource;
    type IntoIter = Iter<'a, Resource>;

    fn into_iter(self) -> Self::IntoIter {
        self.resources.iter()
    }
}

impl Serialize for Template {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_map(Some(self.resources.len()))?;
        for resource in &self.resources {
            state.serialize_entry(resource.logical_id(), resource)?;
        }
        state.end()
    }
}
