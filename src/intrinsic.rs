//! CloudFormation intrinsic functions and pseudo parameters.
//!
//! These build the JSON objects that resources use to refer to one another; CloudFormation resolves them at deploy
//! time.

use serde_json::{json, Map, Value};

pub const ACCOUNT_ID: &str = "AWS::AccountId";
pub const PARTITION: &str = "AWS::Partition";
pub const REGION: &str = "AWS::Region";
pub const STACK_NAME: &str = "AWS::StackName";

/// `{"Ref": logical_id}`.
pub fn reference(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

/// `{"Fn::GetAtt": [logical_id, attribute]}`.
pub fn get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

/// `{"Fn::Sub": template}`, substituting pseudo parameters and resource references.
pub fn sub(template: &str) -> Value {
    json!({ "Fn::Sub": template })
}

/// `{"Fn::Sub": [template, variables]}`. Variables keep the order given.
pub fn sub_with<I, K>(template: &str, variables: I) -> Value
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    let vars: Map<String, Value> = variables.into_iter().map(|(k, v)| (k.into(), v)).collect();
    json!({ "Fn::Sub": [template, vars] })
}

/// `{"Fn::Join": [delimiter, values]}`.
pub fn join<I: IntoIterator<Item = Value>>(delimiter: &str, values: I) -> Value {
    let values: Vec<Value> = values.into_iter().collect();
    json!({ "Fn::Join": [delimiter, values] })
}
