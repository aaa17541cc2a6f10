//! Ready-made constructs for common AWS building blocks.

pub mod apigateway;
pub mod awslambda;
pub mod config;
pub mod s3;

use {
    crate::{serutil::StringLikeList, Action, CfnError, Effect, PolicyDocument, ResourcePattern, Statement},
    serde_json::Value,
    std::str::FromStr,
};

/// Keep single-element lists scalar, the way hand-written policies usually are.
pub(crate) fn one_or_many<T>(mut items: Vec<T>) -> StringLikeList<T> {
    if items.len() == 1 {
        if let Some(item) = items.pop() {
            return StringLikeList::Single(item);
        }
    }
    StringLikeList::List(items)
}

/// An `Allow` statement for a set of actions on a set of resources.
pub(crate) fn allow(construct: &str, actions: &[&str], resources: Vec<ResourcePattern>) -> Result<Statement, CfnError> {
    let actions = actions.iter().map(|a| Action::from_str(a)).collect::<Result<Vec<_>, _>>()?;
    Statement::builder()
        .effect(Effect::Allow)
        .action(one_or_many(actions))
        .resource(one_or_many(resources))
        .build()
        .map_err(|e| CfnError::expansion(construct, e.to_string()))
}

/// Collect statements into a document, failing on the first one that could not be built.
pub(crate) fn policy_document<I>(statements: I) -> Result<PolicyDocument, CfnError>
where
    I: IntoIterator<Item = Result<Statement, CfnError>>,
{
    statements.into_iter().collect()
}

/// Embed a policy document as a resource property.
pub(crate) fn policy_value(construct: &str, document: &PolicyDocument) -> Result<Value, CfnError> {
    serde_json::to_value(document).map_err(|e| CfnError::expansion(construct, e.to_string()))
}
