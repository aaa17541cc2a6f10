#![warn(clippy::all)]

//! Compose CloudFormation templates from reusable constructs.
//!
//! A [Stack] collects raw [Resource]s, [Construct]s, and other stacks. Constructs are expanded into resources when
//! they are added; the stack can then export the template, compute the IAM policy CloudFormation needs to manage it,
//! and stage any local data its constructs need uploaded.

pub(crate) mod construct;
pub mod constructs;
pub(crate) mod error;
pub mod intrinsic;
pub(crate) mod naming;
pub(crate) mod policy;
pub(crate) mod stack;
pub(crate) mod template;

#[macro_use]
pub(crate) mod serutil;

pub use {
    construct::{Construct, DataDir, Element, StackItem},
    error::CfnError,
    naming::{name_to_id, validate_stack_name},
    policy::{
        Action, ActionList, AwsPrincipal, Condition, ConditionMap, ConditionOp, Effect, PolicyDocument, Principal,
        ResourcePattern, ResourcePatternList, SpecifiedPrincipal, SpecifiedPrincipalBuilder,
        SpecifiedPrincipalBuilderError, Statement, StatementBuilder, StatementBuilderError, POLICY_VERSION,
    },
    serutil::{ListKind, StringLikeList},
    stack::{Stack, StackBuilder, StackBuilderError, StackConfig, TEMPLATE_FORMAT_VERSION},
    template::{CollisionPolicy, DeletionPolicy, Resource, Template},
};
