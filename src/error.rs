use std::{
    error::Error,
    fmt::{Display, Formatter, Result as FmtResult},
    io,
    path::{Path, PathBuf},
};

#[derive(Debug, Eq, PartialEq)]
pub enum CfnError {
    /// A construct could not produce its resources.
    ConstructExpansion {
        construct: String,
        message: String,
    },
    InvalidAction(String),
    InvalidConditionOperator(String),
    InvalidPrincipal(String),
    InvalidResource(String),
    InvalidResourceName(String),
    InvalidStackName(String),
    MissingS3Bucket(String),

    /// Two resources normalize to the same logical id.
    NamingCollision {
        logical_id: String,
        existing: String,
        new: String,
    },
    NotFound(String),
    StackSealed(String),
    StagingConflict(String),
    StagingIo {
        path: PathBuf,
        kind: io::ErrorKind,
        message: String,
    },
}

impl CfnError {
    pub fn expansion<C: Into<String>, M: Into<String>>(construct: C, message: M) -> Self {
        Self::ConstructExpansion {
            construct: construct.into(),
            message: message.into(),
        }
    }

    pub fn staging_io(path: &Path, e: io::Error) -> Self {
        Self::StagingIo {
            path: path.to_path_buf(),
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

impl Display for CfnError {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::ConstructExpansion {
                construct,
                message,
            } => write!(f, "Failed to expand construct {}: {}", construct, message),
            Self::InvalidAction(action) => write!(f, "Invalid action: {}", action),
            Self::InvalidConditionOperator(operator) => write!(f, "Invalid condition operator: {}", operator),
            Self::InvalidPrincipal(principal) => write!(f, "Invalid principal: {}", principal),
            Self::InvalidResource(resource) => write!(f, "Invalid resource: {}", resource),
            Self::InvalidResourceName(name) => write!(f, "Invalid resource name: {:?}", name),
            Self::InvalidStackName(name) => write!(f, "Invalid stack name: {:?}", name),
            Self::MissingS3Bucket(construct) => {
                write!(f, "Construct {} stages data but the stack has no S3 bucket", construct)
            }
            Self::NamingCollision {
                logical_id,
                existing,
                new,
            } => write!(f, "Resource {:?} collides with {:?}: both map to logical id {}", new, existing, logical_id),
            Self::NotFound(name) => write!(f, "Resource not found: {}", name),
            Self::StackSealed(stack) => write!(f, "Stack {} is sealed", stack),
            Self::StagingConflict(namespace) => {
                write!(f, "Staging directory {} is used by more than one construct", namespace)
            }
            Self::StagingIo {
                path,
                message,
                ..
            } => write!(f, "Failed to stage data in {}: {}", path.display(), message),
        }
    }
}

impl Error for CfnError {}
