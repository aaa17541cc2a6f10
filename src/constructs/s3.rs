use {
    super::{allow, policy_document, policy_value},
    crate::{
        name_to_id, Action, CfnError, Condition, Construct, Effect, PolicyDocument, Principal, Resource,
        ResourcePattern, Stack, Statement,
    },
    derive_builder::Builder,
    serde_json::json,
    std::str::FromStr,
};

/// A private, versioned S3 bucket with default encryption and a bucket policy that refuses plaintext transport and
/// unencrypted uploads.
///
/// Expands into the bucket (named after the construct) and a `<name>-policy` bucket policy.
#[derive(Builder, Clone, Debug, Eq, PartialEq)]
#[builder(build_fn(private, name = "build_fields", validate = "Self::validate"))]
pub struct Bucket {
    #[builder(setter(into))]
    name: String,

    /// Statements appended to the bucket policy after the built-in denials.
    #[builder(setter(into), default)]
    policy_statements: Vec<Statement>,

    #[builder(setter(skip))]
    cfn_policy: PolicyDocument,
}

impl BucketBuilder {
    pub fn build(&self) -> Result<Bucket, BucketBuilderError> {
        let mut bucket = self.build_fields()?;
        bucket.cfn_policy =
            bucket.management_policy().map_err(|e| BucketBuilderError::ValidationError(e.to_string()))?;
        Ok(bucket)
    }

    fn validate(&self) -> Result<(), BucketBuilderError> {
        match &self.name {
            Some(name) if !is_valid_bucket_name(name) => {
                Err(BucketBuilderError::ValidationError(format!("Invalid bucket name: {}", name)))
            }
            _ => Ok(()),
        }
    }
}

fn is_valid_bucket_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    (3..=63).contains(&bytes.len())
        && bytes.iter().all(|&c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == b'-' || c == b'.')
        && bytes[0].is_ascii_alphanumeric()
        && bytes[bytes.len() - 1].is_ascii_alphanumeric()
}

impl Bucket {
    pub fn builder() -> BucketBuilder {
        BucketBuilder::default()
    }

    #[inline]
    pub fn bucket_name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn policy_statements(&self) -> &[Statement] {
        &self.policy_statements
    }

    /// `arn:aws:s3:::<name>`.
    pub fn arn(&self) -> ResourcePattern {
        ResourcePattern::arn("aws", "s3", "", "", &self.name)
    }

    /// `arn:aws:s3:::<name>/*`.
    pub fn objects_arn(&self) -> ResourcePattern {
        ResourcePattern::arn("aws", "s3", "", "", &format!("{}/*", self.name))
    }

    fn deny_statement(&self, action: &str, condition: Condition) -> Result<Statement, CfnError> {
        Statement::builder()
            .effect(Effect::Deny)
            .principal(Principal::any_aws())
            .action(Action::from_str(action)?)
            .resource(self.objects_arn())
            .condition(condition)
            .build()
            .map_err(|e| CfnError::expansion(&self.name, e.to_string()))
    }

    /// The permissions CloudFormation needs to manage this bucket.
    #[inline]
    pub fn cfn_policy(&self) -> &PolicyDocument {
        &self.cfn_policy
    }

    fn management_policy(&self) -> Result<PolicyDocument, CfnError> {
        policy_document(vec![allow(
            &self.name,
            &[
                "s3:CreateBucket",
                "s3:DeleteBucket",
                "s3:DeleteBucketPolicy",
                "s3:PutBucketAcl",
                "s3:PutBucketPolicy",
                "s3:PutBucketPublicAccessBlock",
                "s3:PutBucketVersioning",
                "s3:PutEncryptionConfiguration",
            ],
            vec![self.arn()],
        )])
    }

    /// The bucket policy: deny non-TLS access, deny uploads not encrypted with AES256, then any extra statements.
    pub fn bucket_policy(&self) -> Result<PolicyDocument, CfnError> {
        let mut document = PolicyDocument::new();
        document.push(self.deny_statement("s3:*", Condition::new().with("Bool", "aws:SecureTransport", "false")?)?);
        document.push(self.deny_statement(
            "s3:PutObject",
            Condition::new().with("StringNotEquals", "s3:x-amz-server-side-encryption", "AES256")?,
        )?);
        document.push(
            self.deny_statement("s3:PutObject", Condition::new().with("Null", "s3:x-amz-server-side-encryption", "true")?)?,
        );
        document.extend(self.policy_statements.iter().cloned());
        Ok(document)
    }
}

impl Construct for Bucket {
    fn name(&self) -> &str {
        &self.name
    }

    fn resources(&self, _stack: &Stack) -> Result<Vec<Resource>, CfnError> {
        let bucket = Resource::new(self.name.as_str(), "AWS::S3::Bucket")?
            .property("BucketName", self.name.as_str())
            .property("AccessControl", "Private")
            .property(
                "BucketEncryption",
                json!({
                    "ServerSideEncryptionConfiguration": [
                        {"ServerSideEncryptionByDefault": {"SSEAlgorithm": "AES256"}}
                    ]
                }),
            )
            .property(
                "PublicAccessBlockConfiguration",
                json!({
                    "BlockPublicAcls": "true",
                    "BlockPublicPolicy": "true",
                    "IgnorePublicAcls": "true",
                    "RestrictPublicBuckets": "true"
                }),
            )
            .property("VersioningConfiguration", json!({"Status": "Enabled"}));

        let policy = Resource::new(format!("{}-policy", self.name), "AWS::S3::BucketPolicy")?
            .property("Bucket", self.name.as_str())
            .property("PolicyDocument", policy_value(&self.name, &self.bucket_policy()?)?)
            .depends_on(name_to_id(&self.name)?);

        Ok(vec![bucket, policy])
    }

    fn cfn_policy_document(&self, _stack: &Stack) -> PolicyDocument {
        self.cfn_policy.clone()
    }
}
