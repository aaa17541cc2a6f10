use {
    super::{allow, policy_document, s3::Bucket},
    crate::{
        intrinsic, name_to_id, Action, CfnError, Condition, Construct, Effect, PolicyDocument, Principal, Resource,
        ResourcePattern, Stack, Statement,
    },
    derive_builder::Builder,
    serde_json::{json, Value},
    std::str::FromStr,
};

const CONFIG_SERVICE: &str = "config.amazonaws.com";
const SERVICE_LINKED_ROLE: &str = "AWSServiceRoleForConfig";
const RECORDER: &str = "ConfigRecorder";
const DELIVERY_CHANNEL: &str = "DeliveryChannel";

/// Turns on AWS Config for every supported resource type and delivers snapshots to a dedicated secure bucket.
///
/// Expands into the Config service-linked role, the recorder, the bucket and its policy (see [Bucket]) with grants
/// for the Config service, and the delivery channel.
#[derive(Builder, Clone, Debug, Eq, PartialEq)]
#[builder(build_fn(private, name = "build_fields"))]
pub struct ConfigurationRecorder {
    #[builder(setter(into))]
    bucket_name: String,

    #[builder(setter(skip))]
    cfn_policy: PolicyDocument,
}

impl ConfigurationRecorderBuilder {
    pub fn build(&self) -> Result<ConfigurationRecorder, ConfigurationRecorderBuilderError> {
        let mut recorder = self.build_fields()?;
        recorder.cfn_policy = recorder
            .management_policy()
            .map_err(|e| ConfigurationRecorderBuilderError::ValidationError(e.to_string()))?;
        Ok(recorder)
    }
}

impl ConfigurationRecorder {
    pub fn builder() -> ConfigurationRecorderBuilder {
        ConfigurationRecorderBuilder::default()
    }

    #[inline]
    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    fn config_statement(&self, action: &str, resource: ResourcePattern) -> Result<Statement, CfnError> {
        let mut builder = Statement::builder();
        builder
            .effect(Effect::Allow)
            .principal(Principal::service(CONFIG_SERVICE))
            .action(Action::from_str(action)?)
            .resource(resource);
        if action == "s3:PutObject" {
            builder.condition(Condition::new().with("StringEquals", "s3:x-amz-acl", "bucket-owner-full-control")?);
        }
        builder.build().map_err(|e| CfnError::expansion(RECORDER, e.to_string()))
    }

    fn bucket(&self) -> Result<Bucket, CfnError> {
        let delivery_prefix = intrinsic::join(
            "",
            [
                json!("arn:aws:s3:::"),
                Value::String(self.bucket_name.clone()),
                json!("/AWSLogs/"),
                intrinsic::reference(intrinsic::ACCOUNT_ID),
                json!("/Config/*"),
            ],
        );

        let statements = vec![
            self.config_statement("s3:GetBucketAcl", ResourcePattern::arn("aws", "s3", "", "", &self.bucket_name))?,
            self.config_statement("s3:PutObject", ResourcePattern::intrinsic(delivery_prefix)?)?,
        ];

        Bucket::builder()
            .name(self.bucket_name.as_str())
            .policy_statements(statements)
            .build()
            .map_err(|e| CfnError::expansion(RECORDER, e.to_string()))
    }

    fn management_policy(&self) -> Result<PolicyDocument, CfnError> {
        let recorder = policy_document(vec![
            allow(
                RECORDER,
                &[
                    "config:DeleteConfigurationRecorder",
                    "config:DeleteDeliveryChannel",
                    "config:DescribeConfigurationRecorders",
                    "config:DescribeDeliveryChannels",
                    "config:PutConfigurationRecorder",
                    "config:PutDeliveryChannel",
                ],
                vec![ResourcePattern::Any],
            ),
            allow(
                RECORDER,
                &["iam:CreateServiceLinkedRole", "iam:DeleteServiceLinkedRole", "iam:GetRole"],
                vec![ResourcePattern::arn(
                    "aws",
                    "iam",
                    "",
                    "*",
                    &format!("role/aws-service-role/{}/{}", CONFIG_SERVICE, SERVICE_LINKED_ROLE),
                )],
            ),
        ])?;

        Ok(recorder + self.bucket()?.cfn_policy().clone())
    }

    fn role_arn() -> Value {
        intrinsic::join(
            ":",
            [
                json!("arn"),
                json!("aws"),
                json!("iam:"),
                intrinsic::reference(intrinsic::ACCOUNT_ID),
                json!(format!("role/aws-service-role/{}/{}", CONFIG_SERVICE, SERVICE_LINKED_ROLE)),
            ],
        )
    }
}

impl Construct for ConfigurationRecorder {
    fn name(&self) -> &str {
        RECORDER
    }

    fn resources(&self, stack: &Stack) -> Result<Vec<Resource>, CfnError> {
        let role = Resource::new(SERVICE_LINKED_ROLE, "AWS::IAM::ServiceLinkedRole")?
            .property("AWSServiceName", CONFIG_SERVICE);

        let recorder = Resource::new(RECORDER, "AWS::Config::ConfigurationRecorder")?
            .property("Name", RECORDER)
            .property("RecordingGroup", json!({"AllSupported": "true", "IncludeGlobalResourceTypes": "true"}))
            .property("RoleARN", Self::role_arn())
            .depends_on(role.logical_id());

        let bucket = self.bucket()?;
        let bucket_resources = bucket.resources(stack)?;

        let delivery_channel = Resource::new(DELIVERY_CHANNEL, "AWS::Config::DeliveryChannel")?
            .property("Name", DELIVERY_CHANNEL)
            .property("S3BucketName", self.bucket_name.as_str())
            .depends_on(vec![name_to_id(&self.bucket_name)?]);

        let mut result = vec![role, recorder];
        result.extend(bucket_resources);
        result.push(delivery_channel);
        Ok(result)
    }

    fn cfn_policy_document(&self, _stack: &Stack) -> PolicyDocument {
        self.cfn_policy.clone()
    }
}

/// An AWS-managed Config rule.
///
/// Rules depend on the recorder created by [ConfigurationRecorder] and must be added after it.
#[derive(Builder, Clone, Debug, Eq, PartialEq)]
pub struct ConfigRule {
    /// The rule name, e.g. `s3-bucket-ssl-requests-only`. Also names the resource.
    #[builder(setter(into))]
    name: String,

    #[builder(setter(into))]
    description: String,

    /// The managed rule identifier, e.g. `S3_BUCKET_SSL_REQUESTS_ONLY`.
    #[builder(setter(into))]
    source_identifier: String,

    #[builder(setter(into))]
    compliance_resource_types: Vec<String>,

    #[builder(setter(into), default = "json!({})")]
    input_parameters: Value,
}

impl ConfigRule {
    pub fn builder() -> ConfigRuleBuilder {
        ConfigRuleBuilder::default()
    }

    fn managed(name: &str, description: &str, source_identifier: &str, resource_type: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            source_identifier: source_identifier.to_string(),
            compliance_resource_types: vec![resource_type.to_string()],
            input_parameters: json!({}),
        }
    }

    pub fn s3_bucket_public_write_prohibited() -> Self {
        Self::managed(
            "s3-bucket-public-write-prohibited",
            "Checks that your S3 buckets do not allow public write access. If an S3 bucket policy or bucket ACL \
             allows public write access, the bucket is noncompliant.",
            "S3_BUCKET_PUBLIC_WRITE_PROHIBITED",
            "AWS::S3::Bucket",
        )
    }

    pub fn s3_bucket_public_read_prohibited() -> Self {
        Self::managed(
            "s3-bucket-public-read-prohibited",
            "Checks that your S3 buckets do not allow public read access. If an S3 bucket policy or bucket ACL \
             allows public read access, the bucket is noncompliant.",
            "S3_BUCKET_PUBLIC_READ_PROHIBITED",
            "AWS::S3::Bucket",
        )
    }

    pub fn s3_bucket_server_side_encryption_enabled() -> Self {
        Self::managed(
            "s3-bucket-server-side-encryption-enabled",
            "Checks that your Amazon S3 bucket either has S3 default encryption enabled or that the S3 bucket \
             policy explicitly denies put-object requests without server side encryption.",
            "S3_BUCKET_SERVER_SIDE_ENCRYPTION_ENABLED",
            "AWS::S3::Bucket",
        )
    }

    pub fn s3_bucket_ssl_requests_only() -> Self {
        Self::managed(
            "s3-bucket-ssl-requests-only",
            "Checks whether S3 buckets have policies that require requests to use Secure Socket Layer (SSL).",
            "S3_BUCKET_SSL_REQUESTS_ONLY",
            "AWS::S3::Bucket",
        )
    }

    pub fn iam_user_no_policies_check() -> Self {
        Self::managed(
            "iam-user-no-policies-check",
            "Checks that none of your IAM users have policies attached. IAM users must inherit permissions from \
             IAM groups or roles.",
            "IAM_USER_NO_POLICIES_CHECK",
            "AWS::IAM::User",
        )
    }

    #[inline]
    pub fn source_identifier(&self) -> &str {
        &self.source_identifier
    }
}

impl Construct for ConfigRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn resources(&self, _stack: &Stack) -> Result<Vec<Resource>, CfnError> {
        let rule = Resource::new(self.name.as_str(), "AWS::Config::ConfigRule")?
            .property("ConfigRuleName", self.name.as_str())
            .property("Description", self.description.as_str())
            .property("InputParameters", self.input_parameters.clone())
            .property("Scope", json!({"ComplianceResourceTypes": self.compliance_resource_types}))
            .property("Source", json!({"Owner": "AWS", "SourceIdentifier": self.source_identifier}))
            .depends_on(RECORDER);
        Ok(vec![rule])
    }
}
