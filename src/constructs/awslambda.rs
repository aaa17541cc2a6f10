use {
    super::{allow, policy_document},
    crate::{intrinsic, name_to_id, CfnError, Construct, DataDir, PolicyDocument, Resource, ResourcePattern, Stack},
    derive_builder::Builder,
    lazy_static::lazy_static,
    log::debug,
    regex::Regex,
    serde_json::{json, Value},
    std::{path::PathBuf, str::FromStr},
};

lazy_static! {
    static ref FUNCTION_NAME: Regex = Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,63}$").unwrap();
    static ref ROLE_ARN: Regex = Regex::new(r"^arn:[a-z][a-z0-9-]*:iam::\d{12}:role/.+$").unwrap();
}

pub const DEFAULT_RUNTIME: &str = "python3.8";

/// Name of the code archive within the function's staging namespace.
pub const PACKAGE_ARCHIVE: &str = "lambda.zip";

/// A Lambda function whose code is staged from a local directory.
///
/// [Construct::create_data_dir] zips `code_dir` into `<Namespace>/lambda.zip`, the file [Stack::s3_data_key] names
/// and the function's `Code` points at.
#[derive(Builder, Clone, Debug, Eq, PartialEq)]
#[builder(build_fn(private, name = "build_fields", validate = "Self::validate"))]
pub struct Function {
    #[builder(setter(into))]
    name: String,

    #[builder(setter(into, strip_option), default)]
    description: Option<String>,

    /// The execution role: an IAM role ARN, or an intrinsic resolving to one such as
    /// `{"Fn::GetAtt": ["LambdaRole", "Arn"]}`.
    #[builder(setter(into))]
    role: Value,

    #[builder(setter(into))]
    code_dir: PathBuf,

    #[builder(setter(into))]
    handler: String,

    #[builder(setter(into), default = "DEFAULT_RUNTIME.to_string()")]
    runtime: String,

    /// Seconds.
    #[builder(default = "3")]
    timeout: u32,

    /// Megabytes.
    #[builder(setter(strip_option), default)]
    memory_size: Option<u32>,

    #[builder(setter(skip))]
    cfn_policy: PolicyDocument,
}

impl FunctionBuilder {
    pub fn build(&self) -> Result<Function, FunctionBuilderError> {
        let mut function = self.build_fields()?;
        function.cfn_policy =
            function.management_policy().map_err(|e| FunctionBuilderError::ValidationError(e.to_string()))?;
        Ok(function)
    }

    fn validate(&self) -> Result<(), FunctionBuilderError> {
        let mut errors = Vec::with_capacity(3);
        if let Some(name) = &self.name {
            if !FUNCTION_NAME.is_match(name) {
                errors.push(format!("Invalid function name: {}.", name));
            }
        }

        if let Some(role) = &self.role {
            if role_pattern(role).is_err() {
                match role {
                    Value::String(arn) => errors.push(format!("Invalid role ARN: {}.", arn)),
                    _ => errors.push(format!("Invalid role: {}.", role)),
                }
            }
        }

        if let Some(timeout) = self.timeout {
            if !(1..=900).contains(&timeout) {
                errors.push(format!("Timeout must be between 1 and 900 seconds, got {}.", timeout));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(FunctionBuilderError::ValidationError(errors.join(" ")))
        }
    }
}

/// The role as a policy resource: a literal role ARN, or an intrinsic.
fn role_pattern(role: &Value) -> Result<ResourcePattern, CfnError> {
    match role {
        Value::String(arn) if ROLE_ARN.is_match(arn) => ResourcePattern::from_str(arn),
        Value::Object(_) => ResourcePattern::intrinsic(role.clone()),
        _ => Err(CfnError::InvalidResource(role.to_string())),
    }
}

impl Function {
    pub fn builder() -> FunctionBuilder {
        FunctionBuilder::default()
    }

    #[inline]
    pub fn role(&self) -> &Value {
        &self.role
    }

    #[inline]
    pub fn runtime(&self) -> &str {
        &self.runtime
    }

    #[inline]
    pub fn code_dir(&self) -> &PathBuf {
        &self.code_dir
    }

    pub fn logical_id(&self) -> Result<String, CfnError> {
        name_to_id(&self.name)
    }

    /// `{"Ref": <logical id>}`, which resolves to the function name.
    pub fn reference(&self) -> Result<Value, CfnError> {
        Ok(intrinsic::reference(&self.logical_id()?))
    }

    /// `{"Fn::GetAtt": [<logical id>, "Arn"]}`.
    pub fn arn(&self) -> Result<Value, CfnError> {
        Ok(intrinsic::get_att(&self.logical_id()?, "Arn"))
    }

    fn management_policy(&self) -> Result<PolicyDocument, CfnError> {
        let function_arn = ResourcePattern::arn("aws", "lambda", "*", "*", &format!("function:{}", self.name));
        policy_document(vec![
            allow(
                &self.name,
                &[
                    "lambda:CreateFunction",
                    "lambda:DeleteFunction",
                    "lambda:GetFunction",
                    "lambda:GetFunctionConfiguration",
                    "lambda:UpdateFunctionCode",
                    "lambda:UpdateFunctionConfiguration",
                ],
                vec![function_arn],
            ),
            role_pattern(&self.role).and_then(|role| allow(&self.name, &["iam:PassRole"], vec![role])),
        ])
    }
}

impl Construct for Function {
    fn name(&self) -> &str {
        &self.name
    }

    fn resources(&self, stack: &Stack) -> Result<Vec<Resource>, CfnError> {
        let s3_key = stack.s3_data_key(&self.name, PACKAGE_ARCHIVE)?;
        let s3_bucket = stack.s3_bucket().ok_or_else(|| CfnError::MissingS3Bucket(self.name.clone()))?;

        let function = Resource::new(self.name.as_str(), "AWS::Lambda::Function")?
            .property("FunctionName", self.name.as_str())
            .property_opt("Description", self.description.as_deref())
            .property("Role", self.role.clone())
            .property("Runtime", self.runtime.as_str())
            .property("Handler", self.handler.as_str())
            .property("Timeout", self.timeout)
            .property_opt("MemorySize", self.memory_size)
            .property("Code", json!({"S3Bucket": s3_bucket, "S3Key": s3_key}));

        Ok(vec![function])
    }

    fn cfn_policy_document(&self, _stack: &Stack) -> PolicyDocument {
        self.cfn_policy.clone()
    }

    fn create_data_dir(&self, data_dir: &DataDir) -> Result<(), CfnError> {
        let archive = data_dir.archive_dir(&self.code_dir, PACKAGE_ARCHIVE)?;
        debug!("Packaged {} into {}", self.code_dir.display(), archive.display());
        Ok(())
    }
}
