use {
    super::{allow, policy_document},
    crate::{intrinsic, CfnError, Construct, PolicyDocument, Resource, ResourcePattern, Stack},
    derive_builder::Builder,
    serde_json::{json, Value},
    std::{
        collections::HashSet,
        fmt::{Display, Formatter, Result as FmtResult},
    },
};

/// Access log line format for the default stage.
pub const ACCESS_LOG_FORMAT: &str = concat!(
    r#"{"source_ip": "$context.identity.sourceIp", "#,
    r#""request_time": "$context.requestTime", "#,
    r#""method": "$context.httpMethod", "route": "$context.routeKey", "#,
    r#""protocol": "$context.protocol", "status": "$context.status", "#,
    r#""response_length": "$context.responseLength", "#,
    r#""request_id": "$context.requestId", "#,
    r#""integration_error_msg": "$context.integrationErrorMessage"}"#,
);

const STAGE_NAME: &str = "$default";

/// Methods accepted in a route key. No entry is a prefix of another.
const METHODS: &[&str] = &["ANY", "DELETE", "GET", "HEAD", "OPTIONS", "PATCH", "POST", "PUT"];

/// Marks an escaped byte in a route's resource stem.
const ESCAPE: char = 'Z';

/// A route served by an [HttpApi]: an HTTP method and a path.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Route {
    method: String,
    path: String,
}

impl Route {
    pub fn new<M: Into<String>, P: Into<String>>(method: M, path: P) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
        }
    }

    #[inline]
    pub fn method(&self) -> &str {
        &self.method
    }

    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// `GET /api1`.
    pub fn route_key(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    /// `GET/api1`, the form used in execute-api ARNs.
    fn route_arn(&self) -> String {
        format!("{}{}", self.method, self.path)
    }

    /// `GETapi1`, used to name the route's resources.
    ///
    /// The leading `/` is dropped. Every other byte that is not alphanumeric, and the escape letter itself, is written
    /// as `Z` plus two hex digits: `GET /a/b` becomes `GETaZ2Fb` while `GET /ab` stays `GETab`.
    fn resource_stem(&self) -> String {
        let mut stem = self.method.clone();
        for c in self.path.chars().skip(1) {
            if c.is_ascii_alphanumeric() && c != ESCAPE {
                stem.push(c);
            } else {
                let mut buf = [0; 4];
                for byte in c.encode_utf8(&mut buf).bytes() {
                    stem.push_str(&format!("{}{:02X}", ESCAPE, byte));
                }
            }
        }
        stem
    }

    fn check(&self) -> Result<(), String> {
        if !METHODS.contains(&self.method.as_str()) {
            return Err(format!("unsupported method in route {}", self));
        }

        if !self.path.starts_with('/') {
            return Err(format!("path must start with / in route {}", self));
        }

        Ok(())
    }
}

impl Display for Route {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{} {}", self.method, self.path)
    }
}

impl<M: Into<String>, P: Into<String>> From<(M, P)> for Route {
    fn from((method, path): (M, P)) -> Self {
        Self::new(method, path)
    }
}

/// An API Gateway HTTP API that proxies every route to one Lambda function.
///
/// Expands into the API, an access log group, the auto-deployed `$default` stage, a Lambda proxy integration, and for
/// each route a route plus the permission that lets API Gateway invoke the function for it.
#[derive(Builder, Clone, Debug, Eq, PartialEq)]
#[builder(build_fn(private, name = "build_fields"))]
pub struct HttpApi {
    #[builder(setter(into))]
    name: String,

    #[builder(setter(into, strip_option), default)]
    description: Option<String>,

    /// The function to integrate with: a name, an ARN, or an intrinsic resolving to one.
    #[builder(setter(into))]
    lambda_arn: Value,

    #[builder(setter(into), default)]
    route_list: Vec<Route>,

    #[builder(setter(skip))]
    cfn_policy: PolicyDocument,
}

impl HttpApiBuilder {
    pub fn build(&self) -> Result<HttpApi, HttpApiBuilderError> {
        let mut api = self.build_fields()?;
        api.cfn_policy = api.management_policy().map_err(|e| HttpApiBuilderError::ValidationError(e.to_string()))?;
        Ok(api)
    }
}

impl HttpApi {
    pub fn builder() -> HttpApiBuilder {
        HttpApiBuilder::default()
    }

    #[inline]
    pub fn routes(&self) -> &[Route] {
        &self.route_list
    }

    fn management_policy(&self) -> Result<PolicyDocument, CfnError> {
        let log_group = ResourcePattern::arn("aws", "logs", "*", "*", &format!("log-group:{}:*", self.name));
        let function = ResourcePattern::arn("aws", "lambda", "*", "*", "function:*");

        policy_document(vec![
            allow(
                &self.name,
                &["apigateway:DELETE", "apigateway:GET", "apigateway:PATCH", "apigateway:POST", "apigateway:PUT"],
                vec![
                    ResourcePattern::arn("aws", "apigateway", "*", "", "/apis"),
                    ResourcePattern::arn("aws", "apigateway", "*", "", "/apis/*"),
                ],
            ),
            allow(
                &self.name,
                &["logs:CreateLogGroup", "logs:DeleteLogGroup", "logs:DescribeLogGroups", "logs:PutRetentionPolicy"],
                vec![log_group],
            ),
            allow(&self.name, &["lambda:AddPermission", "lambda:RemovePermission"], vec![function]),
        ])
    }

    fn check_routes(&self) -> Result<(), CfnError> {
        if self.route_list.is_empty() {
            return Err(CfnError::expansion(&self.name, "an HTTP API needs at least one route"));
        }

        let mut seen = HashSet::with_capacity(self.route_list.len());
        for route in &self.route_list {
            route.check().map_err(|message| CfnError::expansion(&self.name, message))?;
            if !seen.insert(route.route_key()) {
                return Err(CfnError::expansion(&self.name, format!("duplicate route {}", route)));
            }
        }

        Ok(())
    }

    fn resource_name(&self, suffix: &str) -> String {
        format!("{}-{}", self.name, suffix)
    }

    fn route_resources(&self, route: &Route, api: &Value, integration: &Value) -> Result<Vec<Resource>, CfnError> {
        let stem = route.resource_stem();

        let route_resource = Resource::new(self.resource_name(&format!("{}-route", stem)), "AWS::ApiGatewayV2::Route")?
            .property("ApiId", api.clone())
            .property("AuthorizationType", "NONE")
            .property("RouteKey", route.route_key())
            .property("Target", intrinsic::sub_with("integrations/${integration}", [("integration", integration.clone())]));

        let permission =
            Resource::new(self.resource_name(&format!("{}-lambda-permission", stem)), "AWS::Lambda::Permission")?
                .property("Action", "lambda:InvokeFunction")
                .property("FunctionName", self.lambda_arn.clone())
                .property("Principal", "apigateway.amazonaws.com")
                .property(
                    "SourceArn",
                    intrinsic::sub_with(
                        "arn:aws:execute-api:${AWS::Region}:${AWS::AccountId}:${api}/$default/${route_arn}",
                        [("api", api.clone()), ("route_arn", Value::String(route.route_arn()))],
                    ),
                );

        Ok(vec![route_resource, permission])
    }
}

impl Construct for HttpApi {
    fn name(&self) -> &str {
        &self.name
    }

    fn resources(&self, _stack: &Stack) -> Result<Vec<Resource>, CfnError> {
        self.check_routes()?;

        let api = Resource::new(self.name.as_str(), "AWS::ApiGatewayV2::Api")?
            .property("Name", self.name.as_str())
            .property_opt("Description", self.description.as_deref())
            .property("ProtocolType", "HTTP");
        let api_ref = api.reference();

        let log_group = Resource::new(self.resource_name("log-group"), "AWS::Logs::LogGroup")?
            .property("LogGroupName", self.name.as_str());

        let stage = Resource::new(self.resource_name("default-stage"), "AWS::ApiGatewayV2::Stage")?
            .property(
                "AccessLogSettings",
                json!({"DestinationArn": log_group.get_att("Arn"), "Format": ACCESS_LOG_FORMAT}),
            )
            .property("ApiId", api_ref.clone())
            .property("AutoDeploy", "true")
            .property("Description", format!("stage {}", STAGE_NAME))
            .property(
                "DefaultRouteSettings",
                json!({"DetailedMetricsEnabled": "true", "ThrottlingBurstLimit": 10, "ThrottlingRateLimit": 10}),
            )
            .property("StageName", STAGE_NAME);

        let integration = Resource::new(self.resource_name("integration"), "AWS::ApiGatewayV2::Integration")?
            .property("ApiId", api_ref.clone())
            .property("IntegrationType", "AWS_PROXY")
            .property("IntegrationUri", self.lambda_arn.clone())
            .property("PayloadFormatVersion", "2.0");
        let integration_ref = integration.reference();

        let mut result = vec![api, log_group, stage, integration];
        for route in &self.route_list {
            result.extend(self.route_resources(route, &api_ref, &integration_ref)?);
        }

        Ok(result)
    }

    fn cfn_policy_document(&self, _stack: &Stack) -> PolicyDocument {
        self.cfn_policy.clone()
    }
}
