use {
    crate::{
        constructs::{
            apigateway::{HttpApi, Route},
            awslambda::Function,
            config::ConfigRule,
        },
        Action, CfnError, CollisionPolicy, Construct, DataDir, Effect, PolicyDocument, Resource, ResourcePattern,
        Stack, StackConfig, StackItem, Statement,
    },
    indoc::indoc,
    pretty_assertions::assert_eq,
    serde_json::json,
    std::{fs, str::FromStr, sync::Arc},
};

/// A queue whose name is prefixed with the name of the stack expanding it.
#[derive(Debug)]
struct StackQueue {
    name: String,
}

impl Construct for StackQueue {
    fn name(&self) -> &str {
        &self.name
    }

    fn resources(&self, stack: &Stack) -> Result<Vec<Resource>, CfnError> {
        Ok(vec![Resource::new(self.name.as_str(), "AWS::SQS::Queue")?
            .property("QueueName", format!("{}-{}", stack.name(), self.name))])
    }

    fn cfn_policy_document(&self, _stack: &Stack) -> PolicyDocument {
        PolicyDocument::from_statements(vec![
            allow("sqs:CreateQueue", &format!("arn:aws:sqs:*:*:{}", self.name)),
            allow("sqs:DeleteQueue", &format!("arn:aws:sqs:*:*:{}", self.name)),
        ])
    }
}

/// Stages a single file named after itself.
#[derive(Debug)]
struct Notes {
    name: String,
}

impl Construct for Notes {
    fn name(&self) -> &str {
        &self.name
    }

    fn resources(&self, _stack: &Stack) -> Result<Vec<Resource>, CfnError> {
        Ok(vec![])
    }

    fn create_data_dir(&self, data_dir: &DataDir) -> Result<(), CfnError> {
        data_dir.write_file("notes.txt", &self.name)?;
        Ok(())
    }
}

fn allow(action: &str, resource: &str) -> Statement {
    Statement::builder()
        .effect(Effect::Allow)
        .action(Action::from_str(action).unwrap())
        .resource(ResourcePattern::from_str(resource).unwrap())
        .build()
        .unwrap()
}

fn queue(name: &str) -> Arc<dyn Construct> {
    Arc::new(StackQueue {
        name: name.to_string(),
    })
}

fn resource_keys(stack: &Stack) -> Vec<String> {
    stack.export()["Resources"].as_object().unwrap().keys().cloned().collect()
}

#[test_log::test]
fn test_new_stack() {
    let stack = Stack::new("my-stack").unwrap();
    assert_eq!(stack.name(), "my-stack");
    assert!(stack.is_empty());
    assert!(!stack.is_sealed());
    assert_eq!(stack.description(), None);
    assert_eq!(stack.s3_key(), "");
    assert_eq!(stack.on_collision(), CollisionPolicy::Reject);
    assert_eq!(
        stack.export_json(),
        indoc! { r#"
        {
          "AWSTemplateFormatVersion": "2010-09-09",
          "Resources": {}
        }"# }
    );

    assert_eq!(Stack::new("my_stack").unwrap_err(), CfnError::InvalidStackName("my_stack".to_string()));
    let e = Stack::builder().name("9lives").build().unwrap_err();
    assert_eq!(e.to_string(), r#"Invalid stack name: "9lives""#);
    assert!(Stack::builder().build().is_err());
}

#[test_log::test]
fn test_scenario_bucket_and_queue() {
    let mut stack = Stack::builder().name("scenario-a").description("bucket and queue").build().unwrap();
    let bucket = Resource::new("my-bucket", "AWS::S3::Bucket").unwrap().property("BucketName", "my-bucket");
    let queue = Resource::new("my-queue", "AWS::SQS::Queue").unwrap().property("VisibilityTimeout", 60);

    stack.add(bucket).unwrap();
    stack.add(queue).unwrap();

    assert_eq!(
        stack.export(),
        json!({
            "AWSTemplateFormatVersion": "2010-09-09",
            "Description": "bucket and queue",
            "Resources": {
                "MyBucket": {"Type": "AWS::S3::Bucket", "Properties": {"BucketName": "my-bucket"}},
                "MyQueue": {"Type": "AWS::SQS::Queue", "Properties": {"VisibilityTimeout": 60}}
            }
        })
    );
    assert_eq!(resource_keys(&stack), vec!["MyBucket", "MyQueue"]);
    assert_eq!(stack.constructs().len(), 2);
}

#[test_log::test]
fn test_scenario_http_api() {
    let mut stack = Stack::builder().name("scenario-b").s3_bucket("cfn_bucket").s3_key("templates/").build().unwrap();
    let function = Function::builder()
        .name("mypylambda")
        .role("arn:aws:iam::123456789012:role/somerole")
        .code_dir("my_code_dir")
        .handler("app.main")
        .build()
        .unwrap();
    let lambda_ref = function.reference().unwrap();
    stack.add_construct(function).unwrap();

    let api = HttpApi::builder()
        .name("testapi")
        .lambda_arn(lambda_ref)
        .route_list(vec![Route::new("GET", "/api1"), Route::new("POST", "/api2")])
        .build()
        .unwrap();
    let before = stack.len();
    stack.add_construct(api).unwrap();

    assert_eq!(stack.len() - before, 8);
    let permissions: Vec<_> = stack
        .template()
        .iter()
        .filter(|r| r.resource_type() == "AWS::Lambda::Permission")
        .map(|r| r.logical_id().to_string())
        .collect();
    assert_eq!(permissions, vec!["TestapiGETapi1LambdaPermission", "TestapiPOSTapi2LambdaPermission"]);
    assert_eq!(stack["TestapiIntegration"].get_property("IntegrationUri"), Some(&json!({"Ref": "Mypylambda"})));
}

#[test_log::test]
fn test_provenance_and_expansion() {
    let mut child = Stack::new("child").unwrap();
    let c = queue("jobs");
    child.add(c.clone()).unwrap();
    child.add(Resource::new("raw-topic", "AWS::SNS::Topic").unwrap()).unwrap();
    assert_eq!(child["jobs"].get_property("QueueName"), Some(&json!("child-jobs")));

    let mut parent = Stack::new("parent").unwrap();
    parent.add(&child).unwrap();

    // The parent records the construct itself, not its expansion.
    assert_eq!(parent.constructs().len(), 2);
    match &parent.constructs()[0] {
        StackItem::Construct(recorded) => assert!(Arc::ptr_eq(recorded, &c)),
        other => panic!("Unexpected item: {:?}", other),
    }
    match &parent.constructs()[1] {
        StackItem::Resource(r) => assert_eq!(r.logical_id(), "RawTopic"),
        other => panic!("Unexpected item: {:?}", other),
    }

    // ...and expands it in its own context.
    assert_eq!(parent["jobs"].get_property("QueueName"), Some(&json!("parent-jobs")));
    assert_eq!(resource_keys(&parent), vec!["Jobs", "RawTopic"]);

    // The child is unaffected.
    assert_eq!(child["jobs"].get_property("QueueName"), Some(&json!("child-jobs")));
    assert_eq!(parent.cfn_policy_document(), child.cfn_policy_document());
}

#[test_log::test]
fn test_idempotent_reads() {
    let mut stack = Stack::new("idem").unwrap();
    stack.add(queue("a")).unwrap().add(queue("b")).unwrap();

    assert_eq!(stack.export(), stack.export());
    assert_eq!(stack.export_json(), stack.export_json());
    assert_eq!(stack.cfn_policy_document(), stack.cfn_policy_document());
    assert_eq!(stack.export_yaml().unwrap(), stack.export_yaml().unwrap());
}

#[test_log::test]
fn test_insertion_order_is_deterministic() {
    fn build() -> Stack {
        let mut stack = Stack::new("order").unwrap();
        for name in ["zebra", "apple", "mango", "kiwi"] {
            stack.add(queue(name)).unwrap();
        }
        stack.add(Resource::new("banana", "AWS::SNS::Topic").unwrap()).unwrap();
        stack
    }

    let first = build();
    let second = build();
    assert_eq!(resource_keys(&first), vec!["Zebra", "Apple", "Mango", "Kiwi", "Banana"]);
    assert_eq!(resource_keys(&first), resource_keys(&second));
    assert_eq!(first.export_json(), second.export_json());
}

#[test_log::test]
fn test_collision_rejected() {
    let mut stack = Stack::new("collide").unwrap();
    stack.add(Resource::new("my-bucket", "AWS::S3::Bucket").unwrap()).unwrap();

    let e = stack.add(Resource::new("my_bucket", "AWS::S3::Bucket").unwrap()).unwrap_err();
    assert_eq!(
        e,
        CfnError::NamingCollision {
            logical_id: "MyBucket".to_string(),
            existing: "my-bucket".to_string(),
            new: "my_bucket".to_string(),
        }
    );
    assert_eq!(stack.len(), 1);
    assert_eq!(stack["MyBucket"].name(), "my-bucket");
}

#[test_log::test]
fn test_collision_overwrite() {
    let mut stack = Stack::builder().name("collide").on_collision(CollisionPolicy::Overwrite).build().unwrap();
    stack
        .add(Resource::new("my-bucket", "AWS::S3::Bucket").unwrap().property("BucketName", "first"))
        .unwrap()
        .add(Resource::new("other", "AWS::SNS::Topic").unwrap())
        .unwrap()
        .add(Resource::new("my_bucket", "AWS::S3::Bucket").unwrap().property("BucketName", "second"))
        .unwrap();

    assert_eq!(resource_keys(&stack), vec!["MyBucket", "Other"]);
    assert_eq!(stack["my-bucket"].get_property("BucketName"), Some(&json!("second")));
    assert_eq!(stack.constructs().len(), 3);
}

#[test_log::test]
fn test_no_rollback() {
    #[derive(Debug)]
    struct Pair;

    impl Construct for Pair {
        fn name(&self) -> &str {
            "pair"
        }

        fn resources(&self, _stack: &Stack) -> Result<Vec<Resource>, CfnError> {
            Ok(vec![
                Resource::new("fresh", "AWS::SNS::Topic")?,
                Resource::new("taken", "AWS::SNS::Topic")?,
                Resource::new("never", "AWS::SNS::Topic")?,
            ])
        }
    }

    let mut stack = Stack::new("partial").unwrap();
    stack.add(Resource::new("taken", "AWS::SQS::Queue").unwrap()).unwrap();
    let e = stack.add_construct(Pair).unwrap_err();
    assert!(matches!(e, CfnError::NamingCollision { .. }));

    // Resources inserted before the failure stay; the construct is still logged.
    assert_eq!(resource_keys(&stack), vec!["Taken", "Fresh"]);
    assert_eq!(stack.constructs().len(), 2);
    assert!(!stack.contains("never"));
}

#[test_log::test]
fn test_sealed() {
    let mut stack = Stack::new("sealed").unwrap();
    stack.add(queue("a")).unwrap();
    stack.seal();
    assert!(stack.is_sealed());

    let e = stack.add(queue("b")).unwrap_err();
    assert_eq!(e, CfnError::StackSealed("sealed".to_string()));
    assert_eq!(e.to_string(), "Stack sealed is sealed");
    assert_eq!(stack.len(), 1);
    assert_eq!(stack.constructs().len(), 1);

    // Reads still work, and a sealed stack can be merged into an open one.
    assert_eq!(resource_keys(&stack), vec!["A"]);
    let mut parent = Stack::new("parent").unwrap();
    parent.add(&stack).unwrap();
    assert_eq!(parent.len(), 1);
}

#[test_log::test]
fn test_policy_order() {
    let mut stack = Stack::new("policy").unwrap();
    stack.add(queue("jobs")).unwrap();
    stack.add_construct(ConfigRule::s3_bucket_ssl_requests_only()).unwrap();
    stack.add(Resource::new("raw", "AWS::SNS::Topic").unwrap()).unwrap();

    let doc = stack.cfn_policy_document();
    assert_eq!(doc.len(), 2);
    assert_eq!(doc[0].action().unwrap()[0].to_string(), "sqs:CreateQueue");
    assert_eq!(doc[1].action().unwrap()[0].to_string(), "sqs:DeleteQueue");

    let mut reversed = Stack::new("reversed").unwrap();
    reversed.add(queue("zzz")).unwrap().add(queue("jobs")).unwrap();
    let doc = reversed.cfn_policy_document();
    assert_eq!(doc.len(), 4);
    assert_eq!(doc[0].resource().unwrap()[0].to_string(), "arn:aws:sqs:*:*:zzz");
    assert_eq!(doc[2].resource().unwrap()[0].to_string(), "arn:aws:sqs:*:*:jobs");
}

#[test_log::test]
fn test_lookup() {
    let mut stack = Stack::new("lookup").unwrap();
    stack.add(queue("work-queue")).unwrap();

    assert_eq!(stack.lookup("work-queue").unwrap().logical_id(), "WorkQueue");
    assert_eq!(stack.lookup("WorkQueue").unwrap().name(), "work-queue");
    assert_eq!(stack.lookup("missing").unwrap_err(), CfnError::NotFound("missing".to_string()));
    assert_eq!(stack.lookup("--").unwrap_err(), CfnError::InvalidResourceName("--".to_string()));
    assert!(stack.get("missing").is_none());
    assert!(stack.contains("work_queue"));
}

#[test]
#[should_panic(expected = "Resource not found: missing")]
fn test_index_missing() {
    let stack = Stack::new("lookup").unwrap();
    let _ = &stack["missing"];
}

#[test_log::test]
fn test_export_yaml() {
    let mut stack = Stack::new("yaml").unwrap();
    stack.add(Resource::new("topic", "AWS::SNS::Topic").unwrap().property("TopicName", "alerts")).unwrap();

    let yaml = stack.export_yaml().unwrap();
    assert!(yaml.contains("Type: AWS::SNS::Topic\n"));
    assert!(yaml.contains("TopicName: alerts\n"));

    let parsed: serde_json::Value = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(parsed, stack.export());
}

#[test_log::test]
fn test_staging() {
    let mut stack = Stack::new("staging").unwrap();
    stack.add(queue("no-data")).unwrap();
    stack.add_construct(Notes {
        name: "first".to_string(),
    })
    .unwrap();
    stack.add_construct(Notes {
        name: "second".to_string(),
    })
    .unwrap();

    let root = tempfile::tempdir().unwrap();
    stack.create_data_dir(root.path()).unwrap();
    assert_eq!(fs::read_to_string(root.path().join("First/notes.txt")).unwrap(), "first");
    assert_eq!(fs::read_to_string(root.path().join("Second/notes.txt")).unwrap(), "second");
    assert!(!root.path().join("NoData").exists());
}

#[test_log::test]
fn test_staging_conflict() {
    let mut stack = Stack::new("staging").unwrap();
    stack.add_construct(Notes {
        name: "shared-notes".to_string(),
    })
    .unwrap();
    stack.add_construct(Notes {
        name: "shared_notes".to_string(),
    })
    .unwrap();

    let root = tempfile::tempdir().unwrap();
    let e = stack.create_data_dir(root.path()).unwrap_err();
    assert_eq!(e, CfnError::StagingConflict("SharedNotes".to_string()));
    assert_eq!(fs::read_to_string(root.path().join("SharedNotes/notes.txt")).unwrap(), "shared-notes");
}

#[test_log::test]
fn test_staging_repeated_construct() {
    let notes: Arc<dyn Construct> = Arc::new(Notes {
        name: "shared-notes".to_string(),
    });
    let mut child = Stack::new("child").unwrap();
    child.add(queue("jobs")).unwrap();
    child.add(notes.clone()).unwrap();

    let mut parent = Stack::builder().name("parent").on_collision(CollisionPolicy::Overwrite).build().unwrap();
    parent.add(&child).unwrap();
    parent.add(&child).unwrap();
    parent.add(notes).unwrap();
    assert_eq!(parent.constructs().len(), 5);
    assert_eq!(parent.len(), 1);

    let root = tempfile::tempdir().unwrap();
    parent.create_data_dir(root.path()).unwrap();
    assert_eq!(fs::read_to_string(root.path().join("SharedNotes/notes.txt")).unwrap(), "shared-notes");
}

#[test_log::test]
fn test_s3_data_key() {
    let stack = Stack::builder().name("keys").s3_bucket("cfn_bucket").s3_key("templates/").build().unwrap();
    assert_eq!(stack.s3_data_key("mypylambda", "lambda.zip").unwrap(), "templates/Mypylambda/lambda.zip");

    let stack = Stack::new("keys").unwrap();
    assert_eq!(
        stack.s3_data_key("mypylambda", "lambda.zip").unwrap_err(),
        CfnError::MissingS3Bucket("mypylambda".to_string())
    );
}

#[test_log::test]
fn test_stack_config() {
    let config = StackConfig::from_str(indoc! { r#"
        {
            "StackName": "from-config",
            "Description": "configured",
            "CfnRoleArn": "arn:aws:iam::123456789012:role/cfn",
            "S3Bucket": "cfn_bucket",
            "S3Key": "templates/",
            "OnCollision": "Overwrite"
        }"# })
    .unwrap();

    let stack = config.to_stack().unwrap();
    assert_eq!(stack.name(), "from-config");
    assert_eq!(stack.description(), Some("configured"));
    assert_eq!(stack.cfn_role_arn(), Some("arn:aws:iam::123456789012:role/cfn"));
    assert_eq!(stack.s3_bucket(), Some("cfn_bucket"));
    assert_eq!(stack.s3_key(), "templates/");
    assert_eq!(stack.on_collision(), CollisionPolicy::Overwrite);

    let minimal = StackConfig::from_str(r#"{"StackName": "minimal"}"#).unwrap();
    assert_eq!(minimal.on_collision, CollisionPolicy::Reject);
    assert_eq!(
        minimal.to_string(),
        indoc! { r#"
        {
            "StackName": "minimal",
            "S3Key": "",
            "OnCollision": "Reject"
        }"# }
    );

    let bad = StackConfig::from_str(r#"{"StackName": "bad name"}"#).unwrap();
    assert_eq!(Stack::try_from(bad).unwrap_err(), CfnError::InvalidStackName("bad name".to_string()));

    let e = StackConfig::from_str(r#"{"StackName": "x", "Bucket": "y"}"#).unwrap_err();
    assert!(e.to_string().starts_with("unknown field `Bucket`"));
}
