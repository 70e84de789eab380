//! Function collection tests
//!
//! These tests drive [`FunctionCollector`] against an in-memory facade so that
//! every enrichment path can be exercised without AWS credentials: redaction of
//! environment variables, the default access policy, statement flattening,
//! absent versus empty execution roles, and graceful degradation when a single
//! facade call fails.

use async_trait::async_trait;
use awsaudit::app::inventory::{
    CollectionError, CollectorConfig, EnrichmentError, EnrichmentStep, ErrorCategory,
    FunctionCollector, IdentityRecord, LambdaFacade, ManagedPolicy, PolicyDocument,
    ProviderError, RawRecord, RecordEnricher,
};
use insta::assert_json_snapshot;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const REGION: &str = "us-east-1";

/// In-memory facade with per-function failure injection
#[derive(Default)]
struct StubFacade {
    raw_records: Vec<RawRecord>,
    list_failure: Option<ProviderError>,
    roles: HashMap<String, IdentityRecord>,
    policies: HashMap<String, PolicyDocument>,
    variables: HashMap<String, Vec<(String, String)>>,
    failing: HashSet<(String, EnrichmentStep)>,
    variables_delay: Option<Duration>,
    list_calls: AtomicUsize,
    role_lookups: Mutex<Vec<String>>,
    variables_in_flight: AtomicUsize,
    variables_max_in_flight: AtomicUsize,
}

impl StubFacade {
    fn with_functions(names: &[&str]) -> Self {
        Self {
            raw_records: names
                .iter()
                .map(|name| {
                    json!({
                        "FunctionName": name,
                        "FunctionArn": format!("arn:aws:lambda:us-east-1:111:function:{}", name),
                        "Role": format!("arn:aws:iam::111:role/{}-exec", name),
                        "Runtime": "python3.12",
                    })
                })
                .collect(),
            ..Default::default()
        }
    }

    fn fail(mut self, function: &str, step: EnrichmentStep) -> Self {
        self.failing.insert((function.to_string(), step));
        self
    }

    fn check(&self, function: &str, step: EnrichmentStep) -> Result<(), ProviderError> {
        if self.failing.contains(&(function.to_string(), step)) {
            Err(ProviderError::new(
                "Stub",
                "Injected",
                ErrorCategory::Throttled,
                format!("injected failure for {}", function),
            ))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl LambdaFacade for StubFacade {
    async fn list_raw_records(&self, _region: &str) -> Result<Vec<RawRecord>, ProviderError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        match &self.list_failure {
            Some(err) => Err(err.clone()),
            None => Ok(self.raw_records.clone()),
        }
    }

    async fn get_identity_with_managed_policies(
        &self,
        role_name: &str,
    ) -> Result<Option<IdentityRecord>, ProviderError> {
        self.role_lookups.lock().unwrap().push(role_name.to_string());
        let function = role_name.trim_end_matches("-exec");
        self.check(function, EnrichmentStep::ExecutionRole)?;
        Ok(self.roles.get(role_name).cloned())
    }

    async fn get_invocation_policy(
        &self,
        function_name: &str,
        _region: &str,
    ) -> Result<Option<PolicyDocument>, ProviderError> {
        self.check(function_name, EnrichmentStep::AccessPolicy)?;
        Ok(self.policies.get(function_name).cloned())
    }

    async fn get_configuration_variables(
        &self,
        function_name: &str,
        _region: &str,
    ) -> Result<Vec<(String, String)>, ProviderError> {
        let in_flight = self.variables_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.variables_max_in_flight
            .fetch_max(in_flight, Ordering::SeqCst);
        if let Some(delay) = self.variables_delay {
            tokio::time::sleep(delay).await;
        }
        self.variables_in_flight.fetch_sub(1, Ordering::SeqCst);

        self.check(function_name, EnrichmentStep::EnvironmentVariables)?;
        Ok(self
            .variables
            .get(function_name)
            .cloned()
            .unwrap_or_default())
    }
}

fn policy_with_statements(name: &str, statements: Vec<Value>) -> ManagedPolicy {
    ManagedPolicy {
        policy_name: Some(name.to_string()),
        policy_arn: Some(format!("arn:aws:iam::111:policy/{}", name)),
        document: Some(json!({"Version": "2012-10-17", "Statement": statements})),
    }
}

fn secrets() -> Vec<(String, String)> {
    vec![
        ("API_KEY".to_string(), "sk-live-123".to_string()),
        ("DB_PASSWORD".to_string(), "hunter2".to_string()),
        ("EMPTY".to_string(), String::new()),
    ]
}

#[tokio::test]
async fn test_end_to_end_single_function() {
    let mut facade = StubFacade {
        raw_records: vec![json!({"FunctionName": "f1", "Role": "arn:aws:iam::111:role/exec"})],
        ..Default::default()
    };
    facade.roles.insert(
        "exec".to_string(),
        IdentityRecord::new("exec").with_policy(ManagedPolicy {
            policy_name: None,
            policy_arn: None,
            document: Some(json!({"Statement": ["S1"]})),
        }),
    );
    facade.variables.insert(
        "f1".to_string(),
        vec![("SECRET".to_string(), "xyz".to_string())],
    );

    let collector = FunctionCollector::new(Arc::new(facade));
    let collection = collector.fetch_all(REGION).await.unwrap();

    assert_eq!(collection.len(), 1);
    assert_eq!(collection.region(), REGION);
    assert!(collection.diagnostics().is_empty());

    let record = collection.get("f1").unwrap();
    assert_eq!(record.role_arn, "arn:aws:iam::111:role/exec");
    assert_eq!(
        record.execution_role.as_ref().unwrap().policy_statements,
        vec![json!("S1")]
    );
    assert!(record.access_policy.is_default());
    assert_eq!(
        record.env_variables,
        BTreeMap::from([("SECRET".to_string(), "<redacted>".to_string())])
    );

    assert_json_snapshot!("end_to_end_function_record", record);
}

#[tokio::test]
async fn test_environment_values_are_always_redacted() {
    let mut facade = StubFacade::with_functions(&["alpha", "beta"]);
    facade.variables.insert("alpha".to_string(), secrets());

    let collection = FunctionCollector::new(Arc::new(facade))
        .fetch_all(REGION)
        .await
        .unwrap();

    let alpha = collection.get("alpha").unwrap();
    assert_eq!(alpha.env_variable_names, vec!["API_KEY", "DB_PASSWORD", "EMPTY"]);
    assert_eq!(
        alpha.env_variable_values.len(),
        alpha.env_variable_names.len()
    );
    for name in &alpha.env_variable_names {
        assert_eq!(alpha.env_variables[name], RecordEnricher::REDACTION_PLACEHOLDER);
    }
    assert!(alpha
        .env_variable_values
        .iter()
        .all(|v| v == RecordEnricher::REDACTION_PLACEHOLDER));

    let beta = collection.get("beta").unwrap();
    assert!(beta.env_variables.is_empty());
    assert!(beta.env_variable_names.is_empty());
    assert!(beta.env_variable_values.is_empty());

    let output = serde_json::to_string(&collection).unwrap();
    assert!(!output.contains("sk-live-123"));
    assert!(!output.contains("hunter2"));
}

#[tokio::test]
async fn test_missing_access_policy_uses_default_document() {
    let mut facade = StubFacade::with_functions(&["public", "private"]);
    let public_policy: PolicyDocument = serde_json::from_value(json!({
        "Version": "2012-10-17",
        "Id": "default",
        "Statement": [{
            "Sid": "AllowAnyone",
            "Effect": "Allow",
            "Principal": "*",
            "Action": "lambda:InvokeFunction"
        }]
    }))
    .unwrap();
    facade
        .policies
        .insert("public".to_string(), public_policy.clone());

    let collection = FunctionCollector::new(Arc::new(facade))
        .fetch_all(REGION)
        .await
        .unwrap();

    assert_eq!(collection.get("public").unwrap().access_policy, public_policy);
    assert_eq!(
        serde_json::to_value(&collection.get("private").unwrap().access_policy).unwrap(),
        json!({"Version": "2012-10-17", "Id": "default", "Statement": []})
    );
}

#[tokio::test]
async fn test_policy_statements_keep_cross_policy_order() {
    let mut facade = StubFacade::with_functions(&["worker"]);
    facade.roles.insert(
        "worker-exec".to_string(),
        IdentityRecord::new("worker-exec")
            .with_policy(policy_with_statements("first", vec![json!("a")]))
            .with_policy(ManagedPolicy {
                policy_name: Some("unreadable".to_string()),
                policy_arn: None,
                document: None,
            })
            .with_policy(policy_with_statements("second", vec![json!("b"), json!("c")])),
    );

    let collection = FunctionCollector::new(Arc::new(facade))
        .fetch_all(REGION)
        .await
        .unwrap();

    let role = collection
        .get("worker")
        .unwrap()
        .execution_role
        .as_ref()
        .unwrap();
    assert_eq!(role.identity.policies.len(), 3);
    assert_eq!(
        role.policy_statements,
        vec![json!("a"), json!("b"), json!("c")]
    );
}

#[tokio::test]
async fn test_unknown_role_is_absent_and_policyless_role_is_empty() {
    let mut facade = StubFacade::with_functions(&["known", "unknown"]);
    facade
        .roles
        .insert("known-exec".to_string(), IdentityRecord::new("known-exec"));

    let collection = FunctionCollector::new(Arc::new(facade))
        .fetch_all(REGION)
        .await
        .unwrap();

    let known = collection.get("known").unwrap();
    let role = known.execution_role.as_ref().unwrap();
    assert!(role.policy_statements.is_empty());

    let unknown = collection.get("unknown").unwrap();
    assert!(unknown.execution_role.is_none());
    let serialized = serde_json::to_value(unknown).unwrap();
    assert!(serialized.get("execution_role").is_none());
    assert!(collection.diagnostics().is_empty());
}

#[tokio::test]
async fn test_collection_is_keyed_by_function_name() {
    let names = ["a", "b", "c", "d", "e", "f", "g"];
    let collection = FunctionCollector::new(Arc::new(StubFacade::with_functions(&names)))
        .fetch_all(REGION)
        .await
        .unwrap();

    assert_eq!(collection.len(), names.len());
    for (key, record) in collection.iter() {
        assert_eq!(key, record.name);
    }
    assert_eq!(collection.names().collect::<Vec<_>>(), names.to_vec());
}

#[tokio::test]
async fn test_failed_variables_call_keeps_record_with_empty_fields() {
    let mut facade = StubFacade::with_functions(&["flaky", "steady"])
        .fail("flaky", EnrichmentStep::EnvironmentVariables);
    facade.variables.insert("flaky".to_string(), secrets());
    facade.variables.insert("steady".to_string(), secrets());

    let collection = FunctionCollector::new(Arc::new(facade))
        .fetch_all(REGION)
        .await
        .unwrap();

    assert_eq!(collection.len(), 2);
    let flaky = collection.get("flaky").unwrap();
    assert!(flaky.env_variables.is_empty());
    assert!(flaky.env_variable_names.is_empty());
    assert!(flaky.env_variable_values.is_empty());
    assert_eq!(collection.get("steady").unwrap().env_variables.len(), 3);

    assert_eq!(collection.diagnostics().len(), 1);
    let diagnostic = &collection.diagnostics()[0];
    assert_eq!(diagnostic.function(), Some("flaky"));
    assert_eq!(diagnostic.step(), Some(EnrichmentStep::EnvironmentVariables));
}

#[tokio::test]
async fn test_one_failed_step_does_not_cancel_the_others() {
    let mut facade = StubFacade::with_functions(&["api"])
        .fail("api", EnrichmentStep::AccessPolicy)
        .fail("api", EnrichmentStep::ExecutionRole);
    facade.variables.insert("api".to_string(), secrets());
    facade.policies.insert(
        "api".to_string(),
        serde_json::from_value(json!({"Version": "2012-10-17", "Statement": []})).unwrap(),
    );

    let collection = FunctionCollector::new(Arc::new(facade))
        .fetch_all(REGION)
        .await
        .unwrap();

    let api = collection.get("api").unwrap();
    assert!(api.execution_role.is_none());
    assert!(api.access_policy.is_default());
    assert_eq!(api.env_variable_names.len(), 3);

    let steps: HashSet<_> = collection
        .diagnostics()
        .iter()
        .filter_map(EnrichmentError::step)
        .collect();
    assert_eq!(
        steps,
        HashSet::from([EnrichmentStep::AccessPolicy, EnrichmentStep::ExecutionRole])
    );
}

#[tokio::test]
async fn test_list_failure_aborts_region() {
    let facade = Arc::new(StubFacade {
        list_failure: Some(ProviderError::new(
            "Lambda",
            "ListFunctions",
            ErrorCategory::PermissionDenied,
            "AccessDeniedException: not authorized",
        )),
        ..StubFacade::with_functions(&["never"])
    });

    let result = FunctionCollector::new(facade.clone()).fetch_all(REGION).await;

    match result {
        Err(CollectionError::Provider(err)) => {
            assert_eq!(err.category, ErrorCategory::PermissionDenied);
        }
        other => panic!("expected provider error, got {:?}", other),
    }
    assert_eq!(facade.list_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_empty_listing_gives_empty_collection() {
    let facade = Arc::new(StubFacade::default());
    let collection = FunctionCollector::new(facade.clone())
        .fetch_all(REGION)
        .await
        .unwrap();

    assert!(collection.is_empty());
    assert_eq!(serde_json::to_value(&collection).unwrap(), json!({}));
    assert_eq!(facade.list_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_empty_region_is_rejected_before_listing() {
    let facade = Arc::new(StubFacade::with_functions(&["f1"]));
    let result = FunctionCollector::new(facade.clone()).fetch_all("").await;

    assert!(matches!(result, Err(CollectionError::InvalidRegion(_))));
    assert_eq!(facade.list_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_role_reference_fallbacks() {
    let facade = Arc::new(StubFacade {
        raw_records: vec![
            json!({"FunctionName": "no-role"}),
            json!({"FunctionName": "bare", "Role": "bare-exec"}),
            json!({"FunctionName": "trailing", "Role": "arn:aws:iam::111:role/"}),
        ],
        ..Default::default()
    });

    let collection = FunctionCollector::new(facade.clone())
        .fetch_all(REGION)
        .await
        .unwrap();

    assert_eq!(collection.len(), 3);
    assert_eq!(collection.get("no-role").unwrap().role_arn, "");
    assert_eq!(collection.get("bare").unwrap().role_arn, "bare-exec");

    // Only the reference without a separator reaches the facade, as a whole string
    assert_eq!(*facade.role_lookups.lock().unwrap(), vec!["bare-exec"]);

    let malformed: Vec<_> = collection
        .diagnostics()
        .iter()
        .filter(|d| matches!(d, EnrichmentError::MalformedRoleReference { .. }))
        .filter_map(EnrichmentError::function)
        .collect();
    assert_eq!(malformed.len(), 2);
    assert!(malformed.contains(&"no-role"));
    assert!(malformed.contains(&"trailing"));
}

#[tokio::test]
async fn test_unkeyable_raw_records_are_skipped() {
    let facade = StubFacade {
        raw_records: vec![
            json!({"FunctionName": "ok"}),
            json!({"FunctionArn": "arn:aws:lambda:us-east-1:111:function:anonymous"}),
            json!({"FunctionName": 42}),
            json!({"FunctionName": ""}),
        ],
        ..Default::default()
    };

    let collection = FunctionCollector::new(Arc::new(facade))
        .fetch_all(REGION)
        .await
        .unwrap();

    assert_eq!(collection.len(), 1);
    let skipped: Vec<usize> = collection
        .diagnostics()
        .iter()
        .filter_map(|d| match d {
            EnrichmentError::InvalidRecord { index, .. } => Some(*index),
            _ => None,
        })
        .collect();
    assert_eq!(skipped, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_duplicate_names_keep_the_last_listed_record() {
    let facade = StubFacade {
        raw_records: vec![
            json!({"FunctionName": "dup", "Runtime": "nodejs20.x"}),
            json!({"FunctionName": "other"}),
            json!({"FunctionName": "dup", "Runtime": "python3.12"}),
        ],
        ..Default::default()
    };

    let collection = FunctionCollector::new(Arc::new(facade))
        .fetch_all(REGION)
        .await
        .unwrap();

    assert_eq!(collection.len(), 2);
    assert_eq!(
        collection.get("dup").unwrap().runtime.as_deref(),
        Some("python3.12")
    );
}

#[tokio::test]
async fn test_mistyped_fields_do_not_drop_the_record() {
    let facade = StubFacade {
        raw_records: vec![
            json!({"FunctionName": "a"}),
            json!({"FunctionName": "b", "Timeout": "3"}),
            json!({"FunctionName": "c", "CodeSize": 1.5}),
            json!({"FunctionName": "d", "TracingConfig": "Active", "MemorySize": 256}),
        ],
        ..Default::default()
    };

    let collection = FunctionCollector::new(Arc::new(facade))
        .fetch_all(REGION)
        .await
        .unwrap();

    assert_eq!(collection.names().collect::<Vec<_>>(), vec!["a", "b", "c", "d"]);
    assert!(!collection
        .diagnostics()
        .iter()
        .any(|d| matches!(d, EnrichmentError::InvalidRecord { .. })));

    assert_eq!(collection.get("b").unwrap().timeout, None);
    assert_eq!(collection.get("c").unwrap().code_size, None);
    let d = collection.get("d").unwrap();
    assert_eq!(d.tracing_config, None);
    assert_eq!(d.memory_size, Some(256));
}

#[tokio::test]
async fn test_invocation_policy_without_version_is_stored_as_sent() {
    let mut facade = StubFacade::with_functions(&["open"]);
    let sent = json!({
        "Statement": {"Effect": "Allow", "Principal": "*", "Action": "lambda:InvokeFunction"},
        "Comment": "attached by hand"
    });
    facade.policies.insert(
        "open".to_string(),
        serde_json::from_value(sent.clone()).unwrap(),
    );

    let collection = FunctionCollector::new(Arc::new(facade))
        .fetch_all(REGION)
        .await
        .unwrap();

    let record = collection.get("open").unwrap();
    assert!(!record.access_policy.is_default());
    assert_eq!(serde_json::to_value(&record.access_policy).unwrap(), sent);
    assert!(collection.diagnostics().is_empty());
}

#[tokio::test]
async fn test_variable_names_follow_facade_order() {
    let mut facade = StubFacade::with_functions(&["f1"]);
    facade.variables.insert(
        "f1".to_string(),
        vec![
            ("ZETA".to_string(), "1".to_string()),
            ("ALPHA".to_string(), "2".to_string()),
            ("MIDDLE".to_string(), "3".to_string()),
        ],
    );

    let collection = FunctionCollector::new(Arc::new(facade))
        .fetch_all(REGION)
        .await
        .unwrap();

    let record = collection.get("f1").unwrap();
    assert_eq!(record.env_variable_names, vec!["ZETA", "ALPHA", "MIDDLE"]);
    assert_eq!(record.env_variable_values, vec!["<redacted>"; 3]);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let facade = Arc::new(StubFacade::with_functions(&["f1"]));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = FunctionCollector::new(facade.clone())
        .fetch_all_with_cancellation(REGION, &cancel)
        .await;

    assert!(matches!(result, Err(CollectionError::Cancelled { .. })));
    assert_eq!(facade.list_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cancelled_during_enrichment() {
    let facade = Arc::new(StubFacade {
        variables_delay: Some(Duration::from_secs(30)),
        ..StubFacade::with_functions(&["slow-1", "slow-2"])
    });
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        FunctionCollector::new(facade).fetch_all_with_cancellation(REGION, &cancel),
    )
    .await
    .expect("cancellation should end the collection promptly");

    assert!(matches!(result, Err(CollectionError::Cancelled { .. })));
}

#[tokio::test]
async fn test_concurrency_is_bounded_by_config() {
    let names: Vec<String> = (0..8).map(|i| format!("fn-{}", i)).collect();
    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let facade = Arc::new(StubFacade {
        variables_delay: Some(Duration::from_millis(20)),
        ..StubFacade::with_functions(&name_refs)
    });
    let config = CollectorConfig {
        max_concurrent_records: 2,
        ..Default::default()
    };

    let collection = FunctionCollector::with_config(facade.clone(), &config)
        .fetch_all(REGION)
        .await
        .unwrap();

    assert_eq!(collection.len(), 8);
    let max_in_flight = facade.variables_max_in_flight.load(Ordering::SeqCst);
    assert!(max_in_flight >= 1 && max_in_flight <= 2, "max in flight: {}", max_in_flight);
}
