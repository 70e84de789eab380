use anyhow::{Context, Result};
use aws_config::SdkConfig;
use aws_sdk_lambda as lambda;
use aws_types::region::Region;

pub struct LambdaService {
    sdk_config: SdkConfig,
}

impl LambdaService {
    pub fn new(sdk_config: SdkConfig) -> Self {
        Self { sdk_config }
    }

    fn client_for_region(&self, region: &str) -> lambda::Client {
        let config = lambda::config::Builder::from(&self.sdk_config)
            .region(Region::new(region.to_string()))
            .build();
        lambda::Client::from_conf(config)
    }

    /// List every Lambda function in a region as a raw record
    pub async fn list_functions(&self, region: &str) -> Result<Vec<serde_json::Value>> {
        let client = self.client_for_region(region);
        let mut paginator = client.list_functions().into_paginator().send();

        let mut functions = Vec::new();
        while let Some(page) = paginator.next().await {
            let page = page
                .with_context(|| format!("Failed to list Lambda functions in {}", region))?;
            if let Some(function_list) = page.functions {
                for function in function_list {
                    functions.push(function_to_json(&function));
                }
            }
        }

        trace_debug!("Lambda ListFunctions returned {} functions in {}", functions.len(), region);
        Ok(functions)
    }

    /// Resource-based policy of a function as returned by the API, `None` when none is attached
    pub async fn get_policy(&self, function_name: &str, region: &str) -> Result<Option<String>> {
        let client = self.client_for_region(region);
        match client.get_policy().function_name(function_name).send().await {
            Ok(response) => Ok(response.policy),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_resource_not_found_exception()) =>
            {
                Ok(None)
            }
            Err(err) => Err(anyhow::Error::new(err)
                .context(format!("Failed to get policy of Lambda function {}", function_name))),
        }
    }

    /// Environment variables of a function; empty when it defines none
    ///
    /// The SDK returns an unordered map, so pairs come back sorted by name.
    pub async fn get_environment_variables(
        &self,
        function_name: &str,
        region: &str,
    ) -> Result<Vec<(String, String)>> {
        let client = self.client_for_region(region);
        let response = client
            .get_function_configuration()
            .function_name(function_name)
            .send()
            .await
            .with_context(|| {
                format!(
                    "Failed to get configuration of Lambda function {}",
                    function_name
                )
            })?;

        let mut variables: Vec<(String, String)> = response
            .environment
            .and_then(|env| env.variables)
            .map(|variables| variables.into_iter().collect())
            .unwrap_or_default();
        variables.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(variables)
    }
}

/// Provider-shaped record for one function
///
/// Environment variables are not included; they are only read through
/// [`LambdaService::get_environment_variables`].
pub fn function_to_json(function: &lambda::types::FunctionConfiguration) -> serde_json::Value {
    let mut json = serde_json::Map::new();

    let mut insert_string = |key: &str, value: Option<&str>| {
        if let Some(value) = value {
            json.insert(key.to_string(), serde_json::Value::String(value.to_string()));
        }
    };

    insert_string("FunctionName", function.function_name.as_deref());
    insert_string("FunctionArn", function.function_arn.as_deref());
    insert_string("Runtime", function.runtime.as_ref().map(|r| r.as_str()));
    insert_string("Role", function.role.as_deref());
    insert_string("Handler", function.handler.as_deref());
    insert_string("Description", function.description.as_deref());
    insert_string("LastModified", function.last_modified.as_deref());
    insert_string("CodeSha256", function.code_sha256.as_deref());
    insert_string("Version", function.version.as_deref());
    insert_string("RevisionId", function.revision_id.as_deref());

    json.insert(
        "CodeSize".to_string(),
        serde_json::Value::Number(function.code_size.into()),
    );

    if let Some(timeout) = function.timeout {
        json.insert(
            "Timeout".to_string(),
            serde_json::Value::Number(timeout.into()),
        );
    }

    if let Some(memory_size) = function.memory_size {
        json.insert(
            "MemorySize".to_string(),
            serde_json::Value::Number(memory_size.into()),
        );
    }

    if let Some(tracing_config) = &function.tracing_config {
        let mut tracing_json = serde_json::Map::new();
        if let Some(mode) = &tracing_config.mode {
            tracing_json.insert(
                "Mode".to_string(),
                serde_json::Value::String(mode.as_str().to_string()),
            );
        }
        json.insert(
            "TracingConfig".to_string(),
            serde_json::Value::Object(tracing_json),
        );
    }

    serde_json::Value::Object(json)
}
