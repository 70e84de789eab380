//! Per-function enrichment.
//!
//! Three independent steps each fill a disjoint slice of a [`FunctionRecord`]:
//!
//! - **Execution role**: the role's managed policies and their flattened statements
//! - **Access policy**: the resource-based policy, or the fixed default document
//! - **Environment variables**: names only, every value replaced by the placeholder
//!
//! The steps run concurrently and a failing step only degrades its own fields.

use super::errors::{EnrichmentError, EnrichmentStep};
use super::facade::LambdaFacade;
use super::records::{ExecutionRole, FunctionRecord, PolicyDocument};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A record after all enrichment steps, with whatever went wrong along the way
#[derive(Debug)]
pub struct EnrichedFunction {
    pub record: FunctionRecord,
    pub diagnostics: Vec<EnrichmentError>,
}

/// Environment variable names with their redacted values
#[derive(Debug, Default, PartialEq)]
struct RedactedVariables {
    variables: BTreeMap<String, String>,
    names: Vec<String>,
    values: Vec<String>,
}

impl RedactedVariables {
    /// Names keep their order; a repeated name is only listed once
    fn from_names(names: impl IntoIterator<Item = String>) -> Self {
        let mut redacted = Self::default();
        for name in names {
            if redacted
                .variables
                .insert(
                    name.clone(),
                    RecordEnricher::REDACTION_PLACEHOLDER.to_string(),
                )
                .is_some()
            {
                continue;
            }
            redacted.names.push(name);
            redacted
                .values
                .push(RecordEnricher::REDACTION_PLACEHOLDER.to_string());
        }
        redacted
    }
}

/// Short role name from a role ARN: the text after the last `/`, or the whole string
pub fn role_name_from_arn(role_arn: &str) -> &str {
    role_arn.rsplit('/').next().unwrap_or(role_arn)
}

pub struct RecordEnricher {
    facade: Arc<dyn LambdaFacade>,
}

impl RecordEnricher {
    /// Value stored in place of every environment variable value
    pub const REDACTION_PLACEHOLDER: &'static str = "<redacted>";

    pub fn new(facade: Arc<dyn LambdaFacade>) -> Self {
        Self { facade }
    }

    /// Run all enrichment steps for one record and merge their results
    pub async fn enrich(&self, mut record: FunctionRecord, region: &str) -> EnrichedFunction {
        let (execution_role, access_policy, env_variables) = tokio::join!(
            self.execution_role(&record.name, &record.role_arn),
            self.access_policy(&record.name, region),
            self.environment_variables(&record.name, region),
        );

        let mut diagnostics = Vec::new();

        record.execution_role = execution_role.unwrap_or_else(|e| {
            diagnostics.push(e);
            None
        });

        record.access_policy = access_policy.unwrap_or_else(|e| {
            diagnostics.push(e);
            PolicyDocument::default_access_policy()
        });

        let redacted = env_variables.unwrap_or_else(|e| {
            diagnostics.push(e);
            RedactedVariables::default()
        });
        record.env_variables = redacted.variables;
        record.env_variable_names = redacted.names;
        record.env_variable_values = redacted.values;

        for diagnostic in &diagnostics {
            log_warn!("{}", diagnostic);
        }

        EnrichedFunction {
            record,
            diagnostics,
        }
    }

    async fn execution_role(
        &self,
        function_name: &str,
        role_arn: &str,
    ) -> Result<Option<ExecutionRole>, EnrichmentError> {
        let role_name = role_name_from_arn(role_arn);
        if role_name.is_empty() {
            return Err(EnrichmentError::MalformedRoleReference {
                function: function_name.to_string(),
                role_arn: role_arn.to_string(),
            });
        }

        let identity = self
            .facade
            .get_identity_with_managed_policies(role_name)
            .await
            .map_err(|source| EnrichmentError::StepFailed {
                function: function_name.to_string(),
                step: EnrichmentStep::ExecutionRole,
                source,
            })?;

        match identity {
            Some(identity) => {
                let role = ExecutionRole::from_identity(identity);
                trace_trace!(
                    "Role {} of {} carries {} policy statements",
                    role_name,
                    function_name,
                    role.policy_statements.len()
                );
                Ok(Some(role))
            }
            None => {
                trace_debug!("Role {} of {} not found", role_name, function_name);
                Ok(None)
            }
        }
    }

    async fn access_policy(
        &self,
        function_name: &str,
        region: &str,
    ) -> Result<PolicyDocument, EnrichmentError> {
        let policy = self
            .facade
            .get_invocation_policy(function_name, region)
            .await
            .map_err(|source| EnrichmentError::StepFailed {
                function: function_name.to_string(),
                step: EnrichmentStep::AccessPolicy,
                source,
            })?;

        Ok(policy.unwrap_or_else(PolicyDocument::default_access_policy))
    }

    async fn environment_variables(
        &self,
        function_name: &str,
        region: &str,
    ) -> Result<RedactedVariables, EnrichmentError> {
        let variables = self
            .facade
            .get_configuration_variables(function_name, region)
            .await
            .map_err(|source| EnrichmentError::StepFailed {
                function: function_name.to_string(),
                step: EnrichmentStep::EnvironmentVariables,
                source,
            })?;

        // Values are dropped here, only names survive
        Ok(RedactedVariables::from_names(
            variables.into_iter().map(|(name, _)| name),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_name_from_arn() {
        assert_eq!(role_name_from_arn("arn:aws:iam::111:role/exec"), "exec");
        assert_eq!(
            role_name_from_arn("arn:aws:iam::111:role/service-role/nested"),
            "nested"
        );
        assert_eq!(role_name_from_arn("plain-name"), "plain-name");
        assert_eq!(role_name_from_arn(""), "");
        assert_eq!(role_name_from_arn("arn:aws:iam::111:role/"), "");
    }

    #[test]
    fn test_redacted_variables_keep_names_only() {
        let redacted =
            RedactedVariables::from_names(vec!["A".to_string(), "B".to_string()].into_iter());

        assert_eq!(redacted.names, vec!["A", "B"]);
        assert_eq!(redacted.values, vec!["<redacted>", "<redacted>"]);
        assert_eq!(redacted.variables.len(), 2);
        assert!(redacted
            .variables
            .values()
            .all(|v| v == RecordEnricher::REDACTION_PLACEHOLDER));
    }

    #[test]
    fn test_redacted_variables_keep_provider_order() {
        let names = ["ZETA", "ALPHA", "MIDDLE", "ALPHA"].map(String::from);
        let redacted = RedactedVariables::from_names(names);

        assert_eq!(redacted.names, vec!["ZETA", "ALPHA", "MIDDLE"]);
        assert_eq!(redacted.values.len(), 3);
        assert_eq!(redacted.variables.len(), 3);
    }
}
