//! AWS SDK implementation of [`LambdaFacade`].
//!
//! The Lambda wrapper returns `anyhow` errors with context, as the rest of the
//! SDK layer does, and [`AwsLambdaFacade`] converts them into categorized
//! [`ProviderError`]s at the trait boundary. IAM lookups span several calls, so
//! [`IAMService`] labels each failure with the operation that produced it.

pub mod iam;
pub mod lambda;

pub use iam::IAMService;
pub use lambda::LambdaService;

use super::errors::ProviderError;
use super::facade::LambdaFacade;
use super::normalizers::decode_policy_document;
use super::records::{IdentityRecord, PolicyDocument, RawRecord};
use async_trait::async_trait;
use aws_config::SdkConfig;

pub struct AwsLambdaFacade {
    lambda: LambdaService,
    iam: IAMService,
}

impl AwsLambdaFacade {
    pub fn new(sdk_config: SdkConfig) -> Self {
        Self {
            iam: IAMService::new(&sdk_config),
            lambda: LambdaService::new(sdk_config),
        }
    }
}

/// Parse the policy string returned by Lambda `GetPolicy`, keeping every key as sent
fn parse_invocation_policy(policy: &str) -> Result<PolicyDocument, ProviderError> {
    decode_policy_document(policy)
        .and_then(|document| PolicyDocument::try_from(document).ok())
        .ok_or_else(|| {
            ProviderError::malformed("Lambda", "GetPolicy", "policy is not a JSON document")
        })
}

#[async_trait]
impl LambdaFacade for AwsLambdaFacade {
    async fn list_raw_records(&self, region: &str) -> Result<Vec<RawRecord>, ProviderError> {
        self.lambda
            .list_functions(region)
            .await
            .map_err(|e| ProviderError::from_sdk("Lambda", "ListFunctions", &e))
    }

    async fn get_identity_with_managed_policies(
        &self,
        role_name: &str,
    ) -> Result<Option<IdentityRecord>, ProviderError> {
        self.iam.get_role_with_managed_policies(role_name).await
    }

    async fn get_invocation_policy(
        &self,
        function_name: &str,
        region: &str,
    ) -> Result<Option<PolicyDocument>, ProviderError> {
        let Some(policy) = self
            .lambda
            .get_policy(function_name, region)
            .await
            .map_err(|e| ProviderError::from_sdk("Lambda", "GetPolicy", &e))?
        else {
            return Ok(None);
        };

        parse_invocation_policy(&policy).map(Some)
    }

    async fn get_configuration_variables(
        &self,
        function_name: &str,
        region: &str,
    ) -> Result<Vec<(String, String)>, ProviderError> {
        self.lambda
            .get_environment_variables(function_name, region)
            .await
            .map_err(|e| ProviderError::from_sdk("Lambda", "GetFunctionConfiguration", &e))
    }
}
