use super::errors::ProviderError;
use super::records::{IdentityRecord, PolicyDocument, RawRecord};
use async_trait::async_trait;

/// Provider API surface the function collector depends on
///
/// Implementations own authentication, pagination and throttling. Every method
/// may suspend on network I/O and must be safe to call concurrently.
#[async_trait]
pub trait LambdaFacade: Send + Sync {
    /// Every function in `region`, fully paginated
    async fn list_raw_records(&self, region: &str) -> Result<Vec<RawRecord>, ProviderError>;

    /// The role with its attached managed policies, `None` if the role does not exist
    async fn get_identity_with_managed_policies(
        &self,
        role_name: &str,
    ) -> Result<Option<IdentityRecord>, ProviderError>;

    /// The function's resource-based policy, `None` if none is attached
    async fn get_invocation_policy(
        &self,
        function_name: &str,
        region: &str,
    ) -> Result<Option<PolicyDocument>, ProviderError>;

    /// Environment variables of the function as name/value pairs, empty when it has none
    ///
    /// The collector keeps names in the order returned here.
    async fn get_configuration_variables(
        &self,
        function_name: &str,
        region: &str,
    ) -> Result<Vec<(String, String)>, ProviderError>;
}
