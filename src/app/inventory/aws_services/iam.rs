use super::super::errors::ProviderError;
use super::super::normalizers::decode_policy_document;
use super::super::records::{IdentityRecord, ManagedPolicy};
use aws_config::SdkConfig;
use aws_sdk_iam as iam;

pub struct IAMService {
    client: iam::Client,
}

impl IAMService {
    /// IAM is a global service, one client serves every region
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            client: iam::Client::new(sdk_config),
        }
    }

    /// Get a role with its attached managed policies and their documents
    ///
    /// Returns `None` when the role does not exist. A role without attached
    /// policies is returned with an empty policy list.
    pub async fn get_role_with_managed_policies(
        &self,
        role_name: &str,
    ) -> Result<Option<IdentityRecord>, ProviderError> {
        let response = match self.client.get_role().role_name(role_name).send().await {
            Ok(response) => response,
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_no_such_entity_exception()) =>
            {
                trace_debug!("IAM role {} does not exist", role_name);
                return Ok(None);
            }
            Err(err) => {
                return Err(iam_failure(
                    "GetRole",
                    format!("Failed to get IAM role {}", role_name),
                )(err))
            }
        };

        let Some(role) = response.role else {
            return Ok(None);
        };

        let mut identity = role_to_identity(&role);
        for (policy_name, policy_arn) in self.list_attached_policies(role_name).await? {
            let document = match &policy_arn {
                Some(arn) => self.default_policy_document(arn).await,
                None => None,
            };
            identity.policies.push(ManagedPolicy {
                policy_name,
                policy_arn,
                document,
            });
        }

        Ok(Some(identity))
    }

    async fn list_attached_policies(
        &self,
        role_name: &str,
    ) -> Result<Vec<(Option<String>, Option<String>)>, ProviderError> {
        let mut policies = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_attached_role_policies()
                .role_name(role_name);
            if let Some(m) = &marker {
                request = request.marker(m);
            }

            let response = request.send().await.map_err(iam_failure(
                "ListAttachedRolePolicies",
                format!("Failed to list attached policies of IAM role {}", role_name),
            ))?;

            if let Some(attached) = response.attached_policies {
                policies.extend(
                    attached
                        .into_iter()
                        .map(|p| (p.policy_name, p.policy_arn)),
                );
            }

            match response.marker {
                Some(next) if response.is_truncated => marker = Some(next),
                _ => break,
            }
        }

        Ok(policies)
    }

    /// Decoded default version of a managed policy
    ///
    /// Failures here only cost the policy its document, never the whole role.
    async fn default_policy_document(&self, policy_arn: &str) -> Option<serde_json::Value> {
        let policy = match self.client.get_policy().policy_arn(policy_arn).send().await {
            Ok(response) => response.policy?,
            Err(err) => {
                log_warn!("Failed to get IAM policy {}: {}", policy_arn, err);
                return None;
            }
        };
        let version_id = policy.default_version_id?;

        match self
            .client
            .get_policy_version()
            .policy_arn(policy_arn)
            .version_id(&version_id)
            .send()
            .await
        {
            Ok(response) => response
                .policy_version
                .and_then(|version| version.document)
                .and_then(|document| decode_policy_document(&document)),
            Err(err) => {
                log_warn!(
                    "Failed to get version {} of IAM policy {}: {}",
                    version_id,
                    policy_arn,
                    err
                );
                None
            }
        }
    }
}

/// Wrap an IAM SDK failure, labelled with the operation that produced it
fn iam_failure<E>(operation: &'static str, context: String) -> impl FnOnce(E) -> ProviderError
where
    E: std::error::Error + Send + Sync + 'static,
{
    move |err| {
        ProviderError::from_sdk("IAM", operation, &anyhow::Error::new(err).context(context))
    }
}

fn role_to_identity(role: &iam::types::Role) -> IdentityRecord {
    IdentityRecord {
        role_name: role.role_name.clone(),
        role_id: Some(role.role_id.clone()),
        arn: Some(role.arn.clone()),
        path: Some(role.path.clone()),
        create_date: Some(role.create_date.to_string()),
        description: role.description.clone(),
        assume_role_policy_document: role
            .assume_role_policy_document
            .as_deref()
            .and_then(decode_policy_document),
        policies: Vec::new(),
    }
}
