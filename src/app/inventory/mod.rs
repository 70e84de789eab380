//! Lambda function inventory for security auditing.
//!
//! [`FunctionCollector::fetch_all`] lists every function of a region through a
//! [`LambdaFacade`], enriches each one with its execution role's managed-policy
//! statements, its resource-based access policy and a redacted view of its
//! environment variables, and returns a [`FunctionCollection`] keyed by name.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use awsaudit::app::inventory::{AwsLambdaFacade, FunctionCollector};
//! # async fn run(sdk_config: aws_config::SdkConfig) -> anyhow::Result<()> {
//! let collector = FunctionCollector::new(Arc::new(AwsLambdaFacade::new(sdk_config)));
//! let functions = collector.fetch_all("eu-west-1").await?;
//! println!("{}", serde_json::to_string_pretty(&functions)?);
//! # Ok(())
//! # }
//! ```

pub mod aws_services;
pub mod collection;
pub mod config;
pub mod enricher;
pub mod errors;
pub mod facade;
pub mod normalizers;
pub mod records;
pub mod sdk_errors;

pub use aws_services::AwsLambdaFacade;
pub use collection::{FunctionCollection, FunctionCollector};
pub use config::CollectorConfig;
pub use enricher::{role_name_from_arn, EnrichedFunction, RecordEnricher};
pub use errors::{CollectionError, EnrichmentError, EnrichmentStep, ProviderError};
pub use facade::LambdaFacade;
pub use records::{
    ExecutionRole, FunctionRecord, IdentityRecord, ManagedPolicy, PolicyDocument, RawFunction,
    RawRecord, TracingConfig,
};
pub use sdk_errors::ErrorCategory;
