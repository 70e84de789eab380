//! AWS Audit - Lambda function inventory collector
//!
//! Builds a self-contained snapshot of the Lambda functions in an AWS region for
//! downstream security rule evaluation. Each function's provider description is
//! enriched with security-relevant context:
//!
//! - **Execution role**: the role's attached managed policies and the flattened
//!   list of their statements
//! - **Access policy**: the resource-based invocation policy, or a fixed default
//!   document when none is attached
//! - **Environment variables**: variable names only, every value redacted
//!
//! # Architecture Overview
//!
//! - **Facade** ([`app::inventory::LambdaFacade`]): provider API surface, with the
//!   AWS SDK implementation in [`app::inventory::aws_services`]
//! - **Enricher** ([`app::inventory::RecordEnricher`]): independent enrichment steps run
//!   concurrently per function
//! - **Collection** ([`app::inventory::FunctionCollector`]): bounded fan-out over all
//!   functions of a region, producing a [`app::inventory::FunctionCollection`]
//!
//! Enrichment failures never abort a region: the affected field falls back to its
//! default and the problem is reported as a diagnostic on the collection.

#![warn(clippy::all, rust_2018_idioms)]

// Include logging macros first
#[macro_use]
pub mod logging_macros;

pub mod app;
