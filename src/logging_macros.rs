#![warn(clippy::all, rust_2018_idioms)]

/// Logging macros that prefix every message with `[file:module:line]`
///
/// `log_*` macros write to both `log` and `tracing`; `trace_*` macros only
/// write to `tracing`.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        log::info!("[{}:{}:{}] {}", file!(), module_path!(), line!(), format!($($arg)*));
        tracing::info!("[{}:{}:{}] {}", file!(), module_path!(), line!(), format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        log::warn!("[{}:{}:{}] {}", file!(), module_path!(), line!(), format!($($arg)*));
        tracing::warn!("[{}:{}:{}] {}", file!(), module_path!(), line!(), format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        log::error!("[{}:{}:{}] {}", file!(), module_path!(), line!(), format!($($arg)*));
        tracing::error!("[{}:{}:{}] {}", file!(), module_path!(), line!(), format!($($arg)*));
    };
}

#[macro_export]
macro_rules! trace_trace {
    ($($arg:tt)*) => {
        tracing::trace!("[{}:{}:{}] {}", file!(), module_path!(), line!(), format!($($arg)*));
    };
}

#[macro_export]
macro_rules! trace_debug {
    ($($arg:tt)*) => {
        tracing::debug!("[{}:{}:{}] {}", file!(), module_path!(), line!(), format!($($arg)*));
    };
}

/*
Log level guidelines for the inventory:

TRACE: per-function details
- statement counts of execution roles
- individual policy document decoding

DEBUG: facade calls and their outcome
- page counts of ListFunctions
- roles or policies that do not exist
- start of a function's enrichment

INFO: region-level milestones
- number of functions listed and collected
- diagnostics summary

WARN: degraded data
- an enrichment step failed and the field fell back to its default
- a raw record was skipped
- duplicate function names
- collection cancelled

ERROR: a region could not be collected at all

Never log environment variable values, at any level.
*/
