pub mod json_expansion;

pub use json_expansion::decode_policy_document;
