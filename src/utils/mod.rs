//! Shared utility functions for ps-forge.

pub mod json_extraction;

pub use json_extraction::{
    extract_from_generic_code_block, extract_from_json_code_block, extract_json_object,
    find_matching_brace, JsonExtractionError,
};
