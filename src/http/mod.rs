//! HTTP protocol layer module
//!
//! Response builders and the CORS policy, decoupled from routing and dispatch.

pub mod cors;
pub mod response;

// Re-export commonly used types
pub use cors::{match_wildcard, CorsPolicy, OriginMatcher, OriginRule, DEFAULT_METHODS};
pub use response::{
    append_headers, build_404_response, build_413_response, build_empty_response,
    build_json_response, build_options_response, build_redirect_response, build_text_response,
    NOT_FOUND_MESSAGE,
};
