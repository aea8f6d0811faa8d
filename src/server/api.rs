pub mod entity_response;
pub mod error_response;
pub mod explain_response;
