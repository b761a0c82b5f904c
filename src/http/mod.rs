//! HTTP protocol layer module
//!
//! Content-type detection and response building, decoupled from the
//! pipeline that decides which response to send.

pub mod mime;
pub mod response;

// Re-export commonly used types
pub use mime::{ContentTypeResolver, MimeSniffer};
pub use response::{build_error_response, build_success_response, ErrorPage, ResponseBody};
