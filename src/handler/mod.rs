//! Request handler module
//!
//! Path resolution, access counting and the request pipeline that ties them
//! to the security store and response building.

pub mod access;
pub mod pipeline;
pub mod resolver;

// Re-export main entry points
pub use access::AccessRecorder;
pub use pipeline::{RejectReason, RequestContext, RequestError, RequestHandler, RequestPipeline};
pub use resolver::{PathResolver, ResolvedTarget};
