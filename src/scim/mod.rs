//! SCIM 2.0 Protocol Implementation
//!
//! The expression engine and resource-shaping core of the server. Everything
//! here is synchronous and free of I/O; the service layer feeds it resources
//! fetched from the repository.
//!
//! ## RFC References
//!
//! - RFC 7643: SCIM Core Schema
//! - RFC 7644: SCIM Protocol
//!
//! ## Module Structure
//!
//! - [`path`]: attribute path parser (`emails[type eq "work"].value`)
//! - [`filter`]: filter expression parser
//! - [`evaluator`]: filter evaluation against JSON resources
//! - [`projection`]: `attributes` / `excludedAttributes` shaping
//! - [`patch`]: PATCH request types and engine
//! - [`etag`]: resource versions and `If-Match` checks
//! - [`types`]: protocol and discovery types
//! - [`error`]: core errors and RFC 7644 error responses

pub mod error;
pub mod etag;
pub mod evaluator;
pub mod filter;
pub mod patch;
pub mod path;
pub mod projection;
pub mod types;

pub use error::*;
pub use etag::{check_if_match, generate_etag};
pub use evaluator::{ResourceView, evaluate, find_matching_items};
pub use filter::{FilterNode, FilterValue, Operator, parse_filter};
pub use patch::{
    PatchDocument, PatchEngine, PatchOperation, PatchRequest, ReferenceResolver,
    ResolvedReference, ResourceKind,
};
pub use path::{ParsedPath, parse_path};
pub use projection::AttributeProjector;
pub use types::*;
