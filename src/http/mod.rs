//! HTTP protocol layer module
//!
//! Body reading, MIME helpers and response builders, decoupled from the
//! guestbook handlers.

pub mod body;
pub mod mime;
pub mod response;

// Re-export commonly used items
pub use body::{parse_multipart, read_body, BodyError, FormData};
pub use response::{
    build_405_response, build_file_response, build_health_response, build_html_response,
    build_options_response, decorate,
};
