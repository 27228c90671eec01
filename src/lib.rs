//! The library code for the `runestone` content server. The architecture can
//! be generally broken down into three layers:
//!
//! 1. Parsing articles from source files ([`crate::parser`], with bodies
//!    converted by [`crate::markdown`])
//! 2. Loading the whole content directory into an immutable snapshot
//!    ([`crate::load`]), compiling layouts along the way
//!    ([`crate::template`])
//! 3. Serving the snapshot ([`crate::store`], [`crate::render`],
//!    [`crate::serve`])
//!
//! The second layer is the most involved. Each directory may carry a layout,
//! each article may carry its own, and articles without one inherit the
//! layout of the nearest directory above them. Layouts can list the articles
//! of any directory through the `dir` template function.
//!
//! The store never modifies a snapshot. A reload builds a new one from
//! scratch and swaps it in atomically, so readers see either the old content
//! or the new content, and a broken edit on disk never takes the site down.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod article;
pub mod config;
pub mod load;
pub mod markdown;
pub mod parser;
pub mod render;
pub mod serve;
pub mod store;
pub mod template;
pub mod util;
