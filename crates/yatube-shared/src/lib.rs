//! # yatube-shared
//!
//! Pieces used by both the store and the HTTP server: constants, the
//! lenient paginator, form validators and uploaded image inspection.

pub mod constants;
pub mod error;
pub mod forms;
pub mod pagination;
pub mod upload;

pub use error::{FormErrors, ImageError};
pub use pagination::{Page, PageRequest, Paginator};
