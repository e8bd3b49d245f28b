//! Output generation for the merged feed.
//!
//! # Submodules
//!
//! - [`rss`]: Renders a [`Collection`](crate::collection::Collection) as an
//!   RSS 2.0 document and writes it to disk
//!
//! # Output
//!
//! A single UTF-8 file, overwritten on every run:
//!
//! ```text
//! feed.xml
//! ```

pub mod rss;
