//! # historytrends
//!
//! Validating codec for browsing history exported by the History Trends
//! Unlimited extension. Analysis exports repeat every visit time three ways
//! and derive host and domain columns from the URL; decoding checks that
//! all of them agree and learns the export's UTC offset on the way.
//!
//! ## Modules
//!
//! - [`export`] - visit model, analysis codec, stream reader and writer
//! - [`capabilities`] - transition table, public suffix list, title policy
//! - [`parsers`] - Chrome `History` database extraction
//! - [`sink`] - JSONL and CSV visit output

pub mod capabilities;
pub mod cli;
pub mod config;
pub mod export;
pub mod logging;
pub mod parsers;
pub mod sink;
pub mod transition;
pub mod util;

pub use capabilities::Capabilities;
pub use export::{DecodeSession, EncodeSession, Visit, VisitError};
pub use transition::PageTransition;
