//! Data models shared by the pipeline stages.

pub mod config;
pub mod page;
pub mod selection;
pub mod table;
pub mod text;

pub use selection::parse_page_spec;
