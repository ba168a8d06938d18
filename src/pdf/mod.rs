pub mod document;
pub mod provider;
pub mod reader;
