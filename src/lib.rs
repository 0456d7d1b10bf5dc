//! modscope - browse, preview and manage applied mod records
//!
//! Records are grouped into a pack / category / item tree. Selecting an
//! item decodes every texture, material and model behind it into preview
//! rows on a background thread.

pub mod archive;
pub mod catalog;
pub mod classify;
pub mod config;
pub mod paths;
pub mod preview;
