//! sopgen - build Standard Operating Procedure documents step by step
//!
//! Steps (a screenshot plus instructions) and document metadata are kept in a
//! [`session::Session`], autosaved to a state directory after every change,
//! and exported as a Word document.

pub mod config;
pub mod export;
pub mod logging;
pub mod persistence;
pub mod session;
pub mod types;
