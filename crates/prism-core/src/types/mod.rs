//! Core type definitions used across the Prism workspace.

pub mod id;

pub use id::*;
