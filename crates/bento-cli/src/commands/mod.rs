//! Command implementations.
//!
//! - [`build`] - resolve the config and build, once or in watch mode

pub mod build;

pub use build::execute as build_execute;
