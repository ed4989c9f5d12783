//! vfxupload - tag VFX renders and upload them to their shot folders
//!
//! This library crate exposes the pipeline for the binary and for
//! integration testing.

pub mod app;
pub mod catalog;
pub mod config;
pub mod history;
pub mod pipeline;
pub mod state;
pub mod store;
