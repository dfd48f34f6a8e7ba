//! Ebook authoring core and generation relay.
//!
//! The library drives outline generation, chapter drafting and illustration
//! through a [`services::backend::GenerationBackend`], persists projects with
//! a local fallback, and exports finished books. The binary serves the relay
//! endpoints from [`api`].

pub mod api;
pub mod config;
pub mod context;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use api::{AppState, build_router};
