//! wraith web server.
//!
//! Serves the site, drives OAuth2 logins against the configured identity
//! providers, and gates protected pages on the caller's roles.

pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod pages;
pub mod render;
pub mod router;
