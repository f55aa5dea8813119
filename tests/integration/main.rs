//! Integration tests for Site-Sentinel
//!
//! These tests use wiremock to create mock HTTP servers and run complete
//! validations against them.

mod common;
mod crawl_tests;
mod deadline_tests;
mod output_tests;
mod render_tests;
mod scope_tests;
