//! Test utilities for pipeline tests.
//!
//! This module provides a scripted completion driver and story fixtures.

pub mod mock_driver;

#[allow(unused_imports)]
pub use mock_driver::{MockDriver, MockResponse, test_settings};
