// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for the daemon's external collaborators: the repository hosting
//! user evaluation code and the launcher that starts runs

pub mod launcher;
pub mod repository;
pub mod traced;

pub use launcher::{LaunchError, NoOpRunLauncher, ProcessRunLauncher, RunLauncher};
pub use repository::{CommandRepository, CommandTrigger, Repository, RepositoryError};
pub use traced::{TracedRepository, TracedRunLauncher};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use launcher::{FakeRunLauncher, LaunchCall};
#[cfg(any(test, feature = "test-support"))]
pub use repository::{FakeRepository, RepositoryCall};
