//! distpkg: a dist-git build client for a Koji-style build hub
//!
//! The pipeline runs in a fixed order: resolve the per-package workspace,
//! locate the spec file, reconcile source artifacts, resolve the build
//! target on the hub, and submit. Everything is synchronous and
//! single-threaded; external tools are driven with argument vectors and the
//! hub is reached over JSON HTTP behind the [`hub::BuildHub`] trait.

pub mod checksum;
pub mod commands;
pub mod config;
pub mod git;
pub mod hub;
pub mod index;
pub mod process;
pub mod sources;
pub mod spec;
pub mod srpm;
pub mod submit;
pub mod upload;
pub mod workspace;
