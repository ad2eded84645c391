//! contentci core: shared library for CI test selection and detection generation.
//!
//! Two independent flows live here:
//! - selection: [`repository`] + [`pruner`] decide which detection tests a CI
//!   job runs against a checkout of the content repository;
//! - generation: [`catalog`] turns a LOLBAS-style binary catalog into
//!   detection and test YAML files.
//!
//! The CLI crate is a thin front-end over these modules.

pub mod catalog;
pub mod config;
pub mod detection;
pub mod env;
pub mod pruner;
pub mod repository;

pub use config::RunConfig;
