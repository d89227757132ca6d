// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![warn(missing_docs)]                // All public items must be documented
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::panic))]

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # oam-ecs
//!
//! Deploys Open Application Model applications to Amazon ECS on Fargate
//! through CloudFormation stacks.
//!
//! ## Overview
//!
//! oam-ecs reads OAM `core.oam.dev/v1alpha1` documents and turns every
//! component instance into its own CloudFormation stack:
//!
//! - Load an application configuration and its component schematics
//! - Render one stack template per component instance
//! - Create, update or clean up each stack through change sets
//! - Write templates locally instead with a dry run
//!
//! ## Architecture
//!
//! Deployment is **observe, decide, act** per stack:
//!
//! 1. **Observe**: describe the stack by its deterministic name
//! 2. **Decide**: absent, failed, in progress or healthy
//! 3. **Act**: create, delete and re-create, refuse, or update
//!
//! Re-running a deployment without changes is a no-op.
//!
//! ## Modules
//!
//! - [`oam`]: Document model, registry and loader
//! - [`stack`]: Stack configurations, templates and Fargate sizing
//! - [`cloudformation`]: Provider seam, change sets and orchestration
//! - [`application`]: Per-application driver
//! - [`settings`]: Tool settings
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! apiVersion: core.oam.dev/v1alpha1
//! kind: ApplicationConfiguration
//! metadata:
//!   name: shop
//! spec:
//!   components:
//!     - componentName: frontend
//!       instanceName: shop-frontend
//!       traits:
//!         - name: manual-scaler
//!           properties:
//!             replicaCount: 2
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod application;
pub mod cli;
pub mod cloudformation;
pub mod error;
pub mod oam;
pub mod settings;
pub mod stack;

// ============================================================================
// Re-exports
// ============================================================================

pub use application::{ApplicationDeployer, ApplyOutcome};
pub use cli::{Cli, Commands, OutputFormatter};
pub use cloudformation::{AwsCloudFormationClient, CloudFormation, CloudFormationApi, Waiter};
pub use error::{OamError, Result};
pub use oam::{OamWorkload, WorkloadLoader};
pub use settings::Settings;
pub use stack::{Component, ComponentStackConfig, EnvStackConfig, Environment, StackConfiguration};
