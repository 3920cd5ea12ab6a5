// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! chainwarden
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Facade over the Chainwarden workspace: one `use chainwarden::…` away
//! from the whole engine.

pub use cwn_actions as actions;
pub use cwn_cache as cache;
pub use cwn_config as config;
pub use cwn_core as core;
pub use cwn_engine as engine;
pub use cwn_executor as executor;
pub use cwn_fs as fs;
pub use cwn_ingest as ingest;
pub use cwn_provider as provider;
pub use cwn_select as select;
pub use cwn_store as store;
pub use cwn_telemetry as telemetry;

pub use cwn_core::{
    Entity, EntityEvent, EntityKind, EvaluationOutcome, Profile, Properties, RuleStatus, RuleType,
};
pub use cwn_executor::{CancellationToken, EntityCreator, Executor, MessageBus};
