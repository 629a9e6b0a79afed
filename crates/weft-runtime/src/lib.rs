//! Weft Runtime
//!
//! Runtime bootstrap and dynamic-load subsystem for module federation:
//! independently built containers expose and consume modules from one
//! another at run time, sharing a single federation runtime per execution
//! realm.
//!
//! The pieces, leaves first:
//! - [`state`] — the realm-wide federation record and its merge rule;
//! - [`template`] — deterministic bootstrap/fragment generation;
//! - [`cache`] — content-addressed materialization of bootstrap artifacts;
//! - [`loader`] — the cross-environment script loader;
//! - [`guard`] — the once-per-target apply guard;
//! - [`integration`] — the narrow build-integration contracts.

pub mod cache;
pub mod container;
pub mod error;
pub mod guard;
pub mod integration;
pub mod loader;
pub mod state;
pub mod template;

pub use cache::{ArtifactLocation, BootstrapDescriptor, Materializer};
pub use container::{ContainerDescriptor, ExposeOptions, InitOptions, RemoteInfo, RuntimePluginRef};
pub use error::{CacheError, InjectError, IntegrationError, LoadError};
pub use guard::ApplyOnce;
pub use integration::{
    BootstrapInjector, BuildIntegration, CompileTarget, EntryOptions, RecordingIntegration,
    RuntimeFragment,
};
pub use loader::{LoadInfo, PreloadHook, ScriptAttrs, ScriptLoader};
pub use state::{remote_entry_key, FederationView, Realm, FEDERATION_GLOBAL};
pub use template::{render_bootstrap, render_runtime_fragment, BootstrapProgram, BootstrapStmt};

// The script engine's value surface is part of this crate's public API.
pub use weft_script::{call_value, ModuleResolver, Value};
