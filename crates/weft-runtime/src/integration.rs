//! Build-integration contracts and the bootstrap injector.
//!
//! The build tool's compilation pipeline is an external collaborator. Only
//! three narrow shapes cross the boundary: register an artifact as a
//! must-include entry, ask whether a chunk newly needs a runtime
//! capability, and attach a generated runtime fragment to a chunk. The
//! core never inspects the collaborator's internal graph structures.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::cache::{ArtifactLocation, BootstrapDescriptor, Materializer};
use crate::container::{ContainerDescriptor, InitOptions, RemoteInfo};
use crate::error::{InjectError, IntegrationError};
use crate::guard::ApplyOnce;
use crate::state::FEDERATION_GLOBAL;
use crate::template::render_runtime_fragment;

/// Options accompanying a must-include entry registration.
#[derive(Debug, Clone, Default)]
pub struct EntryOptions {
    /// Entry name; None registers a nameless include.
    pub name: Option<String>,
}

/// A generated runtime fragment to attach to a chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeFragment {
    pub name: String,
    pub source: String,
}

/// The three shapes the core consumes from the build-integration
/// collaborator.
pub trait BuildIntegration {
    /// Register an artifact as a must-include entry for a compilation.
    fn register_must_include_entry(
        &mut self,
        context: &Path,
        artifact: &ArtifactLocation,
        options: &EntryOptions,
    ) -> Result<(), IntegrationError>;

    /// Record that a chunk needs an optional runtime capability. Returns
    /// true when the requirement was newly added for this chunk.
    fn notify_runtime_capability_needed(&mut self, chunk: &str, requirement: &str) -> bool;

    /// Attach a generated runtime fragment to a chunk.
    fn attach_generated_runtime_fragment(&mut self, chunk: &str, fragment: RuntimeFragment);
}

/// Identity of one build/compile target, owned by the collaborator.
#[derive(Debug)]
pub struct CompileTarget {
    pub name: String,
    pub context: PathBuf,
}

/// Wires bootstrap injection into a compile target: ensures the bootstrap
/// artifact exists, registers it as a must-include entry, records runtime
/// aliases, and attaches the per-chunk runtime fragment on demand. Applying
/// the injector repeatedly to the same target is a no-op.
pub struct BootstrapInjector {
    options: ContainerDescriptor,
    materializer: Materializer,
    runtime_impl_path: String,
    remotes: Vec<RemoteInfo>,
    inline: bool,
    entry: RefCell<Option<BootstrapDescriptor>>,
    aliases: RefCell<Vec<(String, String)>>,
    once: ApplyOnce,
}

/// Specifier aliased to the concrete runtime implementation.
pub const RUNTIME_ALIAS: &str = "@weft/runtime";

impl BootstrapInjector {
    pub fn new(
        options: ContainerDescriptor,
        materializer: Materializer,
        runtime_impl_path: &str,
    ) -> BootstrapInjector {
        BootstrapInjector {
            options,
            materializer,
            runtime_impl_path: runtime_impl_path.to_string(),
            remotes: Vec::new(),
            inline: false,
            entry: RefCell::new(None),
            aliases: RefCell::new(Vec::new()),
            once: ApplyOnce::new(),
        }
    }

    /// Remote containers to hand to runtime init.
    pub fn with_remotes(mut self, remotes: Vec<RemoteInfo>) -> BootstrapInjector {
        self.remotes = remotes;
        self
    }

    /// Materialize the bootstrap as a self-contained data artifact instead
    /// of a cache file.
    pub fn with_inline_entry(mut self, inline: bool) -> BootstrapInjector {
        self.inline = inline;
        self
    }

    pub fn options(&self) -> &ContainerDescriptor {
        &self.options
    }

    /// The bootstrap artifact for this container, materialized on first
    /// access and memoized for the injector's lifetime.
    pub fn entry_artifact(&self) -> Result<BootstrapDescriptor, InjectError> {
        if let Some(descriptor) = self.entry.borrow().as_ref() {
            return Ok(descriptor.clone());
        }
        let descriptor = self.materializer.materialize(
            &self.options.name,
            &self.options.runtime_plugins,
            &self.runtime_impl_path,
            self.inline,
        )?;
        *self.entry.borrow_mut() = Some(descriptor.clone());
        Ok(descriptor)
    }

    /// Apply bootstrap injection to a compile target, at most once per
    /// live target. A failed apply does not consume the target's slot;
    /// the caller can retry after fixing the cause.
    pub fn apply(
        &self,
        target: &Rc<CompileTarget>,
        integration: &mut dyn BuildIntegration,
    ) -> Result<(), InjectError> {
        self.once
            .try_once(target, || self.apply_inner(target, integration))?;
        Ok(())
    }

    fn apply_inner(
        &self,
        target: &Rc<CompileTarget>,
        integration: &mut dyn BuildIntegration,
    ) -> Result<(), InjectError> {
        let descriptor = self.entry_artifact()?;
        integration.register_must_include_entry(
            &target.context,
            &descriptor.location,
            &EntryOptions { name: None },
        )?;
        self.set_runtime_alias();
        Ok(())
    }

    /// Called by the collaborator when it processes a chunk; attaches the
    /// runtime fragment if the chunk newly needs the federation capability.
    /// Returns true when a fragment was attached.
    pub fn attach_runtime_to_chunk(
        &self,
        chunk: &str,
        integration: &mut dyn BuildIntegration,
    ) -> bool {
        if !integration.notify_runtime_capability_needed(chunk, FEDERATION_GLOBAL) {
            return false;
        }
        let init_options = InitOptions::without_shared(&self.options, self.remotes.clone());
        integration.attach_generated_runtime_fragment(
            chunk,
            RuntimeFragment {
                name: format!("{} federation runtime", self.options.name),
                source: render_runtime_fragment(&init_options),
            },
        );
        true
    }

    /// Record resolve aliases for the federation runtime specifiers. An
    /// alias set earlier wins; re-application never overrides.
    fn set_runtime_alias(&self) {
        let mut aliases = self.aliases.borrow_mut();
        if !aliases.iter().any(|(key, _)| key == RUNTIME_ALIAS) {
            aliases.push((RUNTIME_ALIAS.to_string(), self.runtime_impl_path.clone()));
        }
    }

    /// Aliases recorded for the integration layer to consume.
    pub fn runtime_aliases(&self) -> Vec<(String, String)> {
        self.aliases.borrow().clone()
    }
}

/// In-memory integration double that records every contract call.
#[derive(Debug, Default)]
pub struct RecordingIntegration {
    pub entries: Vec<(PathBuf, String, EntryOptions)>,
    pub requirements: Vec<(String, String)>,
    pub fragments: Vec<(String, RuntimeFragment)>,
}

impl BuildIntegration for RecordingIntegration {
    fn register_must_include_entry(
        &mut self,
        context: &Path,
        artifact: &ArtifactLocation,
        options: &EntryOptions,
    ) -> Result<(), IntegrationError> {
        self.entries
            .push((context.to_path_buf(), artifact.reference(), options.clone()));
        Ok(())
    }

    fn notify_runtime_capability_needed(&mut self, chunk: &str, requirement: &str) -> bool {
        let known = self
            .requirements
            .iter()
            .any(|(c, r)| c == chunk && r == requirement);
        if known {
            return false;
        }
        self.requirements
            .push((chunk.to_string(), requirement.to_string()));
        true
    }

    fn attach_generated_runtime_fragment(&mut self, chunk: &str, fragment: RuntimeFragment) {
        self.fragments.push((chunk.to_string(), fragment));
    }
}
