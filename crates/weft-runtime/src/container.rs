//! Container and runtime-plugin descriptors.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Convert a path to a platform-independent forward-slash string.
pub fn normalize_to_posix(path: &Path) -> String {
    let raw = path.to_string_lossy();
    if raw.contains('\\') {
        raw.replace('\\', "/")
    } else {
        raw.into_owned()
    }
}

/// A runtime-plugin reference, resolved to an absolute forward-slash path
/// at construction. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuntimePluginRef(String);

impl RuntimePluginRef {
    /// Resolve a filesystem path or package specifier against the given
    /// context directory.
    pub fn resolve(specifier: &str, context: &Path) -> RuntimePluginRef {
        let path = PathBuf::from(specifier);
        let absolute = if path.is_absolute() {
            path
        } else {
            context.join(path)
        };
        RuntimePluginRef(normalize_to_posix(&absolute))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Options for one exposed module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposeOptions {
    /// Module request backing the exposed path.
    pub import: String,
    /// Explicit public name; defaults to the exposed path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Identity and configuration of one federated container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerDescriptor {
    /// Container name, unique within a composed application.
    pub name: String,
    /// Exposed modules, in declaration order.
    #[serde(default)]
    pub exposes: Vec<(String, ExposeOptions)>,
    /// Share scope this container participates in.
    pub share_scope: String,
    /// Runtime plugins, in application order.
    #[serde(default)]
    pub runtime_plugins: Vec<RuntimePluginRef>,
}

impl ContainerDescriptor {
    pub fn new(name: &str) -> ContainerDescriptor {
        ContainerDescriptor {
            name: name.to_string(),
            exposes: Vec::new(),
            share_scope: "default".to_string(),
            runtime_plugins: Vec::new(),
        }
    }

    /// Identifier used to merge equal container-entry requests.
    pub fn resource_identifier(&self) -> String {
        format!("container-entry-{}", self.name)
    }
}

/// A remote container reference handed to runtime init.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteInfo {
    pub name: String,
    pub entry: String,
    #[serde(rename = "shareScope")]
    pub share_scope: String,
}

/// Options passed to the runtime's one-time `init` call.
///
/// Share configuration is deliberately excluded: version negotiation for
/// shared dependencies belongs to the runtime, not to this subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitOptions {
    pub name: String,
    pub remotes: Vec<RemoteInfo>,
}

impl InitOptions {
    /// Derive init options from a container descriptor, without shared
    /// configuration.
    pub fn without_shared(descriptor: &ContainerDescriptor, remotes: Vec<RemoteInfo>) -> InitOptions {
        InitOptions {
            name: descriptor.name.clone(),
            remotes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_ref_absolute_path_kept() {
        let plugin = RuntimePluginRef::resolve("/plugins/p.js", Path::new("/work"));
        assert_eq!(plugin.as_str(), "/plugins/p.js");
    }

    #[test]
    fn test_plugin_ref_relative_path_joined() {
        let plugin = RuntimePluginRef::resolve("plugins/p.js", Path::new("/work"));
        assert_eq!(plugin.as_str(), "/work/plugins/p.js");
    }

    #[test]
    fn test_normalize_to_posix_replaces_backslashes() {
        assert_eq!(
            normalize_to_posix(Path::new(r"C:\work\plugin.js")),
            "C:/work/plugin.js"
        );
    }

    #[test]
    fn test_resource_identifier() {
        let descriptor = ContainerDescriptor::new("app1");
        assert_eq!(descriptor.resource_identifier(), "container-entry-app1");
    }

    #[test]
    fn test_init_options_serialize_stable() {
        let options = InitOptions {
            name: "app1".to_string(),
            remotes: vec![RemoteInfo {
                name: "dep".to_string(),
                entry: "https://cdn.test/dep.js".to_string(),
                share_scope: "default".to_string(),
            }],
        };
        let a = serde_json::to_string(&options).unwrap();
        let b = serde_json::to_string(&options).unwrap();
        assert_eq!(a, b);
        assert!(a.contains("\"shareScope\":\"default\""));
    }
}
