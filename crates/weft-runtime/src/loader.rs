//! Cross-environment script loader.
//!
//! Resolves a location to executable source text through the correct
//! channel (file read or network fetch), executes it in an isolated
//! evaluation context with a synthetic `exports`/`module` surface, and
//! returns the exported interface. Each call performs a fresh read/fetch
//! and a fresh execution; memoization belongs to the caller, which can
//! check the published global key first.

use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use url::Url;

use weft_script::{Evaluator, ModuleResolver, NativeFunction, Object, Script, ScriptError, Value};

use crate::error::LoadError;
use crate::state::{remote_entry_key, Realm};

/// HTTP client configuration
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-load attributes.
#[derive(Debug, Clone, Default)]
pub struct ScriptAttrs {
    /// The container's declared name; used for the published global key.
    pub name: Option<String>,
    /// Specific export to extract, and the global key to publish under.
    pub global_name: Option<String>,
}

impl ScriptAttrs {
    pub fn named(name: &str) -> ScriptAttrs {
        ScriptAttrs {
            name: Some(name.to_string()),
            global_name: None,
        }
    }
}

/// Hook that may rewrite a location before resolution.
pub trait PreloadHook {
    /// Return a replacement location, or None to keep the original.
    fn rewrite(&self, location: &str) -> Option<String>;
}

impl<F> PreloadHook for F
where
    F: Fn(&str) -> Option<String>,
{
    fn rewrite(&self, location: &str) -> Option<String> {
        self(location)
    }
}

/// Options for the publishing [`ScriptLoader::load`] wrapper.
#[derive(Default)]
pub struct LoadInfo {
    pub attrs: ScriptAttrs,
    pub preload_hook: Option<Box<dyn PreloadHook>>,
}

/// Loads and executes script artifacts into a realm.
pub struct ScriptLoader {
    realm: Realm,
    host_resolver: Option<Rc<dyn ModuleResolver>>,
    client: OnceCell<reqwest::Client>,
}

impl ScriptLoader {
    pub fn new(realm: Realm) -> ScriptLoader {
        ScriptLoader {
            realm,
            host_resolver: None,
            client: OnceCell::new(),
        }
    }

    /// Loader whose remote payloads resolve `require` calls through the
    /// host's ambient module graph.
    pub fn with_host_resolver(realm: Realm, resolver: Rc<dyn ModuleResolver>) -> ScriptLoader {
        ScriptLoader {
            realm,
            host_resolver: Some(resolver),
            client: OnceCell::new(),
        }
    }

    pub fn realm(&self) -> &Realm {
        &self.realm
    }

    /// Fetch capability, built lazily on first remote load.
    fn client(&self) -> &reqwest::Client {
        self.client.get_or_init(|| {
            reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .user_agent(concat!("weft-runtime/", env!("CARGO_PKG_VERSION")))
                .build()
                .expect("Failed to create HTTP client")
        })
    }

    /// Resolve, execute, and return the exported interface.
    pub async fn create_script(
        &self,
        location: &str,
        attrs: Option<&ScriptAttrs>,
        preload_hook: Option<&dyn PreloadHook>,
    ) -> Result<Value, LoadError> {
        if location.is_empty() {
            return Err(LoadError::InvalidLocation(
                "empty location specifier".to_string(),
            ));
        }

        let location = match preload_hook.and_then(|hook| hook.rewrite(location)) {
            Some(rewritten) => rewritten,
            None => location.to_string(),
        };

        if is_remote(&location) {
            self.load_remote(&location, attrs).await
        } else {
            self.load_local(&location).await
        }
    }

    /// Load and publish the exported interface under the well-known global
    /// key, so later code can locate the container without re-loading.
    ///
    /// Without a global name or a container name the interface is published
    /// under `__FEDERATION_undefined:custom__`, keeping the misuse visible
    /// in the realm rather than hiding it behind an anonymous key.
    pub async fn load(&self, location: &str, info: &LoadInfo) -> Result<Value, LoadError> {
        let exported = self
            .create_script(location, Some(&info.attrs), info.preload_hook.as_deref())
            .await?;
        let key = match &info.attrs.global_name {
            Some(global_name) => global_name.clone(),
            None => remote_entry_key(info.attrs.name.as_deref().unwrap_or("undefined")),
        };
        self.realm.set(&key, exported.clone());
        Ok(exported)
    }

    async fn load_local(&self, location: &str) -> Result<Value, LoadError> {
        let path = PathBuf::from(location);
        let abs_path = if path.is_absolute() {
            path
        } else {
            std::env::current_dir()?.join(path)
        };
        if !abs_path.exists() {
            return Err(LoadError::NotFound(abs_path));
        }
        let content = tokio::fs::read_to_string(&abs_path).await?;
        execute_local_source(&abs_path, &content, &self.realm, self.host_resolver.clone())
    }

    async fn load_remote(
        &self,
        location: &str,
        attrs: Option<&ScriptAttrs>,
    ) -> Result<Value, LoadError> {
        let url = Url::parse(location)
            .map_err(|e| LoadError::InvalidLocation(format!("{}: {}", location, e)))?;

        let response = self
            .client()
            .get(url.clone())
            .send()
            .await
            .map_err(|e| LoadError::FetchFailure {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::FetchFailure {
                url: url.to_string(),
                reason: format!("HTTP {}", status.as_u16()),
            });
        }
        let body = response
            .text()
            .await
            .map_err(|e| LoadError::FetchFailure {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        // Synthesize the execution context from the URL's path segments.
        let (dirname, filename) = split_url_path(url.path());
        let resolver: Rc<dyn ModuleResolver> = Rc::new(AmbientResolver {
            host: self.host_resolver.clone(),
        });
        let exported = run_isolated(&Script::parse(&body)?, &self.realm, resolver, &dirname, &filename)?;

        // A requested global name selects that named export.
        if let Some(global_name) = attrs.and_then(|a| a.global_name.as_deref()) {
            let named = match &exported {
                Value::Object(obj) => obj.borrow().get(global_name).unwrap_or(Value::Undefined),
                _ => Value::Undefined,
            };
            return Ok(named);
        }
        Ok(exported)
    }
}

/// A location without a URL scheme is a filesystem path.
fn is_remote(location: &str) -> bool {
    let lower = location.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("//")
}

/// Split a URL pathname into (dirname, filename).
fn split_url_path(pathname: &str) -> (String, String) {
    match pathname.rfind('/') {
        Some(idx) => (pathname[..idx].to_string(), pathname[idx + 1..].to_string()),
        None => (String::new(), pathname.to_string()),
    }
}

/// Execute local source in an isolated context. `require` resolves relative
/// specifiers against the file's own directory, absolute specifiers as-is,
/// and bare specifiers through the host resolver if one exists.
fn execute_local_source(
    path: &Path,
    content: &str,
    realm: &Realm,
    host: Option<Rc<dyn ModuleResolver>>,
) -> Result<Value, LoadError> {
    let script = Script::parse(content)?;
    let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let dirname = crate::container::normalize_to_posix(&dir);
    let resolver: Rc<dyn ModuleResolver> = Rc::new(LocalResolver {
        dir,
        realm: realm.clone(),
        host,
    });
    run_isolated(&script, realm, resolver, &dirname, &filename)
}

/// Constrained resolver for locally loaded files.
struct LocalResolver {
    dir: PathBuf,
    realm: Realm,
    host: Option<Rc<dyn ModuleResolver>>,
}

impl ModuleResolver for LocalResolver {
    fn resolve(&self, specifier: &str) -> Result<Value, ScriptError> {
        let path = Path::new(specifier);
        let real_path = if path.is_absolute() {
            path.to_path_buf()
        } else if specifier.starts_with("./") || specifier.starts_with("../") {
            self.dir.join(specifier)
        } else {
            // Bare specifier: the host's own module graph.
            return match &self.host {
                Some(host) => host.resolve(specifier),
                None => Err(ScriptError::Eval(format!(
                    "cannot resolve module '{}'",
                    specifier
                ))),
            };
        };
        if !real_path.exists() {
            return Err(ScriptError::Eval(format!(
                "cannot find module '{}'",
                real_path.display()
            )));
        }
        let content = std::fs::read_to_string(&real_path).map_err(|e| {
            ScriptError::Eval(format!("failed to read '{}': {}", real_path.display(), e))
        })?;
        execute_local_source(&real_path, &content, &self.realm, self.host.clone())
            .map_err(|e| ScriptError::Eval(e.to_string()))
    }
}

/// Remote payloads resolve `require` against the host's module graph; the
/// payload is trusted to reference host-visible modules.
struct AmbientResolver {
    host: Option<Rc<dyn ModuleResolver>>,
}

impl ModuleResolver for AmbientResolver {
    fn resolve(&self, specifier: &str) -> Result<Value, ScriptError> {
        match &self.host {
            Some(host) => host.resolve(specifier),
            None => Err(ScriptError::Eval(format!(
                "no ambient module resolver for '{}'",
                specifier
            ))),
        }
    }
}

/// Run a parsed payload with a fresh `exports`/`module` surface and return
/// the exported interface (`module.exports` if truthy, else `exports`).
fn run_isolated(
    script: &Script,
    realm: &Realm,
    resolver: Rc<dyn ModuleResolver>,
    dirname: &str,
    filename: &str,
) -> Result<Value, LoadError> {
    let module = Object::shared();
    module.borrow_mut().set("exports", Value::object());
    let exports = Value::object();

    let require = {
        let resolver = resolver.clone();
        NativeFunction::new("require", move |args| {
            let specifier = args
                .first()
                .and_then(Value::as_str)
                .ok_or_else(|| ScriptError::Eval("require expects a specifier".to_string()))?;
            resolver.resolve(specifier)
        })
    };

    let evaluator = Evaluator::with_resolver(realm.globals().clone(), resolver);
    evaluator.run(
        script,
        vec![
            ("exports".to_string(), exports.clone()),
            ("module".to_string(), Value::Object(module.clone())),
            ("require".to_string(), require),
            ("__dirname".to_string(), Value::string(dirname)),
            ("__filename".to_string(), Value::string(filename)),
        ],
    )?;

    let module_exports = module.borrow().get("exports").unwrap_or(Value::Undefined);
    if module_exports.is_truthy() {
        Ok(module_exports)
    } else {
        Ok(exports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use weft_script::call_value;

    fn write(path: &Path, content: &str) {
        fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn test_local_missing_file_is_not_found() {
        let loader = ScriptLoader::new(Realm::new());
        let result = loader
            .create_script("/no/such/remote.js", None, None)
            .await;
        assert!(matches!(result, Err(LoadError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_local_module_exports_interface() {
        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().join("remote.js");
        write(&entry, "module.exports = { greet: () => 'hi' };");

        let loader = ScriptLoader::new(Realm::new());
        let exported = loader
            .create_script(entry.to_str().unwrap(), None, None)
            .await
            .unwrap();
        let greet = exported.as_object().unwrap().borrow().get("greet").unwrap();
        assert_eq!(call_value(&greet, &[]).unwrap().as_str(), Some("hi"));
    }

    #[tokio::test]
    async fn test_local_exports_object_used_when_module_exports_falsy() {
        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().join("remote.js");
        write(
            &entry,
            "module.exports = null;\nexports.tag = 'from-exports';",
        );

        let loader = ScriptLoader::new(Realm::new());
        let exported = loader
            .create_script(entry.to_str().unwrap(), None, None)
            .await
            .unwrap();
        let tag = exported.as_object().unwrap().borrow().get("tag").unwrap();
        assert_eq!(tag.as_str(), Some("from-exports"));
    }

    #[tokio::test]
    async fn test_local_require_resolves_relative_to_file() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("dep.js"), "module.exports = { n: 41 };");
        let entry = dir.path().join("remote.js");
        write(
            &entry,
            "var dep = require('./dep.js');\nmodule.exports = { n: dep.n + 1 };",
        );

        let loader = ScriptLoader::new(Realm::new());
        let exported = loader
            .create_script(entry.to_str().unwrap(), None, None)
            .await
            .unwrap();
        let n = exported.as_object().unwrap().borrow().get("n").unwrap();
        assert_eq!(n.as_number(), Some(42.0));
    }

    #[tokio::test]
    async fn test_local_execution_error_is_execution_failure() {
        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().join("remote.js");
        write(&entry, "boom();");

        let realm = Realm::new();
        let loader = ScriptLoader::new(realm.clone());
        let result = loader
            .load(
                entry.to_str().unwrap(),
                &LoadInfo {
                    attrs: ScriptAttrs::named("app1"),
                    preload_hook: None,
                },
            )
            .await;
        assert!(matches!(result, Err(LoadError::ExecutionFailure(_))));
        // No interface published on failure.
        assert!(realm.get(&remote_entry_key("app1")).is_none());
    }

    #[tokio::test]
    async fn test_load_publishes_under_remote_entry_key() {
        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().join("remote.js");
        write(&entry, "module.exports = { ok: true };");

        let realm = Realm::new();
        let loader = ScriptLoader::new(realm.clone());
        let exported = loader
            .load(
                entry.to_str().unwrap(),
                &LoadInfo {
                    attrs: ScriptAttrs::named("app1"),
                    preload_hook: None,
                },
            )
            .await
            .unwrap();
        let published = realm.get(&remote_entry_key("app1")).unwrap();
        assert!(published.strict_eq(&exported));
    }

    #[tokio::test]
    async fn test_load_without_identity_publishes_under_undefined_key() {
        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().join("remote.js");
        write(&entry, "module.exports = { ok: true };");

        let realm = Realm::new();
        let loader = ScriptLoader::new(realm.clone());
        loader
            .load(entry.to_str().unwrap(), &LoadInfo::default())
            .await
            .unwrap();
        assert!(realm.get("__FEDERATION_undefined:custom__").is_some());
    }

    #[tokio::test]
    async fn test_preload_hook_rewrites_location() {
        let dir = tempfile::tempdir().unwrap();
        let actual = dir.path().join("actual.js");
        write(&actual, "module.exports = { via: 'hook' };");

        let loader = ScriptLoader::new(Realm::new());
        let rewritten = actual.to_str().unwrap().to_string();
        let hook = move |location: &str| {
            assert_eq!(location, "/virtual/entry.js");
            Some(rewritten.clone())
        };
        let exported = loader
            .create_script("/virtual/entry.js", None, Some(&hook))
            .await
            .unwrap();
        let via = exported.as_object().unwrap().borrow().get("via").unwrap();
        assert_eq!(via.as_str(), Some("hook"));
    }

    #[tokio::test]
    async fn test_empty_location_is_invalid() {
        let loader = ScriptLoader::new(Realm::new());
        let result = loader.create_script("", None, None).await;
        assert!(matches!(result, Err(LoadError::InvalidLocation(_))));
    }

    #[test]
    fn test_location_classification() {
        assert!(is_remote("https://cdn.test/entry.js"));
        assert!(is_remote("HTTP://cdn.test/entry.js"));
        assert!(is_remote("//cdn.test/entry.js"));
        assert!(!is_remote("/srv/entry.js"));
        assert!(!is_remote("./entry.js"));
        assert!(!is_remote("data:text/javascript;base64,AA=="));
    }

    #[test]
    fn test_split_url_path() {
        assert_eq!(
            split_url_path("/container/remote-entry.js"),
            ("/container".to_string(), "remote-entry.js".to_string())
        );
    }
}
