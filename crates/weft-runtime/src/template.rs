//! Bootstrap template generation.
//!
//! The bootstrap program is modeled as an explicit statement list and
//! rendered to source text at the end, so generation stays testable without
//! string-diffing. Rendering is deterministic: whitespace and ordering are
//! part of the contract, because the rendered text feeds the content hash.

use crate::container::{InitOptions, RuntimePluginRef};
use crate::state::FEDERATION_GLOBAL;

/// One statement of a generated program.
#[derive(Debug, Clone, PartialEq)]
pub enum BootstrapStmt {
    Import {
        local: String,
        specifier: String,
    },
    VarDecl {
        name: String,
        init: String,
    },
    /// `var name = [ items ]tail;` rendered one item per line.
    ArrayDecl {
        name: String,
        items: Vec<String>,
        tail: String,
    },
    Assign {
        target: String,
        value: String,
    },
    If {
        cond: String,
        body: Vec<BootstrapStmt>,
    },
    ForIn {
        binding: String,
        object: String,
        body: Vec<BootstrapStmt>,
    },
    Expr(String),
}

/// Ordered statement list rendered to byte-stable source text.
#[derive(Debug, Default)]
pub struct BootstrapProgram {
    stmts: Vec<BootstrapStmt>,
}

impl BootstrapProgram {
    pub fn new() -> BootstrapProgram {
        BootstrapProgram::default()
    }

    pub fn push(&mut self, stmt: BootstrapStmt) {
        self.stmts.push(stmt);
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for stmt in &self.stmts {
            render_stmt(stmt, 0, &mut out);
        }
        out
    }
}

fn render_stmt(stmt: &BootstrapStmt, depth: usize, out: &mut String) {
    let pad = "  ".repeat(depth);
    match stmt {
        BootstrapStmt::Import { local, specifier } => {
            out.push_str(&format!("{}import {} from '{}';\n", pad, local, specifier));
        }
        BootstrapStmt::VarDecl { name, init } => {
            out.push_str(&format!("{}var {} = {};\n", pad, name, init));
        }
        BootstrapStmt::ArrayDecl { name, items, tail } => {
            out.push_str(&format!("{}var {} = [\n", pad, name));
            for item in items {
                out.push_str(&format!("{}  {},\n", pad, item));
            }
            out.push_str(&format!("{}]{};\n", pad, tail));
        }
        BootstrapStmt::Assign { target, value } => {
            out.push_str(&format!("{}{} = {};\n", pad, target, value));
        }
        BootstrapStmt::If { cond, body } => {
            out.push_str(&format!("{}if ({}) {{\n", pad, cond));
            for inner in body {
                render_stmt(inner, depth + 1, out);
            }
            out.push_str(&format!("{}}}\n", pad));
        }
        BootstrapStmt::ForIn {
            binding,
            object,
            body,
        } => {
            out.push_str(&format!("{}for (var {} in {}) {{\n", pad, binding, object));
            for inner in body {
                render_stmt(inner, depth + 1, out);
            }
            out.push_str(&format!("{}}}\n", pad));
        }
        BootstrapStmt::Expr(expr) => {
            out.push_str(&format!("{}{};\n", pad, expr));
        }
    }
}

/// Generate the bootstrap program for a container.
///
/// The program imports the runtime implementation and each runtime plugin
/// (plugin order is application order), merges the implementation into the
/// realm's federation record without clobbering a prior install, and calls
/// `init` exactly once, guarded by presence checks. Identical inputs yield
/// byte-identical text.
pub fn render_bootstrap(runtime_plugins: &[RuntimePluginRef], runtime_impl_path: &str) -> String {
    let fed = FEDERATION_GLOBAL;
    let mut program = BootstrapProgram::new();

    program.push(BootstrapStmt::Import {
        local: "federation".to_string(),
        specifier: runtime_impl_path.to_string(),
    });

    let mut plugin_names = Vec::new();
    for (index, plugin) in runtime_plugins.iter().enumerate() {
        let local = format!("plugin_{}", index);
        program.push(BootstrapStmt::Import {
            local: local.clone(),
            specifier: plugin.as_str().to_string(),
        });
        plugin_names.push(local);
    }

    // Install the implementation, preserving fields a previous partial
    // install already set.
    program.push(BootstrapStmt::If {
        cond: format!("!{}.runtime", fed),
        body: vec![
            BootstrapStmt::VarDecl {
                name: "prevFederation".to_string(),
                init: fed.to_string(),
            },
            BootstrapStmt::Assign {
                target: fed.to_string(),
                value: "{}".to_string(),
            },
            BootstrapStmt::ForIn {
                binding: "key".to_string(),
                object: "federation".to_string(),
                body: vec![BootstrapStmt::Assign {
                    target: format!("{}[key]", fed),
                    value: "federation[key]".to_string(),
                }],
            },
            BootstrapStmt::ForIn {
                binding: "key".to_string(),
                object: "prevFederation".to_string(),
                body: vec![BootstrapStmt::Assign {
                    target: format!("{}[key]", fed),
                    value: "prevFederation[key]".to_string(),
                }],
            },
        ],
    });

    let mut init_body = Vec::new();
    if !plugin_names.is_empty() {
        // Skip plugin factories that resolve to a falsy value.
        init_body.push(BootstrapStmt::ArrayDecl {
            name: "pluginsToAdd".to_string(),
            items: plugin_names
                .iter()
                .map(|name| format!("{} ? ({}.default || {})() : false", name, name, name))
                .collect(),
            tail: ".filter(Boolean)".to_string(),
        });
        init_body.push(BootstrapStmt::Assign {
            target: format!("{}.initOptions.plugins", fed),
            value: format!(
                "{}.initOptions.plugins ? {}.initOptions.plugins.concat(pluginsToAdd) : pluginsToAdd",
                fed, fed
            ),
        });
    }
    init_body.push(BootstrapStmt::Assign {
        target: format!("{}.instance", fed),
        value: format!("{}.runtime.init({}.initOptions)", fed, fed),
    });
    // Optional capabilities: absence is not an error.
    init_body.push(BootstrapStmt::If {
        cond: format!("{}.attachShareScopeMap", fed),
        body: vec![BootstrapStmt::Expr(format!(
            "{}.attachShareScopeMap(require)",
            fed
        ))],
    });
    init_body.push(BootstrapStmt::If {
        cond: format!("{}.installInitialConsumes", fed),
        body: vec![BootstrapStmt::Expr(format!(
            "{}.installInitialConsumes()",
            fed
        ))],
    });

    program.push(BootstrapStmt::If {
        cond: format!("!{}.instance", fed),
        body: init_body,
    });

    program.render()
}

/// Generate the per-chunk runtime fragment that seeds `initOptions` before
/// any bootstrap runs.
pub fn render_runtime_fragment(init_options: &InitOptions) -> String {
    let fed = FEDERATION_GLOBAL;
    let options_literal =
        serde_json::to_string(init_options).expect("init options serialize to JSON");

    let mut program = BootstrapProgram::new();
    program.push(BootstrapStmt::If {
        cond: format!("!{}", fed),
        body: vec![BootstrapStmt::Assign {
            target: fed.to_string(),
            value: "{}".to_string(),
        }],
    });
    program.push(BootstrapStmt::If {
        cond: format!("!{}.initOptions", fed),
        body: vec![BootstrapStmt::Assign {
            target: format!("{}.initOptions", fed),
            value: options_literal,
        }],
    });
    program.render()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ContainerDescriptor;
    use std::path::Path;

    #[test]
    fn test_render_is_deterministic() {
        let plugins = vec![
            RuntimePluginRef::resolve("/p/a.js", Path::new("/")),
            RuntimePluginRef::resolve("/p/b.js", Path::new("/")),
        ];
        let first = render_bootstrap(&plugins, "/rt/impl.js");
        let second = render_bootstrap(&plugins, "/rt/impl.js");
        assert_eq!(first, second);
    }

    #[test]
    fn test_render_no_plugins_has_single_import() {
        let text = render_bootstrap(&[], "/rt/impl.js");
        assert!(text.contains("import federation from '/rt/impl.js';"));
        assert!(!text.contains("plugin_0"));
        assert!(!text.contains("pluginsToAdd"));
        assert!(text.contains("__FEDERATION__.instance = __FEDERATION__.runtime.init(__FEDERATION__.initOptions);"));
    }

    #[test]
    fn test_render_preserves_plugin_order() {
        let plugins = vec![
            RuntimePluginRef::resolve("/p/first.js", Path::new("/")),
            RuntimePluginRef::resolve("/p/second.js", Path::new("/")),
        ];
        let text = render_bootstrap(&plugins, "/rt/impl.js");
        let first = text.find("/p/first.js").unwrap();
        let second = text.find("/p/second.js").unwrap();
        assert!(first < second);
        assert!(text.contains("plugin_0 ? (plugin_0.default || plugin_0)() : false"));
    }

    #[test]
    fn test_distinct_inputs_render_differently() {
        let a = render_bootstrap(&[], "/rt/impl.js");
        let b = render_bootstrap(&[], "/rt/other.js");
        assert_ne!(a, b);
    }

    #[test]
    fn test_generated_bootstrap_parses_in_payload_dialect() {
        let plugins = vec![RuntimePluginRef::resolve("/p/a.js", Path::new("/"))];
        let text = render_bootstrap(&plugins, "/rt/impl.js");
        weft_script::Script::parse(&text).unwrap();
    }

    #[test]
    fn test_runtime_fragment_seeds_init_options() {
        let descriptor = ContainerDescriptor::new("app1");
        let options = InitOptions::without_shared(&descriptor, vec![]);
        let text = render_runtime_fragment(&options);
        assert!(text.contains("if (!__FEDERATION__.initOptions) {"));
        assert!(text.contains("\"name\":\"app1\""));
        weft_script::Script::parse(&text).unwrap();
    }
}
