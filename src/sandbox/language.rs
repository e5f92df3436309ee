/// Language strategies for the execution sandbox
///
/// Each strategy knows how to wrap a workflow's code body into a runnable
/// program and which interpreter runs it. The wrapper defines `run(input)`,
/// calls it, and prints exactly one JSON envelope line:
/// `{"success": true, "data": ...}` or `{"success": false, "error": "..."}`.

use crate::config::SandboxConfig;
use crate::error::{EngineError, EngineResult};
use serde_json::Value;
use std::{collections::HashMap, sync::Arc};

/// Wrapper generation + interpreter invocation for one scripting language
pub trait LanguageStrategy: Send + Sync + std::fmt::Debug {
    /// Canonical tag (e.g., "javascript")
    fn tag(&self) -> &str;

    /// Extension of the generated temp file, without the dot
    fn file_extension(&self) -> &str;

    /// Interpreter binary invoked as `<binary> <file>`
    fn interpreter(&self) -> &str;

    /// Build the full wrapper program for `code` with `input` bound
    fn generate_wrapper(&self, code: &str, input: &Value) -> EngineResult<String>;
}

/// Node.js strategy
#[derive(Debug, Clone)]
pub struct JavaScript {
    binary: String,
}

impl JavaScript {
    pub fn new(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }
}

impl LanguageStrategy for JavaScript {
    fn tag(&self) -> &str {
        "javascript"
    }

    fn file_extension(&self) -> &str {
        "js"
    }

    fn interpreter(&self) -> &str {
        &self.binary
    }

    fn generate_wrapper(&self, code: &str, input: &Value) -> EngineResult<String> {
        // Parsed from a string literal: in an object literal a "__proto__" key
        // would set the prototype instead of creating a property
        let input_json = serde_json::to_string(input)?;
        let input_literal = serde_json::to_string(&input_json)?;
        let body = indent(code, "  ");

        Ok(format!(
            r#"const __input = JSON.parse({input_literal});

async function run(input) {{
{body}
}}

(async () => {{
  try {{
    const result = await run(__input);
    console.log(JSON.stringify({{ success: true, data: result === undefined ? null : result }}));
  }} catch (error) {{
    const message = error && error.message ? error.message : String(error);
    console.log(JSON.stringify({{ success: false, error: message }}));
  }}
}})();
"#
        ))
    }
}

/// CPython strategy
#[derive(Debug, Clone)]
pub struct Python {
    binary: String,
}

impl Python {
    pub fn new(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }
}

impl LanguageStrategy for Python {
    fn tag(&self) -> &str {
        "python"
    }

    fn file_extension(&self) -> &str {
        "py"
    }

    fn interpreter(&self) -> &str {
        &self.binary
    }

    fn generate_wrapper(&self, code: &str, input: &Value) -> EngineResult<String> {
        // JSON text embedded as a string literal; JSON string escapes are valid Python escapes
        let input_json = serde_json::to_string(input)?;
        let input_literal = serde_json::to_string(&input_json)?;
        let body = indent(code, "    ");

        Ok(format!(
            r#"import json


def run(input):
{body}
    pass


try:
    __result = run(json.loads({input_literal}))
    __line = json.dumps({{"success": True, "data": __result}}, allow_nan=False)
    print(__line)
except Exception as __error:
    print(json.dumps({{"success": False, "error": str(__error)}}))
"#
        ))
    }
}

/// Indent every line of the user code so it sits inside the `run` body
fn indent(code: &str, prefix: &str) -> String {
    code.lines()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                format!("{prefix}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Language tag → strategy lookup
///
/// Tags are matched case-insensitively; aliases point at the same strategy.
#[derive(Debug, Default, Clone)]
pub struct LanguageRegistry {
    strategies: HashMap<String, Arc<dyn LanguageStrategy>>,
}

impl LanguageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with JavaScript and Python wired to the configured binaries
    pub fn with_defaults(config: &SandboxConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(JavaScript::new(&config.node_binary)), &["js", "node"]);
        registry.register(Arc::new(Python::new(&config.python_binary)), &["py", "python3"]);
        registry
    }

    /// Add a strategy under its own tag plus any aliases. Replaces existing entries.
    pub fn register(&mut self, strategy: Arc<dyn LanguageStrategy>, aliases: &[&str]) {
        for alias in aliases {
            self.strategies
                .insert(alias.to_ascii_lowercase(), Arc::clone(&strategy));
        }
        self.strategies
            .insert(strategy.tag().to_ascii_lowercase(), strategy);
    }

    pub fn resolve(&self, tag: &str) -> EngineResult<Arc<dyn LanguageStrategy>> {
        self.strategies
            .get(&tag.trim().to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| EngineError::UnsupportedLanguage(tag.to_string()))
    }
}
