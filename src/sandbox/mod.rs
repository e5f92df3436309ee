/// Execution Sandbox
///
/// Runs one workflow code body in a fresh interpreter process:
/// 1. wrap the code in a language-specific `run(input)` program
/// 2. write it to a uniquely named temp file
/// 3. spawn `<interpreter> <file>` and collect its output
/// 4. delete the file and turn the exit status + last stdout line into an outcome
///
/// Process-per-execution keeps a crashing or looping script away from engine
/// state; the only coupling is the JSON envelope on stdout.

pub mod envelope;
pub mod language;
pub mod process;

pub use envelope::Envelope;
pub use language::{JavaScript, LanguageRegistry, LanguageStrategy, Python};

use crate::config::SandboxConfig;
use crate::error::EngineResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{path::PathBuf, process::Stdio, time::Duration};

/// Normalized result of one execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionOutcome {
    pub fn success(data: Value) -> Self {
        Self { success: true, data: Some(data), error: None }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self { success: false, data: None, error: Some(error.into()) }
    }

    pub fn into_result(self) -> Result<Value, String> {
        if self.success {
            Ok(self.data.unwrap_or(Value::Null))
        } else {
            Err(self.error.unwrap_or_else(|| "Workflow execution failed".to_string()))
        }
    }
}

impl From<EngineResult<Value>> for ExecutionOutcome {
    fn from(result: EngineResult<Value>) -> Self {
        match result {
            Ok(data) => Self::success(data),
            Err(e) => Self::failure(e.to_string()),
        }
    }
}

/// Process sandbox for workflow code
#[derive(Debug, Clone)]
pub struct Sandbox {
    languages: LanguageRegistry,
    temp_dir: PathBuf,
    timeout: Option<Duration>,
}

impl Sandbox {
    pub fn new(config: &SandboxConfig) -> Self {
        Self::with_registry(LanguageRegistry::with_defaults(config), config)
    }

    /// Sandbox with a custom language registry
    pub fn with_registry(languages: LanguageRegistry, config: &SandboxConfig) -> Self {
        Self {
            languages,
            temp_dir: config.temp_dir.clone(),
            timeout: config.execution_timeout(),
        }
    }

    pub fn languages(&self) -> &LanguageRegistry {
        &self.languages
    }

    /// Execute and normalize to `{success, data|error}`; never fails itself
    pub async fn execute(&self, language: &str, code: &str, input: &Value) -> ExecutionOutcome {
        self.run(language, code, input).await.into()
    }

    /// Execute and resolve to the returned data or an error.
    ///
    /// Unsupported language tags fail before anything is written or spawned.
    pub async fn run(&self, language: &str, code: &str, input: &Value) -> EngineResult<Value> {
        let strategy = self.languages.resolve(language)?;
        let program = strategy.generate_wrapper(code, input)?;

        let script_path = self.script_path(strategy.as_ref());
        tokio::fs::write(&script_path, program).await?;

        let output =
            process::run_interpreter(strategy.interpreter(), &script_path, self.timeout).await;

        // Cleanup failure must never fail the execution
        if let Err(e) = tokio::fs::remove_file(&script_path).await {
            tracing::warn!("⚠️ Failed to remove temp script {}: {}", script_path.display(), e);
        }

        let output = output?;
        if !output.succeeded() {
            return Err(output.exit_error());
        }

        envelope::parse_stdout(&output.stdout)?.into_result()
    }

    /// `<temp>/runway-<tag>-<millis>-<random>.<ext>`, unique per execution
    fn script_path(&self, strategy: &dyn LanguageStrategy) -> PathBuf {
        let unique = uuid::Uuid::new_v4().simple().to_string();
        self.temp_dir.join(format!(
            "runway-{}-{}-{}.{}",
            strategy.tag(),
            chrono::Utc::now().timestamp_millis(),
            &unique[..8],
            strategy.file_extension()
        ))
    }
}

/// Whether `<binary> --version` can be spawned and exits cleanly
pub async fn interpreter_available(binary: &str) -> bool {
    match tokio::process::Command::new(binary)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
    {
        Ok(status) => status.success(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Shell-backed strategy so the pipeline can be tested without node/python
    #[derive(Debug)]
    struct Shell;

    impl LanguageStrategy for Shell {
        fn tag(&self) -> &str {
            "shell"
        }
        fn file_extension(&self) -> &str {
            "sh"
        }
        fn interpreter(&self) -> &str {
            "sh"
        }
        fn generate_wrapper(&self, code: &str, _input: &Value) -> EngineResult<String> {
            Ok(code.to_string())
        }
    }

    fn shell_sandbox(temp_dir: PathBuf) -> Sandbox {
        let mut registry = LanguageRegistry::new();
        registry.register(std::sync::Arc::new(Shell), &[]);
        let config = SandboxConfig {
            temp_dir,
            ..SandboxConfig::default()
        };
        Sandbox::with_registry(registry, &config)
    }

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("runway-sandbox-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn leftover_files(dir: &PathBuf) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn unsupported_language_fails_without_spawning() {
        let dir = scratch_dir();
        let sandbox = shell_sandbox(dir.clone());

        let outcome = sandbox.execute("cobol", "whatever", &json!({})).await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("Unsupported language"));
        assert_eq!(leftover_files(&dir), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn last_stdout_line_is_the_envelope() {
        let dir = scratch_dir();
        let sandbox = shell_sandbox(dir.clone());

        let code = r#"echo "user print"
echo '{"success": true, "data": {"sum": 15}}'"#;
        let outcome = sandbox.execute("shell", code, &json!({})).await;

        assert_eq!(outcome, ExecutionOutcome::success(json!({"sum": 15})));
        assert_eq!(leftover_files(&dir), 0, "temp script must be deleted");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_fails_with_code_and_stderr() {
        let dir = scratch_dir();
        let sandbox = shell_sandbox(dir.clone());

        let outcome = sandbox
            .execute("shell", "echo 'segfault-ish' >&2\nexit 2", &json!({}))
            .await;

        assert!(!outcome.success);
        let error = outcome.error.unwrap();
        assert!(error.contains("code 2"));
        assert!(error.contains("segfault-ish"));
        assert_eq!(leftover_files(&dir), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn garbage_output_fails_with_raw_output() {
        let sandbox = shell_sandbox(scratch_dir());
        let outcome = sandbox.execute("shell", "echo not json", &json!({})).await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("Raw output: not json"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn concurrent_executions_use_distinct_files() {
        let sandbox = shell_sandbox(scratch_dir());
        let code = "sleep 0.2\necho '{\"success\": true, \"data\": 1}'";
        let input = json!({});

        let (a, b) = tokio::join!(
            sandbox.execute("shell", code, &input),
            sandbox.execute("shell", code, &input)
        );
        assert!(a.success && b.success);
    }

    #[tokio::test]
    async fn javascript_adds_inputs() {
        if !interpreter_available("node").await {
            eprintln!("node not installed, skipping");
            return;
        }
        let sandbox = Sandbox::new(&SandboxConfig::default());

        let outcome = sandbox
            .execute("javascript", "return input.a + input.b;", &json!({"a": 5, "b": 10}))
            .await;
        assert_eq!(outcome, ExecutionOutcome::success(json!(15)));
    }

    #[tokio::test]
    async fn javascript_throw_becomes_failure() {
        if !interpreter_available("node").await {
            eprintln!("node not installed, skipping");
            return;
        }
        let sandbox = Sandbox::new(&SandboxConfig::default());

        let outcome = sandbox
            .execute("javascript", "throw new Error('bad input shape');", &json!({}))
            .await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("bad input shape"));
    }

    #[tokio::test]
    async fn javascript_keeps_proto_key_in_input() {
        if !interpreter_available("node").await {
            eprintln!("node not installed, skipping");
            return;
        }
        let sandbox = Sandbox::new(&SandboxConfig::default());

        let input = json!({"__proto__": {"x": 1}, "a": 2});
        let outcome = sandbox.execute("javascript", "return input;", &input).await;
        assert_eq!(outcome, ExecutionOutcome::success(input));
    }

    #[tokio::test]
    async fn python_nan_result_is_a_clear_failure() {
        if !interpreter_available("python3").await {
            eprintln!("python3 not installed, skipping");
            return;
        }
        let sandbox = Sandbox::new(&SandboxConfig::default());

        let outcome = sandbox.execute("python", "return float('nan')", &json!({})).await;
        assert!(!outcome.success);
        let error = outcome.error.unwrap();
        assert!(error.contains("JSON compliant"), "{error}");
        assert!(!error.contains("Failed to parse execution output"));
    }

    #[tokio::test]
    async fn python_round_trips_structured_data() {
        if !interpreter_available("python3").await {
            eprintln!("python3 not installed, skipping");
            return;
        }
        let sandbox = Sandbox::new(&SandboxConfig::default());

        let input = json!({"items": [1, 2, 3], "label": "it's \"ok\"", "flag": true, "none": null});
        let outcome = sandbox.execute("python", "print('noise')\nreturn input", &input).await;
        assert_eq!(outcome, ExecutionOutcome::success(input));

        let outcome = sandbox
            .execute("python", "raise ValueError('negative amount')", &json!({}))
            .await;
        assert_eq!(outcome, ExecutionOutcome::failure("negative amount"));
    }

    #[test]
    fn outcome_into_result() {
        assert_eq!(ExecutionOutcome::success(json!(1)).into_result(), Ok(json!(1)));
        assert_eq!(
            ExecutionOutcome::failure("nope").into_result(),
            Err("nope".to_string())
        );
    }
}
