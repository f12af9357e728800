//! End-to-end session tests through the interpreter-backed program loader

mod common;

use common::{env_value, test_config, write_tree};
use dynarun::error::ErrorCode;
use dynarun::plugin::{CallCounter, PluginLoader, TraceAnalysis};
use dynarun::session::program::{ENV_COVERAGE, ENV_ENTRY_FILE, ENV_MAIN, ENV_SESSION_ID};
use dynarun::session::{
    Entry, EntryResolver, EntryStatus, ProcessProgramLoader, SessionManager, SessionRequest,
};
use dynarun::subprocess::{MockProcessRunner, SubprocessManager};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn manager(temp: &Path) -> (SessionManager, MockProcessRunner) {
    let (subprocess, mock) = SubprocessManager::mock();
    let loader = ProcessProgramLoader::new(subprocess, "python").quiet();
    let manager = SessionManager::new(test_config(temp), PluginLoader::with_builtins(), Arc::new(loader))
        .with_entry_resolver(EntryResolver::new(vec![temp.join("project")], "py", "__init__.py"));
    (manager, mock)
}

#[tokio::test]
async fn test_program_entry_receives_context() {
    let temp = TempDir::new().unwrap();
    write_tree(temp.path(), &[("project/app.py", "print('hi')\n")]);
    let app = temp.path().join("project/app.py");

    let (manager, mock) = manager(temp.path());
    mock.expect_command("python").returns_success().finish();

    let request = SessionRequest::new(app.display().to_string(), [CallCounter::CLASS_PATH])
        .with_args(["--size", "3"]);
    let report = manager.start(request).await.unwrap();

    assert!(report.succeeded());
    assert_eq!(report.entry_status, EntryStatus::Succeeded);
    assert!(report.coverage.is_none());

    let calls = mock.get_call_history();
    assert_eq!(calls.len(), 1);
    let call = &calls[0];
    assert_eq!(call.args, vec![app.display().to_string(), "--size".into(), "3".into()]);
    assert_eq!(env_value(call, ENV_MAIN), Some("1"));
    assert_eq!(env_value(call, ENV_ENTRY_FILE), Some(app.display().to_string().as_str()));
    assert_eq!(
        env_value(call, ENV_SESSION_ID),
        Some(report.session_id.to_string().as_str())
    );
    assert!(env_value(call, ENV_COVERAGE).is_none());
    assert!(call.env_remove.iter().any(|k| k == ENV_COVERAGE));

    let counts = std::fs::read_to_string(report.output_dir.join(CallCounter::COUNTS_FILE)).unwrap();
    assert_eq!(serde_json::from_str::<serde_json::Value>(&counts).unwrap(), serde_json::json!({}));

    let analyses = std::fs::read_to_string(&report.analyses_file).unwrap();
    assert_eq!(
        analyses,
        format!(
            "{};output_dir={}\n",
            CallCounter::CLASS_PATH,
            report.output_dir.display()
        )
    );
}

#[tokio::test]
async fn test_module_entry_runs_from_search_root() {
    let temp = TempDir::new().unwrap();
    write_tree(
        temp.path(),
        &[("project/pkg/__init__.py", ""), ("project/pkg/main.py", "")],
    );

    let (manager, mock) = manager(temp.path());
    mock.expect_command("python").returns_success().finish();

    let report = manager
        .start(SessionRequest::new("pkg.main", [TraceAnalysis::CLASS_PATH]))
        .await
        .unwrap();
    assert!(report.succeeded());

    let call = &mock.get_call_history()[0];
    assert_eq!(call.args, vec!["-m", "pkg.main"]);
    assert_eq!(call.working_dir.as_deref(), Some(temp.path().join("project").as_path()));

    let trace = std::fs::read_to_string(report.output_dir.join(TraceAnalysis::TRACE_FILE)).unwrap();
    assert!(trace.contains("begin execution"));
    assert!(trace.contains("end execution"));
}

#[tokio::test]
async fn test_coverage_session_exports_directory() {
    let temp = TempDir::new().unwrap();
    write_tree(temp.path(), &[("project/app.py", "")]);
    let coverage_root = temp.path().join("coverage");

    let (manager, mock) = manager(temp.path());
    mock.expect_command("python").returns_success().finish();

    let request = SessionRequest::new(
        temp.path().join("project/app.py").display().to_string(),
        [TraceAnalysis::CLASS_PATH],
    )
    .with_coverage(true)
    .with_coverage_root(&coverage_root);
    let report = manager.start(request).await.unwrap();

    let coverage_dir = report.coverage_dir.clone().unwrap();
    assert!(coverage_dir.starts_with(&coverage_root));
    assert!(coverage_dir.is_dir());
    assert!(report.coverage.unwrap().is_empty());

    let call = &mock.get_call_history()[0];
    assert_eq!(
        env_value(call, ENV_COVERAGE),
        Some(coverage_dir.display().to_string().as_str())
    );
}

#[tokio::test]
async fn test_failing_entry_is_reported_not_raised() {
    let temp = TempDir::new().unwrap();
    write_tree(temp.path(), &[("project/app.py", "")]);

    let (manager, mock) = manager(temp.path());
    mock.expect_command("python").returns_exit_code(3).finish();

    let report = manager
        .start(SessionRequest::new(
            temp.path().join("project/app.py").display().to_string(),
            [CallCounter::CLASS_PATH],
        ))
        .await
        .unwrap();

    assert_eq!(report.entry_status, EntryStatus::Failed { exit_code: 3 });
    assert!(!report.succeeded());
    // End hooks still ran
    assert!(report.output_dir.join(CallCounter::COUNTS_FILE).is_file());
}

#[tokio::test]
async fn test_unspawnable_interpreter_is_session_error() {
    let temp = TempDir::new().unwrap();
    write_tree(temp.path(), &[("project/app.py", "")]);

    let (manager, mock) = manager(temp.path());
    mock.expect_command("python").fails_to_spawn().finish();

    let err = manager
        .start(SessionRequest::new(
            temp.path().join("project/app.py").display().to_string(),
            [CallCounter::CLASS_PATH],
        ))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::SESSION_ENTRY_FAILED);

    // The call counter's end hook wrote its file even though the entry never ran
    let written: Vec<_> = std::fs::read_dir(temp.path())
        .unwrap()
        .map(|e| e.unwrap().path().join(CallCounter::COUNTS_FILE))
        .filter(|path| path.is_file())
        .collect();
    assert_eq!(written.len(), 1);
}

#[tokio::test]
async fn test_resolution_errors_never_spawn() {
    let temp = TempDir::new().unwrap();
    write_tree(temp.path(), &[("project/app.py", "")]);
    let app = temp.path().join("project/app.py").display().to_string();

    let (manager, mock) = manager(temp.path());
    mock.expect_command("python").returns_success().finish();

    let err = manager
        .start(SessionRequest::new("no.such.module", [TraceAnalysis::CLASS_PATH]))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ENTRY_NOT_FOUND);

    let err = manager
        .start(SessionRequest::new(&app, ["dynarun.analyses.Missing"]))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::LOAD_CLASS_NOT_FOUND);

    let err = manager
        .start(SessionRequest::new(&app, [TraceAnalysis::CLASS_PATH]).with_init(TraceAnalysis::CLASS_PATH))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::CONFIG_TYPE_MISMATCH);

    assert!(mock.get_call_history().is_empty());
}

#[test]
fn test_entry_resolution_prefers_existing_file() {
    let temp = TempDir::new().unwrap();
    write_tree(temp.path(), &[("project/tool.py", "")]);
    let resolver = EntryResolver::new(vec![temp.path().join("project")], "py", "__init__.py");

    let file = temp.path().join("project/tool.py");
    assert!(matches!(
        resolver.resolve(&file.display().to_string()).unwrap(),
        Entry::Program { .. }
    ));
    assert!(matches!(resolver.resolve("tool").unwrap(), Entry::Module { .. }));
}
