// Integration tests for the `lcalc` binary.
// Run with: cargo test -p livecalc-cli --test cli_tests -- --nocapture

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

/// Scratch directory with its own settings file, so tests never touch the
/// user's config dir.
struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        Self::with_settings("{}")
    }

    fn with_settings(settings: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("settings.json"), settings).unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn lcalc(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_lcalc"))
            .arg("--settings")
            .arg(self.path("settings.json"))
            .args(args)
            .env_remove("LIVECALC_SETTINGS")
            .output()
            .expect("run lcalc")
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

const DOC: &str = "\
1;0;0;x := 5 # start;;;;text
2;0;40;y := x + 2;;;;text
3;0;80;# just a note;;;;text
4;0;120;f := y t | 0, 2, 3;;;;plot
";

// ---------------------------------------------------------------------------
// calc
// ---------------------------------------------------------------------------

#[test]
fn calc_prints_one_result_per_cell() {
    let sandbox = Sandbox::new();
    let output = sandbox.lcalc(&["calc", "x := 5", "x + 2", "3 m + 2 m"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "5\n7\n5 m\n");
}

#[test]
fn calc_errors_are_results_unless_strict() {
    let sandbox = Sandbox::new();
    let output = sandbox.lcalc(&["calc", "y * 2"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "UndefinedVariableError: undefined variable y\n");

    let output = sandbox.lcalc(&["calc", "--strict", "y * 2"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("1 cell(s) ended in an error state"));
}

#[test]
fn calc_unit_mismatch() {
    let sandbox = Sandbox::new();
    let output = sandbox.lcalc(&["calc", "3 m + 2 s"]);
    assert_eq!(stdout(&output), "EvaluationError: cannot add m and s\n");
}

#[test]
fn calc_json_output() {
    let sandbox = Sandbox::new();
    let output = sandbox.lcalc(&["calc", "--json", "a := 2", "b := a^10"]);
    assert!(output.status.success());
    let records: Vec<serde_json::Value> = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1]["definedVarName"], "b");
    assert_eq!(records[1]["resultText"], "1024");
}

#[test]
fn calc_requires_an_expression() {
    let sandbox = Sandbox::new();
    let output = sandbox.lcalc(&["calc"]);
    assert_eq!(output.status.code(), Some(2));
}

// ---------------------------------------------------------------------------
// eval
// ---------------------------------------------------------------------------

#[test]
fn eval_lines_document() {
    let sandbox = Sandbox::new();
    let doc = sandbox.write("doc.lcalc", DOC);
    let output = sandbox.lcalc(&["eval", arg(&doc)]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let text = stdout(&output);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], "#1    x := 5 # start  => 5");
    assert_eq!(lines[1], "#2    y := x + 2  => 7");
    assert_eq!(lines[2], "#3    # just a note");
}

#[test]
fn eval_json_document() {
    let sandbox = Sandbox::new();
    let doc = sandbox.write("doc.lcalc", DOC);
    let output = sandbox.lcalc(&["eval", "--json", arg(&doc)]);
    let records: Vec<serde_json::Value> = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(records[0]["description"], "start");
    assert_eq!(records[1]["resultText"], "7");
    assert_eq!(records[3]["visType"], "plot");
}

#[test]
fn eval_reports_cycles() {
    let sandbox = Sandbox::new();
    let doc = sandbox.write("cycle.lcalc", "1;0;0;a := b + 1\n2;0;0;b := a + 1\n3;0;0;c := 4\n");
    let output = sandbox.lcalc(&["eval", arg(&doc)]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert_eq!(text.matches("CyclicDependencyError").count(), 2);
    assert!(text.contains("c := 4  => 4"));

    let output = sandbox.lcalc(&["eval", "--strict", arg(&doc)]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn eval_missing_file_is_io_error() {
    let sandbox = Sandbox::new();
    let missing = sandbox.path("missing.lcalc");
    let output = sandbox.lcalc(&["eval", arg(&missing)]);
    assert_eq!(output.status.code(), Some(3));
    assert!(stderr(&output).starts_with("error: "));
}

#[test]
fn eval_malformed_file_is_parse_error() {
    let sandbox = Sandbox::new();
    let doc = sandbox.write("bad.lcalc", "one;0;0;x := 1\n");
    let output = sandbox.lcalc(&["eval", arg(&doc)]);
    assert_eq!(output.status.code(), Some(4));
    assert!(stderr(&output).contains("invalid id"));

    let doc = sandbox.write("bad.json", "[{\"rawText\": 1}]");
    let output = sandbox.lcalc(&["eval", arg(&doc)]);
    assert_eq!(output.status.code(), Some(4));
}

// ---------------------------------------------------------------------------
// convert
// ---------------------------------------------------------------------------

#[test]
fn convert_lines_to_json_and_back() {
    let sandbox = Sandbox::new();
    let doc = sandbox.write("doc.lcalc", DOC);
    let json = sandbox.path("doc.json");
    let output = sandbox.lcalc(&["convert", arg(&doc), "-o", arg(&json)]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let records: Vec<serde_json::Value> =
        serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
    assert_eq!(records.len(), 4);
    assert_eq!(records[1]["resultText"], "7");
    assert_eq!(records[1]["positionY"], 40.0);

    let back = sandbox.path("back.lcalc");
    let output = sandbox.lcalc(&["convert", arg(&json), "--output", arg(&back)]);
    assert!(output.status.success());
    let text = std::fs::read_to_string(&back).unwrap();
    assert!(text.starts_with("1;0;0;x := 5 # start;5;x;start;text\n"));
}

// ---------------------------------------------------------------------------
// plot
// ---------------------------------------------------------------------------

#[test]
fn plot_curve_json() {
    let sandbox = Sandbox::new();
    let doc = sandbox.write("doc.lcalc", DOC);
    let output = sandbox.lcalc(&["plot", arg(&doc), "--cell", "4", "--json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let plot: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(plot["cell"], 4);
    assert_eq!(plot["kind"], "curve");
    assert_eq!(plot["variable"], "t");
    assert_eq!(plot["ys"], serde_json::json!([0.0, 7.0, 14.0]));
}

#[test]
fn plot_curve_text() {
    let sandbox = Sandbox::new();
    let doc = sandbox.write("doc.lcalc", DOC);
    let output = sandbox.lcalc(&["plot", arg(&doc), "--cell", "4"]);
    assert_eq!(stdout(&output), "t\tvalue\n0\t0\n1\t7\n2\t14\n");
}

#[test]
fn plot_unknown_cell_is_usage_error() {
    let sandbox = Sandbox::new();
    let doc = sandbox.write("doc.lcalc", DOC);
    let output = sandbox.lcalc(&["plot", arg(&doc), "--cell", "99"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("unknown equation #99"));
    assert!(stderr(&output).contains("hint:"));
}

#[test]
fn plot_note_cell_fails() {
    let sandbox = Sandbox::new();
    let doc = sandbox.write("doc.lcalc", DOC);
    let output = sandbox.lcalc(&["plot", arg(&doc), "--cell", "3"]);
    assert_eq!(output.status.code(), Some(1));
}

// ---------------------------------------------------------------------------
// settings & list-builtins
// ---------------------------------------------------------------------------

#[test]
fn list_builtins_includes_functions_constants_units() {
    let sandbox = Sandbox::new();
    let output = sandbox.lcalc(&["list-builtins"]);
    assert!(output.status.success());
    let text = stdout(&output);
    for name in ["sin", "sqrt", "pi", "e", "m", "kg", "N"] {
        assert!(text.lines().any(|l| l == name), "missing {}", name);
    }
}

#[test]
fn settings_extend_builtins_and_plot_domain() {
    let sandbox = Sandbox::with_settings(
        "{\n  // custom\n  \"engine.extraBuiltins\": [\"gamma\"],\n  \"plot.domainStart\": 0,\n  \"plot.domainEnd\": 1,\n  \"plot.samples\": 2\n}\n",
    );
    let output = sandbox.lcalc(&["list-builtins"]);
    assert!(stdout(&output).lines().any(|l| l == "gamma"));

    let doc = sandbox.write("doc.lcalc", "1;0;0;t^2\n");
    let output = sandbox.lcalc(&["plot", arg(&doc), "--cell", "1"]);
    assert_eq!(stdout(&output), "t\tvalue\n0\t0\n1\t1\n");
}

#[test]
fn invalid_settings_file_is_parse_error() {
    let sandbox = Sandbox::with_settings("{\"plot.samples\": 0}");
    let output = sandbox.lcalc(&["calc", "1"]);
    assert_eq!(output.status.code(), Some(4));
    assert!(stderr(&output).contains("plot.samples must be at least 1"));
}
