// livecalc CLI - headless evaluation of expression documents

mod exit_codes;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use livecalc_config::{Settings, SettingsError};
use livecalc_engine::{Engine, EngineError, EquationId, EvalType, SampleSet};
use livecalc_io::IoError;
use serde::Serialize;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

use exit_codes::{EXIT_EVAL_ERROR, EXIT_IO_ERROR, EXIT_PARSE_ERROR, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "lcalc")]
#[command(about = "Reactive expression calculator (CLI mode, headless)")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// More log output on stderr (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Settings file to use instead of the one in the user config dir
    #[arg(long, global = true, env = "LIVECALC_SETTINGS")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a document, recompute every cell, print the results
    #[command(after_help = "\
Examples:
  lcalc eval notes.lcalc
  lcalc eval notes.json --json
  lcalc eval notes.lcalc --strict && echo all cells ok")]
    Eval {
        /// Document to evaluate (.json, anything else is read as lines)
        file: PathBuf,

        /// Print cell records as JSON
        #[arg(long)]
        json: bool,

        /// Exit with code 1 if any cell ends in an error state
        #[arg(long)]
        strict: bool,
    },

    /// Evaluate expressions given on the command line, one cell each
    #[command(after_help = "\
Examples:
  lcalc calc '2 + 2'
  lcalc calc 'r := 3 m' 'pi r^2'
  lcalc calc 'd := 100 m' 't := 9.58 s' 'd / t'")]
    Calc {
        /// Cell texts, in order
        #[arg(required = true)]
        exprs: Vec<String>,

        /// Print cell records as JSON
        #[arg(long)]
        json: bool,

        /// Exit with code 1 if any cell ends in an error state
        #[arg(long)]
        strict: bool,
    },

    /// Convert a document between the lines and JSON formats
    #[command(after_help = "\
Examples:
  lcalc convert notes.lcalc -o notes.json
  lcalc convert notes.json -o notes.lcalc

Result texts are refreshed before writing.")]
    Convert {
        /// Input document
        input: PathBuf,

        /// Output document; format is chosen by extension
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Sample a cell's expression over its plot domain
    #[command(after_help = "\
Examples:
  lcalc plot notes.lcalc --cell 3
  lcalc plot notes.lcalc --cell 3 --json")]
    Plot {
        /// Document containing the cell
        file: PathBuf,

        /// Cell id
        #[arg(long)]
        cell: u64,

        /// Print the sample set as JSON
        #[arg(long)]
        json: bool,
    },

    /// List builtin function, constant and unit names
    ListBuiltins,
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nengine:  livecalc-engine ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   debug",
            "\ntarget:  ", env!("TARGET"),
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nengine:  livecalc-engine ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   release",
            "\ntarget:  ", env!("TARGET"),
        )
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = load_settings(cli.settings.as_deref()).and_then(|settings| match cli.command {
        Commands::Eval { file, json, strict } => cmd_eval(&settings, &file, json, strict),
        Commands::Calc { exprs, json, strict } => cmd_calc(&settings, &exprs, json, strict),
        Commands::Convert { input, output } => cmd_convert(&settings, &input, &output),
        Commands::Plot { file, cell, json } => cmd_plot(&settings, &file, cell, json),
        Commands::ListBuiltins => cmd_list_builtins(&settings),
    });

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    // Fails only if a logger is already installed
    let _ = TermLogger::init(level, Config::default(), TerminalMode::Stderr, ColorChoice::Auto);
}

fn load_settings(path: Option<&Path>) -> Result<Settings, CliError> {
    match path {
        Some(path) => Settings::load_from(path).map_err(CliError::from),
        None => Ok(Settings::load()),
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO_ERROR, message: msg.into(), hint: None }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self { code: EXIT_PARSE_ERROR, message: msg.into(), hint: None }
    }

    pub fn eval(msg: impl Into<String>) -> Self {
        Self { code: EXIT_EVAL_ERROR, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<IoError> for CliError {
    fn from(err: IoError) -> Self {
        if err.is_format_error() {
            CliError::parse(err.to_string())
        } else {
            CliError::io(err.to_string())
        }
    }
}

impl From<SettingsError> for CliError {
    fn from(err: SettingsError) -> Self {
        match err {
            SettingsError::Read { .. } | SettingsError::Write { .. } => CliError::io(err.to_string()),
            SettingsError::Parse { .. } | SettingsError::Invalid(_) => CliError::parse(err.to_string())
                .with_hint(format!("see {} for the defaults", Settings::config_path_display())),
        }
    }
}

impl From<EngineError> for CliError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::UnknownEquation(_) => CliError::args(err.to_string()),
            EngineError::Plot { .. } => CliError::eval(err.to_string()),
        }
    }
}

fn write_err(e: io::Error) -> CliError {
    CliError::io(e.to_string())
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Load a document into a fresh engine and recompute it.
fn open_document(settings: &Settings, path: &Path) -> Result<Engine, CliError> {
    let records = livecalc_io::load(path)?;
    let mut engine = Engine::new(settings.engine_config());
    engine.load_records(records);
    engine.recompute_all();
    Ok(engine)
}

fn error_count(engine: &Engine) -> usize {
    engine.equations().filter(|e| e.is_error()).count()
}

fn check_strict(engine: &Engine, strict: bool) -> Result<(), CliError> {
    let errors = error_count(engine);
    if strict && errors > 0 {
        return Err(CliError::eval(format!("{} cell(s) ended in an error state", errors)));
    }
    Ok(())
}

fn print_records_json(engine: &Engine) -> Result<(), CliError> {
    let json = livecalc_io::json::to_string(&engine.records())?;
    print!("{}", json);
    Ok(())
}

// ============================================================================
// eval
// ============================================================================

fn cmd_eval(settings: &Settings, file: &Path, json: bool, strict: bool) -> Result<(), CliError> {
    let engine = open_document(settings, file)?;

    if json {
        print_records_json(&engine)?;
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        for eq in engine.equations() {
            let id = eq.id().to_string();
            if eq.eval_type() == EvalType::NoEval {
                writeln!(handle, "{:<5} {}", id, eq.raw_text()).map_err(write_err)?;
            } else {
                writeln!(handle, "{:<5} {}  => {}", id, eq.raw_text(), eq.result_text())
                    .map_err(write_err)?;
            }
        }
    }

    check_strict(&engine, strict)
}

// ============================================================================
// calc
// ============================================================================

fn cmd_calc(settings: &Settings, exprs: &[String], json: bool, strict: bool) -> Result<(), CliError> {
    let mut engine = Engine::new(settings.engine_config());
    for expr in exprs {
        let id = engine.create_equation();
        engine.add_or_update_equation(id, expr);
    }
    engine.recompute_all();

    if json {
        print_records_json(&engine)?;
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        for eq in engine.equations() {
            writeln!(handle, "{}", eq.result_text()).map_err(write_err)?;
        }
    }

    check_strict(&engine, strict)
}

// ============================================================================
// convert
// ============================================================================

fn cmd_convert(settings: &Settings, input: &Path, output: &Path) -> Result<(), CliError> {
    let engine = open_document(settings, input)?;
    livecalc_io::save(output, &engine.records())?;
    log::info!(
        "converted {} cells: {} -> {}",
        engine.len(),
        input.display(),
        output.display()
    );
    Ok(())
}

// ============================================================================
// plot
// ============================================================================

#[derive(Serialize)]
struct PlotOutput<'a> {
    cell: EquationId,
    expression: &'a str,
    #[serde(flatten)]
    samples: &'a SampleSet,
}

fn cmd_plot(settings: &Settings, file: &Path, cell: u64, json: bool) -> Result<(), CliError> {
    let engine = open_document(settings, file)?;
    let id = EquationId::from_raw(cell);
    let samples = engine.plot_samples(id).map_err(|e| {
        let hint = matches!(e, EngineError::UnknownEquation(_))
            .then(|| format!("`lcalc eval {}` lists the cell ids", file.display()));
        let err = CliError::from(e);
        match hint {
            Some(hint) => err.with_hint(hint),
            None => err,
        }
    })?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();

    if json {
        let expression = engine.equation(id).map(|e| e.body()).unwrap_or("");
        let output = PlotOutput { cell: id, expression, samples: &samples };
        let text = serde_json::to_string_pretty(&output).map_err(|e| CliError::io(e.to_string()))?;
        writeln!(handle, "{}", text).map_err(write_err)?;
        return Ok(());
    }

    match &samples {
        SampleSet::Curve { variable, xs, ys } => {
            let x_name = variable.as_deref().unwrap_or("x");
            writeln!(handle, "{}\tvalue", x_name).map_err(write_err)?;
            for (x, y) in xs.iter().zip(ys) {
                writeln!(handle, "{}\t{}", x, y).map_err(write_err)?;
            }
        }
        SampleSet::Surface { variables, xs, ys, zs } => {
            writeln!(handle, "{}\t{}\tvalue", variables[0], variables[1]).map_err(write_err)?;
            for (row, y) in zs.iter().zip(ys) {
                for (z, x) in row.iter().zip(xs) {
                    writeln!(handle, "{}\t{}\t{}", x, y, z).map_err(write_err)?;
                }
            }
        }
    }
    Ok(())
}

// ============================================================================
// list-builtins
// ============================================================================

fn cmd_list_builtins(settings: &Settings) -> Result<(), CliError> {
    let builtins = settings.engine_config().builtins;
    let stdout = io::stdout();
    let mut handle = stdout.lock();

    for name in builtins.names() {
        writeln!(handle, "{}", name).map_err(write_err)?;
    }

    Ok(())
}
