use anyhow::Context;
use clap::{Parser, ValueEnum};
use jjs_core::compiler::PermutationResult;
use jjs_core::config::{CliOverrides, CompilerConfig, JsOutputOption};
use jjs_core::di::Container;
use jjs_core::jast::JProgram;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "jjs.yaml";

/// jjsc - whole-program Java to JavaScript compiler
#[derive(Parser, Debug, Clone)]
#[command(name = "jjsc")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Serialized typed program (JSON)
    #[arg(value_name = "PROGRAM")]
    program: Option<PathBuf>,

    /// Path to a jjs.yaml or JSON configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Entry-point class; replaces the configured entry points (repeatable)
    #[arg(short, long = "entry", value_name = "CLASS")]
    entries: Vec<String>,

    /// Output directory for compiled permutations
    #[arg(long, value_name = "DIR", default_value = "out")]
    out_dir: PathBuf,

    /// Naming strategy of the output
    #[arg(long, value_enum)]
    output: Option<OutputStyle>,

    /// Disable inlining
    #[arg(long)]
    no_aggressive: bool,

    /// Keep assertions as runtime checks
    #[arg(long)]
    enable_assertions: bool,

    /// Check entry points and rebinds without generating code
    #[arg(long)]
    validate_only: bool,

    /// Write a source map next to each permutation
    #[arg(long)]
    source_map: bool,

    /// Write a symbol map next to each permutation
    #[arg(long)]
    symbol_map: bool,

    /// Write a per-class size report next to each permutation
    #[arg(long)]
    report: bool,

    /// Write a starter jjs.yaml into the current directory
    #[arg(long)]
    init: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputStyle {
    Obfuscated,
    Pretty,
    Detailed,
}

impl From<OutputStyle> for JsOutputOption {
    fn from(style: OutputStyle) -> Self {
        match style {
            OutputStyle::Obfuscated => JsOutputOption::Obfuscated,
            OutputStyle::Pretty => JsOutputOption::Pretty,
            OutputStyle::Detailed => JsOutputOption::Detailed,
        }
    }
}

fn main() -> anyhow::Result<()> {
    // RUST_LOG=debug shows per-pass timings
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.init {
        return init_project();
    }

    let Some(program_path) = cli.program.clone() else {
        anyhow::bail!("No program specified. Use --help for usage information.");
    };
    let config = load_config(&cli)?;
    let program = load_program(&program_path)?;
    info!(
        module = %config.module.name,
        entry_points = config.module.entry_points.len(),
        "compiling {}",
        program_path.display()
    );

    compile(&cli, config, program)
}

/// Write a starter configuration file
fn init_project() -> anyhow::Result<()> {
    let config = r#"# jjs configuration
compilerOptions:
  aggressivelyOptimize: true
  output: OBFUSCATED      # OBFUSCATED, PRETTY or DETAILED
  sourceMap: false
  symbolMap: false
  compileReport: false

module:
  name: app
  entryPoints:
    - app.Main

# One entry per permutation; each maps a requested type to its answer
permutations: []
"#;
    if Path::new(DEFAULT_CONFIG).exists() {
        anyhow::bail!("{} already exists", DEFAULT_CONFIG);
    }
    std::fs::write(DEFAULT_CONFIG, config).with_context(|| format!("Failed to write {}", DEFAULT_CONFIG))?;
    println!("Created {}", DEFAULT_CONFIG);
    Ok(())
}

/// Load configuration from file (if any) and merge command-line overrides
fn load_config(cli: &Cli) -> anyhow::Result<CompilerConfig> {
    let mut config = match &cli.config {
        Some(path) => CompilerConfig::from_file(path)
            .with_context(|| format!("Failed to load config file {}", path.display()))?,
        None if Path::new(DEFAULT_CONFIG).exists() => CompilerConfig::from_file(Path::new(DEFAULT_CONFIG))
            .with_context(|| format!("Failed to load {}", DEFAULT_CONFIG))?,
        None => CompilerConfig::default(),
    };

    let overrides = CliOverrides {
        aggressively_optimize: cli.no_aggressive.then_some(false),
        enable_assertions: cli.enable_assertions.then_some(true),
        output: cli.output.map(JsOutputOption::from),
        validate_only: cli.validate_only.then_some(true),
        source_map: cli.source_map.then_some(true),
        symbol_map: cli.symbol_map.then_some(true),
        compile_report: cli.report.then_some(true),
        entry_points: (!cli.entries.is_empty()).then(|| cli.entries.clone()),
    };
    config.merge(&overrides);
    debug!(options = ?config.compiler_options, "effective options");
    Ok(config)
}

fn load_program(path: &Path) -> anyhow::Result<JProgram> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not a serialized program", path.display()))
}

fn compile(cli: &Cli, config: CompilerConfig, program: JProgram) -> anyhow::Result<()> {
    let permutations = config.effective_permutations();
    let module = config.module.clone();
    let validate_only = config.compiler_options.validate_only;
    let container = Container::new(config);

    let results = container
        .compiler()
        .compile(program, &module, &permutations)
        .context("Compilation failed")?;

    if validate_only {
        println!("Validation succeeded for module {}", module.name);
        return Ok(());
    }

    std::fs::create_dir_all(&cli.out_dir)
        .with_context(|| format!("Failed to create {}", cli.out_dir.display()))?;

    let mut failures = 0usize;
    let mut manifest = Vec::new();
    for (permutation, result) in permutations.iter().zip(results) {
        match result {
            Ok(result) => {
                write_permutation(&cli.out_dir, &result)?;
                println!("Permutation {} -> {}.cache.js", result.permutation_id, result.strong_name);
                manifest.push(json!({
                    "id": result.permutation_id,
                    "strongName": result.strong_name,
                    "rebinds": permutation.rebinds,
                }));
            }
            Err(e) => {
                error!(permutation = permutation.id, "{}", e);
                failures += 1;
            }
        }
    }

    let manifest_path = cli.out_dir.join("permutations.json");
    std::fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?)
        .with_context(|| format!("Failed to write {}", manifest_path.display()))?;

    if failures > 0 {
        anyhow::bail!("{} of {} permutation(s) failed", failures, permutations.len());
    }
    info!(
        permutations = permutations.len(),
        warnings = container.warning_count(),
        "wrote {}",
        cli.out_dir.display()
    );
    Ok(())
}

/// `<strong>.cache.js` plus whichever side artifacts were produced
fn write_permutation(out_dir: &Path, result: &PermutationResult) -> anyhow::Result<()> {
    let write = |name: String, contents: String| -> anyhow::Result<()> {
        let path = out_dir.join(name);
        std::fs::write(&path, contents).with_context(|| format!("Failed to write {}", path.display()))
    };

    let strong = &result.strong_name;
    write(format!("{}.cache.js", strong), result.js.clone())?;
    if let Some(symbols) = &result.symbol_map {
        write(format!("{}.symbolMap", strong), symbols.to_tsv())?;
    }
    if let Some(source_map) = &result.source_map {
        write(format!("{}.cache.js.map", strong), serde_json::to_string(source_map)?)?;
    }
    if let Some(report) = &result.report {
        write(format!("{}.report.json", strong), report.to_json()?)?;
    }
    Ok(())
}
