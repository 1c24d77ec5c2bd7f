use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "x")]
#[command(about = "Development automation for iqlite")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all CI checks (fmt, clippy, build, test)
    Ci {
        #[arg(long)]
        verbose: bool,
    },
    /// Format code
    Fmt {
        #[arg(long)]
        check: bool,
    },
    /// Run clippy with warnings denied
    Clippy,
    /// Run tests, optionally limited to one module
    Test {
        #[arg(long, value_enum)]
        module: Option<Module>,
        /// Run doc tests only
        #[arg(long)]
        doc: bool,
    },
    /// Run benchmarks
    Bench,
    /// Run a flow script through the iqlite binary
    Flow {
        /// Path to the flow script
        flow_path: String,
        /// Write the JSON report here
        #[arg(short = 'r', long, default_value = "flow_report.json")]
        report: String,
        /// Global settings file passed to the runner
        #[arg(short = 's', long)]
        settings: Option<String>,
        #[arg(long)]
        release: bool,
    },
}

/// Library modules with their own unit tests
#[derive(Clone, Copy, ValueEnum)]
enum Module {
    Parameter,
    Executive,
    Vdut,
    Iqmeasure,
    Command,
    Common,
    Wifi,
    Bt,
    Flow,
}

impl Module {
    fn path(self) -> &'static str {
        match self {
            Module::Parameter => "core::parameter",
            Module::Executive => "core::executive",
            Module::Vdut => "core::vdut",
            Module::Iqmeasure => "core::iqmeasure",
            Module::Command => "core::command",
            Module::Common => "core::common",
            Module::Wifi => "core::wifi",
            Module::Bt => "core::bt",
            Module::Flow => "core::flow",
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ci { verbose } => run_ci(verbose),
        Commands::Fmt { check } => run_fmt(check),
        Commands::Clippy => cargo(&["clippy", "--all-targets", "--", "-D", "warnings"]),
        Commands::Test { module, doc } => run_test(module, doc),
        Commands::Bench => cargo(&["bench"]),
        Commands::Flow {
            flow_path,
            report,
            settings,
            release,
        } => run_flow(&flow_path, &report, settings.as_deref(), release),
    }
}

fn run_ci(verbose: bool) -> Result<()> {
    println!("{}", "=== Running CI Pipeline ===".bold().blue());
    let start = Instant::now();

    let stages: [(&str, fn() -> Result<()>); 4] = [
        ("Format Check", || run_fmt(true)),
        ("Clippy", || cargo(&["clippy", "--all-targets", "--", "-D", "warnings"])),
        ("Build", || cargo(&["build", "--all-targets"])),
        ("Test", || run_test(None, false)),
    ];

    for (name, stage) in stages {
        print!("{} {} ... ", "→".blue(), name);
        let stage_start = Instant::now();
        match stage() {
            Ok(()) if verbose => println!(
                "{} ({:.2}s)",
                "✓".green().bold(),
                stage_start.elapsed().as_secs_f64()
            ),
            Ok(()) => println!("{}", "✓".green().bold()),
            Err(e) => {
                println!("{}", "✗".red().bold());
                return Err(e).with_context(|| format!("{} failed", name));
            }
        }
    }

    println!(
        "\n{} {}",
        "✓ CI passed in".green().bold(),
        format!("{:.2}s", start.elapsed().as_secs_f64()).bold()
    );
    Ok(())
}

fn run_fmt(check: bool) -> Result<()> {
    if check {
        cargo(&["fmt", "--all", "--", "--check"])
    } else {
        cargo(&["fmt", "--all"])
    }
}

fn run_test(module: Option<Module>, doc: bool) -> Result<()> {
    match (module, doc) {
        (_, true) => cargo(&["test", "--doc"]),
        (Some(module), false) => {
            println!("{} Running {} tests...", "→".blue(), module.path().bold());
            cargo(&["test", "--lib", module.path()])
        }
        (None, false) => cargo(&["test"]),
    }
}

fn run_flow(flow_path: &str, report: &str, settings: Option<&str>, release: bool) -> Result<()> {
    println!("{}", "=== Flow Run ===".bold().blue());

    let path = Path::new(flow_path);
    if !path.is_file() {
        println!("{} Flow script not found: {}", "✗".red().bold(), flow_path.yellow());
        bail!("Flow script not found");
    }
    if path.extension().and_then(|e| e.to_str()) != Some("toml") {
        println!("{} Not a TOML flow script: {}", "✗".red().bold(), flow_path.yellow());
        bail!("Flow script is not a .toml file");
    }

    println!("{} Flow: {}", "✓".green(), flow_path.cyan());
    println!("{} Report: {}", "→".blue(), report.bold());
    if let Some(settings) = settings {
        println!("{} Settings: {}", "→".blue(), settings.bold());
    }

    let mut args = vec!["run", "--bin", "iqlite"];
    if release {
        args.push("--release");
    }
    args.extend(["--", "run", flow_path, "--report", report]);
    if let Some(settings) = settings {
        args.extend(["--settings", settings]);
    }

    let start = Instant::now();
    if let Err(e) = cargo(&args) {
        println!("\n{} Flow failed, see {}", "✗".red().bold(), report);
        return Err(e);
    }

    println!(
        "\n{} Flow completed in {}",
        "✓".green().bold(),
        format!("{:.2}s", start.elapsed().as_secs_f64()).bold()
    );
    Ok(())
}

fn cargo(args: &[&str]) -> Result<()> {
    let status = Command::new("cargo")
        .args(args)
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .context("Failed to start cargo")?;

    if !status.success() {
        bail!("cargo {} failed with exit code: {}", args.join(" "), status);
    }
    Ok(())
}
