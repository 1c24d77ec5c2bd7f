// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use iqlite::core::error::Result;
use iqlite::core::flow::{Flow, FlowRunner};
use iqlite::core::iqmeasure::SimulatedTester;
use iqlite::core::library::TestLibrary;
use iqlite::core::session::Technology;
use iqlite::core::settings::GlobalSettings;
use iqlite::core::vdut::VirtualDut;
use log::{error, info};

/// IQlite test function runner
#[derive(Parser)]
#[command(name = "iqlite")]
#[command(about = "Run IQlite test flows against the simulated station", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a TOML flow script
    Run {
        /// Path to the flow script
        flow: PathBuf,

        /// Global settings applied to both libraries (TOML)
        #[arg(short = 's', long)]
        settings: Option<PathBuf>,

        /// Write the JSON flow report here
        #[arg(short = 'r', long)]
        report: Option<PathBuf>,
    },

    /// List the functions of one or both libraries
    List {
        /// Technology (WiFi or BT); both when omitted
        technology: Option<String>,
    },

    /// Print the inputs and returns of a function as JSON
    Describe {
        /// Technology (WiFi or BT)
        technology: String,

        /// Function keyword, e.g. TX_VERIFY_EVM
        function: String,
    },
}

fn main() -> Result<()> {
    // Load .env file if present; a missing file is not an error
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize logger with default level INFO
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    match args.command {
        Command::Run {
            flow,
            settings,
            report,
        } => run(flow, settings, report),
        Command::List { technology } => list(technology.as_deref()),
        Command::Describe {
            technology,
            function,
        } => describe(&technology, &function),
    }
}

fn run(flow: PathBuf, settings: Option<PathBuf>, report_path: Option<PathBuf>) -> Result<()> {
    info!("iqlite v{}", env!("CARGO_PKG_VERSION"));

    let flow = Flow::load(&flow)?;
    let settings = match settings {
        Some(path) => GlobalSettings::load(&path)?,
        None => GlobalSettings::default(),
    };

    let mut runner = FlowRunner::new(VirtualDut::new(), SimulatedTester::new()).with_settings(settings);
    let report = runner.run(&flow);

    for step in &report.steps {
        let status = if step.passed() { "PASS" } else { "FAIL" };
        println!(
            "{:>3} {:<5} {:<4} {:<28} {:>9.3} ms",
            step.index + 1,
            status,
            step.technology,
            step.function,
            step.elapsed_ms
        );
        if !step.passed() {
            println!("      {}", step.message.trim_end());
        }
    }

    if let Some(path) = report_path {
        report.write(&path)?;
    }

    if !report.passed {
        error!(
            "Flow failed: {} failed, {} skipped",
            report.failures().count(),
            report.skipped
        );
        std::process::exit(1);
    }

    info!("Flow passed");
    Ok(())
}

fn list(technology: Option<&str>) -> Result<()> {
    let technologies = match technology {
        Some(name) => vec![name.parse::<Technology>()?],
        None => vec![Technology::Wifi, Technology::Bluetooth],
    };

    for technology in technologies {
        let library = TestLibrary::new(technology);
        println!("[{}]", technology);
        for keyword in library.keywords() {
            println!("  {}", keyword);
        }
    }
    Ok(())
}

fn describe(technology: &str, function: &str) -> Result<()> {
    let library = TestLibrary::new(technology.parse()?);
    let description = library.describe(function)?;
    println!("{}", serde_json::to_string_pretty(&description)?);
    Ok(())
}
