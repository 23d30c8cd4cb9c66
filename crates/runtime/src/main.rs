//! `mapperd` CLI
//!
//! Drives a single connection from a TOML scenario file and prints the
//! samples it emits — a local demonstration harness, not a network
//! transport (the actual message parser and device lifecycle are out of
//! scope; see SPEC_FULL.md §1).

use clap::{CommandFactory, Parser as ClapParser, Subcommand};
use clap_complete::{generate, Shell};
use mapper_core::{DataType, Scalar, Timestamp};
use mapper_runtime::config::RuntimeConfig;
use mapper_runtime::property::{PropertyMessage, PropertyValue};
use mapper_runtime::Connection;
use serde::Deserialize;
use std::io;
use std::path::{Path, PathBuf};
use std::process;

#[derive(ClapParser)]
#[command(name = "mapperd")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Drive a connection from a TOML scenario and print emitted samples", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario file end to end
    Run {
        /// Path to a scenario TOML file
        scenario: PathBuf,

        /// Path to a runtime config TOML file (defaults used if omitted)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Generate shell completion scripts
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { scenario, config } => run_scenario(&scenario, config.as_deref()),
        Commands::Completions { shell } => run_completions(shell),
    }
}

fn run_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "mapperd", &mut io::stdout());
}

fn run_scenario(path: &Path, config_path: Option<&Path>) {
    let config = match config_path {
        Some(p) => match RuntimeConfig::from_toml_file(p) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        },
        None => RuntimeConfig::default(),
    };

    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("error reading {}: {e}", path.display());
            process::exit(1);
        }
    };

    let scenario: ScenarioFile = match toml::from_str(&text) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error parsing {}: {e}", path.display());
            process::exit(1);
        }
    };

    let source_type = scenario.connection.source_type.resolve();
    let dest_type = scenario.connection.dest_type.resolve();

    let mut conn = match Connection::new(
        source_type,
        scenario.connection.source_length,
        dest_type,
        scenario.connection.dest_length,
        scenario.connection.default_history_depth,
    ) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error creating connection: {e}");
            process::exit(1);
        }
    };
    conn.apply_config(&config);

    for property in &scenario.properties {
        let msg = property.to_property_message(source_type, dest_type);
        if let Err(e) = conn.apply_message(&msg) {
            eprintln!("error applying property message: {e}");
            process::exit(1);
        }
        tracing::debug!(mode = ?conn.mode, "applied property message");
    }

    let mut input = match mapper_core::History::new(scenario.connection.default_history_depth, scenario.connection.source_length, source_type) {
        Ok(h) => h,
        Err(e) => {
            eprintln!("error allocating input history: {e}");
            process::exit(1);
        }
    };

    for sample in &scenario.samples {
        let values: Vec<Scalar> = sample.values.iter().map(|v| Scalar::Float64(*v).cast_to(source_type)).collect();
        if let Err(e) = input.push(&values, Timestamp(sample.timestamp)) {
            eprintln!("error pushing sample: {e}");
            process::exit(1);
        }

        match conn.perform(&input) {
            Ok(true) => {
                let emitted = conn.output.read(0);
                println!("t={:.6} -> {}", sample.timestamp, format_sample(emitted));
            }
            Ok(false) => println!("t={:.6} -> (suppressed)", sample.timestamp),
            Err(e) => {
                eprintln!("error performing connection: {e}");
                process::exit(1);
            }
        }
    }
}

fn format_sample(values: &[Scalar]) -> String {
    let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!("[{}]", parts.join(", "))
}

#[derive(Deserialize)]
struct ScenarioFile {
    connection: ConnectionSpec,
    #[serde(default)]
    properties: Vec<PropertySpec>,
    samples: Vec<SampleSpec>,
}

#[derive(Deserialize)]
struct ConnectionSpec {
    source_type: ScalarTypeName,
    source_length: usize,
    dest_type: ScalarTypeName,
    dest_length: usize,
    #[serde(default = "default_history_depth")]
    default_history_depth: usize,
}

fn default_history_depth() -> usize {
    1
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum ScalarTypeName {
    Int32,
    Float32,
    Float64,
}

impl ScalarTypeName {
    fn resolve(&self) -> DataType {
        match self {
            ScalarTypeName::Int32 => DataType::Int32,
            ScalarTypeName::Float32 => DataType::Float32,
            ScalarTypeName::Float64 => DataType::Float64,
        }
    }
}

#[derive(Deserialize, Default)]
struct PropertySpec {
    mode: Option<String>,
    expression: Option<String>,
    src_min: Option<Vec<f64>>,
    src_max: Option<Vec<f64>>,
    dest_min: Option<Vec<f64>>,
    dest_max: Option<Vec<f64>>,
    min: Option<Vec<f64>>,
    max: Option<Vec<f64>>,
    mute: Option<bool>,
    bound_min: Option<String>,
    bound_max: Option<String>,
}

impl PropertySpec {
    fn to_property_message(&self, source_type: DataType, dest_type: DataType) -> PropertyMessage {
        let mut msg = PropertyMessage::new();
        let as_vec = |values: &[f64], ty: DataType| PropertyValue::Vector(values.iter().map(|v| Scalar::Float64(*v).cast_to(ty)).collect());

        if let Some(m) = &self.mode {
            msg.insert(mapper_runtime::property::KEY_MODE.to_string(), PropertyValue::Str(m.clone()));
        }
        if let Some(e) = &self.expression {
            msg.insert(mapper_runtime::property::KEY_EXPRESSION.to_string(), PropertyValue::Str(e.clone()));
        }
        if let Some(v) = &self.src_min {
            msg.insert(mapper_runtime::property::KEY_SRC_MIN.to_string(), as_vec(v, source_type));
        }
        if let Some(v) = &self.src_max {
            msg.insert(mapper_runtime::property::KEY_SRC_MAX.to_string(), as_vec(v, source_type));
        }
        if let Some(v) = &self.dest_min {
            msg.insert(mapper_runtime::property::KEY_DEST_MIN.to_string(), as_vec(v, dest_type));
        }
        if let Some(v) = &self.dest_max {
            msg.insert(mapper_runtime::property::KEY_DEST_MAX.to_string(), as_vec(v, dest_type));
        }
        if let Some(v) = &self.min {
            msg.insert(mapper_runtime::property::KEY_MIN.to_string(), as_vec(v, dest_type));
        }
        if let Some(v) = &self.max {
            msg.insert(mapper_runtime::property::KEY_MAX.to_string(), as_vec(v, dest_type));
        }
        if let Some(m) = self.mute {
            msg.insert(mapper_runtime::property::KEY_MUTE.to_string(), PropertyValue::Int(i64::from(m)));
        }
        if let Some(b) = &self.bound_min {
            msg.insert(mapper_runtime::property::KEY_BOUND_MIN.to_string(), PropertyValue::Str(b.clone()));
        }
        if let Some(b) = &self.bound_max {
            msg.insert(mapper_runtime::property::KEY_BOUND_MAX.to_string(), PropertyValue::Str(b.clone()));
        }
        msg
    }
}

#[derive(Deserialize)]
struct SampleSpec {
    values: Vec<f64>,
    timestamp: f64,
}
