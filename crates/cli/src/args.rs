use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use tinywasm::types::WasmValue;

#[derive(Parser)]
#[command(name = "tinybind", version, about = "Run wasm-bindgen style modules on a headless page")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log level
    #[arg(short, long, global = true, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,
}

#[derive(Subcommand)]
pub enum Command {
    /// Load a module, start it and drive the page
    Run(Run),

    /// List a module's imports and whether a binding exists for each
    Inspect {
        /// Module to inspect (.wasm, or .wat with the `wat` feature)
        module: PathBuf,

        /// Settings file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print shell completions
    Completions {
        shell: Shell,
    },
}

#[derive(Args)]
pub struct Run {
    /// Module to run (.wasm, or .wat with the `wat` feature). Defaults to the configured artifact
    pub module: Option<PathBuf>,

    /// Settings file (JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Local storage file (JSON), read before and written after the run
    #[arg(short, long)]
    pub storage: Option<PathBuf>,

    /// Dispatch a click on every element matching this selector, after startup
    #[arg(long, value_name = "SELECTOR")]
    pub click: Vec<String>,

    /// Advance the virtual clock by this many milliseconds
    #[arg(short, long, value_name = "MS")]
    pub advance: Option<u64>,

    /// Export to call once the page is set up
    #[arg(short, long)]
    pub func: Option<String>,

    /// Arguments for `--func`, as `type:value` (i32, i64, f32, f64)
    #[arg(short = 'A', long = "arg", value_parser = parse_wasm_value)]
    pub args: Vec<WasmValue>,

    /// Print the document when done
    #[arg(long)]
    pub html: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => Self::Off,
            LogLevel::Error => Self::Error,
            LogLevel::Warn => Self::Warn,
            LogLevel::Info => Self::Info,
            LogLevel::Debug => Self::Debug,
            LogLevel::Trace => Self::Trace,
        }
    }
}

pub fn parse_wasm_value(arg: &str) -> Result<WasmValue, String> {
    let (ty, value) = arg.split_once(':').ok_or_else(|| format!("expected `type:value`, got `{arg}`"))?;
    let invalid = |err: &dyn std::fmt::Display| format!("invalid {ty} `{value}`: {err}");

    Ok(match ty {
        "i32" => WasmValue::I32(value.parse().map_err(|e| invalid(&e))?),
        "i64" => WasmValue::I64(value.parse().map_err(|e| invalid(&e))?),
        "f32" => WasmValue::F32(value.parse().map_err(|e| invalid(&e))?),
        "f64" => WasmValue::F64(value.parse().map_err(|e| invalid(&e))?),
        ty => return Err(format!("unsupported argument type `{ty}`")),
    })
}
