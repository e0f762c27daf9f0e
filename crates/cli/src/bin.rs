use std::path::Path;

use anstream::println;
use clap::{CommandFactory, Parser};
use eyre::{Result, WrapErr, eyre};
use log::{debug, info};
use owo_colors::OwoColorize;
use tinybind::host::{FileFetcher, Storage};
use tinybind::{Bindings, Compiled, Config, ImportTable, Manifest, ModuleSource};

use crate::args::{Cli, Command, Run};
mod args;

fn main() -> Result<()> {
    let cli = Cli::parse();
    pretty_env_logger::formatted_builder().filter_level(cli.log_level.into()).init();

    match cli.command {
        Command::Run(run_args) => run(run_args),
        Command::Inspect { module, config } => inspect(&module, &load_config(config.as_deref())?),
        Command::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "tinybind", &mut std::io::stdout());
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path).wrap_err_with(|| format!("failed to read config {}", path.display())),
        None => Ok(Config::default()),
    }
}

fn read_module(path: &Path) -> Result<Vec<u8>> {
    match path.extension().is_some_and(|ext| ext == "wat") {
        #[cfg(feature = "wat")]
        true => {
            let wat = std::fs::read_to_string(path)?;
            Ok(wat::parse_str(&wat)?)
        }
        #[cfg(not(feature = "wat"))]
        true => Err(eyre!("wat support is not enabled in this build")),
        false => std::fs::read(path).wrap_err_with(|| format!("failed to read {}", path.display())),
    }
}

fn run(args: Run) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let mut bindings = Bindings::new(config)?;

    if let Some(path) = args.storage.as_deref().filter(|path| path.exists()) {
        let json = std::fs::read_to_string(path)?;
        bindings.host().set_storage(Storage::from_json(&json, bindings.config().storage_quota)?);
        debug!("restored {} stored items", bindings.host().storage().len());
    }

    match &args.module {
        Some(path) => bindings.init_sync(Compiled::compile(&read_module(path)?)?)?,
        None => bindings.init(ModuleSource::Default, &mut FileFetcher)?,
    };
    info!("module started");

    for selector in &args.click {
        let targets = {
            let document = bindings.host().document();
            document.query_selector_all(document.root(), selector)?
        };
        if targets.is_empty() {
            return Err(eyre!("no element matches `{selector}`"));
        }

        for target in targets {
            bindings.dispatch_event(target, "click")?;
        }
    }

    if let Some(func) = &args.func {
        let result = bindings.call(func, &args.args)?;
        println!("{result:?}");
    }

    if let Some(ms) = args.advance {
        let fired = bindings.advance_timers(ms)?;
        info!("{fired} timers fired");
    }

    if let Some(path) = &args.storage {
        std::fs::write(path, bindings.host().storage().to_json()?)?;
    }

    if args.html {
        let document = bindings.host().document();
        println!("{}", document.outer_html(document.root()));
    }

    Ok(())
}

fn inspect(path: &Path, config: &Config) -> Result<()> {
    let manifest = Manifest::parse(&read_module(path)?)?;
    let table = ImportTable::with_defaults();
    let coverage = table.coverage(&manifest, &config.import_module);
    let missing = coverage.iter().filter(|(_, bound)| !bound).count();

    println!("{}", "imports".bold());
    for (import, (name, bound)) in manifest.imports.iter().zip(&coverage) {
        match bound {
            true => println!("  {} {}::{} {}", "✓".green(), import.module, name, format!("({})", import.binding()).dimmed()),
            false => println!("  {} {}::{}", "✗".red(), import.module, name),
        }
    }

    println!("{}", "exports".bold());
    for export in &manifest.exports {
        println!("  {} {}", export.name, format!("({:?})", export.kind).dimmed());
    }

    match missing {
        0 => Ok(()),
        missing => Err(eyre!("{missing} imports have no binding")),
    }
}
