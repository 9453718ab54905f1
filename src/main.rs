//! Main entry point for the ooxpack CLI application.
//!
//! Loads a package through the codec (local first, remote service when
//! configured), runs one command against it through the operation façade
//! and writes it back when the command changed anything.

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde_json::{Value, json};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ooxpack::cli::{Cli, Command};
use ooxpack::config::Config;
use ooxpack::extensions::{ModuleFilter, global};
use ooxpack::io::{BlobStore, LocalBlobStore};
use ooxpack::opc::OoxmlPackage;
use ooxpack::remote::{FallbackCodec, PackageCodec};
use ooxpack::zip::BuildOptions;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level())),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&cli)?;
    if config.extensions != ModuleFilter::default() {
        let mut facade = global().write();
        facade.registry_mut().set_filter(config.extensions.clone());
        facade.reload();
    }

    let codec = config.remote.codec()?;
    let options = config.build_options();
    let (store, id) = LocalBlobStore::for_file(&cli.file)?;

    if !cli.reads_input() {
        return match &cli.command {
            Command::New { colors, major, minor } => {
                let mut args = json!({});
                if !colors.is_empty() {
                    args["colors"] = json!(colors);
                }
                if let Some(major) = major {
                    args["major"] = json!(major);
                }
                if let Some(minor) = minor {
                    args["minor"] = json!(minor);
                }
                let (_, produced) = global().read().call_static("createFromTemplate", &args)?;
                let Some(mut package) = produced else {
                    bail!("createFromTemplate produced no package");
                };
                save(&cli, &codec, &options, &mut package).await
            },
            _ => {
                list_operations();
                Ok(())
            },
        };
    }

    let data = store
        .load(&id)
        .await
        .with_context(|| format!("Failed to read {}", cli.file.display()))?;
    let archive = codec.extract(&data).await?;
    let mut package = OoxmlPackage::open(archive)?;
    info!(file = %cli.file.display(), parts = package.archive().len(), "loaded package");

    let produced = run(&cli, &mut package)?;
    if let Some(mut created) = produced {
        return save(&cli, &codec, &options, &mut created).await;
    }
    if !package.archive().dirty_paths().is_empty() || cli.output.is_some() {
        save(&cli, &codec, &options, &mut package).await?;
    }
    Ok(())
}

/// Config file first, then command-line overrides.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(level) = cli.level {
        config.compression_level = level;
    }
    if let Some(remote) = &cli.remote {
        config.remote.endpoint = Some(remote.clone());
    }
    config.validate()?;
    Ok(config)
}

/// Run a command against a loaded package. A static operation invoked
/// through `call` may hand back a new package to save instead.
fn run(cli: &Cli, package: &mut OoxmlPackage) -> Result<Option<OoxmlPackage>> {
    let facade = global().read();
    let result = match &cli.command {
        Command::List => {
            list_parts(package, cli.verbose > 0);
            return Ok(None);
        },
        Command::Theme => facade.call("getTheme", package, &Value::Null)?,
        Command::SetColors { colors } => facade.call("setColors", package, &json!({ "colors": colors }))?,
        Command::SetFonts { major, minor } => {
            facade.call("setFonts", package, &json!({ "major": major, "minor": minor }))?
        },
        Command::ApplyTheme { prompt } => facade.call("applyTheme", package, &json!({ "prompt": prompt }))?,
        Command::ReplaceText { search, replace } => facade.call(
            "replaceText",
            package,
            &json!({ "search": search, "replace": replace }),
        )?,
        Command::Validate => {
            let report = facade.call("validatePackage", package, &Value::Null)?;
            print_json(&report)?;
            let problems = report["findings"].as_array().map_or(0, Vec::len);
            if problems > 0 {
                bail!("{} problem(s) found", problems);
            }
            return Ok(None);
        },
        Command::Call { name, args } => {
            let args: Value =
                serde_json::from_str(args).with_context(|| format!("Invalid JSON arguments for {}", name))?;
            let is_static = facade
                .operations()
                .iter()
                .any(|op| op.name == *name && op.is_static);
            if is_static {
                let (value, produced) = facade.call_static(name, &args)?;
                print_json(&value)?;
                return Ok(produced);
            }
            facade.call(name, package, &args)?
        },
        Command::New { .. } | Command::Ops => return Ok(None),
    };
    print_json(&result)?;
    Ok(None)
}

async fn save(
    cli: &Cli,
    codec: &FallbackCodec,
    options: &BuildOptions,
    package: &mut OoxmlPackage,
) -> Result<()> {
    let bytes = codec.build(package.archive_mut(), options).await?;
    let (store, id) = LocalBlobStore::for_file(cli.output_path())?;
    store
        .save(&id, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", cli.output_path().display()))?;
    if !cli.quiet {
        eprintln!("wrote {} ({})", cli.output_path().display(), format_size(bytes.len() as u64));
    }
    Ok(())
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn list_operations() {
    let facade = global().read();
    println!("{:<22}  {:<16}  Kind", "Operation", "Provider");
    println!("{}", "-".repeat(50));
    for op in facade.operations() {
        let kind = if op.is_static { "static" } else { "instance" };
        println!("{:<22}  {:<16}  {}", op.name, op.provider, kind);
    }
    for (name, missing) in &facade.last_report().rejected {
        eprintln!("rejected module {}: missing {}", name, missing.join(", "));
    }
}

/// List the parts in the package.
///
/// Simple format prints one path per line. Verbose format prints a table
/// with sizes, compression ratio and timestamps, followed by a totals line.
fn list_parts(package: &OoxmlPackage, verbose: bool) {
    let entries = package.archive().entries();

    if verbose {
        println!(
            "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  {:<6}  Name",
            "Length", "Size", "Cmpr", "Date", "Time", "Method"
        );
        println!("{}", "-".repeat(78));
    }

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in entries {
        if !verbose {
            println!("{}", entry.path());
            continue;
        }
        let (year, month, day) = entry.mod_date();
        let (hour, minute, _second) = entry.mod_time();
        let length = entry.data().len() as u64;
        let size = entry.raw().map_or(length, |raw| raw.len() as u64);
        let method = format!("{:?}", entry.method());

        println!(
            "{:>10}  {:>10}  {}  {:04}-{:02}-{:02}  {:02}:{:02}  {:<6}  {}",
            length,
            size,
            ratio(size, length),
            year,
            month,
            day,
            hour,
            minute,
            method,
            entry.path()
        );

        if !entry.is_directory() {
            total_uncompressed += length;
            total_compressed += size;
            file_count += 1;
        }
    }

    if verbose {
        println!("{}", "-".repeat(78));
        println!(
            "{:>10}  {:>10}  {}  {:>29}  {} parts, {} on disk",
            total_uncompressed,
            total_compressed,
            ratio(total_compressed, total_uncompressed),
            "",
            file_count,
            format_size(package.archive().original_size())
        );
    }
}

/// Percentage saved by compression.
fn ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed > 0 && compressed <= uncompressed {
        format!("{:>4}%", 100 - (compressed * 100 / uncompressed))
    } else {
        "  0%".to_string()
    }
}

/// Format a byte size into a human-readable string.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
