//! Command definitions and dispatch

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use sitepatch_engine::{SnapshotError, SnapshotManager};
use sitepatch_pipeline::{
    ArtifactPatchPipeline, Manifest, PipelineConfig, PipelineError, DEFAULT_MANIFEST,
    EXIT_FAILURE, EXIT_STRUCTURAL,
};
use std::path::{Path, PathBuf};
use tracing::info;

pub(crate) fn build_cli() -> Command {
    Command::new("sitepatch")
        .version(sitepatch_pipeline::VERSION)
        .about("Idempotent patching of generated static-site artifacts")
        .arg(
            Arg::new("root")
                .long("root")
                .global(true)
                .default_value(".")
                .value_parser(value_parser!(PathBuf))
                .help("Project root; artifact paths resolve against it"),
        )
        .arg(
            Arg::new("manifest")
                .long("manifest")
                .value_parser(value_parser!(PathBuf))
                .help("Manifest file [default: <root>/sitepatch.toml]"),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .action(ArgAction::SetTrue)
                .help("Report what would change without writing anything"),
        )
        .arg(
            Arg::new("retain")
                .long("retain")
                .value_parser(value_parser!(usize))
                .help("Keep only the newest N backups per artifact"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Output as JSON"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log every step"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines on stderr"),
        )
        .subcommand(
            Command::new("backups")
                .about("List backups of an artifact, oldest first")
                .arg(
                    Arg::new("file")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Artifact path"),
                ),
        )
        .subcommand(
            Command::new("restore")
                .about("Restore an artifact from a backup, backing up its current state first")
                .arg(
                    Arg::new("backup")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Backup file"),
                ),
        )
}

/// Run the selected command, printing its result to stdout
pub(crate) fn dispatch(matches: &ArgMatches) -> Result<()> {
    let json = matches.get_flag("json");
    match matches.subcommand() {
        Some(("backups", args)) => list_backups(required_path(args, "file")?, json),
        Some(("restore", args)) => restore(required_path(args, "backup")?, json),
        _ => run(matches, json),
    }
}

/// Exit code for an error returned by [`dispatch`]
pub(crate) fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(err) = err.downcast_ref::<PipelineError>() {
        err.exit_code()
    } else if err.downcast_ref::<SnapshotError>().is_some() {
        EXIT_STRUCTURAL
    } else {
        EXIT_FAILURE
    }
}

fn required_path<'a>(args: &'a ArgMatches, id: &str) -> Result<&'a Path> {
    args.get_one::<PathBuf>(id)
        .map(PathBuf::as_path)
        .with_context(|| format!("missing argument <{id}>"))
}

fn run(matches: &ArgMatches, json: bool) -> Result<()> {
    let root = matches
        .get_one::<PathBuf>("root")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("."));
    let manifest_path = matches
        .get_one::<PathBuf>("manifest")
        .cloned()
        .unwrap_or_else(|| root.join(DEFAULT_MANIFEST));

    let manifest = Manifest::load(&manifest_path)
        .map_err(PipelineError::from)
        .with_context(|| format!("loading {}", manifest_path.display()))?;
    let config = PipelineConfig::new(&root)
        .with_dry_run(matches.get_flag("dry-run"))
        .with_retention(matches.get_one::<usize>("retain").copied());

    let report = ArtifactPatchPipeline::new(manifest, config)
        .run()
        .with_context(|| format!("patching site at {}", root.display()))?;

    if json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report.generate_text());
    }
    Ok(())
}

fn list_backups(file: &Path, json: bool) -> Result<()> {
    let backups = SnapshotManager::backups(file)
        .with_context(|| format!("listing backups of {}", file.display()))?;

    if json {
        let paths: Vec<String> = backups
            .iter()
            .map(|b| b.path.display().to_string())
            .collect();
        println!("{}", serde_json::to_string_pretty(&paths)?);
    } else if backups.is_empty() {
        println!("no backups of {}", file.display());
    } else {
        for backup in &backups {
            println!("{}", backup.path.display());
        }
    }
    Ok(())
}

fn restore(backup: &Path, json: bool) -> Result<()> {
    let restored = SnapshotManager::from_now()
        .restore(backup)
        .with_context(|| format!("restoring {}", backup.display()))?;
    info!(artifact = %restored.artifact.display(), "artifact restored");

    if json {
        let value = serde_json::json!({
            "artifact": restored.artifact.display().to_string(),
            "backup": backup.display().to_string(),
            "previous": restored.previous.as_ref().map(|p| p.display().to_string()),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("restored {} from {}", restored.artifact.display(), backup.display());
        if let Some(previous) = &restored.previous {
            println!("previous content saved to {}", previous.display());
        }
    }
    Ok(())
}
