use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tower_rt::error::RtError;
use towerc::ast::Program;
use towerc::diag::{Diag, Level};
use towerc::sema::{BindingTable, ResolveOptions, is_identifier};

const USAGE: &str = r#"usage: tower <command> [options]

commands:
  check     Resolve every source tree and report diagnostics
  build     Resolve and write .tower/build/program.bin
  dump      Resolve and print the typed tree

options:
  --manifest-path <path>  Path to tower.toml (defaults to nearest parent)
  --file <path>           Resolve a single tree instead of the manifest sources
  --invoke-name <name>    Call-operator name override
  --clean                 Remove .tower/build before building (build only)
"#;

const MANIFEST_FILE: &str = "tower.toml";
const BUILD_DIR: &str = ".tower/build";
const PROGRAM_ARTIFACT: &str = "program.bin";

#[derive(Debug, Deserialize)]
struct Manifest {
    package: PackageConfig,
    #[serde(default)]
    resolve: Option<ResolveConfig>,
    #[serde(default)]
    log: Option<LogConfig>,
}

#[derive(Debug, Deserialize)]
struct PackageConfig {
    name: Option<String>,
    #[serde(default)]
    sources: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ResolveConfig {
    invoke_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LogConfig {
    level: Option<String>,
}

/// Written by `tower build`; read back by downstream tooling.
#[derive(Debug, Serialize, Deserialize)]
struct BuildArtifact {
    program: Program,
    bindings: BindingTable,
}

#[derive(Default)]
struct CommonArgs {
    manifest_path: Option<PathBuf>,
    file: Option<PathBuf>,
    invoke_name: Option<String>,
    clean: bool,
}

#[derive(Copy, Clone)]
enum Command {
    Check,
    Build,
    Dump,
}

fn emit_cli_error(message: &str) {
    eprintln!("error: {message}");
}

fn command_tag(command: Command) -> &'static str {
    match command {
        Command::Check => "check",
        Command::Build => "build",
        Command::Dump => "dump",
    }
}

fn emit_command_step(command: Command, message: &str) {
    eprintln!("[{}] {message}", command_tag(command));
}

fn finalize_command(command: Command, code: i32) -> i32 {
    match code {
        0 => emit_command_step(command, "ok"),
        2 => emit_command_step(command, "resolution failed"),
        _ => emit_command_step(command, "failed"),
    }
    code
}

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    let code = run(args);
    std::process::exit(code);
}

fn run(args: Vec<String>) -> i32 {
    let Some((cmd, rest)) = args.split_first() else {
        eprintln!("{USAGE}");
        return 1;
    };
    let command = match cmd.as_str() {
        "check" => Command::Check,
        "build" => Command::Build,
        "dump" => Command::Dump,
        _ => {
            emit_cli_error(&format!("unknown command: {cmd}"));
            eprintln!("{USAGE}");
            return 1;
        }
    };
    let common = match parse_common_args(rest, matches!(command, Command::Build)) {
        Ok(args) => args,
        Err(err) => {
            emit_cli_error(&err);
            eprintln!("{USAGE}");
            return 1;
        }
    };

    let (manifest, manifest_dir) = match load_manifest(common.manifest_path.as_deref()) {
        Ok(value) => value,
        Err(err) => {
            emit_cli_error(&err);
            return 1;
        }
    };
    let log_level = manifest
        .as_ref()
        .and_then(|m| m.log.as_ref())
        .and_then(|log| log.level.clone());
    tower_rt::log::init(log_level.as_deref());

    if matches!(command, Command::Build) && common.clean {
        return finalize_command(command, clean_build_dir(manifest_dir.as_deref()));
    }

    let sources = match resolve_sources(&common, manifest.as_ref(), manifest_dir.as_deref()) {
        Ok(sources) => sources,
        Err(err) => {
            emit_cli_error(&err);
            return 1;
        }
    };
    let options = match resolve_options(&common, manifest.as_ref()) {
        Ok(options) => options,
        Err(err) => {
            emit_cli_error(&err);
            return 1;
        }
    };
    tracing::info!(
        package = manifest.as_ref().and_then(|m| m.package.name.as_deref()).unwrap_or("-"),
        sources = sources.len(),
        invoke_name = %options.invoke_name,
        "resolving project"
    );

    emit_command_step(command, "start");
    let mut program = match towerc::load_programs(&sources) {
        Ok(program) => program,
        Err(err) => {
            emit_cli_error(&err.to_string());
            return finalize_command(command, 1);
        }
    };
    let (analysis, diags) = towerc::resolve_program(&mut program, &options);
    print_diags(&diags);
    let failed = diags.iter().any(|diag| diag.level == Level::Error);

    let code = match command {
        Command::Check => {
            if failed { 2 } else { 0 }
        }
        Command::Dump => {
            print!("{}", towerc::dump::dump_program(&program, &analysis.bindings));
            if failed { 2 } else { 0 }
        }
        Command::Build => {
            if failed {
                2
            } else {
                let artifact = BuildArtifact {
                    program,
                    bindings: analysis.bindings,
                };
                match write_artifact(manifest_dir.as_deref(), &artifact) {
                    Ok(path) => {
                        tracing::info!(path = %path.display(), "wrote build artifact");
                        0
                    }
                    Err(err) => {
                        emit_cli_error(&err);
                        1
                    }
                }
            }
        }
    };
    finalize_command(command, code)
}

fn parse_common_args(args: &[String], allow_clean: bool) -> Result<CommonArgs, String> {
    let mut out = CommonArgs::default();
    let mut idx = 0;
    while idx < args.len() {
        let arg = &args[idx];
        if arg == "--manifest-path" {
            idx += 1;
            let Some(path) = args.get(idx) else {
                return Err("--manifest-path expects a path".to_string());
            };
            out.manifest_path = Some(PathBuf::from(path));
            idx += 1;
            continue;
        }
        if arg == "--file" {
            idx += 1;
            let Some(path) = args.get(idx) else {
                return Err("--file expects a path".to_string());
            };
            out.file = Some(PathBuf::from(path));
            idx += 1;
            continue;
        }
        if arg == "--invoke-name" {
            idx += 1;
            let Some(name) = args.get(idx) else {
                return Err("--invoke-name expects a name".to_string());
            };
            out.invoke_name = Some(name.clone());
            idx += 1;
            continue;
        }
        if arg == "--clean" {
            if !allow_clean {
                return Err("--clean is only supported for tower build".to_string());
            }
            out.clean = true;
            idx += 1;
            continue;
        }
        if arg.starts_with("--") {
            return Err(format!("unknown option: {arg}"));
        }
        if out.file.is_none() {
            let candidate = PathBuf::from(arg);
            if out.manifest_path.is_none() && candidate.is_dir() && candidate.join(MANIFEST_FILE).exists() {
                out.manifest_path = Some(candidate);
            } else {
                out.file = Some(candidate);
            }
            idx += 1;
            continue;
        }
        return Err(format!("unexpected argument: {arg}"));
    }
    Ok(out)
}

fn load_manifest(manifest_override: Option<&Path>) -> Result<(Option<Manifest>, Option<PathBuf>), String> {
    let (manifest_path, manifest_dir) = if let Some(path) = manifest_override {
        if path.is_dir() {
            (Some(path.join(MANIFEST_FILE)), Some(path.to_path_buf()))
        } else {
            (Some(path.to_path_buf()), path.parent().map(|p| p.to_path_buf()))
        }
    } else {
        let cwd = env::current_dir().map_err(|err| format!("cwd error: {err}"))?;
        let path = find_manifest(&cwd);
        let dir = path.as_ref().and_then(|p| p.parent().map(|p| p.to_path_buf()));
        (path, dir)
    };

    let Some(path) = manifest_path else {
        return Ok((None, None));
    };
    let content = fs::read_to_string(&path)
        .map_err(|source| RtError::Read {
            path: path.clone(),
            source,
        })
        .map_err(|err| err.to_string())?;
    let manifest: Manifest = toml::from_str(&content).map_err(|err| format!("invalid manifest: {err}"))?;
    Ok((Some(manifest), manifest_dir))
}

fn find_manifest(start: &Path) -> Option<PathBuf> {
    let mut dir = start;
    loop {
        let candidate = dir.join(MANIFEST_FILE);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
}

fn resolve_sources(
    common: &CommonArgs,
    manifest: Option<&Manifest>,
    manifest_dir: Option<&Path>,
) -> Result<Vec<PathBuf>, String> {
    if let Some(file) = &common.file {
        return Ok(vec![file.clone()]);
    }
    let Some(manifest) = manifest else {
        return Err(format!("no {MANIFEST_FILE} found and no --file given"));
    };
    if manifest.package.sources.is_empty() {
        return Err("manifest lists no [package] sources".to_string());
    }
    let base = manifest_base_dir(manifest_dir)?;
    Ok(manifest
        .package
        .sources
        .iter()
        .map(|source| resolve_manifest_relative_path(&base, source))
        .collect())
}

/// Flag, then `TOWER_RESOLVE_INVOKE_NAME`, then the manifest.
fn resolve_options(common: &CommonArgs, manifest: Option<&Manifest>) -> Result<ResolveOptions, String> {
    let mut options = ResolveOptions::default();
    if let Some(name) = manifest
        .and_then(|m| m.resolve.as_ref())
        .and_then(|resolve| resolve.invoke_name.clone())
    {
        options.invoke_name = name;
    }
    options.apply_env().map_err(|err| err.to_string())?;
    if let Some(name) = &common.invoke_name {
        options.invoke_name = name.clone();
    }
    if !is_identifier(&options.invoke_name) {
        return Err(format!("invalid invoke name: {}", options.invoke_name));
    }
    Ok(options)
}

fn resolve_manifest_relative_path(base: &Path, path: &str) -> PathBuf {
    let path = PathBuf::from(path);
    if path.is_absolute() { path } else { base.join(path) }
}

fn manifest_base_dir(manifest_dir: Option<&Path>) -> Result<PathBuf, String> {
    match manifest_dir {
        Some(dir) => Ok(dir.to_path_buf()),
        None => env::current_dir().map_err(|err| format!("cwd error: {err}")),
    }
}

fn build_dir(manifest_dir: Option<&Path>) -> Result<PathBuf, String> {
    Ok(manifest_base_dir(manifest_dir)?.join(BUILD_DIR))
}

fn clean_build_dir(manifest_dir: Option<&Path>) -> i32 {
    let dir = match build_dir(manifest_dir) {
        Ok(dir) => dir,
        Err(err) => {
            emit_cli_error(&err);
            return 1;
        }
    };
    if !dir.exists() {
        return 0;
    }
    match fs::remove_dir_all(&dir) {
        Ok(()) => 0,
        Err(source) => {
            emit_cli_error(&RtError::Write { path: dir, source }.to_string());
            1
        }
    }
}

fn write_artifact(manifest_dir: Option<&Path>, artifact: &BuildArtifact) -> Result<PathBuf, String> {
    let dir = build_dir(manifest_dir)?;
    fs::create_dir_all(&dir).map_err(|source| {
        RtError::Write {
            path: dir.clone(),
            source,
        }
        .to_string()
    })?;
    let bytes = bincode::serialize(artifact).map_err(|err| format!("artifact encode failed: {err}"))?;
    let path = dir.join(PROGRAM_ARTIFACT);
    fs::write(&path, bytes).map_err(|source| {
        RtError::Write {
            path: path.clone(),
            source,
        }
        .to_string()
    })?;
    Ok(path)
}

fn print_diags(diags: &[Diag]) {
    for diag in diags {
        let level = match diag.level {
            Level::Error => "error",
            Level::Warning => "warning",
        };
        match &diag.path {
            Some(path) => eprintln!(
                "{level}: {}: {} ({}..{})",
                path.display(),
                diag.message,
                diag.span.start,
                diag.span.end
            ),
            None => eprintln!("{level}: {} ({}..{})", diag.message, diag.span.start, diag.span.end),
        }
    }
}
