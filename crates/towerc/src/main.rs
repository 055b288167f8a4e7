use std::env;
use std::path::Path;
use std::process;

use towerc::diag::{Diag, Level, to_report};
use towerc::sema::{ResolveOptions, is_identifier, verify_bindings};

const USAGE: &str = "usage: towerc [--dump] [--json] [--invoke-name NAME] [--log LEVEL] <tree.json|tree.bin>";

fn main() {
    let mut args = env::args().skip(1);
    let mut dump = false;
    let mut json = false;
    let mut options = match ResolveOptions::from_env() {
        Ok(options) => options,
        Err(err) => {
            eprintln!("error: {err}");
            process::exit(2);
        }
    };
    let mut log_level: Option<String> = None;
    let mut path = None;

    while let Some(arg) = args.next() {
        if arg == "--dump" {
            dump = true;
            continue;
        }
        if arg == "--json" {
            json = true;
            continue;
        }
        if arg == "--invoke-name" {
            if let Some(name) = args.next() {
                if !is_identifier(&name) {
                    eprintln!("error: invalid invoke name: {name}");
                    process::exit(2);
                }
                options.invoke_name = name;
            } else {
                eprintln!("--invoke-name expects a name");
                eprintln!("{USAGE}");
                process::exit(2);
            }
            continue;
        }
        if arg == "--log" {
            if let Some(level) = args.next() {
                log_level = Some(level);
            } else {
                eprintln!("--log expects a level");
                eprintln!("{USAGE}");
                process::exit(2);
            }
            continue;
        }
        if path.is_none() {
            path = Some(arg);
        } else {
            eprintln!("unexpected argument: {arg}");
            eprintln!("{USAGE}");
            process::exit(2);
        }
    }

    tower_rt::log::init(log_level.as_deref());

    let path = match path {
        Some(p) => p,
        None => {
            eprintln!("{USAGE}");
            process::exit(2);
        }
    };

    let (program, analysis, diags) = match towerc::resolve_path(Path::new(&path), &options) {
        Ok(result) => result,
        Err(err) => {
            if json {
                println!("{}", tower_rt::error::error_json("load", &err.to_string()));
            } else {
                eprintln!("error: {err}");
            }
            process::exit(1);
        }
    };

    let unbound = verify_bindings(&program, &analysis.bindings);
    if !unbound.is_empty() {
        tracing::warn!(count = unbound.len(), "expressions left without a type");
    }

    if json {
        println!("{}", to_report(&diags).to_json());
    } else {
        print_diags(&diags);
    }

    if dump {
        print!("{}", towerc::dump::dump_program(&program, &analysis.bindings));
    }

    if diags.iter().any(|diag| diag.level == Level::Error) {
        process::exit(1);
    }
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
            None => eprintln!(
                "{level}: {} ({}..{})",
                diag.message, diag.span.start, diag.span.end
            ),
        }
    }
}
