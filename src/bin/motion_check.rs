use anyhow::{anyhow, Context, Result};
use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use waxwing_engine::assets;
use waxwing_engine::context::EngineContext;
use waxwing_engine::curve::BezierSolver;

fn main() {
    match run() {
        Ok(summary) => {
            if summary.failures > 0 {
                process::exit(2);
            }
        }
        Err(err) => {
            eprintln!("motion_check error: {err:?}");
            process::exit(1);
        }
    }
}

#[derive(Default)]
struct RunSummary {
    checked: usize,
    failures: usize,
}

struct CliOptions {
    sample: bool,
    show_help: bool,
    targets: Vec<String>,
}

fn run() -> Result<RunSummary> {
    let args: Vec<String> = env::args().skip(1).collect();
    let options = parse_cli_args(&args)?;
    if options.show_help {
        print_usage();
        return Ok(RunSummary::default());
    }
    let targets = collect_targets(&options.targets)?;
    if targets.is_empty() {
        return Err(anyhow!("no definition files found in provided paths"));
    }

    let mut context = EngineContext::default();
    let mut summary = RunSummary::default();
    for path in targets {
        summary.checked += 1;
        match check_file(&path, &mut context, options.sample) {
            Ok(()) => println!("OK {}", path.display()),
            Err(err) => {
                summary.failures += 1;
                println!("FAIL {} - {err:#}", path.display());
            }
        }
    }
    println!("Checked {} definitions ({} failed)", summary.checked, summary.failures);
    Ok(summary)
}

/// Files are routed by their inner extension: `*.motion.json`,
/// `*.expression.json`, `*.physics.json`. Anything else tries all three
/// parsers and fails with the motion parser's error.
fn check_file(path: &Path, context: &mut EngineContext, sample: bool) -> Result<()> {
    let name = path.file_name().and_then(|name| name.to_str()).unwrap_or_default();
    if name.ends_with(".expression.json") {
        assets::load_expression_from_path(path, context)?;
        return Ok(());
    }
    if name.ends_with(".physics.json") {
        assets::load_physics_from_path(path, context)?;
        return Ok(());
    }
    if name.ends_with(".motion.json") {
        let data = assets::load_motion_from_path(path, context)?;
        if sample {
            sample_motion(&data);
        }
        return Ok(());
    }

    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read definition file {}", path.display()))?;
    match assets::parse_motion(&json, context) {
        Ok(_) => Ok(()),
        Err(motion_err) => {
            if assets::parse_physics(&json, context).is_ok() {
                return Ok(());
            }
            // An expression with no parameters is indistinguishable from
            // arbitrary JSON; insist on at least one.
            match assets::parse_expression(&json, context) {
                Ok(expression) if !expression.parameters.is_empty() => Ok(()),
                _ => Err(motion_err),
            }
        }
    }
}

/// Walks every curve at a coarse sample rate so gross evaluation problems
/// (non-finite values) surface from the command line.
fn sample_motion(data: &waxwing_engine::motion::CurveMotionData) {
    const SAMPLES: u32 = 64;
    for curve in &data.curves {
        let mut minimum = f32::MAX;
        let mut maximum = f32::MIN;
        for step in 0..=SAMPLES {
            let time = data.duration * step as f32 / SAMPLES as f32;
            let value = curve.track.evaluate(time, BezierSolver::Cardano);
            if !value.is_finite() {
                println!("  non-finite sample at t={time:.3}");
                return;
            }
            minimum = minimum.min(value);
            maximum = maximum.max(value);
        }
        println!("  curve range [{minimum:.3}, {maximum:.3}] over {:.2}s", data.duration);
    }
}

fn print_usage() {
    eprintln!(
        "Motion Check

Usage:
  motion_check [--sample] <path> [<path>...]

Each <path> may be a file or directory. Directories are walked recursively
and *.motion.json / *.expression.json / *.physics.json files are parsed with
the playback loader. Use --sample to also evaluate every motion curve at a
coarse rate and report value ranges. Exit code 2 when any definition fails.
"
    );
}

fn parse_cli_args(args: &[String]) -> Result<CliOptions> {
    let mut options = CliOptions { sample: false, show_help: false, targets: Vec::new() };
    for arg in args {
        match arg.as_str() {
            "--sample" => options.sample = true,
            "--help" | "-h" => options.show_help = true,
            _ if arg.starts_with("--") => {
                return Err(anyhow!("unknown flag '{arg}'"));
            }
            _ => options.targets.push(arg.clone()),
        }
    }
    Ok(options)
}

fn collect_targets(inputs: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut seen = HashSet::new();
    for input in inputs {
        let path = PathBuf::from(input);
        if !path.exists() {
            return Err(anyhow!("path '{}' does not exist", input));
        }
        if path.is_file() {
            add_target(path, &mut seen, &mut files);
        } else if path.is_dir() {
            walk_dir(&path, &mut seen, &mut files)
                .with_context(|| format!("failed to enumerate directory '{}'", path.display()))?;
        } else {
            return Err(anyhow!("path '{}' is neither file nor directory", input));
        }
    }
    Ok(files)
}

fn walk_dir(dir: &Path, seen: &mut HashSet<PathBuf>, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            walk_dir(&path, seen, files)?;
        } else if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
            add_target(path, seen, files);
        }
    }
    Ok(())
}

fn add_target(path: PathBuf, seen: &mut HashSet<PathBuf>, files: &mut Vec<PathBuf>) {
    let normalized = fs::canonicalize(&path).unwrap_or(path);
    if seen.insert(normalized.clone()) {
        files.push(normalized);
    }
}
