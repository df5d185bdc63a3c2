//! End-to-end driver: source file in, running binary out.

use std::env;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{anyhow, Context, Result};
use breeze_codegen::{CodegenError, ProjectGenerator, ProjectOptions};
use breeze_parser::BreezeError;

use crate::cli::Cli;
use crate::gotool::{self, GoDocIntrospector};

/// Compile, build, and (unless `--emit-only`) run. Returns the process
/// exit code to propagate.
pub fn run(cli: &Cli) -> Result<i32> {
    let source = fs::read_to_string(&cli.file)
        .with_context(|| format!("reading {}", cli.file.display()))?;
    let stem = cli
        .file
        .file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("{} has no usable file name", cli.file.display()))?;
    let source_dir = cli
        .file
        .parent()
        .map(PathBuf::from)
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from("."));
    let out_dir = cli
        .out
        .clone()
        .unwrap_or_else(|| source_dir.join(format!("{stem}_out")));
    let stdlib_dir = env::var_os("BREEZE_STDLIB").map(PathBuf::from);

    if cli.verbose {
        eprintln!("compiling {} -> {}", cli.file.display(), out_dir.display());
    }

    let mut module_dirs = vec![source_dir.clone()];
    if let Some(dir) = &stdlib_dir {
        module_dirs.push(dir.clone());
    }
    let introspector = Rc::new(GoDocIntrospector::new(module_dirs));

    let mut project = ProjectGenerator::new(
        introspector,
        ProjectOptions {
            out_dir: out_dir.clone(),
            go_module: stem.clone(),
            source_dir,
            stdlib_dir,
        },
    );

    match project.generate(&source, &stem) {
        Ok(path) => {
            if cli.verbose {
                eprintln!("generated {}", path.display());
            }
        }
        Err(CodegenError::Unit { unit, source }) => {
            report_parse_failure(&unit, &source);
            return Ok(1);
        }
        Err(err) => return Err(err.into()),
    }

    // Semantic diagnostics are advisory; the build continues.
    for (unit, diagnostics) in &project.diagnostics {
        for diagnostic in diagnostics {
            eprintln!("warning: {unit}: {diagnostic}");
        }
    }

    if cli.emit_only {
        return Ok(0);
    }

    gotool::init_go_module(&out_dir, &stem)?;
    let binary = gotool::build_go_project(&out_dir, &stem)?;
    if cli.verbose {
        eprintln!("built {}", binary.display());
    }
    gotool::run_binary(&binary)
}

fn report_parse_failure(unit: &str, error: &BreezeError) {
    match error {
        BreezeError::Parse(diagnostics) => {
            eprintln!("error: {unit}: {}", error);
            for diagnostic in diagnostics {
                eprintln!("  {diagnostic}");
            }
        }
        other => eprintln!("error: {unit}: {other}"),
    }
}
