//! Output-project assembly.
//!
//! One Breeze entry file becomes a Go module directory: `main.go` for the
//! entry unit and `lib/<name>/<name>.go` for every imported Breeze module
//! and every standard-library module. Imported modules run the identical
//! lex, parse, analyze, transform, generate pipeline before the importing
//! unit is emitted.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use breeze_parser::{Analyzer, Diagnostic, PackageIntrospector, Program, Stmt, Transformer};

use crate::error::{CodegenError, CodegenResult};
use crate::generator::CodeGenerator;

pub struct ProjectOptions {
    pub out_dir: PathBuf,
    /// Module path written into the generated project's imports.
    pub go_module: String,
    /// Directory the entry file lives in; sibling `.brz` files import as
    /// modules.
    pub source_dir: PathBuf,
    /// Standard-library source directory, when configured.
    pub stdlib_dir: Option<PathBuf>,
}

pub struct ProjectGenerator {
    introspector: Rc<dyn PackageIntrospector>,
    options: ProjectOptions,
    compiled: BTreeSet<String>,
    /// Semantic diagnostics per unit, surfaced by the driver.
    pub diagnostics: Vec<(String, Vec<Diagnostic>)>,
}

impl ProjectGenerator {
    pub fn new(introspector: Rc<dyn PackageIntrospector>, options: ProjectOptions) -> Self {
        ProjectGenerator {
            introspector,
            options,
            compiled: BTreeSet::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Compile the entry source and everything it pulls in; returns the
    /// path of the generated `main.go`.
    pub fn generate(&mut self, entry_source: &str, entry_name: &str) -> CodegenResult<PathBuf> {
        fs::create_dir_all(&self.options.out_dir)?;
        self.compile_stdlib()?;
        let text = self.compile_unit(entry_source, entry_name, true)?;
        let main_path = self.options.out_dir.join("main.go");
        fs::write(&main_path, text)?;
        Ok(main_path)
    }

    /// Every module under the standard-library directory lands in `lib/`,
    /// imported or not, the way the entry unit expects to find them.
    fn compile_stdlib(&mut self) -> CodegenResult<()> {
        let Some(dir) = self.options.stdlib_dir.clone() else {
            return Ok(());
        };
        if !dir.is_dir() {
            return Ok(());
        }
        let mut entries: Vec<PathBuf> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "brz"))
            .collect();
        entries.sort();
        for path in entries {
            if let Some(name) = module_name(&path) {
                self.compile_module(&name, &path)?;
            }
        }
        Ok(())
    }

    fn compile_module(&mut self, name: &str, path: &Path) -> CodegenResult<()> {
        if self.compiled.contains(name) {
            return Ok(());
        }
        self.compiled.insert(name.to_string());
        let source = fs::read_to_string(path)?;
        let text = self.compile_unit(&source, name, false)?;
        let dir = self.options.out_dir.join("lib").join(name);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(format!("{name}.go")), text)?;
        Ok(())
    }

    fn compile_unit(
        &mut self,
        source: &str,
        unit: &str,
        is_main: bool,
    ) -> CodegenResult<String> {
        let mut program = breeze_parser::parse(source).map_err(|source| CodegenError::Unit {
            unit: unit.to_string(),
            source,
        })?;

        let mut analyzer = Analyzer::new(Rc::clone(&self.introspector));
        analyzer.analyze(&mut program);
        Transformer::new(&mut analyzer).transform(&mut program);
        if !analyzer.diagnostics.is_empty() {
            self.diagnostics
                .push((unit.to_string(), analyzer.diagnostics.clone()));
        }

        // Imports that resolve to sibling or stdlib sources are Breeze
        // modules; compile them first.
        let modules = self.breeze_imports(&program);
        for (name, path) in &modules {
            self.compile_module(name, path)?;
        }

        let mut generator = CodeGenerator::new(&mut analyzer, &self.options.go_module);
        generator.breeze_modules =
            modules.iter().map(|(name, _)| name.clone()).collect();
        let text = if is_main {
            generator.generate_main(&program)
        } else {
            generator.generate_library(&program, unit)
        };
        Ok(text)
    }

    fn breeze_imports(&self, program: &Program) -> Vec<(String, PathBuf)> {
        let mut found = Vec::new();
        for stmt in &program.statements {
            let Stmt::Import { path, .. } = stmt else {
                continue;
            };
            if path.contains('/') {
                continue;
            }
            if let Some(file) = self.resolve_module(path) {
                found.push((path.clone(), file));
            }
        }
        found
    }

    fn resolve_module(&self, name: &str) -> Option<PathBuf> {
        let local = self.options.source_dir.join(format!("{name}.brz"));
        if local.is_file() {
            return Some(local);
        }
        let stdlib = self
            .options
            .stdlib_dir
            .as_ref()?
            .join(format!("{name}.brz"));
        stdlib.is_file().then_some(stdlib)
    }
}

/// File stem used as the module and package name.
pub fn module_name(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
}
