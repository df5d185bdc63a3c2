//! Go toolchain integration.
//!
//! Two concerns live here: the `go doc`-backed package introspector the
//! analyzer queries, and the `go mod` / `go build` / run steps the driver
//! performs on the generated project.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};
use breeze_parser::{
    BreezeError, BreezeResult, FunctionSig, MethodSig, PackageInfo, PackageIntrospector, Type,
    TypeIdentity,
};

/// Introspects host packages by parsing `go doc -all` output. Results are
/// cached per import path. Import paths that resolve to a local Breeze
/// module report an empty package, since the codegen pipeline compiles
/// those itself.
pub struct GoDocIntrospector {
    module_dirs: Vec<PathBuf>,
    cache: RefCell<HashMap<String, PackageInfo>>,
}

impl GoDocIntrospector {
    pub fn new(module_dirs: Vec<PathBuf>) -> Self {
        GoDocIntrospector {
            module_dirs,
            cache: RefCell::new(HashMap::new()),
        }
    }

    fn is_breeze_module(&self, path: &str) -> bool {
        !path.contains('/')
            && self
                .module_dirs
                .iter()
                .any(|dir| dir.join(format!("{path}.brz")).is_file())
    }
}

impl PackageIntrospector for GoDocIntrospector {
    fn load(&self, path: &str) -> BreezeResult<PackageInfo> {
        if let Some(info) = self.cache.borrow().get(path) {
            return Ok(info.clone());
        }
        if self.is_breeze_module(path) {
            return Ok(PackageInfo::default());
        }
        let output = Command::new("go")
            .args(["doc", "-all", path])
            .output()
            .map_err(|err| BreezeError::Introspection {
                path: path.to_string(),
                reason: err.to_string(),
            })?;
        if !output.status.success() {
            return Err(BreezeError::Introspection {
                path: path.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let text = String::from_utf8_lossy(&output.stdout);
        let info = parse_go_doc(&text);
        self.cache
            .borrow_mut()
            .insert(path.to_string(), info.clone());
        Ok(info)
    }
}

/// Extract functions, methods, interface method sets, type identities,
/// and constants from `go doc -all` output.
pub fn parse_go_doc(output: &str) -> PackageInfo {
    let mut info = PackageInfo::default();
    let mut lines = output.lines().peekable();

    while let Some(line) = lines.next() {
        let trimmed = line.trim_end();
        if let Some(rest) = trimmed.strip_prefix("func ") {
            parse_func_line(rest, &mut info);
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("type ") {
            if let Some((name, tail)) = rest.split_once(' ') {
                if tail.starts_with("struct") {
                    info.types.insert(name.to_string(), TypeIdentity::Struct);
                } else if tail.starts_with("interface") {
                    info.types.insert(name.to_string(), TypeIdentity::Interface);
                    let mut methods = Vec::new();
                    if tail.contains('{') && !tail.contains('}') {
                        for body_line in lines.by_ref() {
                            let body_line = body_line.trim();
                            if body_line == "}" {
                                break;
                            }
                            if let Some(method) = parse_method_line(body_line) {
                                methods.push(method);
                            }
                        }
                    }
                    info.interfaces.insert(name.to_string(), methods);
                }
            }
            continue;
        }
        if trimmed == "const (" || trimmed == "var (" {
            let is_const = trimmed.starts_with("const");
            for body_line in lines.by_ref() {
                let body_line = body_line.trim();
                if body_line == ")" {
                    break;
                }
                if is_const {
                    if let Some((name, ty)) = parse_const_line(body_line) {
                        info.constants.insert(name, ty);
                    }
                }
            }
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("const ") {
            if let Some((name, ty)) = parse_const_line(rest) {
                info.constants.insert(name, ty);
            }
        }
    }
    info
}

/// One `func` line: either a package function or a method with receiver.
fn parse_func_line(rest: &str, info: &mut PackageInfo) {
    let (key, sig_text) = if let Some(after_recv) = rest.strip_prefix('(') {
        // func (r *Request) Name(...) ...
        let Some(close) = after_recv.find(')') else {
            return;
        };
        let receiver = after_recv[..close]
            .rsplit(' ')
            .next()
            .unwrap_or("")
            .trim_start_matches('*');
        let tail = after_recv[close + 1..].trim_start();
        let Some(paren) = tail.find('(') else {
            return;
        };
        let name = &tail[..paren];
        (format!("{receiver}.{name}"), &tail[paren..])
    } else {
        let Some(paren) = rest.find('(') else {
            return;
        };
        (rest[..paren].to_string(), &rest[paren..])
    };
    if key.is_empty() {
        return;
    }
    if let Type::Function(sig) = Type::from_go_type(&format!("func{sig_text}")) {
        info.functions.insert(key, sig);
    }
}

/// One method inside an interface body: `Name(params) results`.
fn parse_method_line(line: &str) -> Option<MethodSig> {
    let paren = line.find('(')?;
    let name = line[..paren].trim();
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }
    match Type::from_go_type(&format!("func{}", &line[paren..])) {
        Type::Function(sig) => Some(MethodSig {
            name: name.to_string(),
            sig,
        }),
        _ => None,
    }
}

/// `Name Type = value`, `Name = value`, or `Name Type`.
fn parse_const_line(line: &str) -> Option<(String, Type)> {
    let line = line.split("//").next().unwrap_or(line).trim();
    if line.is_empty() {
        return None;
    }
    let (decl, value) = match line.split_once('=') {
        Some((decl, value)) => (decl.trim(), Some(value.trim())),
        None => (line, None),
    };
    let mut parts = decl.split_whitespace();
    let name = parts.next()?;
    if !name
        .chars()
        .next()
        .map(|c| c.is_ascii_uppercase())
        .unwrap_or(false)
    {
        return None;
    }
    let ty = match parts.next() {
        Some(ty_text) => Type::from_go_type(ty_text),
        None => value.map(infer_const_type).unwrap_or(Type::Any),
    };
    Some((name.to_string(), ty))
}

fn infer_const_type(value: &str) -> Type {
    if value.starts_with('"') || value.starts_with('`') {
        Type::string()
    } else if value.parse::<i64>().is_ok() {
        Type::int()
    } else if value.parse::<f64>().is_ok() {
        Type::float()
    } else if value == "true" || value == "false" {
        Type::bool()
    } else {
        Type::Any
    }
}

// ----------------------------------------------------------------------
// Build and run
// ----------------------------------------------------------------------

/// `go mod init` + `go mod tidy` in the generated project.
pub fn init_go_module(project_dir: &Path, name: &str) -> Result<()> {
    if !project_dir.join("go.mod").exists() {
        run_go(project_dir, &["mod", "init", name])
            .with_context(|| format!("go mod init {name}"))?;
    }
    run_go(project_dir, &["mod", "tidy"]).context("go mod tidy")?;
    Ok(())
}

/// `go build` the project into a binary named after the module.
pub fn build_go_project(project_dir: &Path, name: &str) -> Result<PathBuf> {
    run_go(project_dir, &["build", "-o", name, "."]).context("go build")?;
    Ok(project_dir.join(name))
}

/// Run the produced binary with inherited stdio; the child's exit code
/// comes back to the caller.
pub fn run_binary(binary: &Path) -> Result<i32> {
    let status = Command::new(binary)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .with_context(|| format!("running {}", binary.display()))?;
    Ok(status.code().unwrap_or(1))
}

fn run_go(dir: &Path, args: &[&str]) -> Result<()> {
    let output = Command::new("go")
        .args(args)
        .current_dir(dir)
        .output()
        .context("invoking the go toolchain")?;
    if !output.status.success() {
        bail!(
            "go {} failed:\n{}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_functions() {
        let doc = "\
func Println(a ...any) (n int, err error)
func Atoi(s string) (int, error)
";
        let info = parse_go_doc(doc);
        let println = info.functions.get("Println").expect("Println parsed");
        assert_eq!(println.params.len(), 1, "variadic collapses to one slice param");
        assert_eq!(println.returns.len(), 2);
        let atoi = info.functions.get("Atoi").expect("Atoi parsed");
        assert_eq!(atoi.params[0], Type::string());
        assert_eq!(atoi.returns[0], Type::int());
    }

    #[test]
    fn parses_methods_with_receivers() {
        let doc = "func (r *Request) FormValue(key string) string\n";
        let info = parse_go_doc(doc);
        let sig = info
            .functions
            .get("Request.FormValue")
            .expect("method keyed by receiver");
        assert_eq!(sig.params, vec![Type::string()]);
        assert_eq!(sig.returns, vec![Type::string()]);
    }

    #[test]
    fn parses_interface_method_sets() {
        let doc = "\
type Handler interface {
    ServeHTTP(ResponseWriter, *Request)
}
";
        let info = parse_go_doc(doc);
        assert_eq!(info.types.get("Handler"), Some(&TypeIdentity::Interface));
        let methods = info.interfaces.get("Handler").expect("Handler methods");
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].name, "ServeHTTP");
        assert_eq!(methods[0].sig.params.len(), 2);
    }

    #[test]
    fn parses_constant_blocks() {
        let doc = "\
const (
    StatusOK = 200
    MethodGet = \"GET\"
)
const DefaultMaxHeaderBytes = 1048576
";
        let info = parse_go_doc(doc);
        assert_eq!(info.constants.get("StatusOK"), Some(&Type::int()));
        assert_eq!(info.constants.get("MethodGet"), Some(&Type::string()));
        assert_eq!(
            info.constants.get("DefaultMaxHeaderBytes"),
            Some(&Type::int())
        );
    }

    #[test]
    fn struct_types_record_identity() {
        let doc = "type Server struct {\n    Addr string\n}\n";
        let info = parse_go_doc(doc);
        assert_eq!(info.types.get("Server"), Some(&TypeIdentity::Struct));
    }

    #[test]
    fn unused_sig_shapes_degrade_to_any() {
        let sig = FunctionSig::new(vec![Type::from_go_type("chan int")], vec![]);
        assert!(sig.params[0].is_any(), "channel types fall back to any");
    }
}
