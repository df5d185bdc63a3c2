//! Go source emission for one compilation unit.
//!
//! The generator runs against the analyzer state left by the earlier
//! passes: symbol types decide `:=` versus `=`, operand types decide
//! string and float promotion, and the per-call wrapper records apply
//! host adapters. Host imports collect as a side effect of emission and
//! land in the file header at the end.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use breeze_parser::transform::format_float;
use breeze_parser::{Analyzer, Block, Expr, Program, Stmt, Type};

const INDENT: &str = "\t";

pub struct CodeGenerator<'a> {
    analyzer: &'a mut Analyzer,
    /// Go module path of the output project, for Breeze module imports.
    go_module: String,
    /// Names of imported Breeze modules; their members capitalize.
    pub breeze_modules: BTreeSet<String>,
    imports: BTreeSet<String>,
    indent: usize,
    out: String,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(analyzer: &'a mut Analyzer, go_module: impl Into<String>) -> Self {
        CodeGenerator {
            analyzer,
            go_module: go_module.into(),
            breeze_modules: BTreeSet::new(),
            imports: BTreeSet::new(),
            indent: 0,
            out: String::new(),
        }
    }

    /// Emit a `package main` file whose loose statements wrap in `main`.
    pub fn generate_main(&mut self, program: &Program) -> String {
        self.generate(program, "main", true)
    }

    /// Emit a library package; only function bindings surface, exported
    /// by capitalization.
    pub fn generate_library(&mut self, program: &Program, package: &str) -> String {
        self.generate(program, package, false)
    }

    fn generate(&mut self, program: &Program, package: &str, is_main: bool) -> String {
        self.out.clear();
        self.imports.clear();

        let mut functions = String::new();
        let mut body = String::new();

        for stmt in &program.statements {
            match stmt {
                Stmt::Import { path, .. } => self.collect_import(path),
                Stmt::Assignment { targets, value, .. }
                    if matches!(value, Expr::Function { .. })
                        && targets.len() == 1
                        && targets[0].ident_name().is_some() =>
                {
                    let text = self.function_decl(targets, value, is_main);
                    functions.push_str(&text);
                    functions.push('\n');
                }
                other if is_main => {
                    self.indent = 1;
                    let text = self.statement(other);
                    body.push_str(&text);
                    self.indent = 0;
                }
                _ => {}
            }
        }

        let mut file = String::new();
        let _ = writeln!(file, "package {package}");
        file.push('\n');
        if !self.imports.is_empty() {
            file.push_str("import (\n");
            for import in &self.imports {
                let _ = writeln!(file, "{INDENT}\"{import}\"");
            }
            file.push_str(")\n\n");
        }
        file.push_str(&functions);
        if is_main {
            file.push_str("func main() {\n");
            file.push_str(&body);
            file.push_str("}\n");
        }
        file
    }

    fn collect_import(&mut self, path: &str) {
        if self.breeze_modules.contains(path) {
            self.imports.insert(format!("{}/lib/{path}", self.go_module));
        } else {
            self.imports.insert(path.to_string());
        }
    }

    // ------------------------------------------------------------------
    // Functions
    // ------------------------------------------------------------------

    fn function_decl(&mut self, targets: &[Expr], value: &Expr, is_main: bool) -> String {
        let Some(bound) = targets.first().and_then(Expr::ident_name) else {
            return String::new();
        };
        let Expr::Function { name, params, body, .. } = value else {
            return String::new();
        };
        let decl_name = if is_main {
            bound.to_string()
        } else {
            capitalize(bound)
        };
        if let Some(symbol) = self.analyzer.table.resolve_mut(bound) {
            symbol.declared = true;
        }

        let scope = name.clone();
        let sig = self
            .analyzer
            .table
            .find_anywhere(bound)
            .and_then(|s| s.function_sig().cloned())
            .unwrap_or_else(|| breeze_parser::FunctionSig::new(vec![Type::Any; params.len()], Vec::new()));

        self.analyzer.table.enter_scope(&scope);
        let mut text = String::new();
        let _ = write!(
            text,
            "func {decl_name}({})",
            self.param_list(params, &sig.params)
        );
        text.push_str(&returns_clause(&sig.returns));
        text.push_str(" {\n");
        self.indent = 1;
        text.push_str(&self.function_body(body, &sig.returns));
        self.indent = 0;
        text.push_str("}\n");
        self.analyzer.table.pop_scope();
        text
    }

    fn param_list(&mut self, params: &[breeze_parser::Param], types: &[Type]) -> String {
        let mut parts = Vec::with_capacity(params.len());
        for (i, param) in params.iter().enumerate() {
            let ty = types.get(i).cloned().unwrap_or(Type::Any);
            if let Some(symbol) = self.analyzer.table.resolve_mut(&param.name) {
                symbol.declared = true;
            }
            parts.push(format!("{} {}", param.name, go_type(&ty)));
        }
        parts.join(", ")
    }

    fn function_body(&mut self, body: &Block, returns: &[Type]) -> String {
        let mut text = String::new();
        for stmt in &body.statements {
            text.push_str(&self.statement(stmt));
        }
        // A declared result without a trailing return gets zero values.
        let needs_default = !returns.is_empty()
            && !matches!(body.statements.last(), Some(Stmt::Return { .. }));
        if needs_default {
            let zeros: Vec<&str> = returns.iter().map(zero_value).collect();
            let _ = writeln!(text, "{}return {}", self.pad(), zeros.join(", "));
        }
        text
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn pad(&self) -> String {
        INDENT.repeat(self.indent)
    }

    fn statement(&mut self, stmt: &Stmt) -> String {
        match stmt {
            Stmt::Assignment { targets, value, .. } => self.assignment(targets, value),
            Stmt::Expression(expr) => {
                let text = self.expression(expr);
                format!("{}{}\n", self.pad(), text)
            }
            Stmt::Return { values, .. } => {
                let rendered: Vec<String> =
                    values.iter().map(|v| self.expression(v)).collect();
                if rendered.is_empty() {
                    format!("{}return\n", self.pad())
                } else {
                    format!("{}return {}\n", self.pad(), rendered.join(", "))
                }
            }
            Stmt::If {
                condition,
                consequence,
                alternative,
            } => {
                let cond = self.expression(condition);
                let mut text = format!("{}if {cond} {{\n", self.pad());
                text.push_str(&self.block(consequence));
                match alternative {
                    Some(alt) => {
                        let _ = write!(text, "{}}} else {{\n", self.pad());
                        text.push_str(&self.block(alt));
                        let _ = writeln!(text, "{}}}", self.pad());
                    }
                    None => {
                        let _ = writeln!(text, "{}}}", self.pad());
                    }
                }
                text
            }
            Stmt::While { condition, body } => {
                let cond = self.expression(condition);
                let mut text = format!("{}for {cond} {{\n", self.pad());
                text.push_str(&self.block(body));
                let _ = writeln!(text, "{}}}", self.pad());
                text
            }
            Stmt::For {
                binding,
                iterable,
                body,
            } => self.for_statement(binding, iterable, body),
            Stmt::Import { path, .. } => {
                self.collect_import(path);
                String::new()
            }
            Stmt::Defer { text } => {
                self.note_host_text(text);
                format!("{}defer {}\n", self.pad(), self.rewrite_module_calls(text))
            }
            Stmt::Go { text } => {
                self.note_host_text(text);
                format!("{}go {}\n", self.pad(), self.rewrite_module_calls(text))
            }
        }
    }

    fn block(&mut self, block: &Block) -> String {
        self.indent += 1;
        let mut text = String::new();
        for stmt in &block.statements {
            text.push_str(&self.statement(stmt));
        }
        self.indent -= 1;
        text
    }

    fn for_statement(&mut self, binding: &str, iterable: &Expr, body: &Block) -> String {
        let iter_ty = self.analyzer.type_of(iterable);
        let iter_text = self.expression(iterable);
        if let Some(symbol) = self.analyzer.table.resolve_mut(binding) {
            symbol.declared = true;
        }
        let header = match iter_ty {
            // Maps range over keys; everything else takes values.
            Type::Map(_, _) => format!("for {binding} := range {iter_text}"),
            _ => format!("for _, {binding} := range {iter_text}"),
        };
        let mut text = format!("{}{header} {{\n", self.pad());
        text.push_str(&self.block(body));
        let _ = writeln!(text, "{}}}", self.pad());
        text
    }

    fn assignment(&mut self, targets: &[Expr], value: &Expr) -> String {
        // Local function bindings become closures through the normal path.
        let value_text = self.expression(value);
        let pad = self.pad();

        let mut names = Vec::with_capacity(targets.len());
        let mut all_idents = true;
        for target in targets {
            match target.ident_name() {
                Some(name) => names.push(name.to_string()),
                None => {
                    all_idents = false;
                    break;
                }
            }
        }

        if !all_idents || names.is_empty() {
            let rendered: Vec<String> =
                targets.iter().map(|t| self.expression(t)).collect();
            return format!("{pad}{} = {value_text}\n", rendered.join(", "));
        }

        let mut any_new = false;
        let mut prelude = String::new();
        for name in &names {
            let (declared, distinct) = match self.analyzer.table.resolve(name) {
                Some(symbol) => {
                    // Unresolved entries in the history are inference gaps,
                    // not retypings; only real retyping declares loose.
                    let mut seen = BTreeSet::new();
                    for ty in &symbol.assigned {
                        if !ty.is_any() {
                            seen.insert(ty.to_string());
                        }
                    }
                    (symbol.declared, seen.len())
                }
                None => (false, 1),
            };
            if !declared {
                any_new = true;
                // Symbols reassigned across types declare loose up front.
                if distinct > 1 {
                    let _ = writeln!(prelude, "{pad}var {name} any");
                }
            }
            if let Some(symbol) = self.analyzer.table.resolve_mut(name) {
                symbol.declared = true;
            }
        }

        let op = if prelude.is_empty() && any_new { ":=" } else { "=" };
        format!("{prelude}{pad}{} {op} {value_text}\n", names.join(", "))
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn expression(&mut self, expr: &Expr) -> String {
        match expr {
            Expr::Ident { name, .. } => name.clone(),
            Expr::Int { value } => value.to_string(),
            Expr::Float { value } => format_float(*value),
            Expr::Str { value } => quote_go(value),
            Expr::Bool { value } => if *value { "true" } else { "false" }.to_string(),
            Expr::None => "nil".to_string(),
            Expr::Prefix { op, operand } => {
                format!("{op}{}", self.expression(operand))
            }
            Expr::Infix { op, left, right } => self.infix(op, left, right),
            Expr::Call { .. } => self.call(expr),
            Expr::Index { object, index } => self.index(object, index),
            Expr::Selector { object, field } => self.selector(object, field),
            Expr::Function { name, params, body, .. } => {
                self.closure(name, params, body)
            }
            Expr::Array {
                elements,
                elem_type,
            } => {
                let rendered: Vec<String> =
                    elements.iter().map(|e| self.expression(e)).collect();
                format!("[]{}{{{}}}", go_type(elem_type), rendered.join(", "))
            }
            Expr::MapLit {
                pairs,
                key_type,
                value_type,
            } => {
                let rendered: Vec<String> = pairs
                    .iter()
                    .map(|(k, v)| {
                        format!("{}: {}", self.expression(k), self.expression(v))
                    })
                    .collect();
                format!(
                    "map[{}]{}{{{}}}",
                    go_type(key_type),
                    go_type(value_type),
                    rendered.join(", ")
                )
            }
            Expr::Receive { channel } => {
                format!("<-{}", self.expression(channel))
            }
            Expr::Send { channel, value } => {
                format!("{} <- {}", self.expression(channel), self.expression(value))
            }
            Expr::TypeConversion { target, operand } => {
                format!("{}({})", go_type(target), self.expression(operand))
            }
            Expr::HostText(text) => {
                self.note_host_text(text);
                text.clone()
            }
        }
    }

    /// String contagion and numeric widening, decided by operand types.
    fn infix(&mut self, op: &str, left: &Expr, right: &Expr) -> String {
        let lt = self.analyzer.type_of(left);
        let rt = self.analyzer.type_of(right);

        if op == "+" && (lt.is_string() || rt.is_string()) {
            let l = self.string_operand(left, &lt);
            let r = self.string_operand(right, &rt);
            return format!("{l} + {r}");
        }

        let arithmetic = matches!(op, "+" | "-" | "*" | "/" | "%");
        if arithmetic && (lt.is_float() || rt.is_float()) {
            let l = self.float_operand(left, &lt);
            let r = self.float_operand(right, &rt);
            return format!("{l} {op} {r}");
        }
        if arithmetic && (lt.is_any() || rt.is_any()) && (lt.is_numeric() || rt.is_numeric()) {
            // A loose operand meeting a known int asserts its way out.
            let l = self.int_operand(left, &lt);
            let r = self.int_operand(right, &rt);
            return format!("{l} {op} {r}");
        }

        format!(
            "{} {op} {}",
            self.expression(left),
            self.expression(right)
        )
    }

    fn string_operand(&mut self, expr: &Expr, ty: &Type) -> String {
        let text = self.expression(expr);
        if ty.is_string() {
            text
        } else {
            self.imports.insert("fmt".to_string());
            format!("fmt.Sprintf(\"%v\", {text})")
        }
    }

    fn float_operand(&mut self, expr: &Expr, ty: &Type) -> String {
        let text = self.expression(expr);
        if ty.is_float() || matches!(expr, Expr::Int { .. } | Expr::Float { .. }) {
            return text;
        }
        if ty.is_any() {
            return format!("{text}.(float64)");
        }
        format!("float64({text})")
    }

    fn int_operand(&mut self, expr: &Expr, ty: &Type) -> String {
        let text = self.expression(expr);
        if ty.is_any() && !matches!(expr, Expr::Int { .. }) {
            return format!("{text}.(int)");
        }
        text
    }

    fn call(&mut self, expr: &Expr) -> String {
        let Expr::Call { id, function, args, .. } = expr else {
            return String::new();
        };

        // Builtins first.
        if let Some(name) = function.ident_name() {
            if name == "print" {
                self.imports.insert("fmt".to_string());
                let rendered = self.arguments(args, &[]);
                return format!("fmt.Println({rendered})");
            }
            if name == "len" {
                let rendered = self.arguments(args, &[]);
                return format!("len({rendered})");
            }
        }

        let wrappers = self
            .analyzer
            .wrap_calls
            .get(id)
            .cloned()
            .unwrap_or_default();
        let callee = self.expression(function);
        let rendered = self.arguments(args, &wrappers);
        format!("{callee}({rendered})")
    }

    fn arguments(
        &mut self,
        args: &[Option<Expr>],
        wrappers: &[breeze_parser::WrapperInfo],
    ) -> String {
        let mut parts = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let text = match arg {
                Some(a) => self.expression(a),
                None => "nil".to_string(),
            };
            let text = match wrappers.iter().find(|w| w.arg_index == i) {
                Some(info) => format!("{}({text})", info.adapter),
                None => text,
            };
            parts.push(text);
        }
        parts.join(", ")
    }

    fn index(&mut self, object: &Expr, index: &Expr) -> String {
        let obj = self.expression(object);
        // Negative literal indexing counts back from the end.
        if let Expr::Prefix { op, operand } = index {
            if op == "-" {
                if let Expr::Int { value } = operand.as_ref() {
                    return format!("{obj}[len({obj})-{value}]");
                }
            }
        }
        format!("{obj}[{}]", self.expression(index))
    }

    fn selector(&mut self, object: &Expr, field: &str) -> String {
        if let Some(base) = object.ident_name() {
            if self.breeze_modules.contains(base) {
                return format!("{base}.{}", capitalize(field));
            }
        }
        format!("{}.{field}", self.expression(object))
    }

    fn closure(
        &mut self,
        scope: &str,
        params: &[breeze_parser::Param],
        body: &Block,
    ) -> String {
        let sig = self
            .analyzer
            .table
            .find_anywhere(scope)
            .and_then(|s| s.function_sig().cloned())
            .unwrap_or_else(|| {
                breeze_parser::FunctionSig::new(vec![Type::Any; params.len()], Vec::new())
            });
        self.analyzer.table.enter_scope(scope);
        let mut text = format!("func({})", self.param_list(params, &sig.params));
        text.push_str(&returns_clause(&sig.returns));
        text.push_str(" {\n");
        self.indent += 1;
        text.push_str(&self.function_body(body, &sig.returns));
        self.indent -= 1;
        let _ = write!(text, "{}}}", self.pad());
        self.analyzer.table.pop_scope();
        text
    }

    /// Verbatim host fragments can still reference packages; keep their
    /// imports alive.
    fn note_host_text(&mut self, text: &str) {
        if text.contains("fmt.") {
            self.imports.insert("fmt".to_string());
        }
        if text.contains("time.") {
            self.imports.insert("time".to_string());
        }
        if text.contains("sync.") {
            self.imports.insert("sync".to_string());
        }
    }

    /// Calls to Breeze-module members inside verbatim text still need
    /// their exported names.
    fn rewrite_module_calls(&self, text: &str) -> String {
        let mut out = text.to_string();
        for module in &self.breeze_modules {
            let prefix = format!("{module}.");
            let mut from = 0;
            while let Some(pos) = out[from..].find(&prefix) {
                let tail = from + pos + prefix.len();
                let Some(c) = out[tail..].chars().next() else {
                    break;
                };
                let upper: String = c.to_uppercase().collect();
                out.replace_range(tail..tail + c.len_utf8(), &upper);
                from = tail + upper.len();
            }
        }
        out
    }
}

/// Render a type in host syntax. The algebra's canonical strings are
/// already Go-shaped; `any` covers the rest.
pub fn go_type(ty: &Type) -> String {
    match ty {
        Type::Any => "any".to_string(),
        other => other.to_string(),
    }
}

fn returns_clause(returns: &[Type]) -> String {
    match returns {
        [] => String::new(),
        [single] => format!(" {}", go_type(single)),
        many => {
            let rendered: Vec<String> = many.iter().map(go_type).collect();
            format!(" ({})", rendered.join(", "))
        }
    }
}

fn zero_value(ty: &Type) -> &'static str {
    match ty {
        Type::Basic(name) if name == "string" => "\"\"",
        Type::Basic(name) if name == "bool" => "false",
        ty if ty.is_numeric() => "0",
        _ => "nil",
    }
}

pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Go-escaped double-quoted string literal.
pub fn quote_go(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}
