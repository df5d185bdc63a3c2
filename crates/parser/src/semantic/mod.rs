//! Best-effort semantic analysis.
//!
//! The analyzer never fails a build. Unresolved names become `any`,
//! mismatches degrade to `any`, and everything suspicious is reported as a
//! diagnostic. What it does produce is shared state for the two passes
//! behind it: symbol tables with inferred types, descriptor maps for
//! imported host packages, adapter-wrapper records for call sites, and the
//! list of observed calls that assignment widening fans out through.

pub mod external;
pub mod table;

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::ast::{Block, Expr, NodeId, Program, Stmt};
use crate::error::Diagnostic;
use crate::types::{FunctionSig, Type};
use external::{ExternalRegistry, PackageIntrospector, TypeIdentity};
use table::SymbolTable;

/// A call argument that must be wrapped in a host adapter before the call
/// type-checks, e.g. a bare function passed where an interface is wanted.
#[derive(Debug, Clone, PartialEq)]
pub struct WrapperInfo {
    pub arg_index: usize,
    pub adapter: String,
}

/// One observed call: who was called and which plain identifiers were
/// passed at which positions. Assignment widening replays these records.
#[derive(Debug, Clone)]
pub struct CallRecord {
    pub callee: String,
    pub ident_args: Vec<Option<String>>,
}

pub struct Analyzer {
    pub table: SymbolTable,
    pub external: ExternalRegistry,
    /// Aliases of imported host packages.
    pub packages: HashSet<String>,
    pub wrap_calls: HashMap<NodeId, Vec<WrapperInfo>>,
    pub expected_returns: HashMap<NodeId, Type>,
    pub call_records: Vec<CallRecord>,
    pub diagnostics: Vec<Diagnostic>,
    introspector: Rc<dyn PackageIntrospector>,
    return_frames: Vec<Vec<Vec<Type>>>,
}

impl Analyzer {
    pub fn new(introspector: Rc<dyn PackageIntrospector>) -> Self {
        let mut table = SymbolTable::new();
        // Builtins available in every unit.
        table.define_global(
            "print",
            Type::Function(FunctionSig::new(vec![Type::array(Type::Any)], Vec::new())),
        );
        table.define_global(
            "len",
            Type::Function(FunctionSig::new(vec![Type::Any], vec![Type::int()])),
        );
        Analyzer {
            table,
            external: ExternalRegistry::new(),
            packages: HashSet::new(),
            wrap_calls: HashMap::new(),
            expected_returns: HashMap::new(),
            call_records: Vec::new(),
            diagnostics: Vec::new(),
            introspector,
            return_frames: Vec::new(),
        }
    }

    pub fn introspector(&self) -> Rc<dyn PackageIntrospector> {
        Rc::clone(&self.introspector)
    }

    pub fn analyze(&mut self, program: &mut Program) {
        for stmt in &mut program.statements {
            self.statement(stmt);
        }
    }

    fn statement(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::Assignment { targets, value, .. } => {
                self.assignment(targets, value);
            }
            Stmt::Expression(expr) => {
                self.expression(expr);
            }
            Stmt::Return { values, .. } => {
                let types: Vec<Type> = values.iter_mut().map(|v| self.expression(v)).collect();
                if let Some(frame) = self.return_frames.last_mut() {
                    frame.push(types);
                }
            }
            Stmt::If {
                condition,
                consequence,
                alternative,
            } => {
                self.expression(condition);
                self.block(consequence);
                if let Some(alt) = alternative {
                    self.block(alt);
                }
            }
            Stmt::While { condition, body } => {
                self.expression(condition);
                self.block(body);
            }
            Stmt::For {
                binding,
                iterable,
                body,
            } => {
                let iter_ty = self.expression(iterable);
                let elem = element_type(&iter_ty);
                self.table.define(binding.clone(), elem);
                self.block(body);
            }
            Stmt::Import { path, line } => self.import(path, *line),
            Stmt::Defer { .. } | Stmt::Go { .. } => {}
        }
    }

    fn block(&mut self, block: &mut Block) {
        for stmt in &mut block.statements {
            self.statement(stmt);
        }
    }

    // ------------------------------------------------------------------
    // Assignments and widening
    // ------------------------------------------------------------------

    fn assignment(&mut self, targets: &mut [Expr], value: &mut Expr) {
        let value_ty = self.expression(value);

        // Multiple targets split a multi-return call positionally.
        let per_target = self.target_types(targets.len(), value, &value_ty);

        for (target, ty) in targets.iter_mut().zip(per_target) {
            match target {
                Expr::Ident { name, .. } => {
                    let name = name.clone();
                    match self.table.resolve(&name) {
                        None => {
                            self.table.define(name, ty);
                        }
                        Some(existing) => {
                            let existing_ty = existing.ty.clone();
                            if existing_ty.to_string() != ty.to_string() {
                                self.widen(&name, ty.clone());
                            }
                            // A concrete slot constrains the call feeding it.
                            if !existing_ty.is_any() {
                                if let Expr::Call { id, .. } = value {
                                    self.expected_returns.insert(*id, existing_ty);
                                }
                            }
                        }
                    }
                }
                other => {
                    self.expression(other);
                }
            }
        }
    }

    fn target_types(&self, count: usize, value: &Expr, value_ty: &Type) -> Vec<Type> {
        if count > 1 {
            if let Some(returns) = self.call_returns(value) {
                if returns.len() == count {
                    return returns;
                }
            }
            return vec![Type::Any; count];
        }
        vec![value_ty.clone()]
    }

    fn call_returns(&self, value: &Expr) -> Option<Vec<Type>> {
        let Expr::Call { function, .. } = value else {
            return None;
        };
        let sig = match self.callee_name(function) {
            Some(name) => match self.table.find_anywhere(&name) {
                Some(symbol) => symbol.function_sig().cloned(),
                None => self.external.function(&name).cloned(),
            },
            None => None,
        }?;
        Some(sig.returns)
    }

    /// Retype `name` and fan the new type out to every recorded call that
    /// passes it, so callee parameters widen with their arguments.
    pub(crate) fn widen(&mut self, name: &str, ty: Type) {
        self.table.assign(name, ty.clone());
        let touched: Vec<(String, usize)> = self
            .call_records
            .iter()
            .flat_map(|record| {
                record.ident_args.iter().enumerate().filter_map(|(i, arg)| {
                    (arg.as_deref() == Some(name)).then(|| (record.callee.clone(), i))
                })
            })
            .collect();
        for (callee, index) in touched {
            // Builtins and host functions have no scope of their own and
            // never widen.
            if self.table.has_scope(&callee) {
                self.table.update_function_param(&callee, index, ty.clone());
            }
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    pub fn expression(&mut self, expr: &mut Expr) -> Type {
        match expr {
            Expr::Ident { name, .. } => {
                let name = name.clone();
                match self.table.resolve(&name) {
                    Some(symbol) => symbol.ty.clone(),
                    None => {
                        // Unknown names join the scope as `any`.
                        self.table.define(name, Type::Any);
                        Type::Any
                    }
                }
            }
            Expr::Int { .. } => Type::int(),
            Expr::Float { .. } => Type::float(),
            Expr::Str { .. } => Type::string(),
            Expr::Bool { .. } => Type::bool(),
            Expr::None => Type::Any,
            Expr::Prefix { op, operand } => {
                let ty = self.expression(operand);
                if op == "!" {
                    Type::bool()
                } else {
                    ty
                }
            }
            Expr::Infix { op, left, right } => {
                let lt = self.expression(left);
                let rt = self.expression(right);
                infer_infix(op, &lt, &rt)
            }
            Expr::Call { .. } => self.call(expr),
            Expr::Index { object, index } => {
                let obj_ty = self.expression(object);
                self.expression(index);
                element_type(&obj_ty)
            }
            Expr::Selector { object, field } => {
                let field = field.clone();
                self.selector(object, &field)
            }
            Expr::Function { .. } => self.function_literal(expr),
            Expr::Array {
                elements,
                elem_type,
            } => {
                let member_types: Vec<Type> =
                    elements.iter_mut().map(|e| self.expression(e)).collect();
                if elem_type.is_any() {
                    let unified = Type::unify(member_types);
                    if !unified.is_any() {
                        *elem_type = unified;
                    }
                }
                Type::array(elem_type.clone())
            }
            Expr::MapLit {
                pairs,
                key_type,
                value_type,
            } => {
                for (key, value) in pairs.iter_mut() {
                    self.expression(key);
                    self.expression(value);
                }
                Type::map(key_type.clone(), value_type.clone())
            }
            Expr::Receive { channel } => {
                self.expression(channel);
                Type::Any
            }
            Expr::Send { channel, value } => {
                self.expression(channel);
                self.expression(value);
                Type::Any
            }
            Expr::TypeConversion { target, operand } => {
                self.expression(operand);
                target.clone()
            }
            Expr::HostText(_) => Type::string(),
        }
    }

    fn function_literal(&mut self, expr: &mut Expr) -> Type {
        let Expr::Function {
            id,
            name,
            params,
            body,
        } = expr
        else {
            return Type::Any;
        };
        if name.is_empty() {
            *name = format!("fn{}", id.as_u32());
        }
        let scope_name = name.clone();
        let param_names: Vec<String> = params.iter().map(|p| p.name.clone()).collect();

        // Defined up front so the body can recurse.
        let placeholder = FunctionSig::new(vec![Type::Any; param_names.len()], Vec::new());
        self.table
            .define(scope_name.clone(), Type::Function(placeholder));

        self.table.push_scope(scope_name.clone());
        for param in &param_names {
            self.table.define(param.clone(), Type::Any);
        }
        self.return_frames.push(Vec::new());
        self.block(body);
        let frames = self.return_frames.pop().unwrap_or_default();
        let returns = unify_returns(frames);

        self.refine_params_from_usage(&param_names, body);
        let param_types: Vec<Type> = param_names
            .iter()
            .map(|p| {
                self.table
                    .resolve(p)
                    .map(|s| s.ty.clone())
                    .unwrap_or(Type::Any)
            })
            .collect();
        self.table.pop_scope();

        let sig = FunctionSig::new(param_types.clone(), returns.clone());
        for (i, ty) in param_types.into_iter().enumerate() {
            self.table.update_function_param(&scope_name, i, ty);
        }
        self.table.update_function_returns(&scope_name, returns);
        Type::Function(sig)
    }

    /// Parameters used as `+` operands next to a typed counterpart take
    /// the counterpart's type.
    fn refine_params_from_usage(&mut self, params: &[String], body: &Block) {
        let mut found: Vec<(String, Type)> = Vec::new();
        body.walk_exprs(&mut |expr| {
            let Expr::Infix { op, left, right } = expr else {
                return;
            };
            if op != "+" {
                return;
            }
            for (side, other) in [(left, right), (right, left)] {
                let Some(name) = side.ident_name() else {
                    continue;
                };
                if !params.contains(&name.to_string()) {
                    continue;
                }
                let counterpart = self.shallow_type(other);
                if !counterpart.is_any() {
                    found.push((name.to_string(), counterpart));
                }
            }
        });
        for (name, ty) in found {
            if let Some(symbol) = self.table.resolve_mut(&name) {
                if symbol.ty.is_any() {
                    symbol.ty = ty;
                }
            }
        }
    }

    /// Type of an expression without analysis side effects.
    fn shallow_type(&self, expr: &Expr) -> Type {
        match expr {
            Expr::Int { .. } => Type::int(),
            Expr::Float { .. } => Type::float(),
            Expr::Str { .. } => Type::string(),
            Expr::Bool { .. } => Type::bool(),
            Expr::Ident { name, .. } => self
                .table
                .resolve(name)
                .map(|s| s.ty.clone())
                .unwrap_or(Type::Any),
            Expr::Infix { op, left, right } => {
                infer_infix(op, &self.shallow_type(left), &self.shallow_type(right))
            }
            _ => Type::Any,
        }
    }

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    fn call(&mut self, expr: &mut Expr) -> Type {
        let Expr::Call {
            id,
            function,
            args,
            line,
        } = expr
        else {
            return Type::Any;
        };
        let id = *id;
        let line = *line;
        let callee = self.callee_name(function);
        let callee_ty = self.expression(function);

        let mut arg_types = Vec::with_capacity(args.len());
        let mut ident_args = Vec::with_capacity(args.len());
        for arg in args.iter_mut() {
            match arg {
                Some(a) => {
                    ident_args.push(a.ident_name().map(str::to_string));
                    arg_types.push(self.expression(a));
                }
                None => {
                    ident_args.push(None);
                    arg_types.push(Type::Any);
                }
            }
        }
        if let Some(name) = &callee {
            self.call_records.push(CallRecord {
                callee: name.clone(),
                ident_args: ident_args.clone(),
            });
        }

        let sig = match &callee_ty {
            Type::Function(sig) => Some(sig.clone()),
            _ => callee
                .as_deref()
                .and_then(|name| self.external.function(name))
                .cloned(),
        };
        let Some(sig) = sig else {
            return Type::Any;
        };

        // Missing trailing arguments become nil placeholders.
        if args.len() < sig.params.len() && !sig.has_variadic_tail() {
            self.diagnostics.push(Diagnostic::new(
                format!(
                    "call to {} has {} argument(s), expected {}",
                    callee.as_deref().unwrap_or("function"),
                    args.len(),
                    sig.params.len()
                ),
                line,
                0,
            ));
            while args.len() < sig.params.len() {
                args.push(None);
                arg_types.push(Type::Any);
                ident_args.push(None);
            }
        }

        for (i, param_ty) in sig.params.iter().enumerate() {
            let Some(arg_ty) = arg_types.get(i) else {
                break;
            };
            let same = param_ty.to_string() == arg_ty.to_string();
            if same {
                continue;
            }
            if self.is_interface_param(param_ty) {
                if let Type::Function(value_sig) = arg_ty {
                    if let Some(adapter) = self.external.adapter_for(value_sig, param_ty) {
                        self.wrap_calls
                            .entry(id)
                            .or_default()
                            .push(WrapperInfo {
                                arg_index: i,
                                adapter,
                            });
                    }
                    continue;
                }
            }
            match (param_ty.is_any(), arg_ty.is_any()) {
                // A concrete argument teaches a loose callee parameter.
                (true, false) => {
                    if let Some(name) = &callee {
                        if self.table.has_scope(name) {
                            self.table
                                .update_function_param(name, i, arg_ty.clone());
                        }
                    }
                }
                // A concrete parameter pins down a loose argument variable.
                // A variadic tail absorbs anything and teaches nothing.
                (false, true) => {
                    if sig.has_variadic_tail() && i + 1 == sig.params.len() {
                        continue;
                    }
                    if let Some(Some(arg_name)) = ident_args.get(i) {
                        let arg_name = arg_name.clone();
                        if let Some(symbol) = self.table.resolve_mut(&arg_name) {
                            if symbol.ty.is_any() {
                                symbol.ty = param_ty.clone();
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        match sig.returns.as_slice() {
            [] => Type::Any,
            [first, ..] => first.clone(),
        }
    }

    /// Read-only inference against the current scope chain. The passes
    /// after analysis use this instead of re-running analysis, so symbol
    /// state is never disturbed mid-walk.
    pub fn type_of(&self, expr: &Expr) -> Type {
        match expr {
            Expr::Int { .. } => Type::int(),
            Expr::Float { .. } => Type::float(),
            Expr::Str { .. } => Type::string(),
            Expr::Bool { .. } => Type::bool(),
            Expr::None => Type::Any,
            Expr::Ident { name, .. } => self
                .table
                .resolve(name)
                .map(|s| s.ty.clone())
                .unwrap_or(Type::Any),
            Expr::Prefix { op, operand } => {
                if op == "!" {
                    Type::bool()
                } else {
                    self.type_of(operand)
                }
            }
            Expr::Infix { op, left, right } => {
                infer_infix(op, &self.type_of(left), &self.type_of(right))
            }
            Expr::Call { function, .. } => match self.signature_of(function) {
                Some(sig) => sig.returns.first().cloned().unwrap_or(Type::Any),
                None => Type::Any,
            },
            Expr::Index { object, .. } => element_type(&self.type_of(object)),
            Expr::Selector { object, field } => {
                if let Some(base) = object.ident_name() {
                    if self.packages.contains(base) {
                        let qualified = format!("{base}.{field}");
                        if let Some(symbol) = self.table.find_anywhere(&qualified) {
                            return symbol.ty.clone();
                        }
                        if let Some(sig) = self.external.function(&qualified) {
                            return Type::Function(sig.clone());
                        }
                        if let Some(ty) = self.external.constants.get(&qualified) {
                            return ty.clone();
                        }
                        return Type::Any;
                    }
                }
                self.external
                    .member_type(&self.type_of(object), field)
                    .unwrap_or(Type::Any)
            }
            Expr::Function { name, .. } => self
                .table
                .find_anywhere(name)
                .map(|s| s.ty.clone())
                .unwrap_or(Type::Any),
            Expr::Array { elem_type, .. } => Type::array(elem_type.clone()),
            Expr::MapLit {
                key_type,
                value_type,
                ..
            } => Type::map(key_type.clone(), value_type.clone()),
            Expr::Receive { .. } | Expr::Send { .. } => Type::Any,
            Expr::TypeConversion { target, .. } => target.clone(),
            Expr::HostText(_) => Type::string(),
        }
    }

    /// Signature of the function a call expression invokes, if known.
    pub fn signature_of(&self, function: &Expr) -> Option<FunctionSig> {
        if let Some(name) = self.callee_name(function) {
            if let Some(symbol) = self.table.find_anywhere(&name) {
                if let Some(sig) = symbol.function_sig() {
                    return Some(sig.clone());
                }
            }
            if let Some(sig) = self.external.function(&name) {
                return Some(sig.clone());
            }
        }
        match self.type_of(function) {
            Type::Function(sig) => Some(sig),
            _ => None,
        }
    }

    /// Flat callee name of a call, when the callee is a plain name or a
    /// one-level selector.
    pub fn call_target(&self, function: &Expr) -> Option<String> {
        self.callee_name(function)
    }

    fn is_interface_param(&self, ty: &Type) -> bool {
        match ty {
            Type::Interface(_) => true,
            Type::Named { package, name } => matches!(
                self.external.types.get(&format!("{package}.{name}")),
                Some(TypeIdentity::Interface)
            ),
            _ => false,
        }
    }

    /// Flat name of a callee for records and registry lookups:
    /// `add`, `pkg.Func`, or `pkg.Type.Method` style selectors.
    fn callee_name(&self, function: &Expr) -> Option<String> {
        match function {
            Expr::Ident { name, .. } => Some(name.clone()),
            Expr::Selector { object, field } => {
                let base = object.ident_name()?;
                Some(format!("{base}.{field}"))
            }
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Selectors and imports
    // ------------------------------------------------------------------

    fn selector(&mut self, object: &mut Expr, field: &str) -> Type {
        if let Some(base) = object.ident_name() {
            if self.packages.contains(base) {
                let qualified = format!("{base}.{field}");
                if let Some(symbol) = self.table.resolve(&qualified) {
                    return symbol.ty.clone();
                }
                if let Some(sig) = self.external.function(&qualified) {
                    return Type::Function(sig.clone());
                }
                if let Some(ty) = self.external.constants.get(&qualified) {
                    return ty.clone();
                }
                return Type::Any;
            }
        }
        let object_ty = self.expression(object);
        self.external
            .member_type(&object_ty, field)
            .unwrap_or(Type::Any)
    }

    fn import(&mut self, path: &str, line: u32) {
        if self.external.is_loaded(path) {
            return;
        }
        let alias = external::package_alias(path).to_string();
        match self.introspector.load(path) {
            Ok(info) => {
                // Flat `pkg.Name` symbols make selector resolution a plain
                // table lookup.
                for (name, sig) in &info.functions {
                    if !name.contains('.') {
                        let symbol = self
                            .table
                            .define_global(format!("{alias}.{name}"), Type::Function(sig.clone()));
                        symbol.go_type = Some(Type::Function(sig.clone()).to_string());
                    }
                }
                for (name, ty) in &info.constants {
                    self.table
                        .define_global(format!("{alias}.{name}"), ty.clone());
                }
                self.external.seed(path, info);
                self.packages.insert(alias);
            }
            Err(err) => {
                self.diagnostics
                    .push(Diagnostic::new(err.to_string(), line, 0));
                self.packages.insert(alias);
            }
        }
    }
}

/// Element type yielded by indexing or iterating a value.
pub fn element_type(ty: &Type) -> Type {
    match ty {
        Type::Array(elem) => (**elem).clone(),
        Type::Map(_, value) => (**value).clone(),
        Type::Basic(name) if name == "string" => Type::string(),
        _ => Type::Any,
    }
}

/// Numeric promotion and string contagion for binary operators.
pub fn infer_infix(op: &str, left: &Type, right: &Type) -> Type {
    match op {
        "==" | "!=" | "<" | ">" | "<=" | ">=" | "&&" | "||" => Type::bool(),
        "+" if left.is_string() || right.is_string() => Type::string(),
        "+" | "-" | "*" | "/" | "%" => {
            if left.is_float() || right.is_float() {
                Type::float()
            } else if left.is_numeric() && right.is_numeric() {
                Type::int()
            } else if left.is_any() || right.is_any() {
                Type::Any
            } else {
                left.clone()
            }
        }
        _ => Type::Any,
    }
}

/// Return tuples that agree fix the signature; disagreement or an empty
/// set degrades.
fn unify_returns(frames: Vec<Vec<Type>>) -> Vec<Type> {
    let mut iter = frames.into_iter().filter(|f| !f.is_empty());
    let Some(first) = iter.next() else {
        return Vec::new();
    };
    let key: Vec<String> = first.iter().map(Type::to_string).collect();
    for frame in iter {
        let frame_key: Vec<String> = frame.iter().map(Type::to_string).collect();
        if frame_key != key {
            return vec![Type::Any];
        }
    }
    first
}
