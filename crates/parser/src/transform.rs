//! The mutating pass between analysis and generation.
//!
//! The transformer re-enters the scopes the analyzer built and rewrites
//! the tree where inferred types and introspected signatures disagree:
//! convertible literals gain conversion nodes, function literals passed
//! where interfaces are expected have their parameter types rewritten,
//! and string-expecting host parameters receive a format-to-string
//! fragment. Assignments widen a second time here, catching types that
//! only settled late in analysis.

use crate::ast::{Block, Expr, Program, Stmt};
use crate::semantic::external::TypeIdentity;
use crate::semantic::Analyzer;
use crate::types::Type;

pub struct Transformer<'a> {
    analyzer: &'a mut Analyzer,
    fn_stack: Vec<String>,
}

impl<'a> Transformer<'a> {
    pub fn new(analyzer: &'a mut Analyzer) -> Self {
        Transformer {
            analyzer,
            fn_stack: Vec::new(),
        }
    }

    pub fn transform(&mut self, program: &mut Program) {
        for stmt in &mut program.statements {
            self.statement(stmt);
        }
    }

    fn statement(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::Assignment { targets, value, .. } => {
                self.expression(value);
                let value_ty = self.analyzer.type_of(value);
                for target in targets.iter_mut() {
                    if let Some(name) = target.ident_name() {
                        let name = name.to_string();
                        let recorded = self
                            .analyzer
                            .table
                            .resolve(&name)
                            .map(|s| s.ty.clone());
                        if let Some(recorded) = recorded {
                            if !value_ty.is_any()
                                && recorded.to_string() != value_ty.to_string()
                            {
                                self.analyzer.widen(&name, value_ty.clone());
                            }
                        }
                    } else {
                        self.expression(target);
                    }
                }
            }
            Stmt::Expression(expr) => self.expression(expr),
            Stmt::Return { values, .. } => {
                for value in values.iter_mut() {
                    self.expression(value);
                }
                // Late-settling types update the enclosing signature.
                if let Some(fn_name) = self.fn_stack.last().cloned() {
                    let types: Vec<Type> =
                        values.iter().map(|v| self.analyzer.type_of(v)).collect();
                    if !types.is_empty() && types.iter().all(|t| !t.is_any()) {
                        self.analyzer.table.update_function_returns(&fn_name, types);
                    }
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
            Stmt::For { iterable, body, .. } => {
                self.expression(iterable);
                self.block(body);
            }
            Stmt::Import { .. } | Stmt::Defer { .. } | Stmt::Go { .. } => {}
        }
    }

    fn block(&mut self, block: &mut Block) {
        for stmt in &mut block.statements {
            self.statement(stmt);
        }
    }

    fn expression(&mut self, expr: &mut Expr) {
        match expr {
            Expr::Prefix { operand, .. } => self.expression(operand),
            Expr::Infix { left, right, .. } => {
                self.expression(left);
                self.expression(right);
            }
            Expr::Call { .. } => self.call(expr),
            Expr::Index { object, index } => {
                self.expression(object);
                self.expression(index);
            }
            Expr::Selector { object, .. } => self.expression(object),
            Expr::Function { name, body, .. } => {
                let name = name.clone();
                self.analyzer.table.enter_scope(&name);
                self.fn_stack.push(name);
                self.block(body);
                self.fn_stack.pop();
                self.analyzer.table.pop_scope();
            }
            Expr::Array { elements, .. } => {
                for elem in elements {
                    self.expression(elem);
                }
            }
            Expr::MapLit { pairs, .. } => {
                for (key, value) in pairs {
                    self.expression(key);
                    self.expression(value);
                }
            }
            Expr::Receive { channel } => self.expression(channel),
            Expr::Send { channel, value } => {
                self.expression(channel);
                self.expression(value);
            }
            Expr::TypeConversion { operand, .. } => self.expression(operand),
            _ => {}
        }
    }

    fn call(&mut self, expr: &mut Expr) {
        let (sig, external, expected) = {
            let Expr::Call { id, function, .. } = &*expr else {
                return;
            };
            let target = self.analyzer.call_target(function);
            let external = target
                .as_deref()
                .map(|name| self.analyzer.external.function(name).is_some())
                .unwrap_or(false);
            (
                self.analyzer.signature_of(function),
                external,
                self.analyzer.expected_returns.get(id).cloned(),
            )
        };

        if let Expr::Call { function, args, .. } = expr {
            self.expression(function);
            for arg in args.iter_mut().flatten() {
                self.expression(arg);
            }

            // Only introspected host functions carry signatures reliable
            // enough to rewrite arguments against.
            if external {
                if let Some(sig) = &sig {
                    for (i, param_ty) in sig.params.iter().enumerate() {
                        let Some(Some(arg)) = args.get_mut(i) else {
                            continue;
                        };
                        self.adapt_argument(arg, param_ty);
                    }
                }
            }
        }

        // A concrete assignment slot coerces the call's result when the
        // host allows the conversion.
        if let Some(expected) = expected {
            let actual = self.analyzer.type_of(expr);
            if !expected.is_any()
                && !actual.is_any()
                && expected.to_string() != actual.to_string()
                && Type::convertible(&actual, &expected)
            {
                let inner = std::mem::replace(expr, Expr::None);
                *expr = Expr::TypeConversion {
                    target: expected,
                    operand: Box::new(inner),
                };
            }
        }
    }

    fn adapt_argument(&mut self, arg: &mut Expr, param_ty: &Type) {
        let arg_ty = self.analyzer.type_of(arg);
        if arg_ty.to_string() == param_ty.to_string() || param_ty.is_any() {
            return;
        }

        // Function literal meeting an interface: take the method's
        // parameter types.
        if let Expr::Function { name, params, .. } = arg {
            if let Some(methods) = self.interface_methods(param_ty) {
                if let [method] = methods.as_slice() {
                    let fn_name = name.clone();
                    let method_params = method.sig.params.clone();
                    for (j, ty) in method_params.into_iter().enumerate() {
                        if j < params.len() {
                            self.analyzer.table.update_function_param(&fn_name, j, ty);
                        }
                    }
                }
            }
            return;
        }

        if is_literal(arg) && Type::convertible(&arg_ty, param_ty) && !arg_ty.is_any() {
            let inner = std::mem::replace(arg, Expr::None);
            *arg = Expr::TypeConversion {
                target: param_ty.clone(),
                operand: Box::new(inner),
            };
            return;
        }

        // Anything else headed into a string slot goes through the host
        // formatter.
        if param_ty.is_string() && !arg_ty.is_string() && !arg_ty.is_any() {
            let text = expression_text(arg);
            *arg = Expr::HostText(format!("fmt.Sprintf(\"%v\", {text})"));
        }
    }

    fn interface_methods(
        &self,
        ty: &Type,
    ) -> Option<Vec<crate::semantic::external::MethodSig>> {
        let key = match ty {
            Type::Named { package, name } => {
                match self.analyzer.external.types.get(&format!("{package}.{name}")) {
                    Some(TypeIdentity::Interface) => format!("{package}.{name}"),
                    _ => return None,
                }
            }
            Type::Interface(name) => name.clone(),
            _ => return None,
        };
        self.analyzer.external.interfaces.get(&key).cloned()
    }
}

fn is_literal(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Int { .. } | Expr::Float { .. } | Expr::Str { .. } | Expr::Bool { .. }
    )
}

/// Minimal source rendering for expressions folded into host fragments.
pub fn expression_text(expr: &Expr) -> String {
    match expr {
        Expr::Ident { name, .. } => name.clone(),
        Expr::Int { value } => value.to_string(),
        Expr::Float { value } => format_float(*value),
        Expr::Str { value } => format!("{value:?}"),
        Expr::Bool { value } => if *value { "true" } else { "false" }.to_string(),
        Expr::None => "nil".to_string(),
        Expr::Prefix { op, operand } => format!("{op}{}", expression_text(operand)),
        Expr::Infix { op, left, right } => format!(
            "{} {op} {}",
            expression_text(left),
            expression_text(right)
        ),
        Expr::Selector { object, field } => {
            format!("{}.{field}", expression_text(object))
        }
        Expr::Index { object, index } => {
            format!("{}[{}]", expression_text(object), expression_text(index))
        }
        Expr::Call { function, args, .. } => {
            let rendered: Vec<String> = args
                .iter()
                .map(|arg| match arg {
                    Some(a) => expression_text(a),
                    None => "nil".to_string(),
                })
                .collect();
            format!("{}({})", expression_text(function), rendered.join(", "))
        }
        Expr::HostText(text) => text.clone(),
        _ => String::new(),
    }
}

/// Floats keep a decimal point so the host reads them as floats.
pub fn format_float(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}
