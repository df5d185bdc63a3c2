//! Parser tests: statement dispatch, block grammar, literals, precedence.

use breeze_parser::{Expr, Parser, Stmt, Type};

fn parse_ok(source: &str) -> Vec<Stmt> {
    let mut parser = Parser::from_source(source);
    let program = parser.parse_program();
    assert!(
        parser.errors.is_empty(),
        "expected a clean parse, got {:?}",
        parser.errors
    );
    program.statements
}

#[test]
fn assignment_vs_expression_dispatch() {
    let stmts = parse_ok("x = 1\nx + 2\n");
    assert!(matches!(stmts[0], Stmt::Assignment { .. }));
    assert!(matches!(stmts[1], Stmt::Expression(_)));
}

#[test]
fn multi_target_assignment() {
    let stmts = parse_ok("a, b = pair()\n");
    let Stmt::Assignment { targets, .. } = &stmts[0] else {
        panic!("expected assignment, got {:?}", stmts[0]);
    };
    assert_eq!(targets.len(), 2);
}

#[test]
fn index_target_assignment() {
    let stmts = parse_ok("xs[0] = 5\n");
    let Stmt::Assignment { targets, .. } = &stmts[0] else {
        panic!("expected assignment, got {:?}", stmts[0]);
    };
    assert!(matches!(targets[0], Expr::Index { .. }));
}

#[test]
fn operator_precedence_shapes_the_tree() {
    let stmts = parse_ok("r = 1 + 2 * 3\n");
    let Stmt::Assignment { value, .. } = &stmts[0] else {
        panic!("expected assignment");
    };
    let Expr::Infix { op, right, .. } = value else {
        panic!("expected infix at the top, got {value:?}");
    };
    assert_eq!(op, "+", "addition binds loosest");
    assert!(
        matches!(right.as_ref(), Expr::Infix { op, .. } if op == "*"),
        "multiplication nests under addition"
    );
}

#[test]
fn selector_binds_tighter_than_call() {
    let stmts = parse_ok("http.HandleFunc(path, handler)\n");
    let Stmt::Expression(Expr::Call { function, args, .. }) = &stmts[0] else {
        panic!("expected call statement, got {:?}", stmts[0]);
    };
    assert!(matches!(function.as_ref(), Expr::Selector { .. }));
    assert_eq!(args.len(), 2);
}

#[test]
fn function_literal_takes_binding_name() {
    let stmts = parse_ok("add = def(a, b):\n    return a + b\n");
    let Stmt::Assignment { value, .. } = &stmts[0] else {
        panic!("expected assignment");
    };
    let Expr::Function { name, params, body, .. } = value else {
        panic!("expected function literal, got {value:?}");
    };
    assert_eq!(name, "add", "bound literals adopt the binding name");
    assert_eq!(params.len(), 2);
    assert_eq!(body.statements.len(), 1);
}

#[test]
fn elif_desugars_to_nested_if() {
    let source = r#"if a:
    x = 1
elif b:
    x = 2
else:
    x = 3
"#;
    let stmts = parse_ok(source);
    let Stmt::If { alternative, .. } = &stmts[0] else {
        panic!("expected if, got {:?}", stmts[0]);
    };
    let alt = alternative.as_ref().expect("elif produces an alternative");
    assert_eq!(alt.statements.len(), 1);
    let Stmt::If { alternative: inner_alt, .. } = &alt.statements[0] else {
        panic!("elif should nest an if inside the alternative");
    };
    assert!(inner_alt.is_some(), "trailing else attaches to the nested if");
}

#[test]
fn missing_indent_reports_and_drops_block() {
    let mut parser = Parser::from_source("if x:\ny = 1\n");
    let program = parser.parse_program();
    assert!(
        parser
            .errors
            .iter()
            .any(|d| d.message.contains("INDENT")),
        "expected an INDENT diagnostic, got {:?}",
        parser.errors
    );
    // Parsing continues past the bad block.
    assert!(
        program
            .statements
            .iter()
            .any(|s| matches!(s, Stmt::Assignment { .. })),
        "statements after the failed block still parse"
    );
}

#[test]
fn array_literal_unifies_member_types() {
    let stmts = parse_ok("a = [1, 2, 3]\nb = [1, \"x\"]\nc = []\n");
    let elem = |stmt: &Stmt| -> Type {
        let Stmt::Assignment { value, .. } = stmt else {
            panic!("expected assignment");
        };
        let Expr::Array { elem_type, .. } = value else {
            panic!("expected array literal, got {value:?}");
        };
        elem_type.clone()
    };
    assert_eq!(elem(&stmts[0]), Type::int(), "agreeing members fix the type");
    assert!(elem(&stmts[1]).is_any(), "mixed members degrade to any");
    assert!(elem(&stmts[2]).is_any(), "empty literals degrade to any");
}

#[test]
fn map_literal_types() {
    let stmts = parse_ok("m = {\"a\": 1, \"b\": 2}\n");
    let Stmt::Assignment { value, .. } = &stmts[0] else {
        panic!("expected assignment");
    };
    let Expr::MapLit { key_type, value_type, .. } = value else {
        panic!("expected map literal, got {value:?}");
    };
    assert_eq!(*key_type, Type::string());
    assert_eq!(*value_type, Type::int());
}

#[test]
fn for_and_while_statements() {
    let stmts = parse_ok("for v in items:\n    print(v)\nwhile x < 3:\n    x = x + 1\n");
    assert!(matches!(&stmts[0], Stmt::For { binding, .. } if binding == "v"));
    assert!(matches!(&stmts[1], Stmt::While { .. }));
}

#[test]
fn import_statement_keeps_path() {
    let stmts = parse_ok("import \"net/http\"\n");
    assert!(matches!(&stmts[0], Stmt::Import { path, .. } if path == "net/http"));
}

#[test]
fn defer_and_go_capture_source_verbatim() {
    let stmts = parse_ok("go worker(queue, 2)\ndefer wg.Done()\n");
    assert!(
        matches!(&stmts[0], Stmt::Go { text } if text == "worker(queue, 2)"),
        "go keeps its operand text as written, got {:?}",
        stmts[0]
    );
    assert!(
        matches!(&stmts[1], Stmt::Defer { text } if text == "wg.Done()"),
        "defer keeps its operand text as written, got {:?}",
        stmts[1]
    );
}

#[test]
fn channel_send_and_receive_expressions() {
    let stmts = parse_ok("ch <- 1\nv = <-ch\n");
    assert!(matches!(&stmts[0], Stmt::Expression(Expr::Send { .. })));
    let Stmt::Assignment { value, .. } = &stmts[1] else {
        panic!("expected assignment");
    };
    assert!(matches!(value, Expr::Receive { .. }));
}

#[test]
fn logical_operators_parse_loosest() {
    let stmts = parse_ok("ok = a < b and c < d\n");
    let Stmt::Assignment { value, .. } = &stmts[0] else {
        panic!("expected assignment");
    };
    assert!(
        matches!(value, Expr::Infix { op, .. } if op == "&&"),
        "and sits at the top of the tree, got {value:?}"
    );
}

#[test]
fn bad_prefix_reports_diagnostic() {
    let mut parser = Parser::from_source("x = * 2\n");
    parser.parse_program();
    assert!(
        parser
            .errors
            .iter()
            .any(|d| d.message.contains("no prefix parse rule")),
        "expected a prefix diagnostic, got {:?}",
        parser.errors
    );
}
