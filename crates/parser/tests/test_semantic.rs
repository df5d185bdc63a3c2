//! Analyzer tests: widening, inference, call records, and imports.

use std::rc::Rc;

use breeze_parser::{
    Analyzer, Expr, FunctionSig, MethodSig, PackageInfo, Program, StaticIntrospector, Stmt, Type,
    TypeIdentity,
};

fn analyze(source: &str) -> (Program, Analyzer) {
    analyze_with(source, StaticIntrospector::new())
}

fn analyze_with(source: &str, introspector: StaticIntrospector) -> (Program, Analyzer) {
    let mut program = breeze_parser::parse(source).expect("test sources parse cleanly");
    let mut analyzer = Analyzer::new(Rc::new(introspector));
    analyzer.analyze(&mut program);
    (program, analyzer)
}

fn demo_introspector() -> StaticIntrospector {
    let mut info = PackageInfo::default();
    info.functions.insert(
        "Take".to_string(),
        FunctionSig::new(vec![Type::float()], Vec::new()),
    );
    info.functions.insert(
        "Take2".to_string(),
        FunctionSig::new(vec![Type::int(), Type::string()], Vec::new()),
    );
    info.functions.insert(
        "Num".to_string(),
        FunctionSig::new(Vec::new(), vec![Type::float()]),
    );
    info.constants.insert("Limit".to_string(), Type::int());
    let mut introspector = StaticIntrospector::new();
    introspector.register("demo", info);
    introspector
}

fn http_introspector() -> StaticIntrospector {
    let mut info = PackageInfo::default();
    info.functions.insert(
        "Handle".to_string(),
        FunctionSig::new(
            vec![Type::string(), Type::from_go_type("http.Handler")],
            Vec::new(),
        ),
    );
    info.interfaces.insert(
        "Handler".to_string(),
        vec![MethodSig {
            name: "ServeHTTP".to_string(),
            sig: FunctionSig::new(
                vec![
                    Type::basic("ResponseWriter"),
                    Type::pointer(Type::basic("Request")),
                ],
                Vec::new(),
            ),
        }],
    );
    info.types
        .insert("Handler".to_string(), TypeIdentity::Interface);
    let mut introspector = StaticIntrospector::new();
    introspector.register("net/http", info);
    introspector
}

#[test]
fn reassignment_widens_and_keeps_history() {
    let (_, analyzer) = analyze("a = 1\na = \"hello\"\n");
    let symbol = analyzer.table.resolve("a").expect("a is defined");
    assert_eq!(symbol.ty, Type::string(), "latest assignment wins the type");
    assert_eq!(
        symbol.assigned,
        vec![Type::int(), Type::string()],
        "the assignment history records both types in order"
    );
}

#[test]
fn widening_fans_out_to_recorded_call_sites() {
    let source = r#"add = def(a, b):
    return a + b
x = 1
y = add(x, 2)
x = "s"
"#;
    let (_, analyzer) = analyze(source);
    let sig = analyzer
        .table
        .find_anywhere("add")
        .and_then(|s| s.function_sig().cloned())
        .expect("add keeps a function signature");
    assert_eq!(
        sig.params[0],
        Type::string(),
        "reassigning x widens the parameter that received it"
    );
    assert_eq!(sig.params[1], Type::int(), "untouched parameters keep their type");
}

#[test]
fn call_arguments_teach_loose_parameters() {
    let source = r#"add = def(a, b):
    return a + b
r = add(1, 2)
"#;
    let (_, analyzer) = analyze(source);
    let sig = analyzer
        .table
        .find_anywhere("add")
        .and_then(|s| s.function_sig().cloned())
        .expect("add keeps a function signature");
    assert_eq!(sig.params, vec![Type::int(), Type::int()]);
}

#[test]
fn return_types_unify_when_they_agree() {
    let source = r#"scale = def(a):
    return a + 1.5
"#;
    let (_, analyzer) = analyze(source);
    let sig = analyzer
        .table
        .find_anywhere("scale")
        .and_then(|s| s.function_sig().cloned())
        .expect("scale keeps a function signature");
    assert_eq!(sig.returns, vec![Type::float()]);
    assert_eq!(
        sig.params[0],
        Type::float(),
        "a parameter added to a float literal refines to float"
    );
}

#[test]
fn disagreeing_returns_degrade_to_any() {
    let source = r#"pick = def(flag):
    if flag:
        return 1
    return "s"
"#;
    let (_, analyzer) = analyze(source);
    let sig = analyzer
        .table
        .find_anywhere("pick")
        .and_then(|s| s.function_sig().cloned())
        .expect("pick keeps a function signature");
    assert_eq!(sig.returns, vec![Type::Any]);
}

#[test]
fn variadic_tails_never_retype_their_arguments() {
    let source = r#"greet = def(name):
    print(name)
"#;
    let (_, analyzer) = analyze(source);
    let sig = analyzer
        .table
        .find_anywhere("greet")
        .and_then(|s| s.function_sig().cloned())
        .expect("greet keeps a function signature");
    assert_eq!(
        sig.params[0],
        Type::Any,
        "passing a loose value through print must not pin it to print's slice"
    );
}

#[test]
fn unresolved_identifiers_become_any_not_errors() {
    let (_, analyzer) = analyze("print(missing)\n");
    let symbol = analyzer.table.resolve("missing").expect("defined on sight");
    assert!(symbol.ty.is_any());
}

#[test]
fn short_calls_pad_with_placeholders() {
    let source = "import \"demo\"\ndemo.Take2(1)\n";
    let (program, analyzer) = analyze_with(source, demo_introspector());
    let Stmt::Expression(Expr::Call { args, .. }) = &program.statements[1] else {
        panic!("expected call statement, got {:?}", program.statements[1]);
    };
    assert_eq!(args.len(), 2, "missing arguments pad to the declared arity");
    assert!(args[1].is_none(), "the pad slot is an empty placeholder");
    assert!(
        analyzer
            .diagnostics
            .iter()
            .any(|d| d.message.contains("expected 2")),
        "padding is reported, got {:?}",
        analyzer.diagnostics
    );
}

#[test]
fn import_seeds_flat_symbols_and_constants() {
    let (_, analyzer) = analyze_with("import \"demo\"\n", demo_introspector());
    assert!(analyzer.packages.contains("demo"));
    let take = analyzer.table.resolve("demo.Take").expect("seeded symbol");
    assert!(matches!(take.ty, Type::Function(_)));
    let limit = analyzer.table.resolve("demo.Limit").expect("seeded constant");
    assert_eq!(limit.ty, Type::int());
}

#[test]
fn failed_imports_degrade_to_diagnostics() {
    let (_, analyzer) = analyze("import \"nosuch\"\nnosuch.Do()\n");
    assert!(
        analyzer
            .diagnostics
            .iter()
            .any(|d| d.message.contains("nosuch")),
        "the missed package shows up as a diagnostic"
    );
}

#[test]
fn function_arguments_matching_interfaces_record_wrappers() {
    let source = r#"import "net/http"
http.Handle("/", def(w, r):
    print("hit")
)
"#;
    let (_, analyzer) = analyze_with(source, http_introspector());
    let wrappers: Vec<_> = analyzer.wrap_calls.values().flatten().collect();
    assert_eq!(wrappers.len(), 1, "one adapter for the handler argument");
    assert_eq!(wrappers[0].arg_index, 1);
    assert_eq!(wrappers[0].adapter, "http.HandlerFunc");
}

#[test]
fn concrete_slots_record_expected_returns() {
    let source = "import \"demo\"\nx = 1\nx = demo.Num()\n";
    let (_, analyzer) = analyze_with(source, demo_introspector());
    assert_eq!(
        analyzer.expected_returns.len(),
        1,
        "the retyped slot records its expectation for the transformer"
    );
    assert!(analyzer
        .expected_returns
        .values()
        .all(|ty| *ty == Type::int()));
}

#[test]
fn for_bindings_take_the_element_type() {
    let source = "xs = [1, 2, 3]\nfor v in xs:\n    print(v)\n";
    let (_, analyzer) = analyze(source);
    let symbol = analyzer.table.resolve("v").expect("loop binding defined");
    assert_eq!(symbol.ty, Type::int());
}
