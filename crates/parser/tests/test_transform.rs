//! Transformer tests: coercion nodes, wrappers, and second-pass widening.

use std::rc::Rc;

use breeze_parser::{
    Analyzer, Expr, FunctionSig, MethodSig, PackageInfo, Program, StaticIntrospector, Stmt,
    Transformer, Type, TypeIdentity,
};

fn transform_with(source: &str, introspector: StaticIntrospector) -> (Program, Analyzer) {
    let mut program = breeze_parser::parse(source).expect("test sources parse cleanly");
    let mut analyzer = Analyzer::new(Rc::new(introspector));
    analyzer.analyze(&mut program);
    Transformer::new(&mut analyzer).transform(&mut program);
    (program, analyzer)
}

fn demo_introspector() -> StaticIntrospector {
    let mut info = PackageInfo::default();
    info.functions.insert(
        "Take".to_string(),
        FunctionSig::new(vec![Type::float()], Vec::new()),
    );
    info.functions.insert(
        "Say".to_string(),
        FunctionSig::new(vec![Type::string()], Vec::new()),
    );
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

fn call_args(stmt: &Stmt) -> &[Option<Expr>] {
    let Stmt::Expression(Expr::Call { args, .. }) = stmt else {
        panic!("expected a call statement, got {stmt:?}");
    };
    args
}

#[test]
fn convertible_literals_gain_conversion_nodes() {
    let source = "import \"demo\"\ndemo.Take(1)\n";
    let (program, _) = transform_with(source, demo_introspector());
    let args = call_args(&program.statements[1]);
    let Some(Expr::TypeConversion { target, operand }) = &args[0] else {
        panic!("expected a conversion around the literal, got {:?}", args[0]);
    };
    assert_eq!(*target, Type::float());
    assert!(matches!(operand.as_ref(), Expr::Int { value: 1 }));
}

#[test]
fn string_slots_get_format_wrappers() {
    let source = "import \"demo\"\nx = 5\ndemo.Say(x + 1)\n";
    let (program, _) = transform_with(source, demo_introspector());
    let args = call_args(&program.statements[2]);
    let Some(Expr::HostText(text)) = &args[0] else {
        panic!("expected a textual wrapper, got {:?}", args[0]);
    };
    assert_eq!(text, "fmt.Sprintf(\"%v\", x + 1)");
}

#[test]
fn matching_arguments_stay_untouched() {
    let source = "import \"demo\"\ndemo.Say(\"hello\")\n";
    let (program, _) = transform_with(source, demo_introspector());
    let args = call_args(&program.statements[1]);
    assert!(
        matches!(&args[0], Some(Expr::Str { .. })),
        "a string into a string slot needs no rewriting, got {:?}",
        args[0]
    );
}

#[test]
fn interface_arguments_rewrite_function_parameters() {
    let source = r#"import "net/http"
http.Handle("/", def(w, r):
    print("hit")
)
"#;
    let (program, analyzer) = transform_with(source, http_introspector());
    let args = call_args(&program.statements[1]);
    let Some(Expr::Function { name, .. }) = &args[1] else {
        panic!("expected the function literal argument, got {:?}", args[1]);
    };
    let sig = analyzer
        .table
        .find_anywhere(name)
        .and_then(|s| s.function_sig().cloned())
        .expect("handler literal keeps a signature");
    assert_eq!(
        sig.params,
        vec![
            Type::basic("ResponseWriter"),
            Type::pointer(Type::basic("Request")),
        ],
        "the literal takes the interface method's parameter types"
    );
}

#[test]
fn late_settling_calls_widen_their_targets() {
    let source = r#"x = helper()
helper = def():
    return 1
"#;
    let (_, analyzer) = transform_with(source, StaticIntrospector::new());
    let symbol = analyzer.table.resolve("x").expect("x is defined");
    assert_eq!(
        symbol.ty,
        Type::int(),
        "the transformer re-infers the call once helper's type is known"
    );
    assert!(
        symbol.assigned.len() > 1,
        "the widened slot keeps its loose first type in history"
    );
}

#[test]
fn expected_return_mismatches_convert_when_host_allows() {
    let mut info = PackageInfo::default();
    info.functions.insert(
        "Num".to_string(),
        FunctionSig::new(Vec::new(), vec![Type::float()]),
    );
    let mut introspector = StaticIntrospector::new();
    introspector.register("demo", info);

    let source = "import \"demo\"\nx = 1\nx = demo.Num()\n";
    let (program, _) = transform_with(source, introspector);
    let Stmt::Assignment { value, .. } = &program.statements[2] else {
        panic!("expected assignment, got {:?}", program.statements[2]);
    };
    assert!(
        matches!(value, Expr::TypeConversion { target, .. } if *target == Type::int()),
        "the call converts toward the slot's recorded type, got {value:?}"
    );
}
