//! Generator tests: declaration forms, promotion, builtins, and project
//! layout.

use std::fs;
use std::rc::Rc;

use breeze_codegen::{CodeGenerator, ProjectGenerator, ProjectOptions};
use breeze_parser::{
    Analyzer, FunctionSig, MethodSig, PackageInfo, StaticIntrospector, Transformer, Type,
    TypeIdentity,
};

fn emit(source: &str) -> String {
    emit_with(source, StaticIntrospector::new())
}

fn emit_with(source: &str, introspector: StaticIntrospector) -> String {
    let mut program = breeze_parser::parse(source).expect("test sources parse cleanly");
    let mut analyzer = Analyzer::new(Rc::new(introspector));
    analyzer.analyze(&mut program);
    Transformer::new(&mut analyzer).transform(&mut program);
    let mut generator = CodeGenerator::new(&mut analyzer, "app");
    generator.generate_main(&program)
}

#[test]
fn first_write_declares_with_walrus() {
    let out = emit("x = 1\n");
    assert!(out.contains("package main"), "got:\n{out}");
    assert!(out.contains("func main() {"), "got:\n{out}");
    assert!(out.contains("\tx := 1\n"), "got:\n{out}");
}

#[test]
fn retyped_slots_declare_loose_and_reassign() {
    let out = emit("a = 1\na = \"hello\"\nprint(a)\n");
    assert!(out.contains("\tvar a any\n"), "got:\n{out}");
    assert!(out.contains("\ta = 1\n"), "got:\n{out}");
    assert!(out.contains("\ta = \"hello\"\n"), "got:\n{out}");
    assert!(out.contains("\tfmt.Println(a)\n"), "got:\n{out}");
    assert!(
        !out.contains(":="),
        "loose slots never use the short form, got:\n{out}"
    );
}

#[test]
fn string_concat_formats_non_string_operands() {
    let out = emit("x = 5\nmsg = \"n = \" + x\nprint(msg)\n");
    assert!(
        out.contains("msg := \"n = \" + fmt.Sprintf(\"%v\", x)"),
        "got:\n{out}"
    );
    assert!(out.contains("\t\"fmt\"\n"), "formatting pulls in fmt, got:\n{out}");
}

#[test]
fn float_contagion_widens_int_operands() {
    let out = emit("x = 1\ny = x * 2.5\n");
    assert!(out.contains("y := float64(x) * 2.5"), "got:\n{out}");
}

#[test]
fn loose_operands_assert_in_int_arithmetic() {
    let out = emit("v = read()\nn = v + 1\n");
    assert!(out.contains("n := v.(int) + 1"), "got:\n{out}");
}

#[test]
fn plain_int_arithmetic_stays_plain() {
    let out = emit("a = 1\nb = 2\nc = a + b\n");
    assert!(out.contains("c := a + b"), "got:\n{out}");
}

#[test]
fn builtins_map_to_host_forms() {
    let out = emit("xs = [1, 2, 3]\nprint(len(xs))\n");
    assert!(out.contains("xs := []int{1, 2, 3}"), "got:\n{out}");
    assert!(out.contains("fmt.Println(len(xs))"), "got:\n{out}");
}

#[test]
fn negative_literal_index_counts_from_the_end() {
    let out = emit("xs = [1, 2]\ny = xs[-1]\n");
    assert!(out.contains("y := xs[len(xs)-1]"), "got:\n{out}");
}

#[test]
fn for_ranges_arrays_by_value_and_maps_by_key() {
    let out = emit("xs = [1, 2]\nfor v in xs:\n    print(v)\n");
    assert!(out.contains("for _, v := range xs {"), "got:\n{out}");

    let out = emit("m = {\"a\": 1}\nfor k in m:\n    print(k)\n");
    assert!(out.contains("for k := range m {"), "got:\n{out}");
    assert!(out.contains("m := map[string]int{"), "got:\n{out}");
}

#[test]
fn while_becomes_bare_for() {
    let out = emit("x = 0\nwhile x < 3:\n    x = x + 1\n");
    assert!(out.contains("\tfor x < 3 {\n"), "got:\n{out}");
    assert!(out.contains("\t\tx = x + 1\n"), "got:\n{out}");
}

#[test]
fn function_bindings_become_declarations() {
    let source = r#"add = def(a, b):
    return a + b
r = add(1, 2)
"#;
    let out = emit(source);
    assert!(
        out.contains("func add(a int, b int) int {"),
        "call sites teach the parameter and return types, got:\n{out}"
    );
    assert!(out.contains("\treturn a + b\n"), "got:\n{out}");
    assert!(out.contains("r := add(1, 2)"), "got:\n{out}");
}

#[test]
fn missing_trailing_return_gets_zero_values() {
    let source = r#"pick = def(flag):
    if flag:
        return 1
    x = 2
"#;
    let out = emit(source);
    assert!(out.contains("func pick(flag any) int {"), "got:\n{out}");
    assert!(out.contains("\treturn 0\n"), "got:\n{out}");
}

#[test]
fn defer_and_go_pass_through() {
    let out = emit("go worker(1)\ndefer done()\n");
    assert!(out.contains("\tgo worker(1)\n"), "got:\n{out}");
    assert!(out.contains("\tdefer done()\n"), "got:\n{out}");
}

#[test]
fn verbatim_fragments_rewrite_every_module_call() {
    let mut program =
        breeze_parser::parse("defer sib.flush(sib.count)\n").expect("test sources parse cleanly");
    let mut analyzer = Analyzer::new(Rc::new(StaticIntrospector::new()));
    analyzer.analyze(&mut program);
    Transformer::new(&mut analyzer).transform(&mut program);
    let mut generator = CodeGenerator::new(&mut analyzer, "app");
    generator.breeze_modules.insert("sib".to_string());
    let out = generator.generate_main(&program);
    assert!(
        out.contains("defer sib.Flush(sib.Count)"),
        "both module members export, got:\n{out}"
    );
}

#[test]
fn padded_arguments_emit_nil() {
    let mut info = PackageInfo::default();
    info.functions.insert(
        "Take2".to_string(),
        FunctionSig::new(vec![Type::int(), Type::string()], Vec::new()),
    );
    let mut introspector = StaticIntrospector::new();
    introspector.register("demo", info);

    let out = emit_with("import \"demo\"\ndemo.Take2(1)\n", introspector);
    assert!(out.contains("demo.Take2(1, nil)"), "got:\n{out}");
    assert!(out.contains("\t\"demo\"\n"), "got:\n{out}");
}

#[test]
fn interface_adapters_wrap_function_arguments() {
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

    let source = r#"import "net/http"
http.Handle("/", def(w, r):
    print("hit")
)
"#;
    let out = emit_with(source, introspector);
    assert!(
        out.contains("http.Handle(\"/\", http.HandlerFunc(func(w ResponseWriter, r *Request) {"),
        "got:\n{out}"
    );
    assert!(out.contains("fmt.Println(\"hit\")"), "got:\n{out}");
    assert!(out.contains("\t\"net/http\"\n"), "got:\n{out}");
}

#[test]
fn project_lays_out_module_tree() {
    let dir = tempfile::tempdir().expect("temp dir");
    fs::write(
        dir.path().join("sib.brz"),
        "greet = def(name):\n    print(name)\n",
    )
    .expect("write module");

    let mut introspector = StaticIntrospector::new();
    introspector.register("sib", PackageInfo::default());

    let out_dir = dir.path().join("out");
    let options = ProjectOptions {
        out_dir: out_dir.clone(),
        go_module: "app".to_string(),
        source_dir: dir.path().to_path_buf(),
        stdlib_dir: None,
    };
    let mut generator = ProjectGenerator::new(Rc::new(introspector), options);
    let main_path = generator
        .generate("import \"sib\"\nsib.greet(\"hi\")\n", "main")
        .expect("project generates");

    let lib = fs::read_to_string(out_dir.join("lib/sib/sib.go")).expect("library file");
    assert!(lib.contains("package sib"), "got:\n{lib}");
    assert!(
        lib.contains("func Greet(name any) {"),
        "library functions export by capitalization, got:\n{lib}"
    );
    assert!(lib.contains("fmt.Println(name)"), "got:\n{lib}");

    let main = fs::read_to_string(main_path).expect("main file");
    assert!(main.contains("\t\"app/lib/sib\"\n"), "got:\n{main}");
    assert!(
        main.contains("sib.Greet(\"hi\")"),
        "module members capitalize at the call site, got:\n{main}"
    );
}
