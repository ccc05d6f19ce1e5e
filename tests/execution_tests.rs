//! End-to-end tests: build a tree, compile it and run it on the VM.

mod common;

use common::{eval, eval_unfolded, run, run_with};
use lantern::{
    CompilationError, CompilerOptions, Expr, LanternError, Node, Param, RuntimeError, SafeMode, Script, Value,
};

fn compile_error(result: Result<Value, LanternError>) -> CompilationError {
    match result {
        Err(LanternError::Compilation(err)) => err,
        other => panic!("expected a compilation error, got {other:?}"),
    }
}

fn runtime_error(result: Result<Value, LanternError>) -> RuntimeError {
    match result {
        Err(LanternError::Runtime(err)) => err,
        other => panic!("expected a runtime error, got {other:?}"),
    }
}

// =============================================================================
// Scripts
// =============================================================================

#[test]
fn constant_script_returns_its_value() {
    assert_eq!(eval(vec![Expr::add(Expr::int(1), Expr::int(2))]), Value::Int32(3));
}

#[test]
fn undeclared_identifier_fails_before_running() {
    let mut script = Script::new(vec![Expr::get("missing")]);
    let err = script.execute().unwrap_err();
    assert!(matches!(err, LanternError::Compilation(CompilationError::NameResolution { ref name, .. }) if name == "missing"));
    assert!(script.unit().is_none());
}

#[test]
fn statements_run_in_order() {
    let result = eval(vec![
        Expr::var("i", Expr::int(0)),
        Expr::var("sum", Expr::int(0)),
        Expr::while_loop(
            Expr::less_equal(Expr::get("i"), Expr::int(10)),
            Expr::block(vec![
                Expr::set("sum", Expr::add(Expr::get("sum"), Expr::get("i"))),
                Expr::set("i", Expr::add(Expr::get("i"), Expr::int(1))),
            ]),
        ),
        Expr::get("sum"),
    ]);
    assert_eq!(result, Value::Int32(55));
}

#[test]
fn if_without_else_has_no_value() {
    let result = eval(vec![
        Expr::var("x", Expr::int(1)),
        Expr::if_then(Expr::greater(Expr::get("x"), Expr::int(0)), Expr::set("x", Expr::int(5))),
        Expr::get("x"),
    ]);
    assert_eq!(result, Value::Int32(5));
}

#[test]
fn logical_operators_short_circuit() {
    let result = eval(vec![
        Expr::var("hits", Expr::int(0)),
        Expr::and(
            Expr::bool(false),
            Expr::block(vec![Expr::set("hits", Expr::int(1)), Expr::bool(true)]),
        ),
        Expr::or(
            Expr::bool(true),
            Expr::block(vec![Expr::set("hits", Expr::int(2)), Expr::bool(true)]),
        ),
        Expr::get("hits"),
    ]);
    assert_eq!(result, Value::Int32(0));
}

#[test]
fn constant_division_by_zero_is_a_compile_error() {
    let err = compile_error(run(vec![Expr::div(Expr::int(1), Expr::int(0))]));
    assert!(matches!(err, CompilationError::ConstantFold { .. }));
}

#[test]
fn constant_pool_overflow_fails_to_compile() {
    let mut nodes = vec![Expr::var("x", Expr::long(0))];
    nodes.extend((1..=70_009).map(|i| Expr::set("x", Expr::long(i))));
    nodes.push(Expr::get("x"));
    let err = compile_error(run(nodes));
    assert!(matches!(err, CompilationError::InvalidState { ref message } if message.contains("too many constants")));
}

#[test]
fn runtime_division_by_zero() {
    let nodes = vec![Expr::div(Expr::int(1), Expr::int(0))];
    let result = run_with(nodes, CompilerOptions::default().with_unroll_constants(false));
    assert_eq!(runtime_error(result), RuntimeError::DivisionByZero);
}

#[test]
fn safe_mode_rejects_blacklisted_types() {
    let options = CompilerOptions::default().with_safe_mode(SafeMode::blacklist(["double"]));
    let err = compile_error(run_with(vec![Expr::double(1.5)], options));
    assert!(matches!(err, CompilationError::DisallowedType { ref name, .. } if name == "double"));
}

// =============================================================================
// Functions
// =============================================================================

#[test]
fn named_functions_are_called_with_converted_arguments() {
    let result = eval(vec![
        Expr::fun("widen", vec![Param::new("x", "long")], Some("long"), Expr::mul(Expr::arg(0), Expr::long(2))),
        Expr::call("widen", vec![Expr::int(21)]),
    ]);
    assert_eq!(result, Value::Int64(42));
}

#[test]
fn recursive_function() {
    let result = eval(vec![
        Expr::fun(
            "fact",
            vec![Param::new("n", "int")],
            Some("long"),
            Expr::if_else(
                Expr::less_equal(Expr::get("n"), Expr::int(1)),
                Expr::long(1),
                Expr::mul(Expr::get("n"), Expr::call("fact", vec![Expr::sub(Expr::get("n"), Expr::int(1))])),
            ),
        ),
        Expr::call("fact", vec![Expr::int(10)]),
    ]);
    assert_eq!(result, Value::Int64(3_628_800));
}

#[test]
fn overloads_pick_the_cheapest_candidate() {
    let result = eval(vec![
        Expr::fun("pick", vec![Param::new("x", "int")], Some("int"), Expr::int(1)),
        Expr::fun("pick", vec![Param::new("x", "string")], Some("int"), Expr::int(2)),
        Expr::fun("pick", vec![Param::new("x", "long")], Some("int"), Expr::int(3)),
        Expr::add(
            Expr::mul(Expr::call("pick", vec![Expr::int(0)]), Expr::int(100)),
            Expr::mul(Expr::call("pick", vec![Expr::string("s")]), Expr::int(10)),
        ),
    ]);
    assert_eq!(result, Value::Int32(120));
}

#[test]
fn tied_overloads_are_ambiguous() {
    let err = compile_error(run(vec![
        Expr::fun("pick", vec![Param::new("x", "long")], Some("int"), Expr::int(1)),
        Expr::fun("pick", vec![Param::new("x", "double")], Some("int"), Expr::int(2)),
        Expr::call("pick", vec![Expr::int(0)]),
    ]));
    assert!(matches!(err, CompilationError::AmbiguousOverload { .. }));
}

#[test]
fn same_parameter_types_cannot_be_declared_twice() {
    let err = compile_error(run(vec![
        Expr::fun("pick", vec![Param::new("x", "long")], Some("int"), Expr::int(1)),
        Expr::fun("pick", vec![Param::new("y", "long")], Some("long"), Expr::long(2)),
        Expr::int(0),
    ]));
    assert!(matches!(err, CompilationError::Failed { ref message, .. } if message.contains("same parameter types")));
}

#[test]
fn inferred_return_type_must_precede_use() {
    let err = compile_error(run(vec![
        Expr::fun("first", vec![], None, Expr::call("second", vec![])),
        Expr::fun("second", vec![], None, Expr::int(1)),
        Expr::call("first", vec![]),
    ]));
    assert!(matches!(err, CompilationError::UndeclaredReturnType { ref name, .. } if name == "second"));
}

#[test]
fn named_function_as_value() {
    let result = eval(vec![
        Expr::fun("twice", vec![Param::new("x", "int")], Some("int"), Expr::mul(Expr::arg(0), Expr::int(2))),
        Expr::let_("f", Expr::get("twice")),
        Expr::call("f", vec![Expr::int(8)]),
    ]);
    assert_eq!(result, Value::Int32(16));
}

// =============================================================================
// Records, labels and methods
// =============================================================================

#[test]
fn records_hold_fields() {
    let result = eval(vec![
        Expr::record("Point", &[("X", "int"), ("Y", "int")]),
        Expr::let_("p", Expr::new_instance("Point", vec![Expr::int(1), Expr::int(2)])),
        Expr::set_member(Expr::get("p"), "X", Expr::int(40)),
        Expr::add(Expr::member(Expr::get("p"), "X"), Expr::member(Expr::get("p"), "Y")),
    ]);
    assert_eq!(result, Value::Int32(42));
}

#[test]
fn records_without_arguments_get_default_fields() {
    let result = eval(vec![
        Expr::record("Named", &[("Name", "string"), ("Size", "long")]),
        Expr::member(Expr::new_instance("Named", vec![]), "Size"),
    ]);
    assert_eq!(result, Value::Int64(0));
}

#[test]
fn records_compare_structurally() {
    let point = |x, y| Expr::new_instance("Point", vec![Expr::int(x), Expr::int(y)]);
    let nodes = |op: fn(Node, Node) -> Node, a, b| {
        vec![Expr::record("Point", &[("X", "int"), ("Y", "int")]), op(a, b)]
    };
    assert_eq!(eval(nodes(Expr::equal, point(1, 2), point(1, 2))), Value::Bool(true));
    assert_eq!(eval(nodes(Expr::equal, point(1, 2), point(2, 1))), Value::Bool(false));
    assert_eq!(eval(nodes(Expr::not_equal, point(1, 2), point(2, 1))), Value::Bool(true));
}

#[test]
fn type_labels_are_tested_at_run_time() {
    let nodes = |label: &str| {
        vec![
            Expr::type_def("Shape", &[("Circle", Some("double")), ("Empty", None)]),
            Expr::var_typed("s", "Shape"),
            Expr::set("s", Expr::new_instance("Circle", vec![Expr::double(2.5)])),
            Expr::is(Expr::get("s"), label),
        ]
    };
    assert_eq!(eval(nodes("Circle")), Value::Bool(true));
    assert_eq!(eval(nodes("Empty")), Value::Bool(false));
}

#[test]
fn label_tags_are_fields() {
    let result = eval(vec![
        Expr::type_def("Shape", &[("Circle", Some("double"))]),
        Expr::let_("c", Expr::new_instance("Circle", vec![Expr::double(2.5)])),
        Expr::member(Expr::get("c"), "Tag"),
    ]);
    assert_eq!(result, Value::Double(2.5));
}

#[test]
fn static_methods_and_operator_overloads() {
    let money = |cents: Node| Expr::new_instance("Money", vec![cents]);
    let result = eval(vec![
        Expr::record("Money", &[("Cents", "long")]),
        Expr::method("Money", "Zero", vec![], Some("Money"), money(Expr::long(0))),
        Expr::method(
            "Money",
            "op_Addition",
            vec![Param::new("a", "Money"), Param::new("b", "Money")],
            Some("Money"),
            money(Expr::add(
                Expr::member(Expr::get("a"), "Cents"),
                Expr::member(Expr::get("b"), "Cents"),
            )),
        ),
        Expr::let_(
            "total",
            Expr::add(
                Expr::add(money(Expr::long(150)), money(Expr::long(250))),
                Expr::call_static("Money", "Zero", vec![]),
            ),
        ),
        Expr::member(Expr::get("total"), "Cents"),
    ]);
    assert_eq!(result, Value::Int64(400));
}

// =============================================================================
// Collections and strings
// =============================================================================

#[test]
fn list_literals_index_and_count() {
    let result = eval(vec![
        Expr::var("items", Expr::list(vec![Expr::int(1), Expr::int(2), Expr::int(3)])),
        Expr::set_index(Expr::get("items"), Expr::int(0), Expr::int(10)),
        Expr::add(
            Expr::index(Expr::get("items"), Expr::int(0)),
            Expr::member(Expr::get("items"), "Count"),
        ),
    ]);
    assert_eq!(result, Value::Int32(13));
}

#[test]
fn list_index_out_of_range() {
    let err = runtime_error(run(vec![Expr::index(Expr::list(vec![Expr::int(1)]), Expr::int(5))]));
    assert_eq!(err, RuntimeError::IndexOutOfRange { index: 5, len: 1 });
}

#[test]
fn dictionaries_insert_and_look_up() {
    let result = eval(vec![
        Expr::let_(
            "ages",
            Expr::dict(vec![(Expr::string("ann"), Expr::int(31)), (Expr::string("bob"), Expr::long(29))]),
        ),
        Expr::set_index(Expr::get("ages"), Expr::string("cy"), Expr::int(3)),
        Expr::add(
            Expr::index(Expr::get("ages"), Expr::string("bob")),
            Expr::member(Expr::get("ages"), "Count"),
        ),
    ]);
    assert_eq!(result, Value::Int64(32));
}

#[test]
fn missing_dictionary_key() {
    let err = runtime_error(run(vec![Expr::index(
        Expr::dict(vec![(Expr::int(1), Expr::string("one"))]),
        Expr::int(2),
    )]));
    assert!(matches!(err, RuntimeError::KeyNotFound { .. }));
}

#[test]
fn duplicate_literal_keys_fail_to_compile() {
    let err = compile_error(run(vec![Expr::member(
        Expr::dict(vec![(Expr::string("a"), Expr::int(1)), (Expr::string("a"), Expr::int(2))]),
        "Count",
    )]));
    assert!(matches!(err, CompilationError::DuplicateKey { ref key, .. } if key == "a"));
}

#[test]
fn duplicate_run_time_keys_fail() {
    let err = runtime_error(run(vec![
        Expr::var("k", Expr::string("a")),
        Expr::member(Expr::dict(vec![(Expr::get("k"), Expr::int(1)), (Expr::string("a"), Expr::int(2))]), "Count"),
    ]));
    assert!(matches!(err, RuntimeError::DuplicateKey { ref key } if key == "a"));
}

#[test]
fn empty_collections_need_a_constructor() {
    let err = compile_error(run(vec![Expr::list(vec![])]));
    assert_eq!(err.to_string(), "at 0:0: Use explicit constructor to create an empty list!");

    let result = eval(vec![
        Expr::using("Collections"),
        Expr::member(Expr::new_instance("List<int>", vec![]), "Count"),
    ]);
    assert_eq!(result, Value::Int32(0));
}

#[test]
fn collection_types_need_their_namespace() {
    let err = compile_error(run(vec![Expr::var_typed("l", "List<int>")]));
    assert!(matches!(err, CompilationError::TypeNotFound { .. }));

    let qualified = eval(vec![Expr::var_typed("l", "Collections.List<int>"), Expr::equal(Expr::get("l"), Expr::null())]);
    assert_eq!(qualified, Value::Bool(true));
}

#[test]
fn strings_concatenate_and_measure() {
    assert_eq!(eval(vec![Expr::add(Expr::string("lan"), Expr::string("tern"))]), Value::str("lantern"));
    let result = eval(vec![
        Expr::var("s", Expr::string("lan")),
        Expr::set("s", Expr::add(Expr::get("s"), Expr::string("tern"))),
        Expr::member(Expr::get("s"), "Length"),
    ]);
    assert_eq!(result, Value::Int32(7));
}

// =============================================================================
// Casts and type tests
// =============================================================================

#[test]
fn numeric_casts_truncate() {
    assert_eq!(eval(vec![Expr::cast(Expr::double(2.9), "int")]), Value::Int32(2));
    assert_eq!(eval_unfolded(vec![Expr::cast(Expr::double(2.9), "int")]), Value::Int32(2));
    assert_eq!(eval_unfolded(vec![Expr::cast(Expr::int(300), "uint8")]), Value::Uint8(44));
}

#[test]
fn object_values_are_checked_on_cast() {
    let boxed = |target: &str| {
        vec![
            Expr::var_typed("o", "object"),
            Expr::set("o", Expr::int(5)),
            Expr::cast(Expr::get("o"), target),
        ]
    };
    assert_eq!(eval(boxed("int")), Value::Int32(5));
    let err = runtime_error(run(boxed("long")));
    assert!(matches!(err, RuntimeError::InvalidCast { .. }));
}

#[test]
fn is_checks_run_time_types() {
    let test = |target: &str| {
        vec![
            Expr::var_typed("o", "object"),
            Expr::set("o", Expr::string("s")),
            Expr::is(Expr::get("o"), target),
        ]
    };
    assert_eq!(eval(test("string")), Value::Bool(true));
    assert_eq!(eval(test("int")), Value::Bool(false));
    assert_eq!(eval(vec![Expr::var_typed("o", "object"), Expr::is(Expr::get("o"), "string")]), Value::Bool(false));
}

#[test]
fn defaults_per_type() {
    assert_eq!(eval(vec![Expr::default("long")]), Value::Int64(0));
    assert_eq!(eval(vec![Expr::default("bool")]), Value::Bool(false));
    assert_eq!(eval(vec![Expr::default("string")]), Value::Null);
    assert_eq!(eval(vec![Expr::default("int?")]), Value::Null);
}
