//! Closures capture variables by reference.

mod common;

use common::{eval, run};
use lantern::{CompilationError, Expr, LanternError, Param, Value};

#[test]
fn captured_variable_is_shared_with_the_enclosing_scope() {
    let result = eval(vec![
        Expr::var("x", Expr::int(0)),
        Expr::let_("inc", Expr::lambda(vec![], Expr::set("x", Expr::add(Expr::get("x"), Expr::int(1))))),
        Expr::call("inc", vec![]),
        Expr::call("inc", vec![]),
        Expr::get("x"),
    ]);
    assert_eq!(result, Value::Int32(2));
}

#[test]
fn captured_variable_is_shared_inside_a_function() {
    let result = eval(vec![
        Expr::fun(
            "run_twice",
            vec![],
            Some("int"),
            Expr::block(vec![
                Expr::var("x", Expr::int(0)),
                Expr::let_("inc", Expr::lambda(vec![], Expr::set("x", Expr::add(Expr::get("x"), Expr::int(1))))),
                Expr::call("inc", vec![]),
                Expr::call("inc", vec![]),
                Expr::get("x"),
            ]),
        ),
        Expr::call("run_twice", vec![]),
    ]);
    assert_eq!(result, Value::Int32(2));
}

#[test]
fn counters_keep_independent_state() {
    let result = eval(vec![
        Expr::fun(
            "counter",
            vec![],
            None,
            Expr::block(vec![
                Expr::var("n", Expr::int(0)),
                Expr::lambda(
                    vec![],
                    Expr::block(vec![Expr::set("n", Expr::add(Expr::get("n"), Expr::int(1))), Expr::get("n")]),
                ),
            ]),
        ),
        Expr::let_("a", Expr::call("counter", vec![])),
        Expr::let_("b", Expr::call("counter", vec![])),
        Expr::call("a", vec![]),
        Expr::call("a", vec![]),
        Expr::call("b", vec![]),
        Expr::add(Expr::mul(Expr::call("a", vec![]), Expr::int(10)), Expr::call("b", vec![])),
    ]);
    assert_eq!(result, Value::Int32(32));
}

#[test]
fn captured_parameters_outlive_their_call() {
    let result = eval(vec![
        Expr::fun(
            "adder",
            vec![Param::new("n", "int")],
            None,
            Expr::lambda(vec![Param::new("x", "int")], Expr::add(Expr::get("x"), Expr::get("n"))),
        ),
        Expr::let_("add5", Expr::call("adder", vec![Expr::int(5)])),
        Expr::call("add5", vec![Expr::int(10)]),
    ]);
    assert_eq!(result, Value::Int32(15));
}

#[test]
fn nested_lambdas_reach_every_enclosing_scope() {
    let result = eval(vec![
        Expr::var("a", Expr::int(1)),
        Expr::let_(
            "outer",
            Expr::lambda(
                vec![Param::new("b", "int")],
                Expr::block(vec![
                    Expr::var("c", Expr::int(100)),
                    Expr::let_(
                        "inner",
                        Expr::lambda(
                            vec![],
                            Expr::block(vec![
                                Expr::set("a", Expr::add(Expr::get("a"), Expr::int(1))),
                                Expr::add(Expr::add(Expr::get("a"), Expr::get("b")), Expr::get("c")),
                            ]),
                        ),
                    ),
                    Expr::call("inner", vec![]),
                ]),
            ),
        ),
        Expr::add(Expr::call("outer", vec![Expr::int(10)]), Expr::get("a")),
    ]);
    // inner sees a = 2, so outer returns 112; the update is visible outside.
    assert_eq!(result, Value::Int32(114));
}

#[test]
fn lambdas_as_arguments() {
    let result = eval(vec![
        Expr::fun(
            "apply",
            vec![Param::new("f", "Func<int, int>"), Param::new("v", "int")],
            Some("int"),
            Expr::call("f", vec![Expr::get("v")]),
        ),
        Expr::var("scale", Expr::int(3)),
        Expr::call(
            "apply",
            vec![
                Expr::lambda(vec![Param::new("x", "int")], Expr::mul(Expr::get("x"), Expr::get("scale"))),
                Expr::int(7),
            ],
        ),
    ]);
    assert_eq!(result, Value::Int32(21));
}

#[test]
fn constant_bindings_are_read_inline() {
    let result = eval(vec![
        Expr::let_("base", Expr::int(40)),
        Expr::let_("f", Expr::lambda(vec![], Expr::add(Expr::get("base"), Expr::int(2)))),
        Expr::call("f", vec![]),
    ]);
    assert_eq!(result, Value::Int32(42));
}

#[test]
fn redeclaration_in_the_same_scope_fails() {
    let err = run(vec![Expr::var("x", Expr::int(1)), Expr::var("x", Expr::int(2))]).unwrap_err();
    assert!(matches!(err, LanternError::Compilation(CompilationError::Redeclaration { ref name, .. }) if name == "x"));
}

#[test]
fn shadowing_resolves_to_the_innermost_binding() {
    let inner = eval(vec![
        Expr::var("x", Expr::int(1)),
        Expr::block(vec![Expr::var("x", Expr::int(2)), Expr::get("x")]),
    ]);
    assert_eq!(inner, Value::Int32(2));

    let outer = eval(vec![
        Expr::var("x", Expr::int(1)),
        Expr::block(vec![Expr::var("x", Expr::int(2)), Expr::set("x", Expr::int(3))]),
        Expr::get("x"),
    ]);
    assert_eq!(outer, Value::Int32(1));
}

#[test]
fn immutable_bindings_cannot_be_assigned() {
    let err = run(vec![Expr::let_("x", Expr::int(1)), Expr::set("x", Expr::int(2))]).unwrap_err();
    assert!(matches!(err, LanternError::Compilation(CompilationError::ImmutableAssignment { .. })));
}
