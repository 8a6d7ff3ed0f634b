use kiwi::ast::{BinaryOp, Expr, Program};
use kiwi::error::{Diagnostics, ErrorKind, Location};
use kiwi::interpreter::{Flow, Interpreter, MAX_CALL_DEPTH};
use kiwi::runner::{interpret, parse_source};
use kiwi::value::Value;

/// Runs `text` and returns what `main` returned, the diagnostics and the
/// printed output.
fn run(text: &str) -> (Option<Value>, Diagnostics, String) {
    let outcome = interpret(text, None, Vec::new());
    let output = String::from_utf8(outcome.output).expect("program output is UTF-8");
    (outcome.value, outcome.diagnostics, output)
}

/// Runs a program that must not record any diagnostic.
fn run_clean(text: &str) -> Option<Value> {
    let (value, diagnostics, _) = run(text);
    assert!(diagnostics.is_empty(), "{}", diagnostics.render());
    value
}

fn literal(value: i32) -> Box<Expr> {
    Box::new(Expr::Integer {
        value,
        location: Location::default(),
    })
}

#[test]
fn adding_integers() {
    let diagnostics = Diagnostics::new();
    let mut interpreter = Interpreter::new(Program::default(), diagnostics.clone(), Vec::new());
    let sum = Expr::Binary {
        left: literal(2),
        operator: BinaryOp::Add,
        right: literal(1),
        location: Location::default(),
    };

    assert_eq!(interpreter.evaluate_expression(&sum), Some(Value::Int(3)));
    assert!(diagnostics.is_empty());
}

#[test]
fn adding_int_and_float_is_unsupported() {
    let (value, diagnostics, _) = run("main() { return 2 + 1.0; }");
    assert_eq!(value, None);
    assert_eq!(diagnostics.kinds(), vec![ErrorKind::UnsupportedOperation]);
}

#[test]
fn assignment_updates_the_binding() {
    let (program, diagnostics) = parse_source("main() { var x = 1; x = 2; }", None);
    let statements = program.functions["main"].body.statements.clone();
    let mut interpreter = Interpreter::new(program, diagnostics.clone(), Vec::new());

    for statement in &statements {
        assert_eq!(interpreter.execute_statement(statement), Flow::Normal);
    }
    assert_eq!(interpreter.lookup_value("x"), Some(Value::Int(2)));
    assert!(diagnostics.is_empty());
}

#[test]
fn arithmetic() {
    assert_eq!(run_clean("main() { return 7 / 2 * 3 - 1; }"), Some(Value::Int(8)));
    assert_eq!(run_clean("main() { return -(4 - 10); }"), Some(Value::Int(6)));
    assert_eq!(run_clean("main() { return 1.5 * 2.0; }"), Some(Value::Float(3.0)));
    assert_eq!(
        run_clean("main() { return 2147483647 + 1; }"),
        Some(Value::Int(i32::MIN))
    );
    assert_eq!(
        run_clean("main() { return \"kiwi\" + \" \" + \"fruit\"; }"),
        Some(Value::String("kiwi fruit".to_string()))
    );
}

#[test]
fn division_by_zero() {
    for text in ["main() { return 1 / 0; }", "main() { return 1.0 / 0.0; }"] {
        let (value, diagnostics, _) = run(text);
        assert_eq!(value, None);
        assert_eq!(diagnostics.kinds(), vec![ErrorKind::DivisionByZero]);
    }
}

#[test]
fn comparisons() {
    assert_eq!(run_clean("main() { return 1 < 2; }"), Some(Value::Bool(true)));
    assert_eq!(run_clean("main() { return 2.5 >= 2.5; }"), Some(Value::Bool(true)));
    assert_eq!(run_clean("main() { return \"abc\" < \"abd\"; }"), Some(Value::Bool(true)));
    assert_eq!(
        run_clean("main() { return (1 < 2) == (3 < 4); }"),
        Some(Value::Bool(true))
    );
    assert_eq!(run_clean("main() { return 3 != 3; }"), Some(Value::Bool(false)));

    let (value, diagnostics, _) = run("main() { return (1 < 2) < (3 < 4); }");
    assert_eq!(value, None);
    assert_eq!(diagnostics.kinds(), vec![ErrorKind::UnsupportedOperation]);

    let (_, diagnostics, _) = run("main() { return 1 == \"1\"; }");
    assert_eq!(diagnostics.kinds(), vec![ErrorKind::UnsupportedOperation]);
}

#[test]
fn logical_operators_short_circuit() {
    assert_eq!(
        run_clean("main() { return 1 > 2 and missing; }"),
        Some(Value::Bool(false))
    );
    assert_eq!(
        run_clean("main() { return 1 < 2 or missing; }"),
        Some(Value::Bool(true))
    );
    assert_eq!(
        run_clean("main() { return not (1 < 2) or -(1 > 2) and !(2 > 3); }"),
        Some(Value::Bool(true))
    );

    let (_, diagnostics, _) = run("main() { return 1 and 2; }");
    assert_eq!(diagnostics.kinds(), vec![ErrorKind::UnsupportedOperation]);
}

#[test]
fn casts() {
    assert_eq!(run_clean("main() { return int(3.9); }"), Some(Value::Int(3)));
    assert_eq!(run_clean("main() { return int(-3.9); }"), Some(Value::Int(-3)));
    assert_eq!(run_clean("main() { return float(2); }"), Some(Value::Float(2.0)));
    assert_eq!(run_clean("main() { return float(1.5); }"), Some(Value::Float(1.5)));
    assert_eq!(run_clean("main() { return int(7); }"), Some(Value::Int(7)));

    let (value, diagnostics, _) = run("main() { return int(\"7\"); }");
    assert_eq!(value, None);
    assert_eq!(diagnostics.kinds(), vec![ErrorKind::UnsupportedOperation]);
}

#[test]
fn variables_and_scopes() {
    assert_eq!(
        run_clean("main() { var a = 1; if (a == 1) { var a = 2; a = 3; } return a; }"),
        Some(Value::Int(1))
    );
    assert_eq!(
        run_clean("main() { var a; var b = (a = 5); return a + b; }"),
        Some(Value::Int(10))
    );

    let (_, diagnostics, _) = run("main() { return y; }");
    assert_eq!(diagnostics.kinds(), vec![ErrorKind::UndeclaredVariable]);

    let (_, diagnostics, _) = run("main() { var y; return y; }");
    assert_eq!(diagnostics.kinds(), vec![ErrorKind::UninitializedVariable]);

    let (_, diagnostics, _) = run("main() { var a = 1; var a = 2; }");
    assert_eq!(diagnostics.kinds(), vec![ErrorKind::AlreadyDeclared]);

    let (_, diagnostics, _) = run("main() { if (1 < 2) { var inner = 1; } return inner; }");
    assert_eq!(diagnostics.kinds(), vec![ErrorKind::UndeclaredVariable]);
}

#[test]
fn functions_do_not_see_caller_locals() {
    let (value, diagnostics, _) = run("peek() { return x; } main() { var x = 1; return peek(); }");
    assert_eq!(value, None);
    assert_eq!(diagnostics.kinds(), vec![ErrorKind::UndeclaredVariable]);
}

#[test]
fn arguments_are_passed_by_reference() {
    let text = "
        inc(n) { n = n + 1; }
        main() {
            var x = 1;
            inc(x);
            inc(x);
            inc(41);
            return x;
        }";
    assert_eq!(run_clean(text), Some(Value::Int(3)));
}

#[test]
fn return_exits_early() {
    let text = "
        main() {
            var i = 0;
            while (i < 10) {
                if (i == 3) { return i; }
                i = i + 1;
            }
            return 99;
        }";
    assert_eq!(run_clean(text), Some(Value::Int(3)));
}

#[test]
fn recursion() {
    let text = "
        fib(n) {
            if (n < 2) { return n; }
            return fib(n - 1) + fib(n - 2);
        }
        main() { return fib(15); }";
    assert_eq!(run_clean(text), Some(Value::Int(610)));
}

#[test]
fn strict_arity() {
    let (value, diagnostics, _) = run("f(a) { return a; } main() { return f(1, 2); }");
    assert_eq!(value, None);
    assert_eq!(diagnostics.kinds(), vec![ErrorKind::UnmatchedArguments]);

    let (_, diagnostics, _) = run("main() { return len(); }");
    assert_eq!(diagnostics.kinds(), vec![ErrorKind::UnmatchedArguments]);
}

#[test]
fn missing_main_and_unknown_function() {
    let (value, diagnostics, _) = run("helper() { }");
    assert_eq!(value, None);
    assert_eq!(diagnostics.kinds(), vec![ErrorKind::UndefinedSymbol]);

    let (_, diagnostics, _) = run("main() { nowhere(); }");
    assert_eq!(diagnostics.kinds(), vec![ErrorKind::UndefinedSymbol]);
}

#[test]
fn print_writes_to_output() {
    let (value, diagnostics, output) = run(
        "main() {
            print(\"total:\", 1 + 2, 2.5, 1.0, 1 < 2);
            print();
            print([1, 2]);
        }",
    );
    assert_eq!(value, None);
    assert!(diagnostics.is_empty());
    assert_eq!(output, "total: 3 2.5 1.0 true\n\n[1, 2]\n");
}

#[test]
fn len_builtin_and_shadowing() {
    assert_eq!(run_clean("main() { return len(\"héllo\"); }"), Some(Value::Int(5)));
    assert_eq!(run_clean("main() { return len([1, 2, 3]); }"), Some(Value::Int(3)));

    let (value, diagnostics, output) = run("print(x) { return 42; } main() { return print(1); }");
    assert_eq!(value, Some(Value::Int(42)));
    assert!(diagnostics.is_empty());
    assert!(output.is_empty());

    let (_, diagnostics, _) = run("main() { return len(1); }");
    assert_eq!(diagnostics.kinds(), vec![ErrorKind::UnsupportedOperation]);
}

const COUNTER: &str = "
    class Counter {
        var count = 0;
        var step = 1;
        Counter(start) { count = start; }
        bump() { count = count + step; return count; }
    }
";

#[test]
fn classes_construct_and_run_methods() {
    let text = format!(
        "{} main() {{ var c = new Counter(5); c.bump(); return c.bump(); }}",
        COUNTER
    );
    assert_eq!(run_clean(&text), Some(Value::Int(7)));
}

#[test]
fn attributes_are_shared_between_copies() {
    let text = format!(
        "{} main() {{
            var c = new Counter(0);
            var d = c;
            d.bump();
            d.step = 10;
            c.bump();
            return c.count;
        }}",
        COUNTER
    );
    assert_eq!(run_clean(&text), Some(Value::Int(11)));
}

#[test]
fn attribute_passed_by_reference() {
    let text = format!(
        "{} reset(n) {{ n = 0; }}
        main() {{ var c = new Counter(9); reset(c.count); return c.count; }}",
        COUNTER
    );
    assert_eq!(run_clean(&text), Some(Value::Int(0)));
}

#[test]
fn class_errors() {
    let (_, diagnostics, _) = run("class P { var x; } main() { var p = new P(1); }");
    assert_eq!(diagnostics.kinds(), vec![ErrorKind::UnmatchedArguments]);

    let (_, diagnostics, _) = run("main() { var p = new Missing(); }");
    assert_eq!(diagnostics.kinds(), vec![ErrorKind::UndefinedSymbol]);

    let (_, diagnostics, _) = run("class P { } main() { var p = new P(); p.go(); }");
    assert_eq!(diagnostics.kinds(), vec![ErrorKind::UndefinedSymbol]);

    let (_, diagnostics, _) = run("class P { } main() { var p = new P(); return p.x; }");
    assert_eq!(diagnostics.kinds(), vec![ErrorKind::UndefinedSymbol]);

    let (_, diagnostics, _) = run("class P { var x; } main() { var p = new P(); return p.x; }");
    assert_eq!(diagnostics.kinds(), vec![ErrorKind::UninitializedVariable]);

    let (_, diagnostics, _) = run("main() { var n = 1; return n.x; }");
    assert_eq!(diagnostics.kinds(), vec![ErrorKind::UnsupportedOperation]);
}

#[test]
fn member_chains_are_unsupported() {
    let text = format!(
        "{} main() {{ var c = new Counter(1); return c.count.value; }}",
        COUNTER
    );
    let (value, diagnostics, _) = run(&text);
    assert_eq!(value, None);
    assert_eq!(diagnostics.kinds(), vec![ErrorKind::UnsupportedChaining]);
}

#[test]
fn for_loops() {
    assert_eq!(
        run_clean("main() { var total = 0; for (x in [1, 2, 3]) { total = total + x; } return total; }"),
        Some(Value::Int(6))
    );
    assert_eq!(
        run_clean("main() { var s = \"\"; for (c in \"abc\") { s = c + s; } return s; }"),
        Some(Value::String("cba".to_string()))
    );

    let (_, diagnostics, _) = run("main() { for (x in 5) { } }");
    assert_eq!(diagnostics.kinds(), vec![ErrorKind::UnsupportedOperation]);
}

#[test]
fn switch_runs_first_matching_label() {
    let text = "
        main() {
            var r = 0;
            switch (2) {
                1 -> { r = 10; }
                2 -> { r = 20; }
                2 -> { r = 30; }
                3 -> { r = 40; }
            }
            return r;
        }";
    let (value, diagnostics, _) = run(text);
    assert_eq!(value, Some(Value::Int(20)));
    assert_eq!(diagnostics.kinds(), vec![ErrorKind::DuplicateLabel]);

    assert_eq!(
        run_clean("main() { switch (\"b\") { \"a\" -> { return 1; } } return 0; }"),
        Some(Value::Int(0))
    );
}

#[test]
fn conditions_must_be_bool() {
    let (value, diagnostics, _) = run("main() { if (1) { return 1; } return 2; }");
    assert_eq!(value, Some(Value::Int(2)));
    assert_eq!(diagnostics.kinds(), vec![ErrorKind::UnsupportedOperation]);

    let (value, diagnostics, _) = run("main() { while (\"yes\") { return 1; } return 2; }");
    assert_eq!(value, Some(Value::Int(2)));
    assert_eq!(diagnostics.count(ErrorKind::UnsupportedOperation), 1);
}

#[test]
fn runaway_recursion_is_limited() {
    // Values hold Rc cells, so only their text leaves the thread.
    let handle = std::thread::Builder::new()
        .stack_size(64 * 1024 * 1024)
        .spawn(|| {
            let (value, diagnostics, _) =
                run("down(n) { return down(n + 1); } main() { return down(0); }");
            (value.map(|v| v.to_string()), diagnostics.kinds())
        })
        .expect("spawn interpreter thread");

    let (value, kinds) = handle.join().expect("interpreter thread panicked");
    assert_eq!(value, None);
    assert_eq!(kinds, vec![ErrorKind::RecursionLimit]);
}

#[test]
fn self_constructing_attribute_is_limited() {
    let handle = std::thread::Builder::new()
        .stack_size(64 * 1024 * 1024)
        .spawn(|| {
            let (value, diagnostics, _) =
                run("class C { var c = new C(); } main() { var x = new C(); return 1; }");
            (value.map(|v| v.to_string()), diagnostics.kinds())
        })
        .expect("spawn interpreter thread");

    let (value, kinds) = handle.join().expect("interpreter thread panicked");
    assert_eq!(value.as_deref(), Some("1"));
    assert_eq!(kinds, vec![ErrorKind::RecursionLimit]);
}

#[test]
fn self_constructing_constructor_is_limited() {
    let handle = std::thread::Builder::new()
        .stack_size(64 * 1024 * 1024)
        .spawn(|| {
            let (value, diagnostics, _) = run(
                "class D { D() { var d = new D(); } }
                main() { var d = new D(); return 2; }",
            );
            (value.map(|v| v.to_string()), diagnostics.kinds())
        })
        .expect("spawn interpreter thread");

    let (value, kinds) = handle.join().expect("interpreter thread panicked");
    assert_eq!(value.as_deref(), Some("2"));
    assert_eq!(kinds, vec![ErrorKind::RecursionLimit]);
}

#[test]
fn recursion_below_the_limit_is_fine() {
    let handle = std::thread::Builder::new()
        .stack_size(64 * 1024 * 1024)
        .spawn(|| {
            let text = format!(
                "count(n) {{ if (n == 0) {{ return 0; }} return 1 + count(n - 1); }}
                main() {{ return count({}); }}",
                MAX_CALL_DEPTH - 2
            );
            let (value, diagnostics, _) = run(&text);
            (value.map(|v| v.to_string()), diagnostics.len())
        })
        .expect("spawn interpreter thread");

    let (value, count) = handle.join().expect("interpreter thread panicked");
    assert_eq!(value, Some((MAX_CALL_DEPTH - 2).to_string()));
    assert_eq!(count, 0);
}

#[test]
fn runtime_diagnostics_keep_the_offending_name() {
    let (_, diagnostics, _) = run("main() { return ghost; }");
    let records = diagnostics.records();
    assert_eq!(records[0].kind, ErrorKind::UndeclaredVariable);
    assert_eq!(records[0].fragment.as_deref(), Some("ghost"));

    let (_, diagnostics, _) = run("main() { return nothing(1); }");
    assert_eq!(diagnostics.records()[0].fragment.as_deref(), Some("nothing"));
}

#[test]
fn runtime_diagnostics_keep_the_offending_operator() {
    let (_, diagnostics, _) = run("main() { return 1 + \"a\"; }");
    assert_eq!(diagnostics.records()[0].fragment.as_deref(), Some("+"));

    let (_, diagnostics, _) = run("main() { return 1 < \"a\"; }");
    assert_eq!(diagnostics.records()[0].fragment.as_deref(), Some("<"));

    let (_, diagnostics, _) = run("main() { return 4 / 0; }");
    assert_eq!(diagnostics.records()[0].fragment.as_deref(), Some("/"));
}

#[test]
fn output_before_an_error_is_kept() {
    let (_, diagnostics, output) = run("main() { print(\"before\"); return 1 / 0; }");
    assert_eq!(output, "before\n");
    assert_eq!(diagnostics.kinds(), vec![ErrorKind::DivisionByZero]);
}
