use towerc::ast::{
    CalleeReference, ClassKind, Declaration, Expr, ExprKind, FunctionDecl, Literal, Program, ResolutionError,
    StmtKind, VariableDecl,
};
use towerc::builder::*;
use towerc::diag::Diagnostics;
use towerc::sema::body::BodyResolver;
use towerc::sema::symbols::{Session, collect};
use towerc::sema::types::{BOOLEAN, ConeType, INT, STRING, TypeRef, UNIT};
use towerc::sema::{Analysis, ResolveOptions, analyze_program, verify_bindings};

fn analyze_with(mut program: Program, options: &ResolveOptions) -> (Program, Analysis, Vec<String>) {
    let (analysis, diags) = analyze_program(&mut program, options);
    let messages = diags
        .into_iter()
        .map(|diag| format!("{:?}: {}", diag.level, diag.message))
        .collect();
    (program, analysis, messages)
}

fn analyze(decls: Vec<Declaration>) -> (Program, Analysis, Vec<String>) {
    analyze_with(
        program(vec![file("main.kt", "app", decls)]),
        &ResolveOptions::default(),
    )
}

fn top_function<'a>(program: &'a Program, name: &str) -> &'a FunctionDecl {
    for decl in &program.files[0].declarations {
        match decl {
            Declaration::Function(function) if function.name == name => return function,
            Declaration::Class(class) => {
                for member in &class.members {
                    if let Declaration::Function(function) = member {
                        if function.name == name {
                            return function;
                        }
                    }
                }
            }
            _ => {}
        }
    }
    panic!("function {name} not found");
}

fn top_property<'a>(program: &'a Program, name: &str) -> &'a VariableDecl {
    for decl in &program.files[0].declarations {
        if let Declaration::Property(variable) = decl {
            if variable.name == name {
                return variable;
            }
        }
    }
    panic!("property {name} not found");
}

fn trailing_expr(function: &FunctionDecl) -> &Expr {
    let body = function.body.as_ref().expect("function body");
    match &body.stmts.last().expect("statement").kind {
        StmtKind::Expr(expr) => expr,
        StmtKind::Return(Some(expr)) => expr,
        other => panic!("expected trailing expression, got {other:?}"),
    }
}

fn type_of(analysis: &Analysis, expr: &Expr) -> String {
    analysis
        .bindings
        .get(expr.id)
        .map(ToString::to_string)
        .unwrap_or_else(|| "<unbound>".to_string())
}

fn callee(expr: &Expr) -> &CalleeReference {
    match &expr.kind {
        ExprKind::Access(access) => &access.callee,
        ExprKind::Call(call) => &call.callee,
        other => panic!("expected access or call, got {other:?}"),
    }
}

fn resolved_path(expr: &Expr) -> &str {
    match callee(expr) {
        CalleeReference::Resolved { path, .. } => path,
        other => panic!("expected resolved reference, got {other:?}"),
    }
}

fn resolution_error(expr: &Expr) -> &ResolutionError {
    match callee(expr) {
        CalleeReference::Error { error, .. } => error,
        other => panic!("expected error reference, got {other:?}"),
    }
}

#[test]
fn unknown_name_becomes_unresolved_marker() {
    let (program, analysis, diags) = analyze(vec![
        fun("main")
            .returns(builtin(UNIT))
            .body(vec![expr_stmt(name("missing").at(10, 17))])
            .into(),
    ]);
    assert_eq!(diags, vec!["Error: Unresolved name: missing".to_string()]);
    let expr = trailing_expr(top_function(&program, "main"));
    assert_eq!(
        resolution_error(expr),
        &ResolutionError::UnresolvedName {
            name: "missing".to_string()
        }
    );
    assert_eq!(type_of(&analysis, expr), "<error: Unresolved name: missing>");
}

#[test]
fn diagnostics_carry_file_path_and_span() {
    let mut tree = program(vec![file(
        "src/main.kt",
        "app",
        vec![fun("main").body(vec![expr_stmt(call("nope", vec![]).at(4, 10))]).into()],
    )]);
    let (_analysis, diags) = analyze_program(&mut tree, &ResolveOptions::default());
    assert_eq!(diags.len(), 1);
    assert_eq!(
        diags[0].path.as_deref(),
        Some(std::path::Path::new("src/main.kt"))
    );
    assert_eq!((diags[0].span.start, diags[0].span.end), (4, 10));
}

#[test]
fn property_type_is_inferred_from_constant() {
    let (program, analysis, diags) = analyze(vec![val("x").init(int(5)).into()]);
    assert!(diags.is_empty(), "{diags:?}");
    let x = top_property(&program, "x");
    assert_eq!(x.return_type, builtin(INT));
    assert!(!x.return_type.cone().expect("resolved type").is_nullable());
    assert_eq!(
        type_of(&analysis, x.initializer.as_ref().expect("initializer")),
        "std/Int"
    );
}

#[test]
fn null_constant_is_nullable_nothing() {
    let (program, _analysis, _diags) = analyze(vec![val("nothing").init(null()).into()]);
    assert_eq!(
        top_property(&program, "nothing").return_type.to_string(),
        "std/Nothing?"
    );
}

#[test]
fn expected_type_is_asserted_on_constants() {
    let (program, analysis, diags) = analyze(vec![
        val("wide")
            .ty(builtin(towerc::sema::types::LONG))
            .init(int(1))
            .into(),
    ]);
    assert!(diags.is_empty(), "{diags:?}");
    let wide = top_property(&program, "wide");
    assert_eq!(
        type_of(&analysis, wide.initializer.as_ref().expect("initializer")),
        "std/Long"
    );
}

#[test]
fn inner_block_binding_shadows_class_member() {
    let (program, analysis, diags) = analyze(vec![
        class("Holder")
            .member(val("value").ty(builtin(STRING)).init(string("s")))
            .member(fun("read").body(vec![
                local(val("value").init(int(1))),
                expr_stmt(name("value")),
            ]))
            .into(),
    ]);
    assert!(diags.is_empty(), "{diags:?}");
    let read = top_function(&program, "read");
    let expr = trailing_expr(read);
    assert_eq!(resolved_path(expr), "app/Holder.read.value");
    assert_eq!(type_of(&analysis, expr), "std/Int");
    assert_eq!(read.return_type, builtin(INT));
}

#[test]
fn class_member_is_visible_from_member_function() {
    let (program, analysis, diags) = analyze(vec![
        class("Holder")
            .member(val("value").ty(builtin(STRING)))
            .member(fun("read").body(vec![expr_stmt(name("value"))]))
            .into(),
    ]);
    assert!(diags.is_empty(), "{diags:?}");
    let expr = trailing_expr(top_function(&program, "read"));
    assert_eq!(resolved_path(expr), "app/Holder.value");
    assert_eq!(type_of(&analysis, expr), "std/String");
}

#[test]
fn equally_applicable_overloads_are_ambiguous() {
    let (program, analysis, diags) = analyze(vec![
        fun("f").param("a", builtin(INT)).returns(builtin(INT)).into(),
        fun("f").param("b", builtin(INT)).returns(builtin(STRING)).into(),
        fun("main").body(vec![expr_stmt(call("f", vec![int(1)]))]).into(),
    ]);
    assert_eq!(diags, vec!["Error: Ambiguity: f, [app/f, app/f]".to_string()]);
    let expr = trailing_expr(top_function(&program, "main"));
    match resolution_error(expr) {
        ResolutionError::Ambiguity { name, candidates } => {
            assert_eq!(name, "f");
            assert_eq!(candidates.len(), 2);
        }
        other => panic!("expected ambiguity, got {other:?}"),
    }
    assert!(analysis.bindings.get(expr.id).expect("bound").is_error());
}

#[test]
fn argument_count_selects_overload() {
    let (program, analysis, diags) = analyze(vec![
        fun("f")
            .param("a", builtin(INT))
            .param("b", builtin(INT))
            .returns(builtin(STRING))
            .into(),
        fun("f").param("a", builtin(INT)).returns(builtin(INT)).into(),
        fun("main").body(vec![expr_stmt(call("f", vec![int(1)]))]).into(),
    ]);
    assert!(diags.is_empty(), "{diags:?}");
    let one_arg = match &program.files[0].declarations[1] {
        Declaration::Function(function) => function.symbol,
        other => panic!("unexpected declaration {other:?}"),
    };
    let expr = trailing_expr(top_function(&program, "main"));
    assert_eq!(callee(expr).resolved_symbol(), Some(one_arg));
    assert_eq!(type_of(&analysis, expr), "std/Int");
}

#[test]
fn inner_parameter_mismatch_falls_back_to_outer_match() {
    let (program, analysis, diags) = analyze(vec![
        fun("g").param("a", builtin(INT)).returns(builtin(INT)).into(),
        fun("main")
            .body(vec![
                local_fun(
                    fun("g")
                        .param("a", builtin(INT))
                        .param("b", builtin(INT))
                        .returns(builtin(STRING)),
                ),
                expr_stmt(call("g", vec![int(1)])),
            ])
            .into(),
    ]);
    assert!(diags.is_empty(), "{diags:?}");
    let expr = trailing_expr(top_function(&program, "main"));
    assert_eq!(resolved_path(expr), "app/g");
    assert_eq!(type_of(&analysis, expr), "std/Int");
}

#[test]
fn wrong_argument_count_reports_parameter_mapping() {
    let (program, _analysis, diags) = analyze(vec![
        fun("f").param("a", builtin(INT)).returns(builtin(INT)).into(),
        fun("main").body(vec![expr_stmt(call("f", vec![]))]).into(),
    ]);
    assert_eq!(
        diags,
        vec!["Error: Inapplicable candidates for f: [app/f]".to_string()]
    );
    let expr = trailing_expr(top_function(&program, "main"));
    assert!(matches!(
        resolution_error(expr),
        ResolutionError::ParameterMapping { .. }
    ));
}

#[test]
fn calling_a_variable_uses_its_invoke_operator() {
    let (program, analysis, diags) = analyze(vec![
        class("Fn")
            .member(fun("invoke").param("x", builtin(INT)).returns(builtin(STRING)))
            .into(),
        fun("main")
            .param("f", resolved(class_type("app/Fn", vec![])))
            .body(vec![expr_stmt(call("f", vec![int(1)]))])
            .into(),
    ]);
    assert!(diags.is_empty(), "{diags:?}");
    let expr = trailing_expr(top_function(&program, "main"));
    let ExprKind::Call(call) = &expr.kind else {
        panic!("expected call, got {:?}", expr.kind);
    };
    assert_eq!(call.callee.name(), "invoke");
    assert_eq!(resolved_path(expr), "app/Fn.invoke");
    let receiver = call.explicit_receiver.as_ref().expect("synthesized receiver");
    assert_eq!(resolved_path(receiver), "app/main.f");
    assert_eq!(type_of(&analysis, receiver), "app/Fn");
    assert_eq!(type_of(&analysis, expr), "std/String");
    assert!(verify_bindings(&program, &analysis.bindings).is_empty());
}

#[test]
fn invoke_operator_name_is_configurable() {
    let options = ResolveOptions {
        invoke_name: "call".to_string(),
    };
    let (program, analysis, diags) = analyze_with(
        program(vec![file(
            "main.kt",
            "app",
            vec![
                class("Action")
                    .member(fun("call").returns(builtin(BOOLEAN)))
                    .into(),
                fun("main")
                    .param("run", resolved(class_type("app/Action", vec![])))
                    .body(vec![expr_stmt(call("run", vec![]))])
                    .into(),
            ],
        )]),
        &options,
    );
    assert!(diags.is_empty(), "{diags:?}");
    let expr = trailing_expr(top_function(&program, "main"));
    assert_eq!(resolved_path(expr), "app/Action.call");
    assert_eq!(type_of(&analysis, expr), "std/Boolean");
}

#[test]
fn inherited_member_is_substituted_through_supertype() {
    let (program, analysis, diags) = analyze(vec![
        class("Base")
            .type_params(&["T"])
            .member(fun("get").returns(resolved(type_param("T"))))
            .into(),
        class("Derived")
            .extends(class_type("app/Base", vec![ConeType::builtin(INT)]))
            .member(fun("read").body(vec![expr_stmt(call("get", vec![]))]))
            .into(),
    ]);
    assert!(diags.is_empty(), "{diags:?}");
    let read = top_function(&program, "read");
    let expr = trailing_expr(read);
    assert_eq!(resolved_path(expr), "app/Base.get");
    assert_eq!(type_of(&analysis, expr), "std/Int");
    assert_eq!(read.return_type, builtin(INT));
}

#[test]
fn overriding_member_hides_inherited_one() {
    let (program, analysis, diags) = analyze(vec![
        class("Base")
            .member(fun("name").returns(builtin(STRING)))
            .into(),
        class("Derived")
            .extends(class_type("app/Base", vec![]))
            .member(fun("name").returns(builtin(STRING)))
            .member(fun("show").body(vec![expr_stmt(call("name", vec![]))]))
            .into(),
    ]);
    assert!(diags.is_empty(), "{diags:?}");
    let expr = trailing_expr(top_function(&program, "show"));
    assert_eq!(resolved_path(expr), "app/Derived.name");
    assert_eq!(type_of(&analysis, expr), "std/String");
}

#[test]
fn extension_invoke_applies_to_variable_of_receiver_class() {
    let (program, analysis, diags) = analyze(vec![
        class("Fn").into(),
        fun("invoke")
            .receiver(class_type("app/Fn", vec![]))
            .param("x", builtin(INT))
            .returns(builtin(STRING))
            .into(),
        fun("main")
            .param("f", resolved(class_type("app/Fn", vec![])))
            .body(vec![expr_stmt(call("f", vec![int(1)]))])
            .into(),
    ]);
    assert!(diags.is_empty(), "{diags:?}");
    let expr = trailing_expr(top_function(&program, "main"));
    assert_eq!(resolved_path(expr), "app/invoke");
    assert_eq!(type_of(&analysis, expr), "std/String");
    let ExprKind::Call(call) = &expr.kind else {
        panic!("expected call, got {:?}", expr.kind);
    };
    let receiver = call.explicit_receiver.as_ref().expect("synthesized receiver");
    assert_eq!(resolved_path(receiver), "app/main.f");
}

#[test]
fn extension_invoke_on_unrelated_class_is_inapplicable() {
    let (program, _analysis, diags) = analyze(vec![
        class("Fn").into(),
        class("Other").into(),
        fun("invoke")
            .receiver(class_type("app/Fn", vec![]))
            .param("x", builtin(INT))
            .returns(builtin(STRING))
            .into(),
        fun("main")
            .param("g", resolved(class_type("app/Other", vec![])))
            .body(vec![expr_stmt(call("g", vec![int(1)]))])
            .into(),
    ]);
    assert_eq!(
        diags,
        vec!["Error: Inapplicable candidates for g: [app/invoke]".to_string()]
    );
    let expr = trailing_expr(top_function(&program, "main"));
    assert!(matches!(
        resolution_error(expr),
        ResolutionError::ParameterMapping { .. }
    ));
}

#[test]
fn invoke_with_wrong_argument_count_is_inapplicable() {
    let (program, analysis, diags) = analyze(vec![
        class("Fn")
            .member(fun("invoke").param("x", builtin(INT)).returns(builtin(STRING)))
            .into(),
        fun("main")
            .param("f", resolved(class_type("app/Fn", vec![])))
            .body(vec![expr_stmt(call("f", vec![]))])
            .into(),
    ]);
    assert_eq!(
        diags,
        vec!["Error: Inapplicable candidates for f: [app/Fn.invoke]".to_string()]
    );
    let expr = trailing_expr(top_function(&program, "main"));
    assert!(analysis.bindings.get(expr.id).expect("bound").is_error());
}

#[test]
fn only_variables_with_an_invoke_take_part_in_the_call() {
    let (program, analysis, diags) = analyze(vec![
        class("Fn")
            .member(fun("invoke").param("x", builtin(INT)).returns(builtin(STRING)))
            .into(),
        class("Other").into(),
        val("f").ty(resolved(class_type("app/Other", vec![]))).into(),
        val("f").ty(resolved(class_type("app/Fn", vec![]))).into(),
        fun("main")
            .body(vec![expr_stmt(call("f", vec![int(1)]))])
            .into(),
    ]);
    assert!(diags.is_empty(), "{diags:?}");
    let expr = trailing_expr(top_function(&program, "main"));
    assert_eq!(resolved_path(expr), "app/Fn.invoke");
    assert_eq!(type_of(&analysis, expr), "std/String");
    let ExprKind::Call(call) = &expr.kind else {
        panic!("expected call, got {:?}", expr.kind);
    };
    let receiver = call.explicit_receiver.as_ref().expect("synthesized receiver");
    assert_eq!(type_of(&analysis, receiver), "app/Fn");
}

#[test]
fn local_variable_invoke_shadows_outer_variable() {
    let (program, analysis, diags) = analyze(vec![
        class("Fn")
            .member(fun("invoke").param("x", builtin(INT)).returns(builtin(STRING)))
            .into(),
        class("Counter")
            .member(fun("invoke").param("x", builtin(INT)).returns(builtin(INT)))
            .into(),
        val("f").ty(resolved(class_type("app/Fn", vec![]))).into(),
        fun("main")
            .body(vec![
                local(val("f").ty(resolved(class_type("app/Counter", vec![])))),
                expr_stmt(call("f", vec![int(1)])),
            ])
            .into(),
    ]);
    assert!(diags.is_empty(), "{diags:?}");
    let expr = trailing_expr(top_function(&program, "main"));
    assert_eq!(resolved_path(expr), "app/Counter.invoke");
    assert_eq!(type_of(&analysis, expr), "std/Int");
    let ExprKind::Call(call) = &expr.kind else {
        panic!("expected call, got {:?}", expr.kind);
    };
    let receiver = call.explicit_receiver.as_ref().expect("synthesized receiver");
    assert_eq!(resolved_path(receiver), "app/main.f");
}

#[test]
fn property_inherited_from_two_interfaces_is_ambiguous() {
    let (program, analysis, diags) = analyze(vec![
        class("A")
            .kind(ClassKind::Interface)
            .member(val("v").ty(builtin(INT)))
            .into(),
        class("B")
            .kind(ClassKind::Interface)
            .member(val("v").ty(builtin(INT)))
            .into(),
        class("Holder")
            .extends(class_type("app/A", vec![]))
            .extends(class_type("app/B", vec![]))
            .member(fun("read").body(vec![expr_stmt(name("v"))]))
            .into(),
    ]);
    assert_eq!(diags, vec!["Error: Ambiguity: v, [app/A.v, app/B.v]".to_string()]);
    let expr = trailing_expr(top_function(&program, "read"));
    assert!(matches!(
        resolution_error(expr),
        ResolutionError::Ambiguity { .. }
    ));
    assert!(analysis.bindings.get(expr.id).expect("bound").is_error());
}

#[test]
fn function_type_parameter_is_not_taken_from_class_substitution() {
    let (program, analysis, diags) = analyze(vec![
        class("Base")
            .type_params(&["T"])
            .member(
                fun("id")
                    .type_params(&["T"])
                    .returns(resolved(type_param("T"))),
            )
            .into(),
        class("Derived")
            .extends(class_type("app/Base", vec![ConeType::builtin(INT)]))
            .member(fun("read").body(vec![expr_stmt(call_with_types(
                "id",
                vec![ConeType::builtin(STRING)],
                vec![],
            ))]))
            .into(),
    ]);
    assert!(diags.is_empty(), "{diags:?}");
    let expr = trailing_expr(top_function(&program, "read"));
    assert_eq!(resolved_path(expr), "app/Base.id");
    assert_eq!(type_of(&analysis, expr), "std/String");
}

#[test]
fn local_class_member_shadows_enclosing_local() {
    let (program, analysis, diags) = analyze(vec![
        fun("outer")
            .returns(builtin(UNIT))
            .body(vec![
                local(val("x").init(int(1))),
                local_class(
                    class("L")
                        .member(val("x").ty(builtin(STRING)).init(string("s")))
                        .member(fun("g").body(vec![expr_stmt(name("x"))])),
                ),
            ])
            .into(),
    ]);
    assert!(diags.is_empty(), "{diags:?}");
    let outer = top_function(&program, "outer");
    let body = outer.body.as_ref().expect("function body");
    let StmtKind::Class(local_class) = &body.stmts[1].kind else {
        panic!("expected local class, got {:?}", body.stmts[1].kind);
    };
    let g = local_class
        .members
        .iter()
        .find_map(|member| match member {
            Declaration::Function(function) if function.name == "g" => Some(function),
            _ => None,
        })
        .expect("member g");
    let expr = trailing_expr(g);
    assert_eq!(resolved_path(expr), "app/outer.L.x");
    assert_eq!(type_of(&analysis, expr), "std/String");
}

#[test]
fn unbound_label_reports_unresolved_this() {
    let (program, analysis, diags) = analyze(vec![
        fun("main").body(vec![expr_stmt(this_at("Outer"))]).into(),
    ]);
    assert_eq!(diags, vec!["Error: Unresolved this@Outer".to_string()]);
    let expr = trailing_expr(top_function(&program, "main"));
    assert_eq!(type_of(&analysis, expr), "<error: Unresolved this@Outer>");
}

#[test]
fn this_resolves_through_class_and_receiver_labels() {
    let (program, analysis, diags) = analyze(vec![
        class("Outer")
            .type_params(&["T"])
            .member(fun("me").body(vec![expr_stmt(this_at("Outer"))]))
            .into(),
        fun("twice")
            .receiver(ConeType::builtin(INT))
            .body(vec![expr_stmt(this())])
            .into(),
    ]);
    assert!(diags.is_empty(), "{diags:?}");
    let me = trailing_expr(top_function(&program, "me"));
    assert_eq!(type_of(&analysis, me), "app/Outer<T>");
    let twice = trailing_expr(top_function(&program, "twice"));
    assert_eq!(type_of(&analysis, twice), "std/Int");
}

#[test]
fn extension_function_matches_explicit_receiver() {
    let (program, analysis, diags) = analyze(vec![
        fun("describe")
            .receiver(ConeType::builtin(INT))
            .returns(builtin(STRING))
            .into(),
        fun("main")
            .body(vec![expr_stmt(call_on(int(3), "describe", vec![]))])
            .into(),
    ]);
    assert!(diags.is_empty(), "{diags:?}");
    let expr = trailing_expr(top_function(&program, "main"));
    assert_eq!(resolved_path(expr), "app/describe");
    assert_eq!(type_of(&analysis, expr), "std/String");
}

#[test]
fn call_to_class_is_constructor_call() {
    let (program, analysis, diags) = analyze(vec![
        class("Box").type_params(&["T"]).into(),
        fun("plain").body(vec![expr_stmt(call("Box", vec![]))]).into(),
        fun("typed")
            .body(vec![expr_stmt(call_with_types(
                "Box",
                vec![ConeType::builtin(INT)],
                vec![],
            ))])
            .into(),
    ]);
    assert!(diags.is_empty(), "{diags:?}");
    let plain = trailing_expr(top_function(&program, "plain"));
    assert_eq!(resolved_path(plain), "app/Box");
    assert_eq!(type_of(&analysis, plain), "app/Box");
    let typed = trailing_expr(top_function(&program, "typed"));
    assert_eq!(type_of(&analysis, typed), "app/Box<std/Int>");
}

#[test]
fn explicit_type_arguments_substitute_function_type_parameters() {
    let (program, analysis, diags) = analyze(vec![
        fun("id")
            .type_params(&["T"])
            .param("x", resolved(type_param("T")))
            .returns(resolved(type_param("T")))
            .into(),
        fun("main")
            .body(vec![expr_stmt(call_with_types(
                "id",
                vec![ConeType::builtin(STRING)],
                vec![string("s")],
            ))])
            .into(),
    ]);
    assert!(diags.is_empty(), "{diags:?}");
    let expr = trailing_expr(top_function(&program, "main"));
    assert_eq!(type_of(&analysis, expr), "std/String");
}

#[test]
fn function_return_type_comes_from_trailing_result() {
    let (program, _analysis, diags) = analyze(vec![
        fun("answer").body(vec![ret(Some(int(42)))]).into(),
        fun("greeting").body(vec![expr_stmt(string("hi"))]).into(),
        fun("nothing").body(vec![local(val("x").init(int(1)))]).into(),
        fun("declared_only").into(),
    ]);
    assert!(diags.is_empty(), "{diags:?}");
    assert_eq!(top_function(&program, "answer").return_type, builtin(INT));
    assert_eq!(top_function(&program, "greeting").return_type, builtin(STRING));
    assert_eq!(top_function(&program, "nothing").return_type, builtin(UNIT));
    assert!(top_function(&program, "declared_only").return_type.is_error());
}

#[test]
fn reference_before_inference_gets_error_type() {
    let (program, _analysis, _diags) = analyze(vec![
        fun("a").body(vec![expr_stmt(call("b", vec![]))]).into(),
        fun("b").body(vec![expr_stmt(int(1))]).into(),
    ]);
    let a = &top_function(&program, "a").return_type;
    assert!(a.is_error(), "{a}");
    assert!(a.to_string().contains("app/b"));
    assert_eq!(top_function(&program, "b").return_type, builtin(INT));
}

#[test]
fn delegated_property_stays_uninferred() {
    let (program, _analysis, diags) = analyze(vec![
        fun("compute").returns(builtin(INT)).into(),
        val("lazy").by(call("compute", vec![])).into(),
    ]);
    assert!(diags.is_empty(), "{diags:?}");
    assert_eq!(top_property(&program, "lazy").return_type, TypeRef::Implicit);
}

#[test]
fn when_takes_first_branch_type() {
    let (program, analysis, diags) = analyze(vec![
        fun("pick")
            .body(vec![expr_stmt(when(vec![
                (Some(lit(Literal::Boolean(true))), int(1)),
                (None, string("other")),
            ]))])
            .into(),
        fun("empty").body(vec![expr_stmt(when(vec![]))]).into(),
    ]);
    assert!(diags.is_empty(), "{diags:?}");
    let pick = trailing_expr(top_function(&program, "pick"));
    assert_eq!(type_of(&analysis, pick), "std/Int");
    let empty = trailing_expr(top_function(&program, "empty"));
    assert_eq!(type_of(&analysis, empty), "std/Unit");
}

#[test]
fn do_while_condition_sees_body_locals() {
    let (program, analysis, diags) = analyze(vec![
        fun("spin")
            .returns(builtin(UNIT))
            .body(vec![
                do_while(
                    vec![local(val("done").init(lit(Literal::Boolean(true))))],
                    name("done"),
                ),
                while_loop(name("flag"), vec![]),
            ])
            .into(),
        val("flag").ty(builtin(BOOLEAN)).into(),
    ]);
    assert_eq!(diags, Vec::<String>::new());
    assert!(verify_bindings(&program, &analysis.bindings).is_empty());
}

#[test]
fn loop_body_locals_do_not_leak() {
    let (_program, _analysis, diags) = analyze(vec![
        fun("spin")
            .returns(builtin(UNIT))
            .body(vec![
                while_loop(
                    lit(Literal::Boolean(true)),
                    vec![local(val("inner").init(int(1)))],
                ),
                expr_stmt(name("inner")),
            ])
            .into(),
    ]);
    assert_eq!(diags, vec!["Error: Unresolved name: inner".to_string()]);
}

#[test]
fn parameter_defaults_are_resolved_against_parameter_type() {
    let (program, analysis, diags) = analyze(vec![
        fun("pad")
            .param_with_default("width", builtin(towerc::sema::types::LONG), int(4))
            .returns(builtin(UNIT))
            .into(),
    ]);
    assert!(diags.is_empty(), "{diags:?}");
    let pad = top_function(&program, "pad");
    let default = pad.parameters[0].default.as_ref().expect("default");
    assert_eq!(type_of(&analysis, default), "std/Long");
}

#[test]
fn explicit_tree_keeps_types_on_second_pass() {
    let decls: Vec<Declaration> = vec![
        val("count").ty(builtin(INT)).init(int(3)).into(),
        fun("size").returns(builtin(INT)).body(vec![expr_stmt(name("count"))]).into(),
        fun("main")
            .returns(builtin(INT))
            .body(vec![ret(Some(call("size", vec![])))])
            .into(),
    ];
    let (first, first_analysis, diags) = analyze(decls);
    assert!(diags.is_empty(), "{diags:?}");
    let (second, second_analysis, diags) =
        analyze_with(first.clone(), &ResolveOptions::default());
    assert!(diags.is_empty(), "{diags:?}");
    assert_eq!(first_analysis.bindings, second_analysis.bindings);
    assert_eq!(
        resolved_path(trailing_expr(top_function(&second, "main"))),
        "app/size"
    );
}

#[test]
fn substituted_member_type_survives_second_pass() {
    let decls: Vec<Declaration> = vec![
        class("Base")
            .type_params(&["T"])
            .member(fun("get").returns(resolved(type_param("T"))))
            .into(),
        class("Derived")
            .extends(class_type("app/Base", vec![ConeType::builtin(INT)]))
            .member(fun("read").body(vec![expr_stmt(call("get", vec![]))]))
            .into(),
    ];
    let (first, first_analysis, diags) = analyze(decls);
    assert!(diags.is_empty(), "{diags:?}");
    match callee(trailing_expr(top_function(&first, "read"))) {
        CalleeReference::Resolved { ty, .. } => assert_eq!(ty, &builtin(INT)),
        other => panic!("expected resolved reference, got {other:?}"),
    }
    let (second, second_analysis, diags) =
        analyze_with(first.clone(), &ResolveOptions::default());
    assert!(diags.is_empty(), "{diags:?}");
    assert_eq!(first_analysis.bindings, second_analysis.bindings);
    let expr = trailing_expr(top_function(&second, "read"));
    assert_eq!(type_of(&second_analysis, expr), "std/Int");
}

#[test]
fn error_expected_type_is_kept_on_constants() {
    let (program, analysis, diags) = analyze(vec![
        fun("broken")
            .returns(TypeRef::Error("unknown type".to_string()))
            .body(vec![expr_stmt(int(5))])
            .into(),
    ]);
    assert!(diags.is_empty(), "{diags:?}");
    let expr = trailing_expr(top_function(&program, "broken"));
    assert_eq!(type_of(&analysis, expr), "<error: unknown type>");
}

#[test]
fn every_expression_is_bound_after_resolution() {
    let (program, analysis, _diags) = analyze(vec![
        class("Point")
            .member(val("x").ty(builtin(INT)).init(int(0)))
            .member(fun("shifted").body(vec![
                local(val("dx").init(int(1))),
                expr_stmt(block_expr(vec![expr_stmt(name("x")), expr_stmt(name("dx"))])),
            ]))
            .into(),
        fun("broken").body(vec![expr_stmt(call("ghost", vec![name("phantom")]))]).into(),
    ]);
    assert!(verify_bindings(&program, &analysis.bindings).is_empty());
    let shifted = top_function(&program, "shifted");
    assert_eq!(shifted.return_type, builtin(INT));
}

#[test]
fn resolver_releases_all_scopes() {
    let mut tree = program(vec![file(
        "main.kt",
        "app",
        vec![
            class("Outer")
                .member(
                    fun("run").body(vec![
                        local_class(class("Local").member(fun("inner").body(vec![expr_stmt(
                            this_at("Local"),
                        )]))),
                        expr_stmt(call("Local", vec![])),
                    ]),
                )
                .into(),
        ],
    )]);
    let mut session = Session::new();
    let mut diags = Diagnostics::default();
    collect(&mut tree, &mut session, &mut diags);
    let options = ResolveOptions::default();
    let mut resolver = BodyResolver::new(&mut session, &options, &mut diags);
    resolver.resolve_program(&mut tree);
    assert_eq!(resolver.scope_depth(), 0);
    let bindings = resolver.into_bindings();
    assert!(!diags.has_errors(), "{:?}", diags.into_vec());
    assert!(verify_bindings(&tree, &bindings).is_empty());
}
