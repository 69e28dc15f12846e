//! End-to-end scenarios: blueprint in, command plan or make file out.

use rstest::rstest;
use tsugite::blueprint::Blueprint;
use tsugite::graph::Graph;
use tsugite::make_gen::{self, MakeFlavor};
use tsugite::platform::{Os, Platform};
use tsugite::runner::command_plan;
use tsugite::toolchain::{CompilerKind, LinkerKind, Toolchain, select};

const DEMO_BLUEPRINT: &str = r#"{
    "version": "1.0.0",
    "os": "linux",
    "extensions": [ { "name": "m" } ],
    "projects": [
        {
            "kind": "object-library",
            "name": "core",
            "sources": ["/nonexistent/a.c", "/nonexistent/b.c"]
        },
        {
            "kind": "application",
            "name": "/nonexistent/demo",
            "depends": ["core", "m"]
        }
    ]
}"#;

fn gcc_ld() -> Toolchain {
    select(CompilerKind::Gcc, LinkerKind::Ld).expect("pairing")
}

fn demo_graph() -> Graph {
    let blueprint = Blueprint::from_str(DEMO_BLUEPRINT).expect("parse");
    let mut graph =
        Graph::from_blueprint(&blueprint, Platform::for_os(Os::Linux)).expect("convert");
    graph.prepare(Platform::for_os(Os::Linux)).expect("acyclic");
    graph
}

#[rstest]
fn direct_execution_plans_two_compiles_then_one_link() {
    let graph = demo_graph();
    let plan = command_plan(&graph, &gcc_ld(), &[]).expect("plan");

    assert_eq!(plan.len(), 3, "plan: {plan:#?}");
    for compile in plan.iter().take(2) {
        assert!(compile.command.contains(" -c "), "compile: {}", compile.command);
    }
    let link = plan.last().expect("link step");
    assert!(!link.command.contains(" -c "), "link: {}", link.command);
    assert!(link.command.contains("/nonexistent/a.o"), "link: {}", link.command);
    assert!(link.command.contains("/nonexistent/b.o"), "link: {}", link.command);
    assert!(link.command.contains("-lm"), "link: {}", link.command);
}

#[rstest]
fn makefile_contains_object_rules_and_flattened_application_rule() {
    let graph = demo_graph();
    let makefile = make_gen::generate(&graph, &gcc_ld(), MakeFlavor::Posix).expect("generate");

    assert!(
        makefile.contains("/nonexistent/a.o: /nonexistent/a.c"),
        "makefile:\n{makefile}"
    );
    assert!(
        makefile.contains("/nonexistent/b.o: /nonexistent/b.c"),
        "makefile:\n{makefile}"
    );
    assert!(
        makefile.contains("/nonexistent/demo: /nonexistent/a.o /nonexistent/b.o m\n"),
        "makefile:\n{makefile}"
    );
}

#[rstest]
fn scoped_flags_reach_only_their_toolchain() {
    let text = r#"{
        "version": "1.0.0",
        "projects": [{
            "kind": "application",
            "name": "/nonexistent/demo",
            "sources": ["/nonexistent/main.c"],
            "cflags": ["x", "<gnu:-Wall>", "<msc:/W4>"]
        }]
    }"#;
    let blueprint = Blueprint::from_str(text).expect("parse");
    let mut graph =
        Graph::from_blueprint(&blueprint, Platform::for_os(Os::Linux)).expect("convert");
    graph.prepare(Platform::for_os(Os::Linux)).expect("acyclic");

    let plan = command_plan(&graph, &gcc_ld(), &[]).expect("plan");
    let compile = plan.first().expect("compile step");
    assert!(compile.command.contains(" x "), "compile: {}", compile.command);
    assert!(compile.command.contains("-Wall"), "compile: {}", compile.command);
    assert!(!compile.command.contains("/W4"), "compile: {}", compile.command);
}

#[rstest]
fn extension_cycle_fails_before_any_backend_runs() {
    let text = r#"{
        "version": "1.0.0",
        "extensions": [
            { "name": "x", "requires": ["y"] },
            { "name": "y", "requires": ["x"] }
        ]
    }"#;
    let blueprint = Blueprint::from_str(text).expect("parse");
    let err = Graph::from_blueprint(&blueprint, Platform::for_os(Os::Linux))
        .expect_err("cycle");
    assert!(err.to_string().contains("cycle"), "error: {err}");
}
