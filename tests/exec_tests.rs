//! Direct-execution backend tests using real (harmless) shell commands.

#![cfg(unix)]

use camino::Utf8PathBuf;
use tsugite::graph::Graph;
use tsugite::platform::{Os, Platform};
use tsugite::runner::command_plan;
use tsugite::toolchain::{CompilerKind, LinkerKind, Toolchain, select};

fn gcc_ld() -> Toolchain {
    select(CompilerKind::Gcc, LinkerKind::Ld).expect("pairing")
}

fn temp_utf8_dir() -> (tempfile::TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().expect("temp dir");
    let path = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf-8 temp path");
    (temp, path)
}

#[test]
fn existing_file_target_is_skipped_without_timestamp_checks() {
    let (_guard, dir) = temp_utf8_dir();
    let marker = dir.join("stamp.txt");

    let mut graph = Graph::default();
    graph.add_entry(
        "stamp",
        vec![format!("touch {marker}")],
        Some(marker.clone()),
    );
    graph.prepare(Platform::for_os(Os::Linux)).expect("acyclic");

    let before = command_plan(&graph, &gcc_ld(), &[]).expect("plan");
    assert_eq!(before.len(), 1, "missing output schedules the command");

    std::fs::write(&marker, "present").expect("create marker");
    // Existence alone suppresses the command; this is deliberately a
    // coarser check than make's dependency timestamps.
    let after = command_plan(&graph, &gcc_ld(), &[]).expect("plan");
    assert!(after.is_empty(), "plan: {after:#?}");
}

#[test]
fn phony_entries_always_run() {
    let (_guard, dir) = temp_utf8_dir();
    let log = dir.join("log.txt");

    let mut graph = Graph::default();
    graph.add_entry("note", vec![format!("touch {log}")], None);
    graph.prepare(Platform::for_os(Os::Linux)).expect("acyclic");

    std::fs::write(&log, "").expect("pre-create log");
    let plan = command_plan(&graph, &gcc_ld(), &[]).expect("plan");
    assert_eq!(plan.len(), 1, "a word target has no output to check");
}

#[test]
fn entry_dependencies_run_before_the_entry() {
    let (_guard, dir) = temp_utf8_dir();
    let first = dir.join("first.txt");
    let second = dir.join("second.txt");

    let mut graph = Graph::default();
    let produce = graph.add_entry(
        "produce",
        vec![format!("touch {first}")],
        Some(first.clone()),
    );
    let consume = graph.add_entry(
        "consume",
        vec![format!("touch {second}")],
        Some(second.clone()),
    );
    graph.add_dep(consume, produce);
    graph.prepare(Platform::for_os(Os::Linux)).expect("acyclic");

    let plan = command_plan(&graph, &gcc_ld(), &[]).expect("plan");
    let commands: Vec<&str> = plan.iter().map(|p| p.command.as_str()).collect();
    assert_eq!(
        commands,
        [
            format!("touch {first}"),
            format!("touch {second}"),
        ]
    );
}
