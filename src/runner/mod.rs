//! CLI execution and command dispatch logic.
//!
//! This module keeps `main` minimal by providing a single entry point
//! that loads the blueprint, builds and prepares the graph, selects the
//! toolchain pair, and hands the graph to the chosen backend: direct
//! execution, Makefile/NMake generation, or Visual Studio generation.

mod emit;
mod exec;
mod process;

pub use emit::write_if_changed;
pub use exec::{PlannedCommand, command_plan};

use anyhow::{Context, Result};
use camino::Utf8Path;
use tracing::debug;

use crate::blueprint::Blueprint;
use crate::cli::{Cli, Commands, MakefileArgs, VsArgs};
use crate::graph::Graph;
use crate::make_gen::{self, MakeFlavor};
use crate::platform::Platform;
use crate::toolchain::{self, Toolchain, default_linker};
use crate::vs_gen;

/// Execute the parsed [`Cli`] command.
///
/// # Errors
///
/// Returns an error when the blueprint cannot be loaded, the graph is
/// invalid, the toolchain pairing is unsupported, or the selected backend
/// fails.
pub fn run(cli: &Cli) -> Result<()> {
    if let Some(dir) = &cli.directory {
        std::env::set_current_dir(dir)
            .with_context(|| format!("changing directory to {}", dir.display()))?;
    }

    let blueprint = Blueprint::from_path(cli.file.as_std_path())
        .with_context(|| format!("loading blueprint {}", cli.file))?;
    let platform = Platform::for_os(cli.os.or(blueprint.os).unwrap_or(Platform::host().os));
    let linker = cli.linker.unwrap_or(default_linker(cli.compiler));
    let toolchain = toolchain::select(cli.compiler, linker).context("selecting toolchain")?;

    let mut graph =
        Graph::from_blueprint(&blueprint, platform).context("building dependency graph")?;
    if tracing::enabled!(tracing::Level::DEBUG) {
        let dump = serde_json::to_string_pretty(&graph).context("serialising graph")?;
        debug!("graph:\n{dump}");
    }
    graph.prepare(platform).context("preparing graph")?;

    match cli.command.clone().unwrap_or_default() {
        Commands::Build(args) => exec::execute(&graph, &toolchain, &args.targets, args.dry_run),
        Commands::Makefile(args) => handle_makefile(&graph, &toolchain, &args),
        Commands::Vs(args) => handle_vs(&graph, &toolchain, cli, &args),
    }
}

fn handle_makefile(graph: &Graph, toolchain: &Toolchain, args: &MakefileArgs) -> Result<()> {
    let flavor = if args.nmake {
        MakeFlavor::NMake
    } else {
        MakeFlavor::Posix
    };
    let text = make_gen::generate(graph, toolchain, flavor).context("generating make file")?;
    if args.file.as_str() == "-" {
        process::write_stdout(&text).context("writing make file to stdout")?;
    } else {
        write_if_changed(&args.file, &text)
            .with_context(|| format!("writing make file {}", args.file))?;
    }
    Ok(())
}

fn handle_vs(graph: &Graph, toolchain: &Toolchain, cli: &Cli, args: &VsArgs) -> Result<()> {
    let solution_name = cli
        .file
        .file_stem()
        .filter(|stem| !stem.is_empty())
        .unwrap_or("build");
    let output = vs_gen::generate(graph, toolchain, args.platform, solution_name)
        .context("generating Visual Studio solution")?;

    write_generated(&args.dir, &output.solution.path, &output.solution.content)?;
    for project in &output.projects {
        write_generated(&args.dir, &project.path, &project.content)?;
    }
    Ok(())
}

fn write_generated(dir: &Utf8Path, relative: &Utf8Path, content: &str) -> Result<()> {
    let path = dir.join(relative);
    write_if_changed(&path, content).with_context(|| format!("writing {path}"))?;
    Ok(())
}
