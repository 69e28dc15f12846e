//! Blueprint-to-graph conversion.

use indexmap::IndexMap;

use crate::blueprint::{
    Blueprint, BlueprintError, EntryCommand, EntryPrimitive, ExtensionDef, ProjectDef,
    ProjectKind, SourceDef,
};
use crate::extension::{self, Extension};
use crate::flags::Flag;
use crate::platform::Platform;

use super::model::{ExtensionLink, Graph, GraphError, NodeId};
use super::settings::Settings;

impl Graph {
    /// Build a graph from a loaded blueprint.
    ///
    /// Nodes are created in a fixed order: variables, extensions (in
    /// sequenced initialisation order), projects with their object files,
    /// then entries. `depends` lists are resolved against every referable
    /// name once all nodes exist, so declaration order never matters.
    ///
    /// # Errors
    ///
    /// Returns [`BlueprintError`] on duplicate or unknown names, extension
    /// requirement cycles, or primitives the platform cannot synthesise.
    pub fn from_blueprint(
        blueprint: &Blueprint,
        platform: &Platform,
    ) -> Result<Self, BlueprintError> {
        let mut graph = Self::default();
        let mut registry: IndexMap<String, NodeId> = IndexMap::new();

        for variable in &blueprint.variables {
            let id = graph.add_variable(
                variable.name.clone(),
                variable.value.clone(),
                variable.default.clone(),
            );
            register(&mut registry, &variable.name, id)?;
        }

        add_extensions(&mut graph, &mut registry, &blueprint.extensions)?;

        for project in &blueprint.projects {
            let id = add_project(&mut graph, project);
            register(&mut registry, &project.name, id)?;
        }

        for entry in &blueprint.entries {
            let commands = entry
                .commands
                .iter()
                .map(|command| entry_command(&entry.name, command, platform))
                .collect::<Result<Vec<_>, _>>()?;
            let id = graph.add_entry(entry.name.clone(), commands, entry.output.clone());
            register(&mut registry, &entry.name, id)?;
        }

        for project in &blueprint.projects {
            wire_depends(&mut graph, &registry, &project.name, &project.depends)?;
        }
        for entry in &blueprint.entries {
            wire_depends(&mut graph, &registry, &entry.name, &entry.depends)?;
        }

        Ok(graph)
    }
}

fn register(
    registry: &mut IndexMap<String, NodeId>,
    name: &str,
    id: NodeId,
) -> Result<(), BlueprintError> {
    if registry.insert(name.to_owned(), id).is_some() {
        return Err(GraphError::DuplicateName {
            name: name.to_owned(),
        }
        .into());
    }
    Ok(())
}

/// Sequence the extension set and add one node per extension in
/// initialisation order.
fn add_extensions(
    graph: &mut Graph,
    registry: &mut IndexMap<String, NodeId>,
    defs: &[ExtensionDef],
) -> Result<(), BlueprintError> {
    let components: Vec<Extension> = defs
        .iter()
        .map(|def| Extension::requiring(def.name.clone(), def.requires.iter().cloned()))
        .collect();
    let ordered = extension::sequence(&components)?;

    let by_name: IndexMap<&str, &ExtensionDef> =
        defs.iter().map(|def| (def.name.as_str(), def)).collect();
    for sequenced in &ordered {
        let Some(def) = by_name.get(sequenced.name.as_str()) else {
            continue;
        };
        let id = match (&def.archive, &def.library) {
            (Some(path), _) => graph.add_static_extension(path.clone()),
            (None, Some(library)) if library.starts_with('<') => {
                let flag =
                    Flag::parse(library).map_err(|source| BlueprintError::ExtensionLiteral {
                        name: def.name.clone(),
                        source,
                    })?;
                graph.add_dynamic_extension(ExtensionLink::Literal(flag))
            }
            (None, Some(library)) => {
                graph.add_dynamic_extension(ExtensionLink::Named(library.clone()))
            }
            (None, None) => graph.add_dynamic_extension(ExtensionLink::Named(def.name.clone())),
        };
        register(registry, &def.name, id)?;
    }
    Ok(())
}

fn project_settings(project: &ProjectDef) -> Settings {
    Settings {
        includes: project.includes.clone(),
        definitions: project.definitions.clone(),
        cflags: project.cflags.clone(),
        searches: project.searches.clone(),
        ldflags: project.ldflags.clone(),
        optimization: project.optimization,
        debug: project.debug,
    }
}

fn add_project(graph: &mut Graph, project: &ProjectDef) -> NodeId {
    let settings = project_settings(project);
    let id = match project.kind {
        ProjectKind::Application => {
            graph.add_application(project.name.clone(), project.strip, settings)
        }
        ProjectKind::DynamicLibrary => graph.add_dynamic_library(project.name.clone(), settings),
        ProjectKind::StaticLibrary => graph.add_static_library(project.name.clone(), settings),
        ProjectKind::ObjectLibrary => graph.add_object_library(project.name.clone(), settings),
    };
    graph.node_mut(id).output = project.output.clone();

    for source in &project.sources {
        let object = match source {
            SourceDef::Path(path) => graph.add_object_file(path.clone(), Settings::default()),
            SourceDef::Detailed(file) => {
                let local = Settings {
                    includes: file.includes.clone(),
                    definitions: file.definitions.clone(),
                    cflags: file.cflags.clone(),
                    searches: Vec::new(),
                    ldflags: Vec::new(),
                    optimization: file.optimization,
                    debug: file.debug,
                };
                let object = if file.preprocess {
                    graph.add_preprocessed_file(file.source.clone(), local)
                } else {
                    graph.add_object_file(file.source.clone(), local)
                };
                graph.node_mut(object).output = file.output.clone();
                object
            }
        };
        graph.add_dep(id, object);
    }
    id
}

fn wire_depends(
    graph: &mut Graph,
    registry: &IndexMap<String, NodeId>,
    target: &str,
    depends: &[String],
) -> Result<(), BlueprintError> {
    let Some(&target_id) = registry.get(target) else {
        return Ok(());
    };
    for dependency in depends {
        let Some(&dep_id) = registry.get(dependency) else {
            return Err(GraphError::UnknownDependency {
                target: target.to_owned(),
                dependency: dependency.clone(),
            }
            .into());
        };
        graph.add_dep(target_id, dep_id);
    }
    Ok(())
}

fn entry_command(
    entry: &str,
    command: &EntryCommand,
    platform: &Platform,
) -> Result<String, BlueprintError> {
    match command {
        EntryCommand::Shell(text) => Ok(text.clone()),
        EntryCommand::Primitive(primitive) => match primitive {
            EntryPrimitive::CreateDir(path) => Ok(platform.create_dir_command(path)),
            EntryPrimitive::Delete(path) => Ok(platform.delete_command(path)),
            EntryPrimitive::Strip(path) => {
                platform
                    .strip_command(path)
                    .ok_or(BlueprintError::UnsupportedPrimitive {
                        entry: entry.to_owned(),
                        op: "strip",
                        os: platform.os,
                    })
            }
        },
    }
}
