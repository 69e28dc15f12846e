//! Visual Studio solution and project generation.
//!
//! Emits one `.vcxproj` per compilable project node and one `.sln` tying
//! them together, mirroring the dependency graph through
//! `ProjectReference` items and `ProjectSection(ProjectDependencies)`
//! blocks. Entry nodes become Utility projects whose pre-build events
//! carry reified command text, since MSBuild has no make-style deferral
//! for arbitrary shell commands. Project GUIDs come from a fixed
//! pre-generated pool, so generation is deterministic and needs no UUID
//! dependency.

use std::fmt::{self, Display, Formatter};

use camino::Utf8PathBuf;
use indexmap::IndexMap;
use itertools::Itertools;
use thiserror::Error;

use crate::flags::{ToolchainId, filter_flags};
use crate::graph::{
    Effective, ExtensionLink, Graph, NodeId, NodeKind, ReifyError, SynthesisError, Visited,
    effective, reify,
};
use crate::toolchain::{Optimization, Toolchain, ToolchainError};

/// The solution platform to target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum VsPlatform {
    /// 32-bit (`Win32`).
    X86,
    /// 64-bit (`x64`).
    X64,
}

impl VsPlatform {
    /// The platform name as solutions spell it.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::X86 => "Win32",
            Self::X64 => "x64",
        }
    }
}

impl Display for VsPlatform {
    /// Spelled as the CLI accepts it, not as solutions do.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::X86 => "x86",
            Self::X64 => "x64",
        })
    }
}

/// Errors raised during solution generation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VsGenError {
    /// Command synthesis failed.
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
    /// A pre-build command could not be reified.
    #[error(transparent)]
    Reify(#[from] ReifyError),
    /// More project nodes than pre-generated GUIDs.
    #[error("GUID pool exhausted: {count} projects exceed the pool of {pool}")]
    GuidPoolExhausted {
        /// Number of projects requested.
        count: usize,
        /// Pool capacity.
        pool: usize,
    },
}

impl From<ToolchainError> for VsGenError {
    fn from(err: ToolchainError) -> Self {
        Self::Synthesis(SynthesisError::Toolchain(err))
    }
}

/// One emitted file, path relative to the output directory.
#[derive(Debug, PartialEq, Eq)]
pub struct GeneratedFile {
    /// Relative path.
    pub path: Utf8PathBuf,
    /// Full file content.
    pub content: String,
}

/// The generated solution and its projects.
#[derive(Debug, PartialEq, Eq)]
pub struct VsOutput {
    /// The `.sln` file.
    pub solution: GeneratedFile,
    /// One `.vcxproj` per project node.
    pub projects: Vec<GeneratedFile>,
}

/// The C++ project-type GUID every `Project(...)` solution line carries.
const CPP_PROJECT_TYPE: &str = "8BC9CEB8-8B4A-11D0-8D11-00A0C91BC942";

/// Fixed GUID pool; one entry per project node, allocated in visit order.
const GUID_POOL: [&str; 24] = [
    "9D4AD210-5E2B-4E6F-9C33-61D5C4F0A001",
    "9D4AD210-5E2B-4E6F-9C33-61D5C4F0A002",
    "9D4AD210-5E2B-4E6F-9C33-61D5C4F0A003",
    "9D4AD210-5E2B-4E6F-9C33-61D5C4F0A004",
    "9D4AD210-5E2B-4E6F-9C33-61D5C4F0A005",
    "9D4AD210-5E2B-4E6F-9C33-61D5C4F0A006",
    "9D4AD210-5E2B-4E6F-9C33-61D5C4F0A007",
    "9D4AD210-5E2B-4E6F-9C33-61D5C4F0A008",
    "9D4AD210-5E2B-4E6F-9C33-61D5C4F0A009",
    "9D4AD210-5E2B-4E6F-9C33-61D5C4F0A00A",
    "9D4AD210-5E2B-4E6F-9C33-61D5C4F0A00B",
    "9D4AD210-5E2B-4E6F-9C33-61D5C4F0A00C",
    "9D4AD210-5E2B-4E6F-9C33-61D5C4F0A00D",
    "9D4AD210-5E2B-4E6F-9C33-61D5C4F0A00E",
    "9D4AD210-5E2B-4E6F-9C33-61D5C4F0A00F",
    "9D4AD210-5E2B-4E6F-9C33-61D5C4F0A010",
    "9D4AD210-5E2B-4E6F-9C33-61D5C4F0A011",
    "9D4AD210-5E2B-4E6F-9C33-61D5C4F0A012",
    "9D4AD210-5E2B-4E6F-9C33-61D5C4F0A013",
    "9D4AD210-5E2B-4E6F-9C33-61D5C4F0A014",
    "9D4AD210-5E2B-4E6F-9C33-61D5C4F0A015",
    "9D4AD210-5E2B-4E6F-9C33-61D5C4F0A016",
    "9D4AD210-5E2B-4E6F-9C33-61D5C4F0A017",
    "9D4AD210-5E2B-4E6F-9C33-61D5C4F0A018",
];

/// Generate the solution and project files for a prepared graph.
///
/// # Errors
///
/// Returns [`VsGenError`] when command synthesis or reification fails, or
/// when the graph holds more project nodes than the GUID pool.
pub fn generate(
    graph: &Graph,
    toolchain: &Toolchain,
    platform: VsPlatform,
    solution_name: &str,
) -> Result<VsOutput, VsGenError> {
    let mut visited = Visited::new(graph);
    let mut records: Vec<ProjectRecord> = Vec::new();
    for root in graph.roots() {
        collect_projects(graph, root, toolchain, &mut visited, &mut records)?;
    }
    if records.len() > GUID_POOL.len() {
        return Err(VsGenError::GuidPoolExhausted {
            count: records.len(),
            pool: GUID_POOL.len(),
        });
    }

    let index: IndexMap<NodeId, (String, &'static str)> = records
        .iter()
        .zip(GUID_POOL)
        .map(|(record, guid)| (record.id, (record.name.clone(), guid)))
        .collect();

    let projects = records
        .iter()
        .map(|record| GeneratedFile {
            path: Utf8PathBuf::from(format!("{}.vcxproj", record.name)),
            content: DisplayProject {
                record,
                index: &index,
                platform,
            }
            .to_string(),
        })
        .collect();

    let solution = GeneratedFile {
        path: Utf8PathBuf::from(format!("{solution_name}.sln")),
        content: DisplaySolution {
            records: &records,
            index: &index,
            platform,
        }
        .to_string(),
    };

    Ok(VsOutput { solution, projects })
}

enum ProjectShape {
    Compiled {
        config_type: &'static str,
        composed: Effective,
        optimization: &'static str,
        sources: Vec<Utf8PathBuf>,
        link_inputs: Vec<String>,
    },
    Utility {
        build_event: String,
    },
}

struct ProjectRecord {
    id: NodeId,
    name: String,
    shape: ProjectShape,
    references: Vec<NodeId>,
}

fn collect_projects(
    graph: &Graph,
    id: NodeId,
    toolchain: &Toolchain,
    visited: &mut Visited,
    records: &mut Vec<ProjectRecord>,
) -> Result<(), VsGenError> {
    if !visited.insert(id) {
        return Ok(());
    }
    for dep in graph.node(id).deps.clone() {
        collect_projects(graph, dep, toolchain, visited, records)?;
    }

    let node = graph.node(id);
    let config_type = match &node.kind {
        NodeKind::Application { .. } => "Application",
        NodeKind::DynamicLibrary { .. } => "DynamicLibrary",
        // Visual Studio has no object-library concept; a static library
        // project is the closest shape.
        NodeKind::StaticLibrary { .. } | NodeKind::ObjectLibrary { .. } => "StaticLibrary",
        NodeKind::Entry { name, commands } => {
            let vars = graph.variables();
            let reified: Vec<String> = commands
                .iter()
                .map(|command| reify(command, &vars))
                .collect::<Result<_, _>>()?;
            let (_, _, references) = split_deps(graph, id, toolchain);
            records.push(ProjectRecord {
                id,
                name: name.clone(),
                shape: ProjectShape::Utility {
                    build_event: reified.join("\n"),
                },
                references,
            });
            return Ok(());
        }
        NodeKind::ObjectFile { .. }
        | NodeKind::DynamicExtension { .. }
        | NodeKind::StaticExtension { .. }
        | NodeKind::Variable { .. } => return Ok(()),
    };

    let (sources, link_inputs, references) = split_deps(graph, id, toolchain);
    let composed = effective(graph, id);
    let optimization = vs_optimization(composed.optimization())?;
    records.push(ProjectRecord {
        id,
        name: node.name().to_owned(),
        shape: ProjectShape::Compiled {
            config_type,
            composed,
            optimization,
            sources,
            link_inputs,
        },
        references,
    });
    Ok(())
}

/// Partition a project's dependencies into compiled sources, raw linker
/// inputs (extension references) and references to sibling projects.
fn split_deps(
    graph: &Graph,
    id: NodeId,
    toolchain: &Toolchain,
) -> (Vec<Utf8PathBuf>, Vec<String>, Vec<NodeId>) {
    let mut sources = Vec::new();
    let mut link_inputs = Vec::new();
    let mut references = Vec::new();
    for dep in &graph.node(id).deps {
        let node = graph.node(*dep);
        match &node.kind {
            NodeKind::ObjectFile { source, .. } => sources.push(source.clone()),
            NodeKind::ObjectLibrary { .. }
            | NodeKind::StaticLibrary { .. }
            | NodeKind::DynamicLibrary { .. }
            | NodeKind::Application { .. }
            | NodeKind::Entry { .. } => references.push(*dep),
            NodeKind::DynamicExtension { link } => match link {
                ExtensionLink::Named(name) => link_inputs.push(format!("{name}.lib")),
                ExtensionLink::Literal(flag) => {
                    if let Some(value) = flag.filter(toolchain.id()) {
                        link_inputs.push(value.to_owned());
                    }
                }
            },
            NodeKind::StaticExtension { path } => link_inputs.push(path.as_str().to_owned()),
            NodeKind::Variable { .. } => {}
        }
    }
    (sources, link_inputs, references)
}

fn vs_optimization(level: Optimization) -> Result<&'static str, ToolchainError> {
    match level {
        Optimization::O0 => Ok("Disabled"),
        Optimization::O1 | Optimization::Size => Ok("MinSpace"),
        Optimization::O2 => Ok("MaxSpeed"),
        level => Err(ToolchainError::UnsupportedOptimization {
            tool: "visual-studio",
            level,
        }),
    }
}

/// Escape text for embedding in an XML element.
fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Wrapper struct to display one `.vcxproj`.
struct DisplayProject<'a> {
    record: &'a ProjectRecord,
    index: &'a IndexMap<NodeId, (String, &'static str)>,
    platform: VsPlatform,
}

impl DisplayProject<'_> {
    fn write_compiled(
        &self,
        f: &mut Formatter<'_>,
        config_type: &str,
        composed: &Effective,
        optimization: &str,
        sources: &[Utf8PathBuf],
        link_inputs: &[String],
    ) -> fmt::Result {
        writeln!(f, "  <PropertyGroup Label=\"Configuration\">")?;
        writeln!(f, "    <ConfigurationType>{config_type}</ConfigurationType>")?;
        writeln!(f, "    <PlatformToolset>v143</PlatformToolset>")?;
        writeln!(f, "  </PropertyGroup>")?;
        writeln!(f, "  <Import Project=\"$(VCTargetsPath)\\Microsoft.Cpp.props\" />")?;
        writeln!(f, "  <ItemDefinitionGroup>")?;
        writeln!(f, "    <ClCompile>")?;
        if !composed.settings.includes.is_empty() {
            let dirs = composed.settings.includes.iter().join(";");
            writeln!(
                f,
                "      <AdditionalIncludeDirectories>{};%(AdditionalIncludeDirectories)</AdditionalIncludeDirectories>",
                xml_escape(&dirs)
            )?;
        }
        if !composed.settings.definitions.is_empty() {
            let defines = composed.settings.definitions.iter().join(";");
            writeln!(
                f,
                "      <PreprocessorDefinitions>{};%(PreprocessorDefinitions)</PreprocessorDefinitions>",
                xml_escape(&defines)
            )?;
        }
        writeln!(f, "      <Optimization>{optimization}</Optimization>")?;
        if composed.debug().enabled() {
            writeln!(
                f,
                "      <DebugInformationFormat>ProgramDatabase</DebugInformationFormat>"
            )?;
        }
        let options = filter_flags(&composed.settings.cflags, ToolchainId::Msc);
        if !options.is_empty() {
            writeln!(
                f,
                "      <AdditionalOptions>{} %(AdditionalOptions)</AdditionalOptions>",
                xml_escape(&options.join(" "))
            )?;
        }
        writeln!(f, "    </ClCompile>")?;
        let link_element = if config_type == "StaticLibrary" { "Lib" } else { "Link" };
        writeln!(f, "    <{link_element}>")?;
        if !link_inputs.is_empty() {
            writeln!(
                f,
                "      <AdditionalDependencies>{};%(AdditionalDependencies)</AdditionalDependencies>",
                xml_escape(&link_inputs.join(";"))
            )?;
        }
        if !composed.settings.searches.is_empty() {
            let dirs = composed.settings.searches.iter().join(";");
            writeln!(
                f,
                "      <AdditionalLibraryDirectories>{};%(AdditionalLibraryDirectories)</AdditionalLibraryDirectories>",
                xml_escape(&dirs)
            )?;
        }
        writeln!(f, "    </{link_element}>")?;
        writeln!(f, "  </ItemDefinitionGroup>")?;
        if !sources.is_empty() {
            writeln!(f, "  <ItemGroup>")?;
            for source in sources {
                writeln!(f, "    <ClCompile Include=\"{}\" />", xml_escape(source.as_str()))?;
            }
            writeln!(f, "  </ItemGroup>")?;
        }
        Ok(())
    }

    fn write_utility(&self, f: &mut Formatter<'_>, build_event: &str) -> fmt::Result {
        writeln!(f, "  <PropertyGroup Label=\"Configuration\">")?;
        writeln!(f, "    <ConfigurationType>Utility</ConfigurationType>")?;
        writeln!(f, "    <PlatformToolset>v143</PlatformToolset>")?;
        writeln!(f, "  </PropertyGroup>")?;
        writeln!(f, "  <Import Project=\"$(VCTargetsPath)\\Microsoft.Cpp.props\" />")?;
        writeln!(f, "  <ItemDefinitionGroup>")?;
        writeln!(f, "    <PreBuildEvent>")?;
        writeln!(f, "      <Command>{}</Command>", xml_escape(build_event))?;
        writeln!(f, "    </PreBuildEvent>")?;
        writeln!(f, "  </ItemDefinitionGroup>")?;
        Ok(())
    }

    fn write_references(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let referenced: Vec<&(String, &'static str)> = self
            .record
            .references
            .iter()
            .filter_map(|dep| self.index.get(dep))
            .collect();
        if referenced.is_empty() {
            return Ok(());
        }
        writeln!(f, "  <ItemGroup>")?;
        for (name, guid) in referenced {
            writeln!(
                f,
                "    <ProjectReference Include=\"{}.vcxproj\">",
                xml_escape(name)
            )?;
            writeln!(f, "      <Project>{{{guid}}}</Project>")?;
            writeln!(f, "    </ProjectReference>")?;
        }
        writeln!(f, "  </ItemGroup>")
    }
}

impl Display for DisplayProject<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let platform = self.platform.as_str();
        let guid = self
            .index
            .get(&self.record.id)
            .map(|(_, guid)| *guid)
            .unwrap_or_default();
        writeln!(f, "<?xml version=\"1.0\" encoding=\"utf-8\"?>")?;
        writeln!(
            f,
            "<Project DefaultTargets=\"Build\" xmlns=\"http://schemas.microsoft.com/developer/msbuild/2003\">"
        )?;
        writeln!(f, "  <ItemGroup Label=\"ProjectConfigurations\">")?;
        writeln!(f, "    <ProjectConfiguration Include=\"Release|{platform}\">")?;
        writeln!(f, "      <Configuration>Release</Configuration>")?;
        writeln!(f, "      <Platform>{platform}</Platform>")?;
        writeln!(f, "    </ProjectConfiguration>")?;
        writeln!(f, "  </ItemGroup>")?;
        writeln!(f, "  <PropertyGroup Label=\"Globals\">")?;
        writeln!(f, "    <ProjectGuid>{{{guid}}}</ProjectGuid>")?;
        writeln!(f, "    <RootNamespace>{}</RootNamespace>", xml_escape(&self.record.name))?;
        writeln!(f, "  </PropertyGroup>")?;
        writeln!(
            f,
            "  <Import Project=\"$(VCTargetsPath)\\Microsoft.Cpp.Default.props\" />"
        )?;
        match &self.record.shape {
            ProjectShape::Compiled {
                config_type,
                composed,
                optimization,
                sources,
                link_inputs,
            } => self.write_compiled(f, config_type, composed, optimization, sources, link_inputs)?,
            ProjectShape::Utility { build_event } => self.write_utility(f, build_event)?,
        }
        self.write_references(f)?;
        writeln!(f, "  <Import Project=\"$(VCTargetsPath)\\Microsoft.Cpp.targets\" />")?;
        writeln!(f, "</Project>")
    }
}

/// Wrapper struct to display the `.sln`.
struct DisplaySolution<'a> {
    records: &'a [ProjectRecord],
    index: &'a IndexMap<NodeId, (String, &'static str)>,
    platform: VsPlatform,
}

impl DisplaySolution<'_> {
    fn guid_of(&self, id: NodeId) -> &'static str {
        self.index.get(&id).map(|(_, guid)| *guid).unwrap_or_default()
    }
}

impl Display for DisplaySolution<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let platform = self.platform.as_str();
        writeln!(f, "Microsoft Visual Studio Solution File, Format Version 12.00")?;
        writeln!(f, "# Visual Studio Version 17")?;
        for record in self.records {
            let guid = self.guid_of(record.id);
            writeln!(
                f,
                "Project(\"{{{CPP_PROJECT_TYPE}}}\") = \"{name}\", \"{name}.vcxproj\", \"{{{guid}}}\"",
                name = record.name
            )?;
            let referenced: Vec<&'static str> = record
                .references
                .iter()
                .filter_map(|dep| self.index.get(dep).map(|(_, dep_guid)| *dep_guid))
                .collect();
            if !referenced.is_empty() {
                writeln!(f, "\tProjectSection(ProjectDependencies) = postProject")?;
                for dep_guid in referenced {
                    writeln!(f, "\t\t{{{dep_guid}}} = {{{dep_guid}}}")?;
                }
                writeln!(f, "\tEndProjectSection")?;
            }
            writeln!(f, "EndProject")?;
        }
        writeln!(f, "Global")?;
        writeln!(f, "\tGlobalSection(SolutionConfigurationPlatforms) = preSolution")?;
        writeln!(f, "\t\tRelease|{platform} = Release|{platform}")?;
        writeln!(f, "\tEndGlobalSection")?;
        writeln!(f, "\tGlobalSection(ProjectConfigurationPlatforms) = postSolution")?;
        for record in self.records {
            let guid = self.guid_of(record.id);
            writeln!(f, "\t\t{{{guid}}}.Release|{platform}.ActiveCfg = Release|{platform}")?;
            writeln!(f, "\t\t{{{guid}}}.Release|{platform}.Build.0 = Release|{platform}")?;
        }
        writeln!(f, "\tEndGlobalSection")?;
        writeln!(f, "EndGlobal")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Settings;
    use crate::platform::{Os, Platform};
    use crate::toolchain::{CompilerKind, DebugInfo, LinkerKind, select};

    fn cl_link() -> Toolchain {
        select(CompilerKind::Cl, LinkerKind::Link).expect("pairing")
    }

    fn sample_graph() -> Graph {
        let mut graph = Graph::default();
        let a = graph.add_object_file("a.c", Settings::default());
        let b = graph.add_object_file("b.c", Settings::default());
        let core = graph.add_object_library("core", Settings::default());
        let settings = Settings {
            includes: vec!["include".into()],
            definitions: vec!["NDEBUG".into()],
            optimization: Some(Optimization::O2),
            debug: Some(DebugInfo::new(2).expect("level")),
            ..Settings::default()
        };
        let app = graph.add_application("demo", false, settings);
        let ext = graph.add_dynamic_extension(ExtensionLink::Named("winmm".into()));
        graph.add_dep(core, a);
        graph.add_dep(core, b);
        graph.add_dep(app, core);
        graph.add_dep(app, ext);
        graph
            .prepare(Platform::for_os(Os::Windows))
            .expect("acyclic");
        graph
    }

    #[test]
    fn solution_lists_every_project_with_dependencies() {
        let graph = sample_graph();
        let output = generate(&graph, &cl_link(), VsPlatform::X64, "demo").expect("generate");
        assert_eq!(output.projects.len(), 2);
        let sln = &output.solution.content;
        assert!(sln.contains("\"core\", \"core.vcxproj\""), "sln:\n{sln}");
        assert!(sln.contains("\"demo\", \"demo.vcxproj\""), "sln:\n{sln}");
        assert!(sln.contains("ProjectSection(ProjectDependencies)"), "sln:\n{sln}");
        assert!(sln.contains("Release|x64 = Release|x64"), "sln:\n{sln}");
    }

    #[test]
    fn application_project_carries_settings_and_extension_libs() {
        let graph = sample_graph();
        let output = generate(&graph, &cl_link(), VsPlatform::X64, "demo").expect("generate");
        let demo = output
            .projects
            .iter()
            .find(|project| project.path.as_str() == "demo.vcxproj")
            .expect("demo project");
        let content = &demo.content;
        assert!(content.contains("<ConfigurationType>Application</ConfigurationType>"));
        assert!(content.contains("<Optimization>MaxSpeed</Optimization>"));
        assert!(content.contains("NDEBUG;%(PreprocessorDefinitions)"));
        assert!(content.contains("winmm.lib;%(AdditionalDependencies)"));
        assert!(content.contains("<ProjectReference Include=\"core.vcxproj\">"));
    }

    #[test]
    fn object_library_becomes_a_static_library_project_with_sources() {
        let graph = sample_graph();
        let output = generate(&graph, &cl_link(), VsPlatform::X64, "demo").expect("generate");
        let core = output
            .projects
            .iter()
            .find(|project| project.path.as_str() == "core.vcxproj")
            .expect("core project");
        assert!(core.content.contains("<ConfigurationType>StaticLibrary</ConfigurationType>"));
        assert!(core.content.contains("<ClCompile Include=\"a.c\" />"));
        assert!(core.content.contains("<ClCompile Include=\"b.c\" />"));
    }

    #[test]
    fn entries_become_utility_projects_with_reified_events() {
        let mut graph = Graph::default();
        graph.add_variable("OUT", Some("dist".into()), None);
        graph.add_entry("stage", vec!["xcopy demo.exe $(OUT)".into()], None);
        graph
            .prepare(Platform::for_os(Os::Windows))
            .expect("acyclic");

        let output = generate(&graph, &cl_link(), VsPlatform::X86, "build").expect("generate");
        let stage = output
            .projects
            .iter()
            .find(|project| project.path.as_str() == "stage.vcxproj")
            .expect("stage project");
        assert!(stage.content.contains("<ConfigurationType>Utility</ConfigurationType>"));
        assert!(
            stage.content.contains("<Command>xcopy demo.exe dist</Command>"),
            "content:\n{}",
            stage.content
        );
        assert!(output.solution.content.contains("Release|Win32"));
    }

    #[test]
    fn guid_assignment_is_deterministic() {
        let graph = sample_graph();
        let first = generate(&graph, &cl_link(), VsPlatform::X64, "demo").expect("generate");
        let second = generate(&graph, &cl_link(), VsPlatform::X64, "demo").expect("generate");
        assert_eq!(first, second);
    }
}
