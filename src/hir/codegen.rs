//! Code generation seam.
//!
//! Producing real ABC bytecode is outside this crate. A [`CodeGenerator`] is
//! injected into each project; the default [`ListingGenerator`] emits a
//! deterministic textual listing of the unit's definitions so builds can be
//! compared byte for byte.

use std::sync::Arc;

use rayon::prelude::*;
use tokio_util::sync::CancellationToken;

use crate::error::{CompileError, Result};
use crate::project::Project;

use super::definitions::{Definition, DefinitionData, ResolvedType};
use super::lower::FileScopeResult;
use super::unit::CompilationUnit;

/// Everything a generator may look at.
pub struct CodegenInput<'a> {
    pub project: &'a Project,
    pub unit: &'a CompilationUnit,
    pub file_scope: &'a FileScopeResult,
    /// Whether the generator may use worker threads.
    pub parallel: bool,
    pub cancel: &'a CancellationToken,
}

pub trait CodeGenerator: Send + Sync {
    fn generate(&self, input: &CodegenInput<'_>) -> Result<Vec<u8>>;
}

/// Renders one line per definition.
#[derive(Clone, Copy, Debug, Default)]
pub struct ListingGenerator;

impl CodeGenerator for ListingGenerator {
    fn generate(&self, input: &CodegenInput<'_>) -> Result<Vec<u8>> {
        let defs = &input.file_scope.definitions;
        let lines: Vec<String> = if input.parallel {
            defs.par_iter()
                .map(|def| render(input, def))
                .collect::<Result<_>>()?
        } else {
            defs.iter().map(|def| render(input, def)).collect::<Result<_>>()?
        };

        let mut out = format!("unit {} {}\n", input.unit.id(), input.unit.name());
        for line in lines {
            out.push_str(&line);
            out.push('\n');
        }
        Ok(out.into_bytes())
    }
}

fn render(input: &CodegenInput<'_>, def: &Arc<Definition>) -> Result<String> {
    if input.cancel.is_cancelled() {
        return Err(CompileError::Interrupted);
    }
    let project = input.project;
    let mut line = format!("{} {}", def.kind().display(), def.qname());
    if def.is_static() {
        line.push_str(" static");
    }
    if let Some(namespace) = def.resolve_namespace(project)? {
        line.push_str(&format!(" ns={namespace}"));
    }
    match def.data() {
        DefinitionData::Class { .. } => {
            if let Some(base) = def.resolve_base_class(project)? {
                line.push_str(&format!(" extends {}", base.qname()));
            }
            let interfaces = def.resolve_interfaces(project)?;
            if !interfaces.is_empty() {
                let names: Vec<String> = interfaces.iter().map(|i| i.qname().to_string()).collect();
                line.push_str(&format!(" implements {}", names.join(",")));
            }
        }
        DefinitionData::Interface { .. } => {
            let interfaces = def.resolve_interfaces(project)?;
            if !interfaces.is_empty() {
                let names: Vec<String> = interfaces.iter().map(|i| i.qname().to_string()).collect();
                line.push_str(&format!(" extends {}", names.join(",")));
            }
        }
        DefinitionData::Function { .. } => {
            let params: Vec<String> = def
                .resolve_parameter_types(project)?
                .iter()
                .map(ResolvedType::display_name)
                .map(|name| name.to_string())
                .collect();
            let returns = def.resolve_return_type(project)?;
            line.push_str(&format!(" ({}):{}", params.join(","), returns.display_name()));
        }
        DefinitionData::Variable { is_const, .. } => {
            let keyword = if *is_const { "const" } else { "var" };
            let ty = def.resolve_type(project)?;
            line.push_str(&format!(" {keyword}:{}", ty.display_name()));
        }
        DefinitionData::Namespace { uri } => {
            line.push_str(&format!(" uri={uri}"));
        }
        DefinitionData::Package => {}
    }
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::QName;
    use crate::project::{ProjectConfig, Workspace};

    #[test]
    fn test_listing_renders_resolved_signatures() {
        let workspace = Workspace::new();
        let project = workspace
            .create_project(ProjectConfig::new().with_source_path("/src"))
            .unwrap();
        workspace
            .add_string_file("/src/Base.as", "package { public class Base {} }")
            .unwrap();
        workspace
            .add_string_file(
                "/src/Main.as",
                "package { public class Main extends Base { public var count:int; \
                 public static const LIMIT:Number = 1; public function make(a:Base):String { return null; } } }",
            )
            .unwrap();
        project.add_source_file("/src/Base.as").unwrap();
        let unit = project.add_source_file("/src/Main.as").unwrap();

        let main = project
            .resolve_qname_to_definition(&QName::top_level("Main"))
            .unwrap()
            .unwrap();
        let file_scope = project.file_scope_for(main.id()).unwrap();
        let cancel = CancellationToken::new();
        let input = CodegenInput {
            project: &project,
            unit: &unit,
            file_scope: &file_scope,
            parallel: false,
            cancel: &cancel,
        };
        let listing = String::from_utf8(ListingGenerator.generate(&input).unwrap()).unwrap();

        assert!(listing.starts_with(&format!("unit {} ", unit.id())));
        let class_line = listing.lines().find(|l| l.starts_with("class Main ")).unwrap();
        assert!(class_line.ends_with(" extends Base"), "{listing}");
        assert!(listing.lines().any(|l| l.ends_with(" var:int")), "{listing}");
        assert!(listing.lines().any(|l| l.contains(" static") && l.ends_with(" const:Number")), "{listing}");
        assert!(listing.lines().any(|l| l.ends_with(" (Base):String")), "{listing}");

        let parallel = CodegenInput { parallel: true, ..input };
        assert_eq!(ListingGenerator.generate(&parallel).unwrap(), listing.into_bytes());

        cancel.cancel();
        assert!(ListingGenerator.generate(&parallel).unwrap_err().is_interrupted());
    }
}
