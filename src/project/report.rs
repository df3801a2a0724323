//! Link report: what a build linked, in order, and why.

use crate::error::Result;
use crate::hir::{DependencyType, ProblemKind, Severity, UnitKind};

use super::project::Project;
use super::target::BuildOutput;

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "interchange", derive(serde::Serialize, serde::Deserialize))]
pub struct LinkReport {
    pub units: Vec<LinkedUnit>,
    pub problems: Vec<ReportedProblem>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "interchange", derive(serde::Serialize, serde::Deserialize))]
pub struct LinkedUnit {
    pub id: u32,
    pub name: String,
    pub kind: UnitKind,
    /// Qualified names the unit defines.
    pub definitions: Vec<String>,
    pub dependencies: Vec<LinkedDependency>,
    pub bytes: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "interchange", derive(serde::Serialize, serde::Deserialize))]
pub struct LinkedDependency {
    pub unit: u32,
    /// Names through which the dependency was recorded, with their edge types.
    pub names: Vec<(String, Vec<DependencyType>)>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "interchange", derive(serde::Serialize, serde::Deserialize))]
pub struct ReportedProblem {
    pub kind: ProblemKind,
    pub severity: Severity,
    pub code: String,
    pub message: String,
    pub unit: Option<u32>,
}

impl LinkReport {
    pub fn new(project: &Project, output: &BuildOutput) -> Result<Self> {
        let graph = project.graph();
        let mut units = Vec::with_capacity(output.units.len());
        for (unit, (_, bytes)) in output.units.iter().zip(&output.bytecode) {
            let dependencies = graph
                .direct_dependencies(unit.id())
                .into_iter()
                .map(|target| LinkedDependency {
                    unit: target.index(),
                    names: graph
                        .named_dependencies(unit.id(), target)
                        .into_iter()
                        .map(|(name, types)| (name.to_string(), types.iter().collect()))
                        .collect(),
                })
                .collect();
            units.push(LinkedUnit {
                id: unit.id().index(),
                name: unit.name().to_string(),
                kind: unit.kind(),
                definitions: unit
                    .qualified_names()?
                    .iter()
                    .map(|qname| qname.to_string())
                    .collect(),
                dependencies,
                bytes: bytes.len(),
            });
        }

        let problems = output
            .problems
            .iter()
            .map(|problem| ReportedProblem {
                kind: problem.kind,
                severity: problem.severity,
                code: problem.code.to_string(),
                message: problem.message.to_string(),
                unit: problem.unit.map(|unit| unit.index()),
            })
            .collect();

        Ok(Self { units, problems })
    }

    #[cfg(feature = "interchange")]
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    #[cfg(feature = "interchange")]
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
