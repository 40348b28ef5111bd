//! Node-level enumerations

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Category a project or component is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    Analysis,
    Communication,
    Data,
    Hypothesis,
    Instrumentation,
    #[serde(rename = "methods and measures")]
    MethodsAndMeasures,
    Procedure,
    Project,
    Software,
    Other,
    #[default]
    #[serde(rename = "")]
    Uncategorized,
}

impl NodeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::Communication => "communication",
            Self::Data => "data",
            Self::Hypothesis => "hypothesis",
            Self::Instrumentation => "instrumentation",
            Self::MethodsAndMeasures => "methods and measures",
            Self::Procedure => "procedure",
            Self::Project => "project",
            Self::Software => "software",
            Self::Other => "other",
            Self::Uncategorized => "",
        }
    }

    /// Human-readable label shown in listings.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Analysis => "Analysis",
            Self::Communication => "Communication",
            Self::Data => "Data",
            Self::Hypothesis => "Hypothesis",
            Self::Instrumentation => "Instrumentation",
            Self::MethodsAndMeasures => "Methods and Measures",
            Self::Procedure => "Procedure",
            Self::Project => "Project",
            Self::Software => "Software",
            Self::Other => "Other",
            Self::Uncategorized => "Uncategorized",
        }
    }
}

impl FromStr for NodeCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "analysis" => Ok(Self::Analysis),
            "communication" => Ok(Self::Communication),
            "data" => Ok(Self::Data),
            "hypothesis" => Ok(Self::Hypothesis),
            "instrumentation" => Ok(Self::Instrumentation),
            "methods and measures" => Ok(Self::MethodsAndMeasures),
            "procedure" => Ok(Self::Procedure),
            "project" => Ok(Self::Project),
            "software" => Ok(Self::Software),
            "other" => Ok(Self::Other),
            "" => Ok(Self::Uncategorized),
            _ => Err(format!("Unknown node category: {}", s)),
        }
    }
}

/// Requested visibility of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    Public,
    Private,
}

impl fmt::Display for Privacy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => f.write_str("public"),
            Self::Private => f.write_str("private"),
        }
    }
}
