//! The built-in catalog of study resources.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StudyError};

/// Kind of study resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    /// Lecture or revision notes.
    Notes,
    /// A written article.
    Article,
    /// A video tutorial.
    Video,
}

/// Subject a resource belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Subject {
    /// Mathematics.
    Math,
    /// History.
    History,
    /// Natural sciences.
    Science,
    /// Literature.
    Literature,
    /// Computer science.
    #[serde(rename = "Computer Science")]
    ComputerScience,
}

impl std::str::FromStr for ResourceType {
    type Err = StudyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "notes" => Ok(Self::Notes),
            "article" => Ok(Self::Article),
            "video" => Ok(Self::Video),
            _ => Err(StudyError::validation(
                "type",
                format!("Unknown resource type '{s}'."),
            )),
        }
    }
}

impl std::str::FromStr for Subject {
    type Err = StudyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace(['-', '_'], " ").as_str() {
            "math" => Ok(Self::Math),
            "history" => Ok(Self::History),
            "science" => Ok(Self::Science),
            "literature" => Ok(Self::Literature),
            "computer science" => Ok(Self::ComputerScience),
            _ => Err(StudyError::validation(
                "subject",
                format!("Unknown subject '{s}'."),
            )),
        }
    }
}

/// One entry of the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// Stable identifier.
    pub id: &'static str,
    /// Display title.
    pub title: &'static str,
    /// Short summary.
    pub description: &'static str,
    /// Kind of resource.
    #[serde(rename = "type")]
    pub kind: ResourceType,
    /// Subject.
    pub subject: Subject,
    /// Keywords for a cover image.
    pub image_hint: &'static str,
}

const RESOURCES: [Resource; 6] = [
    Resource {
        id: "1",
        title: "Comprehensive Calculus Notes",
        description: "Detailed notes covering limits, derivatives, and integration. Perfect for review.",
        kind: ResourceType::Notes,
        subject: Subject::Math,
        image_hint: "notebook study",
    },
    Resource {
        id: "2",
        title: "In-depth Article on Ancient Rome",
        description: "Explore the rise and fall of the Roman Empire, its culture, and key figures.",
        kind: ResourceType::Article,
        subject: Subject::History,
        image_hint: "library books",
    },
    Resource {
        id: "3",
        title: "Video Tutorial: Quantum Mechanics",
        description: "An engaging video that simplifies the core concepts of quantum mechanics.",
        kind: ResourceType::Video,
        subject: Subject::Science,
        image_hint: "laptop screen",
    },
    Resource {
        id: "4",
        title: "Guide to Organic Chemistry Reactions",
        description: "A handy guide with diagrams and explanations for major organic reactions.",
        kind: ResourceType::Notes,
        subject: Subject::Science,
        image_hint: "science lab",
    },
    Resource {
        id: "5",
        title: "Summary of Shakespeare's Macbeth",
        description: "Character analyses, plot summary, and theme exploration for the classic play.",
        kind: ResourceType::Article,
        subject: Subject::Literature,
        image_hint: "book open",
    },
    Resource {
        id: "6",
        title: "JavaScript Promises: A Complete Guide",
        description: "Master asynchronous JavaScript with this comprehensive tutorial on Promises.",
        kind: ResourceType::Video,
        subject: Subject::ComputerScience,
        image_hint: "code computer",
    },
];

/// Returns the whole catalog.
#[must_use]
pub const fn resources() -> &'static [Resource] {
    &RESOURCES
}

/// Returns the resources matching both filters; `None` matches everything.
#[must_use]
pub fn filter(subject: Option<Subject>, kind: Option<ResourceType>) -> Vec<&'static Resource> {
    RESOURCES
        .iter()
        .filter(|r| subject.map_or(true, |s| r.subject == s))
        .filter(|r| kind.map_or(true, |k| r.kind == k))
        .collect()
}
