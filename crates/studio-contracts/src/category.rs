use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const CATEGORY_COUNT: usize = 8;

/// One of the eight style-reference slots. Declaration order is the slot order
/// shared by keyword sets and reference images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Pose,
    ModelFace,
    HairStyle,
    Background,
    Vibe,
    Location,
    Lighting,
    Composition,
}

impl Category {
    pub const ALL: [Category; CATEGORY_COUNT] = [
        Category::Pose,
        Category::ModelFace,
        Category::HairStyle,
        Category::Background,
        Category::Vibe,
        Category::Location,
        Category::Lighting,
        Category::Composition,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Pose => "Pose",
            Category::ModelFace => "Model Face",
            Category::HairStyle => "Hair Style",
            Category::Background => "Background",
            Category::Vibe => "Vibe",
            Category::Location => "Location",
            Category::Lighting => "Lighting",
            Category::Composition => "Composition",
        }
    }

    /// Generic search query used when no tailored keyword is available.
    pub fn fallback_keyword(self) -> &'static str {
        match self {
            Category::Pose => "Model Pose",
            Category::ModelFace => "Model Face",
            Category::HairStyle => "Hairstyle",
            Category::Background => "Background",
            Category::Vibe => "Vibe",
            Category::Location => "Shoot Location",
            Category::Lighting => "Lighting",
            Category::Composition => "Composition",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    Male,
    Female,
    Unisex,
}

impl Audience {
    pub fn as_str(self) -> &'static str {
        match self {
            Audience::Male => "male",
            Audience::Female => "female",
            Audience::Unisex => "unisex",
        }
    }
}

impl FromStr for Audience {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "male" | "m" => Ok(Audience::Male),
            "female" | "f" => Ok(Audience::Female),
            "unisex" | "u" => Ok(Audience::Unisex),
            other => Err(format!(
                "unknown audience '{other}' (expected male, female or unisex)"
            )),
        }
    }
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Language used for persona prompts and replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Mm,
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Ok(Locale::En),
            "mm" | "my" | "burmese" => Ok(Locale::Mm),
            other => Err(format!("unknown locale '{other}' (expected en or mm)")),
        }
    }
}
