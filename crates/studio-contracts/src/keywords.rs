use std::ops::Index;

use serde::{Deserialize, Serialize};

use crate::category::{Category, CATEGORY_COUNT};

/// Eight search queries, one per [`Category`], index-aligned to `Category::ALL`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordSet {
    values: [String; CATEGORY_COUNT],
}

impl KeywordSet {
    pub fn fallback() -> Self {
        Self {
            values: Category::ALL.map(|category| category.fallback_keyword().to_string()),
        }
    }

    /// Builds a full set from an arbitrary list. Blank or missing slots take the
    /// category's fallback keyword; values past the eighth are ignored.
    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::fallback();
        for (idx, value) in values.into_iter().take(CATEGORY_COUNT).enumerate() {
            let value = value.into();
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                set.values[idx] = trimmed.to_string();
            }
        }
        set
    }

    pub fn get(&self, category: Category) -> &str {
        &self.values[category.index()]
    }

    pub fn values(&self) -> &[String; CATEGORY_COUNT] {
        &self.values
    }

    /// Replaces one slot. Blank replacements are ignored.
    pub fn with_replaced(&self, category: Category, value: impl Into<String>) -> Self {
        let mut next = self.clone();
        let value = value.into();
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            next.values[category.index()] = trimmed.to_string();
        }
        next
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, &str)> {
        Category::ALL
            .iter()
            .copied()
            .zip(self.values.iter().map(String::as_str))
    }

    pub fn is_fallback(&self) -> bool {
        *self == Self::fallback()
    }
}

impl Index<Category> for KeywordSet {
    type Output = str;

    fn index(&self, category: Category) -> &Self::Output {
        self.get(category)
    }
}
