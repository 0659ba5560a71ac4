//! Tag values attached to entity sets, following the DAGMC conventions.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Capacity of the fixed-size name and category tags, terminator included.
pub const NAME_TAG_SIZE: usize = 32;
pub const CATEGORY_TAG_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Group,
    Volume,
    Surface,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Group => "Group",
            Self::Volume => "Volume",
            Self::Surface => "Surface",
        }
    }

    /// Geometric dimension tag value.
    pub fn dimension(self) -> u32 {
        match self {
            Self::Group => 4,
            Self::Volume => 3,
            Self::Surface => 2,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relative orientation of a surface with respect to a parent volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sense {
    Forward,
    Reverse,
}

impl Sense {
    pub fn value(self) -> i32 {
        match self {
            Self::Forward => 1,
            Self::Reverse => -1,
        }
    }

    pub fn reversed(self) -> Self {
        match self {
            Self::Forward => Self::Reverse,
            Self::Reverse => Self::Forward,
        }
    }
}

/// Tags carried by every entity set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetTags {
    pub category: Category,
    pub global_id: u32,
    pub name: Option<String>,
}

impl SetTags {
    pub fn new(category: Category, global_id: u32) -> Self {
        Self {
            category,
            global_id,
            name: None,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(truncate_tag(name, NAME_TAG_SIZE));
        self
    }

    pub fn dimension(&self) -> u32 {
        self.category.dimension()
    }
}

/// Cuts `value` so that it fits a fixed-size tag of `size` bytes,
/// leaving room for the terminator.
pub fn truncate_tag(value: &str, size: usize) -> String {
    let max = size.saturating_sub(1);
    if value.len() <= max {
        return value.to_string();
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    value[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimensions() {
        assert_eq!(Category::Group.dimension(), 4);
        assert_eq!(Category::Volume.dimension(), 3);
        assert_eq!(Category::Surface.dimension(), 2);
    }

    #[test]
    fn test_sense() {
        assert_eq!(Sense::Forward.value(), 1);
        assert_eq!(Sense::Reverse.value(), -1);
        assert_eq!(Sense::Forward.reversed(), Sense::Reverse);
    }

    #[test]
    fn test_truncate_tag() {
        let long = "mat:".to_string() + &"x".repeat(40);
        let tags = SetTags::new(Category::Group, 1).with_name(&long);
        assert_eq!(tags.name.as_deref().map(str::len), Some(31));
        assert_eq!(truncate_tag("short", NAME_TAG_SIZE), "short");
        // Never split a multi-byte character
        let wide = "é".repeat(20);
        let cut = truncate_tag(&wide, NAME_TAG_SIZE);
        assert_eq!(cut.len(), 30);
    }
}
