//! Qualified names (`Point::new`), used for both variables and type names.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier {
    parts: Vec<String>,
}

impl Identifier {
    pub fn new(part: impl Into<String>) -> Self {
        Self {
            parts: vec![part.into()],
        }
    }

    pub fn push(&self, part: impl Into<String>) -> Self {
        let mut parts = self.parts.clone();
        parts.push(part.into());
        Self { parts }
    }

    pub fn last(&self) -> &str {
        self.parts.last().expect("identifier is never empty")
    }

    /// Everything but the last part, or `None` for a simple (unqualified) name.
    pub fn prefix(&self) -> Option<Identifier> {
        if self.parts.len() <= 1 {
            return None;
        }
        Some(Identifier {
            parts: self.parts[..self.parts.len() - 1].to_vec(),
        })
    }

    pub fn is_simple(&self) -> bool {
        self.parts.len() == 1
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.parts.join("::"))
    }
}

impl std::ops::Add<&str> for Identifier {
    type Output = Identifier;

    fn add(self, rhs: &str) -> Identifier {
        self.push(rhs)
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Identifier::new(value)
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Identifier::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_with_double_colon() {
        let id = Identifier::new("Point").push("x");
        assert_eq!(id.to_string(), "Point::x");
    }

    #[test]
    fn prefix_of_simple_name_is_none() {
        let id = Identifier::new("x");
        assert_eq!(id.prefix(), None);
    }

    #[test]
    fn prefix_of_qualified_name() {
        let id = Identifier::new("Point").push("x");
        assert_eq!(id.prefix(), Some(Identifier::new("Point")));
        assert_eq!(id.last(), "x");
    }
}
