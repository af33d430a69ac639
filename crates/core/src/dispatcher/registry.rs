//! Registry of transforms the executable accepts.

use crate::config::TransformEntry;

/// Static, read-only set of known transforms.
#[derive(Debug, Clone)]
pub struct TransformRegistry {
    entries: Vec<TransformEntry>,
}

impl TransformRegistry {
    pub fn new(entries: Vec<TransformEntry>) -> Self {
        Self { entries }
    }

    /// Looks up a transform by exact name.
    pub fn resolve(&self, name: &str) -> Option<&TransformEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    pub fn entries(&self) -> &[TransformEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::new(crate::config::default_transforms())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry() {
        let registry = TransformRegistry::default();
        assert_eq!(registry.len(), 5);
        assert!(registry.contains("opencv sobel"));
        assert!(registry.contains("roberts cross"));
        assert!(!registry.contains("Prewitt"));
        assert!(!registry.contains("; rm -rf /"));
    }

    #[test]
    fn test_resolve_returns_argument() {
        let registry = TransformRegistry::new(vec![TransformEntry {
            name: "roberts cross".to_string(),
            argument: Some("roberts".to_string()),
        }]);
        assert_eq!(registry.resolve("roberts cross").unwrap().argument(), "roberts");
        assert!(registry.resolve("roberts").is_none());
    }
}
