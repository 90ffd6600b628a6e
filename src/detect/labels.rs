//! Class label map.
//!
//! Detector label files are one label per line, in class-id order. Some
//! label maps carry a leading `???` background sentinel; it is skipped so
//! class id 0 lands on the first real label.

use std::path::Path;

use anyhow::{Context, Result};

const FALLBACK_LABEL: &str = "object";

#[derive(Clone, Debug, Default)]
pub struct LabelMap {
    labels: Vec<String>,
}

impl LabelMap {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read label file {}", path.display()))?;
        Ok(Self::parse(&raw))
    }

    pub fn parse(raw: &str) -> Self {
        let mut labels: Vec<String> = raw
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();
        if labels.first().map(String::as_str) == Some("???") {
            labels.remove(0);
        }
        Self { labels }
    }

    /// Label for a class id; unknown ids map to a generic fallback so a
    /// detector with a larger class space than the label file cannot
    /// break event emission.
    pub fn label(&self, class_id: usize) -> &str {
        self.labels
            .get(class_id)
            .map(String::as_str)
            .unwrap_or(FALLBACK_LABEL)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_skips_background_sentinel() {
        let map = LabelMap::parse("???\nperson\nbicycle\ncar\n");
        assert_eq!(map.len(), 3);
        assert_eq!(map.label(0), "person");
        assert_eq!(map.label(2), "car");
    }

    #[test]
    fn parse_without_sentinel() {
        let map = LabelMap::parse("person\ncar\n");
        assert_eq!(map.label(1), "car");
    }

    #[test]
    fn unknown_class_id_falls_back() {
        let map = LabelMap::parse("person\n");
        assert_eq!(map.label(7), FALLBACK_LABEL);
        assert_eq!(LabelMap::default().label(0), FALLBACK_LABEL);
    }
}
