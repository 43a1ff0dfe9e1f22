// SPDX-License-Identifier: MPL-2.0
//! Minimal annotation model.
//!
//! The per-type renderers and serializers live behind a registry the
//! engine dispatches into; the engine itself only needs identity, class
//! and the main annotation type of each annotation, plus a selection
//! slot per layer.

use serde::{Deserialize, Serialize};

/// Main annotation type of a class. Closed set: the engine routes tool
/// affinity on these, it does not interpret their geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationType {
    BoundingBox,
    Polygon,
    Polyline,
    Ellipse,
    Keypoint,
    Skeleton,
    Mask,
    Tag,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub id: String,
    pub class_name: String,
    pub main_type: AnnotationType,
}

/// The annotation layer owned by a view: annotations plus at most one
/// selection.
#[derive(Debug, Default)]
pub struct AnnotationLayer {
    annotations: Vec<Annotation>,
    selected_id: Option<String>,
}

impl AnnotationLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_annotations(&mut self, annotations: Vec<Annotation>) {
        self.selected_id = None;
        self.annotations = annotations;
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn select(&mut self, id: &str) {
        if self.annotations.iter().any(|a| a.id == id) {
            self.selected_id = Some(id.to_string());
        }
    }

    pub fn deselect_all(&mut self) {
        self.selected_id = None;
    }

    pub fn selected(&self) -> Option<&Annotation> {
        let id = self.selected_id.as_deref()?;
        self.annotations.iter().find(|a| a.id == id)
    }

    pub fn clear(&mut self) {
        self.annotations.clear();
        self.selected_id = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotation(id: &str, main_type: AnnotationType) -> Annotation {
        Annotation {
            id: id.to_string(),
            class_name: "car".to_string(),
            main_type,
        }
    }

    #[test]
    fn select_known_annotation() {
        let mut layer = AnnotationLayer::new();
        layer.set_annotations(vec![annotation("a", AnnotationType::Polygon)]);
        layer.select("a");
        assert_eq!(layer.selected().unwrap().id, "a");
    }

    #[test]
    fn select_unknown_id_is_ignored() {
        let mut layer = AnnotationLayer::new();
        layer.set_annotations(vec![annotation("a", AnnotationType::Polygon)]);
        layer.select("missing");
        assert!(layer.selected().is_none());
    }

    #[test]
    fn set_annotations_clears_selection() {
        let mut layer = AnnotationLayer::new();
        layer.set_annotations(vec![annotation("a", AnnotationType::BoundingBox)]);
        layer.select("a");
        layer.set_annotations(vec![annotation("b", AnnotationType::Ellipse)]);
        assert!(layer.selected().is_none());
    }
}
