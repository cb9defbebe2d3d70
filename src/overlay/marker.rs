//! Annotation markers as the overlay sees them

use serde::{Deserialize, Serialize};

/// A point annotation on one page.
///
/// `x` and `y` are percentages of the page width and height, so the marker
/// lands on the same spot at any scale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationMarker {
    pub id: String,
    /// 1-based page number
    pub page: usize,
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub highlighted: bool,
}

impl AnnotationMarker {
    pub fn new(id: impl Into<String>, page: usize, x: f32, y: f32) -> Self {
        Self {
            id: id.into(),
            page,
            x,
            y,
            category: String::new(),
            text: None,
            highlighted: false,
        }
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    #[must_use]
    pub fn color(&self) -> CategoryColor {
        CategoryColor::from_category(&self.category)
    }
}

/// Mark exactly the marker with `highlight_id` as highlighted
pub fn apply_highlight(markers: &mut [AnnotationMarker], highlight_id: Option<&str>) {
    for marker in markers {
        marker.highlighted = highlight_id == Some(marker.id.as_str());
    }
}

/// Marker colour by annotation category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryColor {
    Medical,
    Legal,
    Review,
    Urgent,
    Other,
}

impl CategoryColor {
    #[must_use]
    pub fn from_category(category: &str) -> Self {
        match category {
            "Medical" => Self::Medical,
            "Legal" => Self::Legal,
            "Review" => Self::Review,
            "Urgent" => Self::Urgent,
            _ => Self::Other,
        }
    }

    #[must_use]
    pub fn rgb(self) -> [u8; 3] {
        match self {
            Self::Medical => [239, 68, 68],
            Self::Legal => [59, 130, 246],
            Self::Review => [245, 158, 11],
            Self::Urgent => [244, 63, 94],
            Self::Other => [100, 116, 139],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_category_is_neutral() {
        assert_eq!(CategoryColor::from_category("Billing"), CategoryColor::Other);
        assert_eq!(CategoryColor::from_category("medical"), CategoryColor::Other);
        assert_eq!(CategoryColor::from_category("Legal").rgb(), [59, 130, 246]);
    }

    #[test]
    fn highlight_is_exclusive() {
        let mut markers = vec![
            AnnotationMarker::new("a", 1, 10.0, 10.0),
            AnnotationMarker::new("b", 1, 20.0, 20.0),
        ];
        markers[0].highlighted = true;

        apply_highlight(&mut markers, Some("b"));
        assert!(!markers[0].highlighted);
        assert!(markers[1].highlighted);

        apply_highlight(&mut markers, None);
        assert!(markers.iter().all(|m| !m.highlighted));
    }

    #[test]
    fn deserializes_camel_case_with_defaults() {
        let marker: AnnotationMarker =
            serde_json::from_str(r#"{"id":"n1","page":2,"x":12.5,"y":40}"#).unwrap();
        assert_eq!(marker, AnnotationMarker::new("n1", 2, 12.5, 40.0));
    }
}
