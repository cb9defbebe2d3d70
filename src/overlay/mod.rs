//! Annotation overlay for rendered pages

mod mapper;
mod marker;
mod source;

pub use mapper::{
    PositionedMarker, SCROLL_OFFSET_PX, ScrollBehavior, ScrollContainer, paint_markers,
    project_markers, scroll_to_highlighted,
};
pub use marker::{AnnotationMarker, CategoryColor, apply_highlight};
pub use source::{AnnotationSource, JsonAnnotationFile};
