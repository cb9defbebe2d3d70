//! Projects annotation markers onto a rendered page

use crate::render::{Surface, Viewport};

use super::marker::{AnnotationMarker, CategoryColor};

/// Distance kept above a highlighted marker when scrolling to it
pub const SCROLL_OFFSET_PX: f32 = 200.0;

const MARKER_RADIUS: f32 = 8.0;
const HIGHLIGHT_GROWTH: f32 = 1.5;
const BORDER_WIDTH: f32 = 2.0;
const RING_WIDTH: f32 = 4.0;
const BORDER_RGB: [u8; 3] = [255, 255, 255];
const RING_RGB: [u8; 3] = [99, 102, 241];

/// A marker placed in viewport pixels
#[derive(Debug, Clone, PartialEq)]
pub struct PositionedMarker {
    pub id: String,
    pub left: f32,
    pub top: f32,
    pub color: CategoryColor,
    pub highlighted: bool,
}

/// Place the markers that belong to `viewport.page`. Others are dropped.
#[must_use]
pub fn project_markers(markers: &[AnnotationMarker], viewport: &Viewport) -> Vec<PositionedMarker> {
    markers
        .iter()
        .filter(|m| m.page == viewport.page)
        .map(|m| PositionedMarker {
            id: m.id.clone(),
            left: m.x / 100.0 * viewport.width,
            top: m.y / 100.0 * viewport.height,
            color: m.color(),
            highlighted: m.highlighted,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollBehavior {
    Smooth,
    Instant,
}

/// Whatever scrolls the rendered page
pub trait ScrollContainer {
    fn scroll_to(&mut self, top: f32, behavior: ScrollBehavior);
}

/// Smooth-scroll `container` so the marker `marker_id` sits `offset` pixels
/// below the top edge.
///
/// Does nothing unless the marker is on the rendered page. Returns whether a
/// scroll was issued.
pub fn scroll_to_highlighted(
    marker_id: &str,
    markers: &[AnnotationMarker],
    viewport: &Viewport,
    container: &mut dyn ScrollContainer,
    offset: f32,
) -> bool {
    let Some(marker) = markers
        .iter()
        .find(|m| m.id == marker_id && m.page == viewport.page)
    else {
        return false;
    };

    let absolute_y = marker.y / 100.0 * viewport.height;
    container.scroll_to((absolute_y - offset).max(0.0), ScrollBehavior::Smooth);
    true
}

/// Draw markers as bordered dots. The highlighted one is larger and ringed.
pub fn paint_markers(surface: &mut Surface, positioned: &[PositionedMarker]) {
    // Highlighted last so it sits on top
    let ordered = positioned
        .iter()
        .filter(|m| !m.highlighted)
        .chain(positioned.iter().filter(|m| m.highlighted));

    for marker in ordered {
        let mut radius = MARKER_RADIUS;
        if marker.highlighted {
            radius *= HIGHLIGHT_GROWTH;
            fill_disc(surface, marker.left, marker.top, radius + RING_WIDTH, RING_RGB);
        }
        fill_disc(surface, marker.left, marker.top, radius, BORDER_RGB);
        fill_disc(
            surface,
            marker.left,
            marker.top,
            radius - BORDER_WIDTH,
            marker.color.rgb(),
        );
    }
}

fn fill_disc(surface: &mut Surface, cx: f32, cy: f32, radius: f32, rgb: [u8; 3]) {
    if radius <= 0.0 || surface.width() == 0 || surface.height() == 0 {
        return;
    }
    let max_x = surface.width() - 1;
    let max_y = surface.height() - 1;
    let x0 = (cx - radius).floor().max(0.0) as u32;
    let y0 = (cy - radius).floor().max(0.0) as u32;
    let x1 = ((cx + radius).ceil().max(0.0) as u32).min(max_x);
    let y1 = ((cy + radius).ceil().max(0.0) as u32).min(max_y);
    let r2 = radius * radius;

    for y in y0..=y1 {
        for x in x0..=x1 {
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            if dx * dx + dy * dy <= r2 {
                surface.set_pixel(x, y, rgb);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_helpers::RecordingScroll;

    fn viewport(page: usize) -> Viewport {
        Viewport::for_page(page, (200.0, 1000.0), 1.5)
    }

    #[test]
    fn projects_percentages_into_pixels() {
        let markers = vec![AnnotationMarker::new("a", 2, 50.0, 25.0).with_category("Medical")];
        let positioned = project_markers(&markers, &viewport(2));
        assert_eq!(
            positioned,
            vec![PositionedMarker {
                id: "a".to_string(),
                left: 150.0,
                top: 375.0,
                color: CategoryColor::Medical,
                highlighted: false,
            }]
        );
    }

    #[test]
    fn scroll_target_subtracts_offset() {
        let markers = vec![AnnotationMarker::new("a", 1, 10.0, 60.0)];
        let mut scroll = RecordingScroll::default();
        assert!(scroll_to_highlighted(
            "a",
            &markers,
            &viewport(1),
            &mut scroll,
            SCROLL_OFFSET_PX
        ));
        assert_eq!(scroll.calls, vec![(700.0, ScrollBehavior::Smooth)]);
    }

    #[test]
    fn scroll_target_clamps_at_top() {
        let markers = vec![AnnotationMarker::new("a", 1, 10.0, 5.0)];
        let mut scroll = RecordingScroll::default();
        scroll_to_highlighted("a", &markers, &viewport(1), &mut scroll, SCROLL_OFFSET_PX);
        assert_eq!(scroll.calls, vec![(0.0, ScrollBehavior::Smooth)]);
    }

    #[test]
    fn unknown_marker_does_not_scroll() {
        let markers = vec![AnnotationMarker::new("a", 1, 10.0, 60.0)];
        let mut scroll = RecordingScroll::default();
        assert!(!scroll_to_highlighted(
            "zzz",
            &markers,
            &viewport(1),
            &mut scroll,
            SCROLL_OFFSET_PX
        ));
        assert!(scroll.calls.is_empty());
    }

    #[test]
    fn paints_category_colour_at_marker_centre() {
        let mut surface = Surface::new();
        surface.resize(100, 100).unwrap();
        let markers = vec![
            AnnotationMarker::new("a", 1, 20.0, 20.0).with_category("Legal"),
            AnnotationMarker {
                highlighted: true,
                ..AnnotationMarker::new("b", 1, 70.0, 70.0).with_category("Urgent")
            },
        ];
        let vp = Viewport::for_page(1, (100.0, 100.0), 1.0);
        paint_markers(&mut surface, &project_markers(&markers, &vp));

        assert_eq!(surface.pixel(20, 20), Some(CategoryColor::Legal.rgb()));
        assert_eq!(surface.pixel(70, 70), Some(CategoryColor::Urgent.rgb()));
        // ring sits just outside the enlarged white border
        assert_eq!(surface.pixel(70, 55), Some(RING_RGB));
        assert_eq!(surface.pixel(0, 0), Some([0xFF; 3]));
    }

    #[test]
    fn painting_near_edges_is_clipped() {
        let mut surface = Surface::new();
        surface.resize(10, 10).unwrap();
        let markers = vec![AnnotationMarker::new("a", 1, 100.0, 0.0)];
        let vp = Viewport::for_page(1, (10.0, 10.0), 1.0);
        paint_markers(&mut surface, &project_markers(&markers, &vp));
        assert_eq!(surface.pixel(9, 0), Some(CategoryColor::Other.rgb()));
    }
}
