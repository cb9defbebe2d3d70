use casepreview::overlay::{
    AnnotationMarker, SCROLL_OFFSET_PX, ScrollBehavior, project_markers, scroll_to_highlighted,
};
use casepreview::render::Viewport;
use casepreview::test_utils::test_helpers::RecordingScroll;

fn markers() -> Vec<AnnotationMarker> {
    vec![
        AnnotationMarker::new("p1", 1, 10.0, 10.0).with_category("Medical"),
        AnnotationMarker::new("p2a", 2, 25.0, 50.0).with_category("Legal"),
        AnnotationMarker::new("p2b", 2, 75.0, 90.0),
        AnnotationMarker::new("p3", 3, 50.0, 50.0).with_category("Urgent"),
    ]
}

#[test]
fn only_current_page_markers_are_projected() {
    let viewport = Viewport::for_page(2, (612.0, 792.0), 1.0);
    let positioned = project_markers(&markers(), &viewport);

    let ids: Vec<_> = positioned.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["p2a", "p2b"]);
    assert!((positioned[0].left - 153.0).abs() < 1e-3);
    assert!((positioned[0].top - 396.0).abs() < 1e-3);
}

#[test]
fn positions_track_scale() {
    let at_one = project_markers(&markers(), &Viewport::for_page(2, (612.0, 792.0), 1.0));
    let at_hifi = project_markers(&markers(), &Viewport::for_page(2, (612.0, 792.0), 1.5));
    for (a, b) in at_one.iter().zip(&at_hifi) {
        assert!((a.left * 1.5 - b.left).abs() < 1e-3);
        assert!((a.top * 1.5 - b.top).abs() < 1e-3);
    }
}

#[test]
fn highlight_on_other_page_does_not_scroll() {
    let viewport = Viewport::for_page(2, (612.0, 792.0), 1.0);
    let mut scroll = RecordingScroll::default();

    let scrolled = scroll_to_highlighted("p3", &markers(), &viewport, &mut scroll, SCROLL_OFFSET_PX);

    assert!(!scrolled);
    assert!(scroll.calls.is_empty());
}

#[test]
fn highlight_on_current_page_scrolls_smoothly() {
    let viewport = Viewport::for_page(2, (612.0, 792.0), 1.0);
    let mut scroll = RecordingScroll::default();

    assert!(scroll_to_highlighted(
        "p2b",
        &markers(),
        &viewport,
        &mut scroll,
        SCROLL_OFFSET_PX
    ));
    let (top, behavior) = scroll.calls[0];
    assert!((top - (792.0 * 0.9 - 200.0)).abs() < 1e-3);
    assert_eq!(behavior, ScrollBehavior::Smooth);
}
