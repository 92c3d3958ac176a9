//! Feature select: filtering, keyboard navigation, virtualization, outside clicks.

use caniuse_embed_core::catalog::{Catalog, CatalogEntry, CatalogError, CatalogPoll};
use caniuse_embed_core::events::{PointerEvent, Window};
use caniuse_embed_core::select::{CatalogStatus, FeatureSelect, Key, SelectConfig, SelectState};
use pretty_assertions::assert_eq;

fn two_features() -> Catalog {
    vec![
        CatalogEntry::new("CSS Grid", "css-grid"),
        CatalogEntry::new("Flexbox", "flexbox"),
    ]
    .into()
}

fn numbered(n: usize) -> Catalog {
    (0..n)
        .map(|i| CatalogEntry::new(&format!("Feature {i}"), &format!("feature-{i}")))
        .collect()
}

fn values(state: &SelectState) -> Vec<String> {
    state.filtered().map(|e| e.value.clone()).collect()
}

#[test]
fn test_search_grid() {
    let mut state = SelectState::with_catalog(SelectConfig::default(), two_features());
    state.set_search_term("grid");
    assert_eq!(values(&state), vec!["css-grid"]);
}

#[test]
fn test_search_matches_value_case_insensitively() {
    let mut state = SelectState::with_catalog(SelectConfig::default(), two_features());
    state.set_search_term("FLEX");
    assert_eq!(values(&state), vec!["flexbox"]);
    state.set_search_term("css-");
    assert_eq!(values(&state), vec!["css-grid"]);
    state.set_search_term("   ");
    assert_eq!(values(&state), vec!["css-grid", "flexbox"]);
}

#[test]
fn test_search_term_is_matched_as_typed() {
    let mut state = SelectState::with_catalog(SelectConfig::default(), two_features());
    state.set_search_term("grid ");
    assert_eq!(values(&state), Vec::<String>::new());
    state.set_search_term(" flex");
    assert_eq!(values(&state), Vec::<String>::new());
    state.set_search_term("css grid");
    assert_eq!(values(&state), vec!["css-grid"]);
    state.set_search_term(" ");
    assert_eq!(values(&state), vec!["css-grid", "flexbox"]);
}

#[test]
fn test_search_resets_highlight_and_scroll() {
    let mut state = SelectState::with_catalog(SelectConfig::default(), numbered(50));
    state.open();
    for _ in 0..20 {
        state.handle_key(Key::ArrowDown);
    }
    assert!(state.scroll_offset() > 0.0);
    state.set_search_term("Feature 1");
    assert_eq!(state.highlighted(), None);
    assert_eq!(state.scroll_offset(), 0.0);
}

#[test]
fn test_arrow_down_clamps_at_last_entry() {
    let mut state = SelectState::with_catalog(SelectConfig::default(), numbered(5));
    state.open();
    let mut seen = Vec::new();
    for _ in 0..6 {
        state.handle_key(Key::ArrowDown);
        seen.push(state.highlighted_index());
    }
    assert_eq!(seen, vec![0, 1, 2, 3, 4, 4]);
}

#[test]
fn test_enter_commits_highlighted() {
    let mut state = SelectState::with_catalog(SelectConfig::default(), two_features());
    state.open();
    let outcome = state.handle_key(Key::Enter);
    assert!(outcome.prevent_default);
    assert_eq!(outcome.committed, None);
    assert!(state.is_open());

    state.handle_key(Key::ArrowDown);
    state.handle_key(Key::ArrowDown);
    let outcome = state.handle_key(Key::Enter);
    assert_eq!(outcome.committed.as_deref(), Some("flexbox"));
    assert!(!state.is_open());
    assert_eq!(state.selected(), Some("flexbox"));
    assert_eq!(state.search_term(), "Flexbox");
}

#[test]
fn test_escape_closes_without_commit() {
    let mut state = SelectState::with_catalog(SelectConfig::default(), two_features());
    state.open();
    state.handle_key(Key::ArrowDown);
    let outcome = state.handle_key(Key::Escape);
    assert_eq!(outcome.committed, None);
    assert!(!state.is_open());
    assert_eq!(state.selected(), None);
}

#[test]
fn test_closed_trigger_opens_on_enter_or_space() {
    let mut state = SelectState::with_catalog(SelectConfig::default(), two_features());
    assert!(!state.handle_key(Key::ArrowDown).prevent_default);
    assert!(!state.is_open());

    assert!(state.handle_key(Key::Space).prevent_default);
    assert!(state.is_open());
    assert!(state.take_focus_request());
    assert!(!state.take_focus_request());

    state.handle_key(Key::Escape);
    state.handle_key(Key::Enter);
    assert!(state.is_open());
}

#[test]
fn test_open_clears_previous_search() {
    let mut state = SelectState::with_catalog(SelectConfig::default(), two_features());
    state.open();
    state.set_search_term("grid");
    state.close();
    state.open();
    assert_eq!(state.search_term(), "");
    assert_eq!(state.filtered_len(), 2);
}

#[test]
fn test_highlight_scrolls_into_view_without_recentering() {
    // 8 rows of 60px visible.
    let mut state = SelectState::with_catalog(SelectConfig::default(), numbered(100));
    state.open();
    for _ in 0..8 {
        state.handle_key(Key::ArrowDown);
    }
    assert_eq!(state.highlighted(), Some(7));
    assert_eq!(state.scroll_offset(), 0.0);

    state.handle_key(Key::ArrowDown);
    assert_eq!(state.scroll_offset(), 60.0);
    state.handle_key(Key::ArrowDown);
    assert_eq!(state.scroll_offset(), 120.0);

    // Moving up inside the viewport does not scroll.
    state.handle_key(Key::ArrowUp);
    assert_eq!(state.scroll_offset(), 120.0);

    for _ in 0..7 {
        state.handle_key(Key::ArrowUp);
    }
    assert_eq!(state.highlighted(), Some(1));
    assert_eq!(state.scroll_offset(), 60.0);
}

#[test]
fn test_render_is_bounded_for_large_catalogs() {
    let mut state = SelectState::with_catalog(SelectConfig::default(), numbered(5000));
    state.open();
    state.scroll_to(123_456.0);

    let tree = state.render(caniuse_embed_core::events::ElementId::next());
    let rows = tree.find_all_by_class("option");
    assert!(rows.len() <= 8 + 3);

    let spacers = tree.find_all_by_class("options-spacer");
    assert_eq!(spacers.len(), 2);
    let window = state.window();
    assert_eq!(spacers[0].get_attr("style"), Some(format!("height: {}px;", window.leading).as_str()));
    assert_eq!(
        window.leading + rows.len() as f64 * 60.0 + window.trailing,
        5000.0 * 60.0
    );
    assert_eq!(rows[0].get_attr("data-index"), Some(window.start.to_string().as_str()));
}

#[test]
fn test_no_results_and_loading_states() {
    let mut state = SelectState::new(SelectConfig::default());
    state.open();
    let html = state.render(caniuse_embed_core::events::ElementId::next()).to_html();
    assert!(html.contains("select-loading"));

    state.set_catalog(two_features());
    state.set_search_term("nothing-like-this");
    let tree = state.render(caniuse_embed_core::events::ElementId::next());
    assert!(tree.find_by_class("no-results").is_some());
    assert!(tree.find_by_class("options-container").is_none());
}

#[test]
fn test_labels_render_inline_markup() {
    let catalog: Catalog = vec![CatalogEntry::new("<code>:has()</code> selector", "css-has")].into();
    let mut state = SelectState::with_catalog(SelectConfig::default(), catalog);
    state.open();
    let tree = state.render(caniuse_embed_core::events::ElementId::next());
    let label = tree.find_by_class("option-label").unwrap();
    assert_eq!(label.children[0].tag, "code");
    assert_eq!(label.text_content(), ":has() selector");

    state.select_feature("css-has");
    assert_eq!(state.display_value(), ":has() selector");
}

#[test]
fn test_outside_click_closes_and_inside_click_does_not() {
    let window = Window::new();
    let mut select = FeatureSelect::from_state(SelectState::with_catalog(
        SelectConfig::default(),
        two_features(),
    ));
    select.connect(&window);
    select.state_mut().open();

    window.dispatch_pointer(PointerEvent::on([select.id()]));
    assert!(select.state().is_open());

    window.dispatch_pointer(PointerEvent::outside());
    assert!(!select.state().is_open());
}

#[test]
fn test_outside_click_listener_is_scoped() {
    let window = Window::new();
    {
        let mut select = FeatureSelect::new(SelectConfig::default());
        select.connect(&window);
        select.connect(&window);
        assert_eq!(window.pointer().listener_count(), 1);
        select.disconnect();
        assert_eq!(window.pointer().listener_count(), 0);
        select.connect(&window);
    }
    assert_eq!(window.pointer().listener_count(), 0);
}

#[test]
fn test_catalog_sink_respects_liveness() {
    let select = FeatureSelect::new(SelectConfig::default());
    let sink = select.catalog_sink();
    assert_eq!(select.state().status(), CatalogStatus::Loading);

    assert!(!sink.deliver(CatalogPoll::Pending));
    assert!(sink.deliver(CatalogPoll::Failed(CatalogError::HttpError(503))));
    assert_eq!(select.state().status(), CatalogStatus::Unavailable);
    assert_eq!(select.state().filtered_len(), 0);

    drop(select);
    assert!(!sink.is_alive());
    assert!(!sink.deliver(CatalogPoll::Ready(two_features())));
}

#[test]
fn test_hover_highlights_row() {
    let mut state = SelectState::with_catalog(SelectConfig::default(), two_features());
    state.open();
    state.hover(1);
    assert_eq!(state.highlighted(), Some(1));
    state.hover(7);
    assert_eq!(state.highlighted(), Some(1));
}
