//! Demo page flows: catalog arrival, choosing a feature, settings, dynamic embeds.

use caniuse_embed_core::catalog::{CatalogEntry, CatalogError, PendingCatalog};
use caniuse_embed_core::embed::{EmbedConfig, Theme};
use caniuse_embed_core::events::{MessageEvent, Window};
use caniuse_embed_core::host::{self, DemoHost, HostConfig};
use caniuse_embed_core::select::{CatalogStatus, Key};
use caniuse_embed_core::HeightUpdate;
use pretty_assertions::assert_eq;

fn loaded_host(window: &Window) -> DemoHost {
    let mut host = DemoHost::new(HostConfig::default(), window);
    host.load_catalog(PendingCatalog::resolved(Ok(vec![
        CatalogEntry::new("CSS Grid Layout", "css-grid"),
        CatalogEntry::new("Flexbox", "flexbox"),
        CatalogEntry::new("Custom Elements (V1)", "custom-elementsv1"),
    ])));
    assert!(host.tick());
    host
}

#[test]
fn test_catalog_arrival_fills_select() {
    let window = Window::new();
    let mut host = DemoHost::new(HostConfig::default(), &window);
    assert_eq!(host.select().state().status(), CatalogStatus::Loading);
    assert!(!host.tick());

    host.load_catalog(PendingCatalog::resolved(Ok(vec![CatalogEntry::new("Flexbox", "flexbox")])));
    assert!(host.tick());
    assert_eq!(host.select().state().status(), CatalogStatus::Ready);
    assert_eq!(host.select().state().filtered_len(), 1);
    assert!(!host.tick());
}

#[test]
fn test_catalog_failure_degrades_to_no_results() {
    let window = Window::new();
    let mut host = DemoHost::new(HostConfig::default(), &window);
    host.load_catalog(PendingCatalog::resolved(Err(CatalogError::Network("refused".into()))));
    assert!(host.tick());
    assert_eq!(host.select().state().status(), CatalogStatus::Unavailable);

    host.click_trigger();
    let page = host.render();
    assert!(page.find_by_class("no-results").is_some());
}

#[test]
fn test_keyboard_commit_drives_live_embed() {
    let window = Window::new();
    let mut host = loaded_host(&window);
    assert_eq!(host.live_embed().source(), None);

    host.click_trigger();
    host.type_search("flex");
    host.press_key(Key::ArrowDown);
    let outcome = host.press_key(Key::Enter);
    assert_eq!(outcome.committed.as_deref(), Some("flexbox"));

    assert_eq!(host.feature(), "flexbox");
    let meta = host.live_embed().meta();
    assert_eq!(
        host.live_embed().source().as_deref(),
        Some(format!("https://caniuse.lruihao.cn/flexbox#meta={meta}&past=2&future=1&theme=auto").as_str())
    );
    assert_eq!(host.select().state().display_value(), "Flexbox");
}

#[test]
fn test_settings_update_live_source_and_keep_token() {
    let window = Window::new();
    let mut host = loaded_host(&window);
    host.click_option("css-grid");
    let meta = host.live_embed().meta();

    host.set_past("4");
    host.set_future("0");
    host.set_future("lots");
    assert_eq!(host.toggle_theme(), Theme::Light);
    assert_eq!(host.toggle_theme(), Theme::Dark);
    host.set_baseline(true);

    assert_eq!(host.live_embed().meta(), meta);
    assert_eq!(
        host.live_embed().source().as_deref(),
        Some(format!("https://caniuse.lruihao.cn/css-grid#meta={meta}&past=4&future=0&theme=dark&baseline=true").as_str())
    );
    assert_eq!(
        host.embed_code(),
        r#"<caniuse-embed feature="css-grid" past="4" future="0" theme="dark" baseline></caniuse-embed>"#
    );
}

#[test]
fn test_theme_cycles_back_to_auto() {
    let window = Window::new();
    let mut host = loaded_host(&window);
    let seen: Vec<Theme> = (0..3).map(|_| host.toggle_theme()).collect();
    assert_eq!(seen, vec![Theme::Light, Theme::Dark, Theme::Auto]);
}

#[test]
fn test_live_embed_resizes_independently_of_hero() {
    let window = Window::new();
    let mut host = loaded_host(&window);
    host.click_option("css-grid");

    let report = HeightUpdate {
        feature: "css-grid".into(),
        meta: host.live_embed().meta(),
        height: 812.2,
    };
    window.post_message(MessageEvent::new("https://caniuse.lruihao.cn", report.to_message()));

    assert_eq!(host.live_embed().height(), 813);
    assert_eq!(host.hero_embed().height(), 500);
}

#[test]
fn test_outside_click_closes_select() {
    let window = Window::new();
    let mut host = loaded_host(&window);
    host.click_trigger();
    assert!(host.select().state().is_open());
    host.click_outside();
    assert!(!host.select().state().is_open());
}

#[test]
fn test_dynamic_embeds() {
    let window = Window::new();
    let mut host = loaded_host(&window);
    let baseline_listeners = window.messages().listener_count();

    host.set_feature_input("flexbox");
    let first = host.create_element();
    host.set_feature_input("css-grid");
    let second = host.create_element();
    assert_eq!(host.dynamic_embeds().len(), 2);
    assert_eq!(window.messages().listener_count(), baseline_listeners + 2);
    assert_eq!(host.dynamic_embeds()[1].feature(), "css-grid");

    assert!(host.remove_element(first));
    assert!(!host.remove_element(first));
    assert_eq!(window.messages().listener_count(), baseline_listeners + 1);
    assert_eq!(host.dynamic_embeds()[0].id(), second);
}

#[test]
fn test_render_shows_code_block_only_with_feature() {
    let window = Window::new();
    let mut host = loaded_host(&window);
    assert!(host.render().find_by_class("code-block").is_none());

    host.click_option("flexbox");
    let page = host.render();
    let code = page.find_by_class("code-block").unwrap();
    assert_eq!(code.text_content(), r#"<caniuse-embed feature="flexbox"></caniuse-embed>"#);
    assert!(page.find_by_tag("iframe").is_some());
}

#[test]
fn test_catalog_discarded_after_teardown() {
    let window = Window::new();
    let host = DemoHost::new(HostConfig::default(), &window);
    let sink = host.select().catalog_sink();
    drop(host);
    assert!(!sink.is_alive());
    assert_eq!(window.messages().listener_count(), 0);
    assert_eq!(window.pointer().listener_count(), 0);
}

#[test]
fn test_embed_code_for_defaults() {
    assert_eq!(
        host::embed_code(&EmbedConfig::default()),
        "<caniuse-embed></caniuse-embed>"
    );
    assert_eq!(
        host::embed_code(&EmbedConfig::for_feature("css-grid")),
        r#"<caniuse-embed feature="css-grid"></caniuse-embed>"#
    );
}
