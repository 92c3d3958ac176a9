//! The demo page: a feature select driving a live embed, version sliders,
//! theme cycling, the baseline toggle, and embeds created on demand.

use crate::catalog::PendingCatalog;
use crate::dom::DomNode;
use crate::embed::{EmbedConfig, EmbedElement, Theme, DEFAULT_FUTURE, DEFAULT_ORIGIN, DEFAULT_PAST, TAG_NAME};
use crate::events::{ElementId, PointerEvent, Window};
use crate::select::{CatalogSink, FeatureSelect, Key, KeyOutcome, SelectConfig};
use std::time::Duration;

/// Configuration for a demo host.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Embed service origin, also the source of `features.json`.
    pub origin: String,
    /// Feature shown by the embed at the top of the page.
    pub hero_feature: String,
    pub select: SelectConfig,
    #[cfg(feature = "fetch")]
    pub catalog: crate::catalog::CatalogConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            hero_feature: "custom-elementsv1".to_string(),
            select: SelectConfig::default(),
            #[cfg(feature = "fetch")]
            catalog: Default::default(),
        }
    }
}

pub struct DemoHost {
    config: HostConfig,
    window: Window,
    feature: String,
    past: i64,
    future: i64,
    theme: Theme,
    baseline: bool,
    feature_input: String,
    hero: EmbedElement,
    live: EmbedElement,
    select: FeatureSelect,
    dynamic: Vec<EmbedElement>,
    pending: Option<(PendingCatalog, CatalogSink)>,
}

impl DemoHost {
    /// Build the page and connect every element to `window`. The select
    /// shows a loading state until [`DemoHost::load_catalog`] delivers.
    pub fn new(config: HostConfig, window: &Window) -> Self {
        let mut hero = EmbedElement::with_config(EmbedConfig {
            feature: config.hero_feature.clone(),
            origin: config.origin.clone(),
            ..Default::default()
        });
        hero.connect(window);

        let mut live = EmbedElement::with_config(EmbedConfig {
            origin: config.origin.clone(),
            ..Default::default()
        });
        live.connect(window);

        let mut select = FeatureSelect::new(config.select.clone());
        select.connect(window);

        Self {
            config,
            window: window.clone(),
            feature: String::new(),
            past: DEFAULT_PAST,
            future: DEFAULT_FUTURE,
            theme: Theme::default(),
            baseline: false,
            feature_input: String::new(),
            hero,
            live,
            select,
            dynamic: Vec::new(),
            pending: None,
        }
    }

    /// Build the page and start fetching the catalog in the background.
    #[cfg(feature = "fetch")]
    pub fn start(config: HostConfig, window: &Window) -> Result<Self, crate::catalog::CatalogError> {
        let client = crate::catalog::CatalogClient::with_config(config.catalog.clone())?;
        let origin = config.origin.clone();
        let mut host = Self::new(config, window);
        host.load_catalog(client.spawn(&origin));
        Ok(host)
    }

    /// Hand over the one catalog load of this session.
    pub fn load_catalog(&mut self, pending: PendingCatalog) {
        self.pending = Some((pending, self.select.catalog_sink()));
    }

    /// Apply the catalog if it has arrived. Returns whether anything changed.
    pub fn tick(&mut self) -> bool {
        let Some((pending, _)) = self.pending.as_mut() else {
            return false;
        };
        let poll = pending.poll();
        self.settle(poll)
    }

    /// Like [`DemoHost::tick`], blocking for up to `timeout`.
    pub fn wait_for_catalog(&mut self, timeout: Duration) -> bool {
        let Some((pending, _)) = self.pending.as_mut() else {
            return false;
        };
        let poll = pending.wait(timeout);
        self.settle(poll)
    }

    fn settle(&mut self, poll: crate::catalog::CatalogPoll) -> bool {
        let settled = self.pending.as_ref().map(|(p, _)| p.is_settled()).unwrap_or(true);
        let delivered = match &self.pending {
            Some((_, sink)) => sink.deliver(poll),
            None => false,
        };
        if settled {
            self.pending = None;
            self.sync_select_label();
        }
        delivered
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn feature(&self) -> &str {
        &self.feature
    }

    pub fn past(&self) -> i64 {
        self.past
    }

    pub fn future(&self) -> i64 {
        self.future
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn baseline(&self) -> bool {
        self.baseline
    }

    pub fn select(&self) -> &FeatureSelect {
        &self.select
    }

    pub fn hero_embed(&self) -> &EmbedElement {
        &self.hero
    }

    pub fn live_embed(&self) -> &EmbedElement {
        &self.live
    }

    pub fn dynamic_embeds(&self) -> &[EmbedElement] {
        &self.dynamic
    }

    // --- feature select ---

    pub fn click_trigger(&mut self) {
        self.window.dispatch_pointer(PointerEvent::on([self.select.id()]));
        self.select.state_mut().toggle();
    }

    pub fn type_search(&mut self, term: &str) {
        self.select.state_mut().set_search_term(term);
    }

    pub fn press_key(&mut self, key: Key) -> KeyOutcome {
        let outcome = self.select.state_mut().handle_key(key);
        if let Some(value) = &outcome.committed {
            self.apply_feature(value);
        }
        outcome
    }

    pub fn hover_option(&mut self, index: usize) {
        self.select.state_mut().hover(index);
    }

    pub fn scroll_options(&mut self, offset: f64) {
        self.select.state_mut().scroll_to(offset);
    }

    pub fn click_option(&mut self, value: &str) {
        self.window.dispatch_pointer(PointerEvent::on([self.select.id()]));
        self.select.state_mut().select_feature(value);
        self.apply_feature(value);
    }

    /// A press anywhere else on the page.
    pub fn click_outside(&self) {
        self.window.dispatch_pointer(PointerEvent::outside());
    }

    fn apply_feature(&mut self, value: &str) {
        tracing::debug!(feature = value, "feature selected");
        self.feature = value.to_string();
        self.sync_live();
    }

    fn sync_select_label(&mut self) {
        let selected = (!self.feature.is_empty()).then_some(self.feature.as_str());
        self.select.state_mut().set_selected(selected);
    }

    // --- settings ---

    /// Past-versions slider input.
    pub fn set_past(&mut self, raw: &str) {
        if let Some(past) = parse_int("past", raw) {
            self.past = past;
            self.sync_live();
        }
    }

    /// Future-versions slider input.
    pub fn set_future(&mut self, raw: &str) {
        if let Some(future) = parse_int("future", raw) {
            self.future = future;
            self.sync_live();
        }
    }

    pub fn toggle_theme(&mut self) -> Theme {
        self.theme = self.theme.next();
        self.sync_live();
        self.theme
    }

    pub fn set_baseline(&mut self, enabled: bool) {
        self.baseline = enabled;
        self.sync_live();
    }

    fn sync_live(&mut self) {
        let config = EmbedConfig {
            feature: self.feature.clone(),
            past: self.past,
            future: self.future,
            origin: self.config.origin.clone(),
            theme: self.theme,
            baseline: self.baseline,
            ..self.live.config()
        };
        self.live.set_config(config);
    }

    // --- dynamic creation ---

    pub fn set_feature_input(&mut self, value: &str) {
        self.feature_input = value.to_string();
    }

    /// Create a new embed for the typed feature and attach it to the page.
    pub fn create_element(&mut self) -> ElementId {
        let mut element = EmbedElement::with_config(EmbedConfig {
            feature: self.feature_input.clone(),
            origin: self.config.origin.clone(),
            ..Default::default()
        });
        element.connect(&self.window);
        let id = element.id();
        tracing::debug!(feature = %self.feature_input, element = id.as_u64(), "embed created");
        self.dynamic.push(element);
        id
    }

    /// Remove a dynamically created embed. Its listener goes with it.
    pub fn remove_element(&mut self, id: ElementId) -> bool {
        let before = self.dynamic.len();
        self.dynamic.retain(|e| e.id() != id);
        self.dynamic.len() != before
    }

    // --- snippets ---

    /// Embed code for the current configuration.
    pub fn embed_code(&self) -> String {
        embed_code(&self.live.config())
    }

    pub fn render(&self) -> DomNode {
        let mut live_demo = DomNode::new_element("section")
            .attr("class", "live-demo")
            .child(DomNode::new_element("h3").text("Select a feature"))
            .child(self.select.render())
            .child(self.render_settings())
            .child(self.live.render());
        if !self.feature.is_empty() {
            live_demo = live_demo.child(
                DomNode::new_element("pre")
                    .attr("class", "code-block")
                    .child(DomNode::new_element("code").text(&self.embed_code())),
            );
        }

        let dynamic = DomNode::new_element("section")
            .attr("class", "dynamic-demo")
            .child(
                DomNode::new_element("input")
                    .attr("type", "text")
                    .attr("class", "feature-input")
                    .attr("placeholder", "Feature name")
                    .attr("value", self.feature_input.as_str()),
            )
            .child(DomNode::new_element("button").attr("part", "button").text("Create"))
            .child(
                DomNode::new_element("div")
                    .attr("class", "dynamic-demo-section")
                    .children(self.dynamic.iter().map(|e| {
                        DomNode::new_element("div")
                            .attr("class", "live-demo")
                            .child(e.render())
                    })),
            );

        DomNode::new_element("div")
            .attr("class", "caniuse-embed-app")
            .child(self.hero.render())
            .child(live_demo)
            .child(dynamic)
    }

    fn render_settings(&self) -> DomNode {
        let slider = |id: &str, label: &str, max: u32, value: i64| {
            DomNode::new_element("div")
                .attr("class", "setting-item")
                .child(DomNode::new_element("label").attr("for", id).text(label))
                .child(
                    DomNode::new_element("input")
                        .attr("type", "range")
                        .attr("class", "slider")
                        .attr("id", id)
                        .attr("min", "0")
                        .attr("max", max.to_string())
                        .attr("value", value.to_string()),
                )
                .child(
                    DomNode::new_element("span")
                        .attr("class", "value-display")
                        .text(&value.to_string()),
                )
        };

        let mut baseline = DomNode::new_element("input").attr("type", "checkbox");
        if self.baseline {
            baseline.set_attr("checked", "");
        }

        DomNode::new_element("div")
            .attr("class", "settings-row")
            .child(slider("past-versions", "Past versions (0-5)", 5, self.past))
            .child(slider("future-versions", "Future versions (0-3)", 3, self.future))
            .child(
                DomNode::new_element("div")
                    .attr("class", "setting-item")
                    .child(DomNode::new_element("label").text("Baseline"))
                    .child(baseline),
            )
            .child(
                DomNode::new_element("div")
                    .attr("class", "setting-item")
                    .child(DomNode::new_element("span").text("Theme"))
                    .child(
                        DomNode::new_element("button")
                            .attr("part", "button")
                            .attr("class", "theme-toggle")
                            .text(self.theme.as_str()),
                    ),
            )
    }
}

/// Markup reproducing `config`; attributes at their default values are
/// left out, and so are `origin`, `loading` and `meta`.
pub fn embed_code(config: &EmbedConfig) -> String {
    if config.feature.is_empty() {
        return format!("<{}></{}>", TAG_NAME, TAG_NAME);
    }
    let mut code = format!("<{} feature=\"{}\"", TAG_NAME, config.feature);
    if config.past != DEFAULT_PAST {
        code.push_str(&format!(" past=\"{}\"", config.past));
    }
    if config.future != DEFAULT_FUTURE {
        code.push_str(&format!(" future=\"{}\"", config.future));
    }
    if config.theme != Theme::Auto {
        code.push_str(&format!(" theme=\"{}\"", config.theme));
    }
    if config.baseline {
        code.push_str(" baseline");
    }
    code.push_str(&format!("></{}>", TAG_NAME));
    code
}

/// Script tag loading the standalone bundle from `base`.
pub fn script_snippet(base: &str) -> String {
    format!("<script src=\"{}/embed.js\"></script>", base.trim_end_matches('/'))
}

/// `parseInt`-style: optional sign and leading digits, rest ignored.
fn parse_int(name: &str, raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits.find(|c: char| !c.is_ascii_digit()).unwrap_or(digits.len());
    match digits[..end].parse::<i64>() {
        Ok(n) => Some(sign * n),
        Err(_) => {
            tracing::warn!(setting = name, value = raw, "ignoring non-numeric slider value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_int_like_javascript() {
        assert_eq!(parse_int("past", "3"), Some(3));
        assert_eq!(parse_int("past", " 4px"), Some(4));
        assert_eq!(parse_int("past", "-1"), Some(-1));
        assert_eq!(parse_int("past", "abc"), None);
        assert_eq!(parse_int("past", ""), None);
    }

    #[test]
    fn script_snippet_joins_base() {
        assert_eq!(
            script_snippet("https://example.test/caniuse/"),
            "<script src=\"https://example.test/caniuse/embed.js\"></script>"
        );
    }
}
