//! The `<caniuse-embed>` element: one iframe pointed at the embed service,
//! resized from the height reports that iframe posts back.

use crate::dom::DomNode;
use crate::events::{ElementId, MessageEvent, Subscription, Window};
use crate::protocol::{self, HeightUpdate, ProtocolError};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use url::{form_urlencoded, Url};
use uuid::Uuid;

pub const TAG_NAME: &str = "caniuse-embed";

/// Default embed service; also serves `features.json`.
pub const DEFAULT_ORIGIN: &str = "https://caniuse.lruihao.cn";

pub const DEFAULT_PAST: i64 = 2;
pub const DEFAULT_FUTURE: i64 = 1;

/// Iframe height before the first report arrives.
pub const INITIAL_HEIGHT: u32 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Auto,
    Light,
    Dark,
}

impl Theme {
    pub const ALL: [Theme; 3] = [Theme::Auto, Theme::Light, Theme::Dark];

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Auto => "auto",
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    /// auto → light → dark → auto
    pub fn next(self) -> Theme {
        match self {
            Theme::Auto => Theme::Light,
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Auto,
        }
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Theme {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Theme::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ConfigError::new("theme", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Loading {
    Eager,
    #[default]
    Lazy,
}

impl Loading {
    pub fn as_str(self) -> &'static str {
        match self {
            Loading::Eager => "eager",
            Loading::Lazy => "lazy",
        }
    }
}

impl std::str::FromStr for Loading {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eager" => Ok(Loading::Eager),
            "lazy" => Ok(Loading::Lazy),
            _ => Err(ConfigError::new("loading", s)),
        }
    }
}

/// An attribute value that could not be interpreted at all. Values that
/// parse but fall outside the documented range are not errors; the embed
/// service clamps them.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError {
    pub attribute: String,
    pub value: String,
}

impl ConfigError {
    fn new(attribute: &str, value: &str) -> Self {
        Self {
            attribute: attribute.to_string(),
            value: value.to_string(),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invalid value for `{}`: {:?}", self.attribute, self.value)
    }
}

impl std::error::Error for ConfigError {}

/// Fresh correlation token.
pub fn generate_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Everything the iframe URL is derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbedConfig {
    /// caniuse feature id, e.g. `css-grid`. Empty means "nothing to show".
    pub feature: String,
    /// Past major versions to show, documented as 0–5.
    pub past: i64,
    /// Future major versions to show, documented as 0–3.
    pub future: i64,
    pub origin: String,
    pub theme: Theme,
    pub loading: Loading,
    /// Correlation token matched against `payload.meta`.
    pub meta: String,
    pub baseline: bool,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            feature: String::new(),
            past: DEFAULT_PAST,
            future: DEFAULT_FUTURE,
            origin: DEFAULT_ORIGIN.to_string(),
            theme: Theme::Auto,
            loading: Loading::Lazy,
            meta: generate_token(),
            baseline: false,
        }
    }
}

impl EmbedConfig {
    pub fn for_feature(feature: &str) -> Self {
        Self {
            feature: feature.to_string(),
            ..Default::default()
        }
    }
}

/// The iframe `src` for `config`, or `None` when no feature is set.
///
/// Shape: `<origin>/<feature>#meta=<token>&past=<n>&future=<n>&theme=<t>`.
pub fn build_source(config: &EmbedConfig) -> Option<String> {
    if config.feature.is_empty() {
        return None;
    }

    let mut fragment = form_urlencoded::Serializer::new(String::new());
    fragment
        .append_pair("meta", &config.meta)
        .append_pair("past", &config.past.to_string())
        .append_pair("future", &config.future.to_string())
        .append_pair("theme", config.theme.as_str());
    if config.baseline {
        fragment.append_pair("baseline", "true");
    }

    Some(format!("{}/{}#{}", config.origin, config.feature, fragment.finish()))
}

/// The parameters recovered from an iframe `src`.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceParams {
    pub feature: String,
    pub meta: String,
    pub past: i64,
    pub future: i64,
    pub theme: Theme,
    pub baseline: bool,
}

/// Inverse of [`build_source`]. `None` if the URL or its fragment is not in
/// the expected shape.
pub fn parse_source(src: &str) -> Option<SourceParams> {
    let url = Url::parse(src).ok()?;
    let feature = url.path_segments()?.last()?.to_string();
    let fragment = url.fragment()?;

    let mut meta = None;
    let mut past = None;
    let mut future = None;
    let mut theme = None;
    let mut baseline = false;
    for (key, value) in form_urlencoded::parse(fragment.as_bytes()) {
        match key.as_ref() {
            "meta" => meta = Some(value.into_owned()),
            "past" => past = value.parse().ok(),
            "future" => future = value.parse().ok(),
            "theme" => theme = value.parse().ok(),
            "baseline" => baseline = value == "true",
            _ => {}
        }
    }

    Some(SourceParams {
        feature,
        meta: meta?,
        past: past?,
        future: future?,
        theme: theme?,
        baseline,
    })
}

/// What the element currently shows.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderState {
    Placeholder,
    Frame { src: String, height: u32 },
}

/// Result of offering a window message to one element.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageOutcome {
    Applied { height: u32 },
    Malformed(ProtocolError),
    /// Well-formed, but for another feature or another instance.
    Unmatched,
    /// Rejected by the optional sender-origin check.
    ForeignOrigin,
}

struct EmbedState {
    config: EmbedConfig,
    height: u32,
    render_requested: bool,
    origin_check: bool,
}

impl EmbedState {
    fn receive(&mut self, event: &MessageEvent) -> MessageOutcome {
        let update = match protocol::classify(&event.data) {
            Ok(update) => update,
            Err(e) => {
                tracing::trace!(error = %e, "ignoring message");
                return MessageOutcome::Malformed(e);
            }
        };

        if !self.is_addressed_to_me(&update) {
            tracing::trace!(feature = %update.feature, meta = %update.meta, "ignoring message for another embed");
            return MessageOutcome::Unmatched;
        }

        if self.origin_check && !origin_matches(&self.config.origin, &event.origin) {
            tracing::trace!(origin = %event.origin, "ignoring message from unexpected origin");
            return MessageOutcome::ForeignOrigin;
        }

        let height = pixel_height(update.height);
        tracing::debug!(feature = %self.config.feature, height, "iframe resized");
        self.height = height;
        self.render_requested = true;
        MessageOutcome::Applied { height }
    }

    fn is_addressed_to_me(&self, update: &HeightUpdate) -> bool {
        update.feature == self.config.feature && update.meta == self.config.meta
    }

    fn render_state(&self) -> RenderState {
        match build_source(&self.config) {
            Some(src) => RenderState::Frame {
                src,
                height: self.height,
            },
            None => RenderState::Placeholder,
        }
    }
}

/// Round up to whole pixels; reports never shrink the frame below zero.
fn pixel_height(height: f64) -> u32 {
    height.ceil().max(0.0) as u32
}

fn origin_matches(configured: &str, sender: &str) -> bool {
    Url::parse(configured)
        .map(|url| url.origin().ascii_serialization() == sender)
        .unwrap_or(false)
}

/// A `<caniuse-embed>` instance.
///
/// The element listens on the window message channel only while connected;
/// [`EmbedElement::disconnect`] (or dropping the element) removes the listener.
pub struct EmbedElement {
    id: ElementId,
    state: Rc<RefCell<EmbedState>>,
    listener: Option<Subscription<MessageEvent>>,
}

impl EmbedElement {
    pub fn new() -> Self {
        Self::with_config(EmbedConfig::default())
    }

    pub fn with_config(config: EmbedConfig) -> Self {
        Self {
            id: ElementId::next(),
            state: Rc::new(RefCell::new(EmbedState {
                config,
                height: INITIAL_HEIGHT,
                render_requested: true,
                origin_check: false,
            })),
            listener: None,
        }
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    /// Attach to `window`: registers exactly one message listener.
    pub fn connect(&mut self, window: &Window) {
        if self.listener.is_some() {
            return;
        }
        let state: Weak<RefCell<EmbedState>> = Rc::downgrade(&self.state);
        let listener = window.messages().subscribe(move |event| {
            let Some(state) = state.upgrade() else {
                return;
            };
            if let Ok(mut state) = state.try_borrow_mut() {
                state.receive(event);
            };
        });
        self.listener = Some(listener);
    }

    /// Detach from the window; later messages are never seen.
    pub fn disconnect(&mut self) {
        self.listener = None;
    }

    pub fn is_connected(&self) -> bool {
        self.listener.is_some()
    }

    /// Offer a message directly, bypassing the window channel.
    pub fn handle_message(&self, event: &MessageEvent) -> MessageOutcome {
        self.state.borrow_mut().receive(event)
    }

    /// Also require the sender origin to equal the configured `origin`.
    /// Token matching still applies.
    pub fn set_origin_check(&self, enabled: bool) {
        self.state.borrow_mut().origin_check = enabled;
    }

    /// Apply an HTML attribute. Unknown attributes are ignored.
    pub fn set_attribute(&self, name: &str, value: &str) {
        self.update(|config| match name {
            "feature" => config.feature = value.to_string(),
            "past" => config.past = parse_number("past", value, DEFAULT_PAST),
            "future" => config.future = parse_number("future", value, DEFAULT_FUTURE),
            "origin" => config.origin = value.to_string(),
            "theme" => config.theme = parse_keyword(value),
            "loading" => config.loading = parse_keyword(value),
            "meta" => config.meta = value.to_string(),
            "baseline" => config.baseline = true,
            _ => {}
        });
    }

    /// Remove an HTML attribute, restoring its default. The correlation
    /// token survives removal of `meta`.
    pub fn remove_attribute(&self, name: &str) {
        self.update(|config| match name {
            "feature" => config.feature.clear(),
            "past" => config.past = DEFAULT_PAST,
            "future" => config.future = DEFAULT_FUTURE,
            "origin" => config.origin = DEFAULT_ORIGIN.to_string(),
            "theme" => config.theme = Theme::default(),
            "loading" => config.loading = Loading::default(),
            "baseline" => config.baseline = false,
            _ => {}
        });
    }

    /// Replace the whole configuration, keeping this element's token.
    pub fn set_config(&self, mut config: EmbedConfig) {
        self.update(|current| {
            config.meta = std::mem::take(&mut current.meta);
            *current = config;
        });
    }

    fn update(&self, apply: impl FnOnce(&mut EmbedConfig)) {
        let mut state = self.state.borrow_mut();
        let before = state.config.clone();
        apply(&mut state.config);
        if state.config != before {
            state.render_requested = true;
        }
    }

    pub fn config(&self) -> EmbedConfig {
        self.state.borrow().config.clone()
    }

    pub fn feature(&self) -> String {
        self.state.borrow().config.feature.clone()
    }

    pub fn meta(&self) -> String {
        self.state.borrow().config.meta.clone()
    }

    /// Last reported iframe height in pixels.
    pub fn height(&self) -> u32 {
        self.state.borrow().height
    }

    pub fn source(&self) -> Option<String> {
        build_source(&self.state.borrow().config)
    }

    pub fn render_state(&self) -> RenderState {
        self.state.borrow().render_state()
    }

    /// Whether anything changed since the last call.
    pub fn take_render_request(&self) -> bool {
        std::mem::take(&mut self.state.borrow_mut().render_requested)
    }

    pub fn render(&self) -> DomNode {
        let state = self.state.borrow();
        let body = match state.render_state() {
            RenderState::Placeholder => placeholder(),
            RenderState::Frame { src, height } => DomNode::new_element("iframe")
                .attr("class", "ciu-embed-iframe")
                .attr("src", src)
                .attr("height", height.to_string())
                .attr("allow", "fullscreen")
                .attr("loading", state.config.loading.as_str()),
        };
        DomNode::new_element(TAG_NAME)
            .attr("data-element-id", self.id.as_u64().to_string())
            .child(body)
    }
}

impl Default for EmbedElement {
    fn default() -> Self {
        Self::new()
    }
}

fn placeholder() -> DomNode {
    let link = |href: &str, text: &str| {
        DomNode::new_element("a")
            .attr("href", href)
            .attr("target", "_blank")
            .text(text)
    };
    DomNode::new_element("p")
        .attr("class", "ciu-embed-empty")
        .child(
            DomNode::new_element("span")
                .text("Data on support for the features across the major browsers from ")
                .child(link("https://caniuse.com", "caniuse.com"))
                .text("."),
        )
        .child(DomNode::new_element("br"))
        .child(
            DomNode::new_element("span")
                .text("See more at ")
                .child(link(DEFAULT_ORIGIN, "caniuse.lruihao.cn"))
                .text("."),
        )
}

fn parse_number(attribute: &str, value: &str, default: i64) -> i64 {
    match value.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => n.trunc() as i64,
        _ => {
            tracing::warn!(attribute, value, default, "not a number, using default");
            default
        }
    }
}

fn parse_keyword<T>(value: &str) -> T
where
    T: std::str::FromStr<Err = ConfigError> + Default,
{
    value.parse().unwrap_or_else(|e: ConfigError| {
        tracing::warn!(error = %e, "using default");
        T::default()
    })
}
