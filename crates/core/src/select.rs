//! Searchable, keyboard-navigable feature dropdown.
//!
//! The catalog runs to a few thousand entries, so the option list is
//! virtualized: only the rows intersecting the scroll viewport, plus one row
//! of overscan above and two below, are rendered. Spacers above and below the
//! rendered window keep the scrollable height equal to the full list.
//!
//! [`SelectState`] is the pure state machine. [`FeatureSelect`] wraps it with
//! the document-level outside-click listener.

use crate::catalog::{Catalog, CatalogEntry, CatalogPoll};
use crate::dom::{self, DomNode};
use crate::events::{ElementId, PointerEvent, Subscription, Window};
use std::cell::{Ref, RefCell, RefMut};
use std::rc::{Rc, Weak};

/// Sizing of the option list.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectConfig {
    /// Fixed height of one option row in pixels.
    pub item_height: f64,
    /// Rows that fit in the viewport.
    pub visible_count: usize,
    /// Height of the scroll viewport in pixels.
    pub viewport_height: f64,
    pub placeholder: String,
}

impl Default for SelectConfig {
    fn default() -> Self {
        Self::with_rows(60.0, 8)
    }
}

impl SelectConfig {
    /// Viewport sized to exactly `visible_count` rows.
    pub fn with_rows(item_height: f64, visible_count: usize) -> Self {
        Self {
            item_height,
            visible_count,
            viewport_height: item_height * visible_count as f64,
            placeholder: "Select a feature...".to_string(),
        }
    }
}

/// Keys the select reacts to, named after `KeyboardEvent.key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowDown,
    ArrowUp,
    Enter,
    Escape,
    Space,
    Other,
}

impl Key {
    pub fn from_name(name: &str) -> Key {
        match name {
            "ArrowDown" => Key::ArrowDown,
            "ArrowUp" => Key::ArrowUp,
            "Enter" => Key::Enter,
            "Escape" | "Esc" => Key::Escape,
            " " | "Space" | "Spacebar" => Key::Space,
            _ => Key::Other,
        }
    }
}

/// What a key press did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyOutcome {
    /// The key was consumed; the platform default must not run.
    pub prevent_default: bool,
    /// Value committed by `Enter`, if any.
    pub committed: Option<String>,
}

impl KeyOutcome {
    fn consumed() -> Self {
        Self {
            prevent_default: true,
            committed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogStatus {
    Loading,
    Ready,
    Unavailable,
}

/// The rendered slice of the filtered list and the spacers around it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VirtualWindow {
    /// First rendered index into the filtered list.
    pub start: usize,
    /// One past the last rendered index.
    pub end: usize,
    /// Height of the empty space above the first rendered row.
    pub leading: f64,
    /// Height of the empty space below the last rendered row.
    pub trailing: f64,
    /// `len * item_height`.
    pub total_height: f64,
}

impl VirtualWindow {
    pub fn compute(len: usize, scroll_offset: f64, item_height: f64, visible_count: usize) -> Self {
        let first = if item_height > 0.0 {
            (scroll_offset.max(0.0) / item_height).floor() as usize
        } else {
            0
        };
        let end = len.min(first.saturating_add(visible_count).saturating_add(2));
        let start = first.saturating_sub(1).min(end);
        Self {
            start,
            end,
            leading: start as f64 * item_height,
            trailing: (len - end) as f64 * item_height,
            total_height: len as f64 * item_height,
        }
    }

    pub fn rows(&self) -> usize {
        self.end - self.start
    }

    pub fn range(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

/// State of one feature select.
#[derive(Debug, Clone)]
pub struct SelectState {
    config: SelectConfig,
    catalog: Catalog,
    status: CatalogStatus,
    search_term: String,
    /// Ascending indices into `catalog`.
    filtered: Vec<usize>,
    open: bool,
    highlighted: Option<usize>,
    scroll_offset: f64,
    selected: Option<String>,
    focus_requested: bool,
}

impl SelectState {
    pub fn new(config: SelectConfig) -> Self {
        Self {
            config,
            catalog: Catalog::empty(),
            status: CatalogStatus::Loading,
            search_term: String::new(),
            filtered: Vec::new(),
            open: false,
            highlighted: None,
            scroll_offset: 0.0,
            selected: None,
            focus_requested: false,
        }
    }

    pub fn with_catalog(config: SelectConfig, catalog: Catalog) -> Self {
        let mut state = Self::new(config);
        state.set_catalog(catalog);
        state
    }

    pub fn config(&self) -> &SelectConfig {
        &self.config
    }

    pub fn set_catalog(&mut self, catalog: Catalog) {
        self.catalog = catalog;
        self.status = CatalogStatus::Ready;
        self.refilter();
    }

    /// The catalog could not be loaded: behave as an empty catalog.
    pub fn mark_unavailable(&mut self) {
        self.catalog = Catalog::empty();
        self.status = CatalogStatus::Unavailable;
        self.refilter();
    }

    pub fn status(&self) -> CatalogStatus {
        self.status
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    /// Filter by case-insensitive substring over label and value. The term
    /// is matched as typed; only a blank term selects the full catalog.
    pub fn set_search_term(&mut self, term: &str) {
        self.search_term = term.to_string();
        self.refilter();
    }

    fn refilter(&mut self) {
        let needle = self.search_term.to_lowercase();
        self.filtered = if needle.trim().is_empty() {
            (0..self.catalog.len()).collect()
        } else {
            self.catalog
                .iter()
                .enumerate()
                .filter(|(_, entry)| entry.matches(&needle))
                .map(|(i, _)| i)
                .collect()
        };
        self.highlighted = None;
        self.scroll_offset = 0.0;
    }

    pub fn filtered_len(&self) -> usize {
        self.filtered.len()
    }

    pub fn filtered(&self) -> impl Iterator<Item = &CatalogEntry> + '_ {
        self.filtered.iter().map(move |&i| &self.catalog[i])
    }

    pub fn filtered_entry(&self, index: usize) -> Option<&CatalogEntry> {
        self.filtered.get(index).map(|&i| &self.catalog[i])
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Open with a cleared search over the full catalog; the search input
    /// takes focus on the next render.
    pub fn open(&mut self) {
        self.open = true;
        self.search_term.clear();
        self.refilter();
        self.focus_requested = true;
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    pub fn toggle(&mut self) {
        if self.open {
            self.close();
            self.highlighted = None;
        } else {
            self.open();
        }
    }

    pub fn highlighted(&self) -> Option<usize> {
        self.highlighted
    }

    /// `-1` when nothing is highlighted.
    pub fn highlighted_index(&self) -> isize {
        self.highlighted.map_or(-1, |i| i as isize)
    }

    /// Pointer hover over a rendered row.
    pub fn hover(&mut self, index: usize) {
        if index < self.filtered.len() {
            self.highlighted = Some(index);
        }
    }

    pub fn handle_key(&mut self, key: Key) -> KeyOutcome {
        if !self.open {
            return match key {
                Key::Enter | Key::Space => {
                    self.toggle();
                    KeyOutcome::consumed()
                }
                _ => KeyOutcome::default(),
            };
        }

        match key {
            Key::ArrowDown => {
                let last = self.filtered.len().checked_sub(1);
                self.highlighted = match (self.highlighted, last) {
                    (_, None) => None,
                    (None, Some(_)) => Some(0),
                    (Some(i), Some(last)) => Some((i + 1).min(last)),
                };
                self.scroll_to_highlighted();
                KeyOutcome::consumed()
            }
            Key::ArrowUp => {
                self.highlighted = self.highlighted.and_then(|i| i.checked_sub(1));
                self.scroll_to_highlighted();
                KeyOutcome::consumed()
            }
            Key::Enter => {
                let committed = self
                    .highlighted
                    .and_then(|i| self.filtered_entry(i))
                    .map(|entry| entry.value.clone());
                if let Some(value) = &committed {
                    self.select_feature(value);
                }
                KeyOutcome {
                    prevent_default: true,
                    committed,
                }
            }
            Key::Escape => {
                self.close();
                KeyOutcome::consumed()
            }
            Key::Space | Key::Other => KeyOutcome::default(),
        }
    }

    /// Commit `value`: close, and show its label in the search box.
    pub fn select_feature(&mut self, value: &str) {
        self.selected = Some(value.to_string());
        self.open = false;
        if let Some(entry) = self.catalog.find(value) {
            self.search_term = entry.label.clone();
        }
    }

    /// Reflect a feature chosen elsewhere without touching the dropdown.
    pub fn set_selected(&mut self, value: Option<&str>) {
        self.selected = value.map(str::to_string);
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Text on the closed trigger.
    pub fn display_value(&self) -> String {
        match &self.selected {
            Some(value) => self
                .catalog
                .find(value)
                .map(CatalogEntry::label_text)
                .unwrap_or_else(|| value.clone()),
            None => self.config.placeholder.clone(),
        }
    }

    pub fn scroll_offset(&self) -> f64 {
        self.scroll_offset
    }

    pub fn max_scroll(&self) -> f64 {
        (self.filtered.len() as f64 * self.config.item_height - self.config.viewport_height).max(0.0)
    }

    /// The options container scrolled to `offset`.
    pub fn scroll_to(&mut self, offset: f64) {
        self.scroll_offset = offset.clamp(0.0, self.max_scroll());
    }

    /// Scroll the minimum needed to bring the highlighted row into view.
    fn scroll_to_highlighted(&mut self) {
        let Some(index) = self.highlighted else {
            return;
        };
        let item_height = self.config.item_height;
        let viewport = self.config.viewport_height;
        let top = index as f64 * item_height;
        if top < self.scroll_offset {
            self.scroll_offset = top;
        } else if top + item_height > self.scroll_offset + viewport {
            self.scroll_offset = top + item_height - viewport;
        }
    }

    pub fn window(&self) -> VirtualWindow {
        VirtualWindow::compute(
            self.filtered.len(),
            self.scroll_offset,
            self.config.item_height,
            self.config.visible_count,
        )
    }

    /// Whether the search input should take focus; clears the request.
    pub fn take_focus_request(&mut self) -> bool {
        std::mem::take(&mut self.focus_requested)
    }

    pub fn render(&self, root: ElementId) -> DomNode {
        let trigger = DomNode::new_element("div")
            .attr("class", "select-trigger")
            .attr("tabindex", "0")
            .attr("role", "combobox")
            .attr("aria-expanded", self.open.to_string())
            .attr("aria-haspopup", "listbox")
            .child(
                DomNode::new_element("span")
                    .attr("class", "select-value")
                    .text(&self.display_value()),
            )
            .child(
                DomNode::new_element("span")
                    .attr("class", "select-arrow")
                    .text(if self.open { "▲" } else { "▼" }),
            );

        let mut root_node = DomNode::new_element("div")
            .attr("class", "custom-select")
            .attr("data-element-id", root.as_u64().to_string())
            .child(trigger);

        if self.open {
            let mut search = DomNode::new_element("input")
                .attr("class", "search-input")
                .attr("type", "text")
                .attr("placeholder", "Search features...")
                .attr("aria-label", "Search features")
                .attr("value", self.search_term.as_str());
            if self.focus_requested {
                search.set_attr("autofocus", "");
            }
            root_node = root_node.child(
                DomNode::new_element("div")
                    .attr("class", "select-dropdown")
                    .child(search)
                    .child(self.render_options()),
            );
        }

        root_node
    }

    fn render_options(&self) -> DomNode {
        if self.status == CatalogStatus::Loading {
            return DomNode::new_element("div")
                .attr("class", "select-loading")
                .text("Loading features...");
        }
        if self.filtered.is_empty() {
            return DomNode::new_element("div")
                .attr("class", "no-results")
                .text("No matching features");
        }

        let window = self.window();
        let item_height = self.config.item_height;
        let spacer = |height: f64| {
            DomNode::new_element("div")
                .attr("class", "options-spacer")
                .attr("style", format!("height: {}px;", height))
        };

        let rows = window.range().map(|index| {
            let entry = &self.catalog[self.filtered[index]];
            let mut class = String::from("option");
            if self.highlighted == Some(index) {
                class.push_str(" highlighted");
            }
            if self.selected.as_deref() == Some(entry.value.as_str()) {
                class.push_str(" selected");
            }
            DomNode::new_element("div")
                .attr("class", class)
                .attr("role", "option")
                .attr("data-value", entry.value.as_str())
                .attr("data-index", index.to_string())
                .attr(
                    "aria-selected",
                    (self.selected.as_deref() == Some(entry.value.as_str())).to_string(),
                )
                .attr("style", format!("height: {}px;", item_height))
                .child(
                    DomNode::new_element("span")
                        .attr("class", "option-label")
                        .children(dom::parse_fragment(&entry.label)),
                )
                .child(
                    DomNode::new_element("span")
                        .attr("class", "option-value")
                        .text(&entry.value),
                )
        });

        DomNode::new_element("div")
            .attr("class", "options-container")
            .attr("role", "listbox")
            .attr(
                "style",
                format!("max-height: {}px; overflow-y: auto;", self.config.viewport_height),
            )
            .attr("data-scroll-top", self.scroll_offset.to_string())
            .child(spacer(window.leading))
            .children(rows)
            .child(spacer(window.trailing))
    }
}

/// A mounted select: [`SelectState`] plus the outside-click listener.
pub struct FeatureSelect {
    id: ElementId,
    state: Rc<RefCell<SelectState>>,
    outside_click: Option<Subscription<PointerEvent>>,
}

impl FeatureSelect {
    pub fn new(config: SelectConfig) -> Self {
        Self::from_state(SelectState::new(config))
    }

    pub fn from_state(state: SelectState) -> Self {
        Self {
            id: ElementId::next(),
            state: Rc::new(RefCell::new(state)),
            outside_click: None,
        }
    }

    /// Root identity; pointer events whose path contains it are "inside".
    pub fn id(&self) -> ElementId {
        self.id
    }

    /// Start listening for document presses outside the select.
    pub fn connect(&mut self, window: &Window) {
        if self.outside_click.is_some() {
            return;
        }
        let root = self.id;
        let state = Rc::downgrade(&self.state);
        self.outside_click = Some(window.pointer().subscribe(move |event: &PointerEvent| {
            if event.is_within(root) {
                return;
            }
            let Some(state) = state.upgrade() else {
                return;
            };
            if let Ok(mut state) = state.try_borrow_mut() {
                if state.is_open() {
                    tracing::debug!("closing feature select on outside press");
                    state.close();
                }
            };
        }));
    }

    pub fn disconnect(&mut self) {
        self.outside_click = None;
    }

    pub fn is_connected(&self) -> bool {
        self.outside_click.is_some()
    }

    pub fn state(&self) -> Ref<'_, SelectState> {
        self.state.borrow()
    }

    pub fn state_mut(&self) -> RefMut<'_, SelectState> {
        self.state.borrow_mut()
    }

    /// A handle for delivering the catalog once it arrives.
    pub fn catalog_sink(&self) -> CatalogSink {
        CatalogSink {
            state: Rc::downgrade(&self.state),
        }
    }

    pub fn render(&self) -> DomNode {
        self.state.borrow().render(self.id)
    }
}

/// Where a finished catalog load lands. Holds the select weakly, so a load
/// that finishes after the select is gone is dropped.
#[derive(Clone)]
pub struct CatalogSink {
    state: Weak<RefCell<SelectState>>,
}

impl CatalogSink {
    pub fn is_alive(&self) -> bool {
        self.state.strong_count() > 0
    }

    /// Apply a finished load. Returns `false` if the select no longer exists
    /// or the poll was still pending.
    pub fn deliver(&self, poll: CatalogPoll) -> bool {
        let Some(state) = self.state.upgrade() else {
            tracing::debug!("feature select gone; discarding catalog");
            return false;
        };
        let mut state = state.borrow_mut();
        match poll {
            CatalogPoll::Pending => false,
            CatalogPoll::Ready(catalog) => {
                state.set_catalog(catalog);
                true
            }
            CatalogPoll::Failed(error) => {
                tracing::warn!(%error, "feature catalog unavailable; select will show no results");
                state.mark_unavailable();
                true
            }
        }
    }
}
