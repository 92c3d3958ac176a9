//! Window-level broadcast channels.
//!
//! A browser delivers `message` events to every listener on the window and
//! pointer events to every listener on the document. Components here get the
//! same shape: a [`Channel`] broadcasts to every live subscriber and each
//! subscriber decides on its own whether an event is relevant. Subscriptions
//! are scoped: dropping the [`Subscription`] guard removes the listener.

use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// A `postMessage` delivery to the host window.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEvent {
    /// Serialized origin of the sender, e.g. `https://caniuse.lruihao.cn`.
    pub origin: String,
    /// Either a JSON string or an already structured value.
    pub data: Value,
}

impl MessageEvent {
    pub fn new(origin: &str, data: Value) -> Self {
        Self {
            origin: origin.to_string(),
            data,
        }
    }
}

/// Identity of a rendered component root, used for containment checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(u64);

thread_local! {
    static NEXT_ELEMENT_ID: Cell<u64> = const { Cell::new(1) };
}

impl ElementId {
    pub fn next() -> Self {
        NEXT_ELEMENT_ID.with(|next| {
            let id = next.get();
            next.set(id + 1);
            ElementId(id)
        })
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// A pointer press somewhere in the document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointerEvent {
    /// Composed path from the target outwards: the target first, then every
    /// component root containing it.
    pub path: Vec<ElementId>,
}

impl PointerEvent {
    /// A press on something that belongs to no component.
    pub fn outside() -> Self {
        Self::default()
    }

    pub fn on(path: impl IntoIterator<Item = ElementId>) -> Self {
        Self {
            path: path.into_iter().collect(),
        }
    }

    pub fn is_within(&self, root: ElementId) -> bool {
        self.path.contains(&root)
    }
}

type Handler<E> = Rc<RefCell<dyn FnMut(&E)>>;

struct Registry<E> {
    next_id: u64,
    handlers: Vec<(u64, Handler<E>)>,
}

impl<E> Registry<E> {
    fn contains(&self, id: u64) -> bool {
        self.handlers.iter().any(|(h, _)| *h == id)
    }
}

/// A broadcast channel with per-subscriber filtering.
pub struct Channel<E> {
    registry: Rc<RefCell<Registry<E>>>,
}

impl<E: 'static> Channel<E> {
    pub fn new() -> Self {
        Self {
            registry: Rc::new(RefCell::new(Registry {
                next_id: 1,
                handlers: Vec::new(),
            })),
        }
    }

    /// Register `handler`; it stays registered until the guard is dropped.
    #[must_use = "dropping the subscription immediately removes the listener"]
    pub fn subscribe(&self, handler: impl FnMut(&E) + 'static) -> Subscription<E> {
        let mut registry = self.registry.borrow_mut();
        let id = registry.next_id;
        registry.next_id += 1;
        let handler: Handler<E> = Rc::new(RefCell::new(handler));
        registry.handlers.push((id, handler));
        tracing::debug!(subscription = id, listeners = registry.handlers.len(), "listener added");
        Subscription {
            id,
            registry: Rc::downgrade(&self.registry),
        }
    }

    /// Deliver `event` to every subscriber, in subscription order.
    pub fn dispatch(&self, event: &E) {
        let snapshot: Vec<(u64, Handler<E>)> = self
            .registry
            .borrow()
            .handlers
            .iter()
            .map(|(id, h)| (*id, Rc::clone(h)))
            .collect();

        for (id, handler) in snapshot {
            // A handler may have removed a later one.
            if !self.registry.borrow().contains(id) {
                continue;
            }
            match handler.try_borrow_mut() {
                Ok(mut handler) => {
                    let handler: &mut dyn FnMut(&E) = &mut *handler;
                    handler(event)
                }
                Err(_) => tracing::trace!(subscription = id, "skipping re-entrant dispatch"),
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        self.registry.borrow().handlers.len()
    }
}

impl<E: 'static> Default for Channel<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for Channel<E> {
    fn clone(&self) -> Self {
        Self {
            registry: Rc::clone(&self.registry),
        }
    }
}

/// Scoped listener registration. Unsubscribes on drop.
pub struct Subscription<E> {
    id: u64,
    registry: Weak<RefCell<Registry<E>>>,
}

impl<E> Subscription<E> {
    /// Whether the listener is still registered on a live channel.
    pub fn is_active(&self) -> bool {
        self.registry
            .upgrade()
            .map(|r| r.borrow().contains(self.id))
            .unwrap_or(false)
    }
}

impl<E> Drop for Subscription<E> {
    fn drop(&mut self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        // The handler is dropped after the borrow ends; its captures may
        // hold subscriptions of their own.
        let removed = match registry.try_borrow_mut() {
            Ok(mut registry) => {
                let removed = registry
                    .handlers
                    .iter()
                    .position(|(id, _)| *id == self.id)
                    .map(|pos| registry.handlers.remove(pos));
                tracing::debug!(subscription = self.id, listeners = registry.handlers.len(), "listener removed");
                removed
            }
            Err(_) => None,
        };
        drop(removed);
    }
}

/// The host page: the `message` channel on `window` and the pointer channel
/// on `document`. Cloning yields another handle to the same channels.
#[derive(Clone, Default)]
pub struct Window {
    messages: Channel<MessageEvent>,
    pointer: Channel<PointerEvent>,
}

impl Window {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &Channel<MessageEvent> {
        &self.messages
    }

    pub fn pointer(&self) -> &Channel<PointerEvent> {
        &self.pointer
    }

    /// What an iframe's `parent.postMessage(data, '*')` amounts to.
    pub fn post_message(&self, event: MessageEvent) {
        self.messages.dispatch(&event);
    }

    pub fn dispatch_pointer(&self, event: PointerEvent) {
        self.pointer.dispatch(&event);
    }
}
