//! Observable registry of exposed tools.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::debug;

use crate::error::{ToolError, ToolResult};
use crate::handler::{Arguments, ToolDescriptor, ToolResponse};

/// Immutable view of the catalog published to subscribers, ordered by name.
#[derive(Clone, Debug, Default)]
pub struct ToolSnapshot {
    tools: Vec<ToolDescriptor>,
}

impl ToolSnapshot {
    /// Returns the tools in the snapshot.
    #[must_use]
    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    /// Returns the tool named `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|tool| tool.name() == name)
    }

    /// Returns the tool names in order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(ToolDescriptor::name).collect()
    }

    /// Returns the number of tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` for an empty catalog.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

type Subscriber = Arc<dyn Fn(Arc<ToolSnapshot>) + Send + Sync>;

/// Registry that stores tools keyed by name.
///
/// Registration overwrites by name. After every registration each subscriber
/// receives the complete current catalog. A read-only registry leaves
/// [`ReadOnlyHint::Mutating`](crate::ReadOnlyHint::Mutating) tools out of
/// every snapshot.
pub struct ToolRegistry {
    read_only: bool,
    tools: RwLock<BTreeMap<String, ToolDescriptor>>,
    subscribers: RwLock<Vec<Subscriber>>,
    outbox: Mutex<Outbox>,
}

/// Snapshot waiting for delivery. Only one caller delivers at a time and
/// keeps draining until nothing newer is pending.
#[derive(Default)]
struct Outbox {
    pending: Option<Arc<ToolSnapshot>>,
    delivering: bool,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tools = self.tools.read().unwrap_or_else(PoisonError::into_inner);
        let names: Vec<_> = tools.keys().cloned().collect();
        f.debug_struct("ToolRegistry")
            .field("read_only", &self.read_only)
            .field("registered", &names)
            .finish_non_exhaustive()
    }
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(read_only: bool) -> Self {
        Self {
            read_only,
            tools: RwLock::new(BTreeMap::new()),
            subscribers: RwLock::new(Vec::new()),
            outbox: Mutex::new(Outbox::default()),
        }
    }

    /// Returns `true` if mutating tools are hidden.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Inserts or overwrites tools by name, then notifies subscribers.
    ///
    /// Subscribers run without any registry lock held, so a callback may
    /// register tools itself; that nested update is delivered after the
    /// current one.
    pub fn register_tools<I>(&self, tools: I)
    where
        I: IntoIterator<Item = ToolDescriptor>,
    {
        self.publish(false, tools);
    }

    /// Replaces the whole catalog with `tools`, then notifies subscribers.
    pub fn replace_tools<I>(&self, tools: I)
    where
        I: IntoIterator<Item = ToolDescriptor>,
    {
        self.publish(true, tools);
    }

    fn publish<I>(&self, replace: bool, tools: I)
    where
        I: IntoIterator<Item = ToolDescriptor>,
    {
        {
            let mut inner = self.tools.write().unwrap_or_else(PoisonError::into_inner);
            if replace {
                inner.clear();
            }
            for tool in tools {
                debug!(name = tool.name(), "registering tool");
                inner.insert(tool.name().to_owned(), tool);
            }
            // Queued before the write lock is released so publishers enqueue
            // in mutation order.
            let snapshot = Arc::new(self.visible(&inner));
            let mut outbox = self.outbox.lock().unwrap_or_else(PoisonError::into_inner);
            outbox.pending = Some(snapshot);
            if outbox.delivering {
                return;
            }
            outbox.delivering = true;
        }
        self.deliver();
    }

    /// Subscribes to catalog changes.
    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(Arc<ToolSnapshot>) + Send + Sync + 'static,
    {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(callback));
    }

    /// Returns the visible catalog.
    #[must_use]
    pub fn snapshot(&self) -> ToolSnapshot {
        let inner = self.tools.read().unwrap_or_else(PoisonError::into_inner);
        self.visible(&inner)
    }

    fn visible(&self, tools: &BTreeMap<String, ToolDescriptor>) -> ToolSnapshot {
        let tools = tools
            .values()
            .filter(|tool| !self.read_only || tool.read_only().visible_in_read_only())
            .cloned()
            .collect();
        ToolSnapshot { tools }
    }

    /// Returns the visible tool named `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<ToolDescriptor> {
        let inner = self.tools.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .get(name)
            .filter(|tool| !self.read_only || tool.read_only().visible_in_read_only())
            .cloned()
    }

    /// Invokes a visible tool.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnknownTool`] when the tool is not visible, or
    /// propagates the handler's error.
    pub async fn invoke(&self, name: &str, arguments: Arguments) -> ToolResult<ToolResponse> {
        let tool = self.get(name).ok_or_else(|| ToolError::UnknownTool {
            name: name.to_owned(),
        })?;
        tool.call(arguments).await
    }

    fn deliver(&self) {
        loop {
            let snapshot = {
                let mut outbox = self.outbox.lock().unwrap_or_else(PoisonError::into_inner);
                match outbox.pending.take() {
                    Some(snapshot) => snapshot,
                    None => {
                        outbox.delivering = false;
                        return;
                    }
                }
            };
            let subscribers: Vec<Subscriber> = self
                .subscribers
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            for subscriber in subscribers {
                debug!(tools_count = snapshot.len(), "invoking tool registry callback");
                subscriber(Arc::clone(&snapshot));
            }
        }
    }
}
