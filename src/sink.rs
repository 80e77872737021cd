use serde_json::Value;

/// Arrival-ordered collection of received frames. Frames are opaque JSON
/// values; nothing here is reordered, deduplicated or mutated after append.
#[derive(Default, Debug)]
pub struct NotificationSink {
    items: Vec<Value>,
}

impl NotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, value: Value) {
        self.items.push(value);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Frames in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.items.iter()
    }

    /// Frames newest first, for display. Canonical storage stays in arrival
    /// order; this never mutates.
    pub fn newest_first(&self) -> impl Iterator<Item = &Value> {
        self.items.iter().rev()
    }
}
