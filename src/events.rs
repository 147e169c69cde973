//! Typed editor event bus.
//!
//! The host editor publishes view lifecycle events here and subscribes to
//! engine output (diagnostics). Delivery is synchronous and in publish
//! order: `publish` returns only after every subscriber for the event's
//! topic has run, so a modify following a load can never overtake it.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use parking_lot::RwLock;

/// Identifier for one editor window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(pub u64);

impl fmt::Display for WindowId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "window#{}", self.0)
	}
}

/// Point-in-time view of an editor buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSnapshot {
	pub window: WindowId,
	pub path: PathBuf,
	pub text: String,
}

/// Diagnostics for one file, already formatted for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticsUpdate {
	pub window: WindowId,
	pub path: PathBuf,
	/// One `path\tline:col\tmessage` line per diagnostic; empty when the
	/// file became clean.
	pub lines: Vec<String>,
}

/// Everything that can flow over the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
	ViewLoaded(ViewSnapshot),
	ViewModified(ViewSnapshot),
	ViewSaved(ViewSnapshot),
	ViewClosed(ViewSnapshot),
	ViewActivated(ViewSnapshot),
	DiagnosticsPublished(DiagnosticsUpdate),
}

/// Subscription key; every event maps to exactly one topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
	ViewLoaded,
	ViewModified,
	ViewSaved,
	ViewClosed,
	ViewActivated,
	DiagnosticsPublished,
}

impl EditorEvent {
	pub fn topic(&self) -> Topic {
		match self {
			EditorEvent::ViewLoaded(_) => Topic::ViewLoaded,
			EditorEvent::ViewModified(_) => Topic::ViewModified,
			EditorEvent::ViewSaved(_) => Topic::ViewSaved,
			EditorEvent::ViewClosed(_) => Topic::ViewClosed,
			EditorEvent::ViewActivated(_) => Topic::ViewActivated,
			EditorEvent::DiagnosticsPublished(_) => Topic::DiagnosticsPublished,
		}
	}

	/// The view payload, for the five view topics.
	pub fn view(&self) -> Option<&ViewSnapshot> {
		match self {
			EditorEvent::ViewLoaded(view)
			| EditorEvent::ViewModified(view)
			| EditorEvent::ViewSaved(view)
			| EditorEvent::ViewClosed(view)
			| EditorEvent::ViewActivated(view) => Some(view),
			EditorEvent::DiagnosticsPublished(_) => None,
		}
	}
}

type Callback = Box<dyn Fn(&EditorEvent) + Send + Sync>;

/// Per-topic subscriber lists with synchronous in-order delivery.
///
/// Subscribing from inside a callback would deadlock; subscriptions are
/// expected at wiring time, before events flow.
#[derive(Default)]
pub struct EventBus {
	subscribers: RwLock<HashMap<Topic, Vec<Callback>>>,
}

impl EventBus {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn subscribe(&self, topic: Topic, callback: impl Fn(&EditorEvent) + Send + Sync + 'static) {
		self.subscribers
			.write()
			.entry(topic)
			.or_default()
			.push(Box::new(callback));
	}

	pub fn publish(&self, event: &EditorEvent) {
		let subscribers = self.subscribers.read();
		if let Some(callbacks) = subscribers.get(&event.topic()) {
			for callback in callbacks {
				callback(event);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use parking_lot::Mutex;

	use super::*;

	fn snapshot(path: &str) -> ViewSnapshot {
		ViewSnapshot {
			window: WindowId(1),
			path: PathBuf::from(path),
			text: String::new(),
		}
	}

	#[test]
	fn test_delivery_is_in_publish_order() {
		let bus = EventBus::new();
		let seen = Arc::new(Mutex::new(Vec::new()));

		let sink = seen.clone();
		bus.subscribe(Topic::ViewModified, move |event| {
			sink.lock().push(event.view().unwrap().path.clone());
		});

		bus.publish(&EditorEvent::ViewModified(snapshot("/a.rs")));
		bus.publish(&EditorEvent::ViewModified(snapshot("/b.rs")));

		assert_eq!(
			*seen.lock(),
			vec![PathBuf::from("/a.rs"), PathBuf::from("/b.rs")]
		);
	}

	#[test]
	fn test_only_matching_topic_receives() {
		let bus = EventBus::new();
		let count = Arc::new(Mutex::new(0usize));

		let sink = count.clone();
		bus.subscribe(Topic::ViewSaved, move |_| *sink.lock() += 1);

		bus.publish(&EditorEvent::ViewLoaded(snapshot("/a.rs")));
		bus.publish(&EditorEvent::ViewSaved(snapshot("/a.rs")));

		assert_eq!(*count.lock(), 1);
	}

	#[test]
	fn test_multiple_subscribers_run_in_subscription_order() {
		let bus = EventBus::new();
		let order = Arc::new(Mutex::new(Vec::new()));

		for tag in ["first", "second"] {
			let sink = order.clone();
			bus.subscribe(Topic::ViewClosed, move |_| sink.lock().push(tag));
		}

		bus.publish(&EditorEvent::ViewClosed(snapshot("/a.rs")));
		assert_eq!(*order.lock(), vec!["first", "second"]);
	}
}
