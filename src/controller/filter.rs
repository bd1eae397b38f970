//! Watch event filtering
//!
//! Changes to a CustomPodAutoscaler always trigger a reconcile. Changes to
//! the objects it owns only do so when they are deleted, so that an object
//! removed by hand is recreated while the operator's own writes do not feed
//! back into the queue.

use futures::{Stream, StreamExt, future};
use kube::runtime::watcher;

/// Whether an object is the watched CustomPodAutoscaler or one of its dependents
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectRole {
    Primary,
    Secondary,
}

/// Kind of change notification
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchEventKind {
    Create,
    Update,
    Delete,
    Generic,
}

/// Decide whether a notification triggers a reconcile
pub fn should_reconcile(role: ObjectRole, event: WatchEventKind) -> bool {
    match (role, event) {
        (_, WatchEventKind::Generic) => false,
        (ObjectRole::Primary, _) => true,
        (ObjectRole::Secondary, WatchEventKind::Delete) => true,
        (ObjectRole::Secondary, _) => false,
    }
}

/// Classify a watcher event, returning the object it carries if any
///
/// Objects seen while the watch (re)lists are reported as created, later
/// applies as updates.
pub fn classify<K>(event: watcher::Event<K>) -> (WatchEventKind, Option<K>) {
    match event {
        watcher::Event::InitApply(obj) => (WatchEventKind::Create, Some(obj)),
        watcher::Event::Apply(obj) => (WatchEventKind::Update, Some(obj)),
        watcher::Event::Delete(obj) => (WatchEventKind::Delete, Some(obj)),
        watcher::Event::Init | watcher::Event::InitDone => (WatchEventKind::Generic, None),
    }
}

/// Reduce a watcher event stream to the objects whose changes trigger a reconcile
pub fn filter_events<K, S>(stream: S, role: ObjectRole) -> impl Stream<Item = Result<K, watcher::Error>>
where
    S: Stream<Item = Result<watcher::Event<K>, watcher::Error>>,
{
    stream.filter_map(move |event| {
        let admitted = match event {
            Ok(event) => match classify(event) {
                (kind, Some(obj)) if should_reconcile(role, kind) => Some(Ok(obj)),
                _ => None,
            },
            Err(e) => Some(Err(e)),
        };
        future::ready(admitted)
    })
}
