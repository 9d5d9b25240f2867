//! Watcher - path-keyed subscription table with index re-alignment.
//!
//! Two independent tables:
//! - `add(path, ..)` - whole-field subscriptions. Fire for any write at, above
//!   or below the subscribed path.
//! - `watch_access(path, ..)` - fully qualified access paths (usually inside a
//!   repeated section). Fire only through `collect_access`.
//!
//! Index re-alignment (`forward_access` / `backward_access`) re-keys access
//! subscriptions whose path runs through an array when elements are inserted
//! or removed at its front.
//!
//! # Firing
//!
//! The watcher never invokes callbacks itself. `collect_*` returns the
//! matching [`Pending`] entries in subscription order and the caller runs
//! them once it no longer holds any borrow of the watcher:
//!
//! ```ignore
//! let batch = watcher.borrow().collect_fields(&change);
//! for pending in batch {
//!     if watcher.borrow().is_live(pending.id()) {
//!         pending.invoke(&vm, &change);
//!     }
//! }
//! ```
//!
//! Callbacks may add or dispose subscriptions while a batch runs.

use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::dom::NodeId;
use crate::types::{Change, Path, Segment};

// =============================================================================
// TYPES
// =============================================================================

/// Subscription callback. `C` is the context handed to every callback.
pub type Callback<C> = Rc<dyn Fn(&C, &Change)>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

struct Subscription<C> {
    id: SubscriptionId,
    owner: Option<NodeId>,
    callback: Callback<C>,
}

/// A callback selected for one change, with the path it is registered under.
pub struct Pending<C> {
    id: SubscriptionId,
    target: Path,
    callback: Callback<C>,
}

impl<C> Pending<C> {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Run the callback with `change` re-targeted at the subscription's path.
    pub fn invoke(&self, context: &C, change: &Change) {
        (self.callback)(context, &change.retarget(&self.target));
    }
}

// =============================================================================
// STATE
// =============================================================================

pub struct Watcher<C> {
    next_id: u64,
    next_seq: u64,
    fields: FxHashMap<Path, Vec<Subscription<C>>>,
    access: FxHashMap<Path, Vec<Subscription<C>>>,
    live: FxHashSet<SubscriptionId>,
    /// Sequence number of the last change fanned out to access subscribers.
    last_access_seq: Option<u64>,
    /// Last (change, array) pair realigned through `realign_once`.
    last_realign: Option<(u64, Path)>,
}

impl<C> Default for Watcher<C> {
    fn default() -> Self {
        Self {
            next_id: 0,
            next_seq: 0,
            fields: FxHashMap::default(),
            access: FxHashMap::default(),
            live: FxHashSet::default(),
            last_access_seq: None,
            last_realign: None,
        }
    }
}

impl<C> Watcher<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence number for a new change.
    pub fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn subscription(&mut self, owner: Option<NodeId>, callback: Callback<C>) -> Subscription<C> {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.live.insert(id);
        Subscription {
            id,
            owner,
            callback,
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Subscribe to a whole field.
    pub fn add(&mut self, path: Path, owner: Option<NodeId>, callback: Callback<C>) -> SubscriptionId {
        let subscription = self.subscription(owner, callback);
        let id = subscription.id;
        self.fields.entry(path).or_default().push(subscription);
        id
    }

    /// Subscribe to a fully qualified access path.
    pub fn watch_access(
        &mut self,
        path: Path,
        owner: Option<NodeId>,
        callback: Callback<C>,
    ) -> SubscriptionId {
        let subscription = self.subscription(owner, callback);
        let id = subscription.id;
        self.access.entry(path).or_default().push(subscription);
        id
    }

    pub fn remove(&mut self, id: SubscriptionId) -> bool {
        if !self.live.remove(&id) {
            return false;
        }
        for table in [&mut self.fields, &mut self.access] {
            table.retain(|_, subscriptions| {
                subscriptions.retain(|s| s.id != id);
                !subscriptions.is_empty()
            });
        }
        true
    }

    /// Drop every subscription owned by one of `released`. Returns how many
    /// were dropped.
    pub fn dispose_owned(&mut self, released: &FxHashSet<NodeId>) -> usize {
        if released.is_empty() {
            return 0;
        }
        let live = &mut self.live;
        let mut dropped = 0;
        for table in [&mut self.fields, &mut self.access] {
            table.retain(|_, subscriptions| {
                subscriptions.retain(|s| {
                    let owned = s.owner.is_some_and(|owner| released.contains(&owner));
                    if owned {
                        live.remove(&s.id);
                        dropped += 1;
                    }
                    !owned
                });
                !subscriptions.is_empty()
            });
        }
        dropped
    }

    pub fn is_live(&self, id: SubscriptionId) -> bool {
        self.live.contains(&id)
    }

    /// Number of live subscriptions in both tables.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Path a subscription is currently registered under. Access paths move
    /// with index realignment, so this is the up-to-date location.
    pub fn path_of(&self, id: SubscriptionId) -> Option<Path> {
        if !self.live.contains(&id) {
            return None;
        }
        [&self.fields, &self.access].into_iter().find_map(|table| {
            table
                .iter()
                .find(|(_, subscriptions)| subscriptions.iter().any(|s| s.id == id))
                .map(|(path, _)| path.clone())
        })
    }

    /// Paths currently registered in the access table.
    pub fn access_paths(&self) -> Vec<Path> {
        let mut paths: Vec<Path> = self.access.keys().cloned().collect();
        paths.sort_by_key(|p| p.to_string());
        paths
    }

    // =========================================================================
    // Collection
    // =========================================================================

    /// Whole-field subscribers affected by `change`.
    pub fn collect_fields(&self, change: &Change) -> Vec<Pending<C>> {
        let mut batch: Vec<Pending<C>> = self
            .fields
            .iter()
            .filter(|(path, _)| path.overlaps(&change.path))
            .flat_map(|(path, subscriptions)| pending(path, subscriptions))
            .collect();
        batch.sort_by_key(|p| p.id);
        batch
    }

    /// Access subscribers affected by `change`: the exact path and its
    /// ancestors, plus descendants when the change is a plain assignment.
    ///
    /// A change is fanned out once; collecting the same sequence number again
    /// yields nothing.
    pub fn collect_access(&mut self, change: &Change) -> Vec<Pending<C>> {
        if self.last_access_seq == Some(change.seq) {
            return Vec::new();
        }
        self.last_access_seq = Some(change.seq);

        let mut batch: Vec<Pending<C>> = Vec::new();
        for len in 0..=change.path.len() {
            let path = change.path.truncated(len);
            if let Some(subscriptions) = self.access.get(&path) {
                batch.extend(pending(&path, subscriptions));
            }
        }
        if !change.kind.is_structural() {
            for (path, subscriptions) in &self.access {
                if path.len() > change.path.len() && path.starts_with(&change.path) {
                    batch.extend(pending(path, subscriptions));
                }
            }
        }
        batch.sort_by_key(|p| p.id);
        batch
    }

    // =========================================================================
    // Index re-alignment
    // =========================================================================

    /// Shift the index right below `path` forward by `count` in every access
    /// subscription under `path`.
    pub fn forward_access(&mut self, path: &Path, count: usize) {
        self.realign(path, count as isize);
    }

    /// Shift the index right below `path` back by `count`. Subscriptions that
    /// would land below zero belong to removed elements and are dropped.
    pub fn backward_access(&mut self, path: &Path, count: usize) {
        self.realign(path, -(count as isize));
    }

    /// Realign for one structural change. Several repeated sections over the
    /// same array all react to the change, but the shared access table must
    /// move only once. Returns false when this change was already applied.
    pub fn realign_once(&mut self, seq: u64, base: &Path, delta: isize) -> bool {
        if self
            .last_realign
            .as_ref()
            .is_some_and(|(last, path)| *last == seq && path == base)
        {
            return false;
        }
        self.last_realign = Some((seq, base.clone()));
        self.realign(base, delta);
        true
    }

    fn realign(&mut self, base: &Path, delta: isize) {
        let at = base.len();
        let moving: Vec<Path> = self
            .access
            .keys()
            .filter(|p| {
                p.starts_with(base) && matches!(p.segments().get(at), Some(Segment::Index(_)))
            })
            .cloned()
            .collect();
        if moving.is_empty() {
            return;
        }

        let mut shifted: Vec<(Path, Vec<Subscription<C>>)> = Vec::with_capacity(moving.len());
        for path in moving {
            let Some(subscriptions) = self.access.remove(&path) else {
                continue;
            };
            let mut moved = path;
            if moved.shift_index(at, delta) {
                shifted.push((moved, subscriptions));
            } else {
                for s in &subscriptions {
                    self.live.remove(&s.id);
                }
            }
        }

        for (path, mut subscriptions) in shifted {
            let entry = self.access.entry(path).or_default();
            entry.append(&mut subscriptions);
            entry.sort_by_key(|s| s.id);
        }
        log::trace!("realigned access paths under {} by {}", base, delta);
    }
}

fn pending<'a, C>(
    path: &'a Path,
    subscriptions: &'a [Subscription<C>],
) -> impl Iterator<Item = Pending<C>> + 'a {
    subscriptions.iter().map(move |s| Pending {
        id: s.id,
        target: path.clone(),
        callback: Rc::clone(&s.callback),
    })
}
