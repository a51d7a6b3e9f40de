//! Reference-counted cycles, leaks, and reclamation.
//!
//! Nodes here count their own destructor runs through a shared [`DropTally`],
//! so a report can say exactly how many of the nodes built for a scenario
//! were actually reclaimed. Three scenarios are covered:
//!
//! - a pair of [`StrongNode`]s linked into a cycle, which stays allocated
//!   after every handle is gone;
//! - the same shape severed with [`StrongNode::unlink`] before release,
//!   which reclaims both nodes;
//! - a pair of [`WeakNode`]s whose links never keep each other alive.
//!
//! A weak observer is held across each release so the report can also say
//! whether the nodes are still reachable through an upgrade.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::trace;

/// Shared counter of destructor runs.
///
/// Clones share the same counter, so one tally can watch a whole graph.
#[derive(Debug, Clone, Default)]
pub struct DropTally {
    drops: Arc<AtomicUsize>,
}

impl DropTally {
    /// Create a tally starting at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Destructor runs observed so far.
    #[must_use]
    pub fn count(&self) -> usize {
        self.drops.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

/// A named node that holds a strong link to its successor.
///
/// Linking two of these into a ring keeps both alive even after every
/// outside handle has been dropped.
pub struct StrongNode {
    name: String,
    next: RefCell<Option<Rc<StrongNode>>>,
    tally: DropTally,
}

impl StrongNode {
    /// Create an unlinked node reporting to the given tally.
    #[must_use]
    pub fn new(name: impl Into<String>, tally: DropTally) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            next: RefCell::new(None),
            tally,
        })
    }

    /// Point `from` at `to`, keeping `to` alive through the link.
    pub fn link(from: &Rc<Self>, to: &Rc<Self>) {
        *from.next.borrow_mut() = Some(Rc::clone(to));
    }

    /// Clear the node's outgoing link.
    pub fn unlink(node: &Rc<Self>) {
        *node.next.borrow_mut() = None;
    }

    /// The node this one points at, if any.
    #[must_use]
    pub fn next(&self) -> Option<Rc<Self>> {
        self.next.borrow().clone()
    }

    /// The node's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Strong handles currently keeping the node alive.
    #[must_use]
    pub fn strong_count(node: &Rc<Self>) -> usize {
        Rc::strong_count(node)
    }
}

impl Drop for StrongNode {
    fn drop(&mut self) {
        trace!(name = %self.name, "dropping node");
        self.tally.bump();
    }
}

impl fmt::Debug for StrongNode {
    // Deriving Debug would follow `next` around the cycle forever.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrongNode")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A named node that holds only a weak link to its successor.
///
/// The link can be followed while the successor is alive but never keeps
/// it alive.
pub struct WeakNode {
    name: String,
    next: RefCell<Option<Weak<WeakNode>>>,
    tally: DropTally,
}

impl WeakNode {
    /// Create an unlinked node reporting to the given tally.
    #[must_use]
    pub fn new(name: impl Into<String>, tally: DropTally) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            next: RefCell::new(None),
            tally,
        })
    }

    /// Point `from` at `to` without keeping `to` alive.
    pub fn link(from: &Rc<Self>, to: &Rc<Self>) {
        *from.next.borrow_mut() = Some(Rc::downgrade(to));
    }

    /// Clear the node's outgoing link.
    pub fn unlink(node: &Rc<Self>) {
        *node.next.borrow_mut() = None;
    }

    /// Follow the link, returning the successor if it is still alive.
    #[must_use]
    pub fn next(&self) -> Option<Rc<Self>> {
        self.next.borrow().as_ref().and_then(Weak::upgrade)
    }

    /// The node's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Strong handles currently keeping the node alive.
    #[must_use]
    pub fn strong_count(node: &Rc<Self>) -> usize {
        Rc::strong_count(node)
    }
}

impl Drop for WeakNode {
    fn drop(&mut self) {
        trace!(name = %self.name, "dropping node");
        self.tally.bump();
    }
}

impl fmt::Debug for WeakNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakNode")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// What happened to one node graph after its handles were released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Nodes built for the scenario.
    pub nodes: usize,
    /// Destructors that actually ran.
    pub dropped: usize,
    /// Whether a weak observer could still upgrade after release.
    pub observer_alive: bool,
}

impl CycleReport {
    /// True when some nodes stayed allocated past their last handle.
    #[must_use]
    pub fn leaked(&self) -> bool {
        self.dropped < self.nodes
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} nodes, {} dropped, observer {}",
            self.nodes,
            self.dropped,
            if self.observer_alive {
                "still upgrades"
            } else {
                "gone"
            }
        )
    }
}

/// Reports for all three cycle scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CycleDemo {
    /// Strong two-node ring, links left in place.
    pub strong: CycleReport,
    /// Two nodes joined by weak links.
    pub weak: CycleReport,
    /// Strong ring with one link severed before release.
    pub broken: CycleReport,
}

/// Build a two-node strong ring, release the handles, and report.
///
/// The ring keeps itself alive, so the pair stays allocated for the rest
/// of the process.
#[must_use]
pub fn strong_cycle_report() -> CycleReport {
    let tally = DropTally::new();
    let observer;
    {
        let a = StrongNode::new("a", tally.clone());
        let b = StrongNode::new("b", tally.clone());
        StrongNode::link(&a, &b);
        StrongNode::link(&b, &a);
        observer = Rc::downgrade(&a);
    }
    CycleReport {
        nodes: 2,
        dropped: tally.count(),
        observer_alive: observer.upgrade().is_some(),
    }
}

/// Build two weakly linked nodes, release the handles, and report.
#[must_use]
pub fn weak_cycle_report() -> CycleReport {
    let tally = DropTally::new();
    let observer;
    {
        let a = WeakNode::new("a", tally.clone());
        let b = WeakNode::new("b", tally.clone());
        WeakNode::link(&a, &b);
        WeakNode::link(&b, &a);
        observer = Rc::downgrade(&a);
    }
    CycleReport {
        nodes: 2,
        dropped: tally.count(),
        observer_alive: observer.upgrade().is_some(),
    }
}

/// Build a strong ring, sever one link, release the handles, and report.
#[must_use]
pub fn broken_cycle_report() -> CycleReport {
    let tally = DropTally::new();
    let observer;
    {
        let a = StrongNode::new("a", tally.clone());
        let b = StrongNode::new("b", tally.clone());
        StrongNode::link(&a, &b);
        StrongNode::link(&b, &a);
        observer = Rc::downgrade(&a);
        StrongNode::unlink(&a);
    }
    CycleReport {
        nodes: 2,
        dropped: tally.count(),
        observer_alive: observer.upgrade().is_some(),
    }
}

/// Run all three scenarios.
#[must_use]
pub fn run_cycle_demo() -> CycleDemo {
    CycleDemo {
        strong: strong_cycle_report(),
        weak: weak_cycle_report(),
        broken: broken_cycle_report(),
    }
}
