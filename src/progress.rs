// src/progress.rs

//! Hierarchical progress reporting and cancellation
//!
//! Every long-running operation (metadata load, download, resolve) is
//! threaded through a [`Progress`] node. A node is configured with a step
//! count or an explicit weighted step list exactly once, then driven to
//! completion with [`Progress::done`]. Sub-operations get a child node via
//! [`Progress::child`]; a child driven to completion advances its parent
//! by the current step's weight, so nested operations report one coherent
//! 0-100% value at the root without any layer knowing the others' scales.
//!
//! Cancellation is cooperative: the whole tree shares one flag, leaf I/O
//! polls it between chunks via [`Progress::check_cancelled`], and
//! [`Progress::set_allow_cancel`] masks it over critical sections.

use crate::error::{Error, Result};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::debug;

/// Shared cancellation state for one progress tree
struct CancelFlag {
    cancelled: Cell<bool>,
    allow_cancel: Cell<bool>,
}

type ReportFn = Rc<dyn Fn(u32)>;

struct Inner {
    /// Step weights; empty until the node is configured
    steps: Vec<u32>,
    /// Number of completed steps
    current: usize,
    /// Last reported percentage, kept monotonic
    percentage: u32,
    on_change: Option<ReportFn>,
    parent: Option<Rc<RefCell<Inner>>>,
    cancel: Rc<CancelFlag>,
}

impl Inner {
    fn total_weight(&self) -> u32 {
        self.steps.iter().sum()
    }

    /// Percentage covered by the completed steps
    fn base_percentage(&self) -> u32 {
        let total = self.total_weight();
        if total == 0 {
            return 0;
        }
        let completed: u32 = self.steps[..self.current].iter().sum();
        completed * 100 / total
    }

    /// Map a child percentage into this node's scale without advancing
    fn partial_percentage(&self, child_percentage: u32) -> u32 {
        let total = self.total_weight();
        if total == 0 || self.current >= self.steps.len() {
            return self.percentage;
        }
        let completed: u32 = self.steps[..self.current].iter().sum();
        (completed * 100 + child_percentage * self.steps[self.current]) / total
    }
}

/// One node of the progress tree
///
/// Cloning a `Progress` yields another handle to the same node.
#[derive(Clone)]
pub struct Progress {
    inner: Rc<RefCell<Inner>>,
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}

impl Progress {
    /// Create a new root node
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                steps: Vec::new(),
                current: 0,
                percentage: 0,
                on_change: None,
                parent: None,
                cancel: Rc::new(CancelFlag {
                    cancelled: Cell::new(false),
                    allow_cancel: Cell::new(true),
                }),
            })),
        }
    }

    /// Register a callback observing this node's percentage changes
    pub fn set_report_fn<F: Fn(u32) + 'static>(&self, report: F) {
        self.inner.borrow_mut().on_change = Some(Rc::new(report));
    }

    /// Configure the node with `count` equal-weight steps.
    ///
    /// Configuring a node twice is a programming error.
    pub fn set_steps(&self, count: usize) -> Result<()> {
        self.set_step_weights(&vec![1; count])
    }

    /// Configure the node with explicitly weighted steps.
    ///
    /// The weights are normalized and need not sum to 100.
    pub fn set_step_weights(&self, weights: &[u32]) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        if !inner.steps.is_empty() {
            return Err(Error::InvalidState(
                "progress steps already configured".to_string(),
            ));
        }
        if weights.is_empty() {
            return Err(Error::InvalidState(
                "cannot configure zero progress steps".to_string(),
            ));
        }
        inner.steps = weights.to_vec();
        Ok(())
    }

    /// Current percentage, 0-100
    pub fn percentage(&self) -> u32 {
        self.inner.borrow().percentage
    }

    /// Get a child node representing the current step's sub-progress.
    ///
    /// Driving the child to completion advances this node by one step, so
    /// callers must not also call [`Progress::done`] for that step.
    pub fn child(&self) -> Result<Progress> {
        let inner = self.inner.borrow();
        if inner.steps.is_empty() {
            return Err(Error::InvalidState(
                "cannot get child of an unconfigured progress node".to_string(),
            ));
        }
        if inner.current >= inner.steps.len() {
            return Err(Error::InvalidState(
                "cannot get child: all steps already completed".to_string(),
            ));
        }
        Ok(Progress {
            inner: Rc::new(RefCell::new(Inner {
                steps: Vec::new(),
                current: 0,
                percentage: 0,
                on_change: None,
                parent: Some(Rc::clone(&self.inner)),
                cancel: Rc::clone(&inner.cancel),
            })),
        })
    }

    /// Mark the current step as completed.
    ///
    /// Advancing past the configured step count, or advancing a node with
    /// no configured steps, is a programming error.
    pub fn done(&self) -> Result<()> {
        let (complete, parent) = {
            let mut inner = self.inner.borrow_mut();
            if inner.steps.is_empty() {
                return Err(Error::InvalidState(
                    "done() called with no steps configured".to_string(),
                ));
            }
            if inner.current >= inner.steps.len() {
                return Err(Error::InvalidState(format!(
                    "done() called more than the configured {} steps",
                    inner.steps.len()
                )));
            }
            inner.current += 1;
            (inner.current == inner.steps.len(), inner.parent.clone())
        };
        let percentage = self.inner.borrow().base_percentage();
        report(&self.inner, percentage);

        // a completed child advances its parent by the step weight
        if complete
            && let Some(parent) = parent
        {
            return Progress { inner: parent }.done();
        }
        Ok(())
    }

    /// Jump straight to completion, skipping any remaining steps.
    ///
    /// Valid on an unconfigured node, which is treated as one big step.
    pub fn finished(&self) -> Result<()> {
        let parent = {
            let mut inner = self.inner.borrow_mut();
            if inner.steps.is_empty() {
                inner.steps = vec![1];
            }
            if inner.current == inner.steps.len() {
                // already complete, nothing to do
                return Ok(());
            }
            inner.current = inner.steps.len();
            inner.parent.clone()
        };
        report(&self.inner, 100);
        if let Some(parent) = parent {
            return Progress { inner: parent }.done();
        }
        Ok(())
    }

    /// Directly report a percentage on a leaf node.
    ///
    /// Only valid on a node with no configured steps: leaves that track
    /// continuous progress (byte counts of a download) use this instead
    /// of subdividing into steps.
    pub fn set_percentage(&self, percentage: u32) -> Result<()> {
        if !self.inner.borrow().steps.is_empty() {
            return Err(Error::InvalidState(
                "cannot set a direct percentage on a stepped node".to_string(),
            ));
        }
        report(&self.inner, percentage.min(100));
        Ok(())
    }

    /// Request cancellation of the whole tree
    pub fn cancel(&self) {
        debug!("cancellation requested");
        self.inner.borrow().cancel.cancelled.set(true);
    }

    /// Whether a cancellation has been requested, regardless of masking
    pub fn is_cancelled(&self) -> bool {
        self.inner.borrow().cancel.cancelled.get()
    }

    /// Mask or unmask cancellation over a critical section
    pub fn set_allow_cancel(&self, allow: bool) {
        self.inner.borrow().cancel.allow_cancel.set(allow);
    }

    pub fn allow_cancel(&self) -> bool {
        self.inner.borrow().cancel.allow_cancel.get()
    }

    /// Bail out with [`Error::Cancelled`] if a cancellation request is
    /// pending and not masked. Long-running leaves poll this between
    /// chunks of work.
    pub fn check_cancelled(&self) -> Result<()> {
        let cancel = &self.inner.borrow().cancel;
        if cancel.cancelled.get() && cancel.allow_cancel.get() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}

/// Store a new percentage on a node and propagate it up the tree
fn report(node: &Rc<RefCell<Inner>>, percentage: u32) {
    let (on_change, parent, parent_percentage) = {
        let mut inner = node.borrow_mut();
        // percentage never goes backwards
        if percentage <= inner.percentage {
            return;
        }
        inner.percentage = percentage;
        let parent = inner.parent.clone();
        let parent_percentage = parent
            .as_ref()
            .map(|p| p.borrow().partial_percentage(percentage));
        (inner.on_change.clone(), parent, parent_percentage)
    };
    if let Some(on_change) = on_change {
        on_change(percentage);
    }
    if let (Some(parent), Some(parent_percentage)) = (parent, parent_percentage) {
        report(&parent, parent_percentage);
    }
}
