//! Element types with observable construction, cloning, and destruction.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Shared log of dropped [`Tracked`] ids, in drop order.
#[derive(Clone, Debug, Default)]
pub struct DropLog {
    dropped: Rc<RefCell<Vec<u32>>>,
}

impl DropLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an element that reports to this log when dropped.
    pub fn track(&self, id: u32) -> Tracked {
        Tracked {
            id,
            log: self.clone(),
        }
    }

    /// Ids dropped so far, in order.
    pub fn dropped(&self) -> Vec<u32> {
        self.dropped.borrow().clone()
    }

    pub fn count(&self) -> usize {
        self.dropped.borrow().len()
    }
}

/// Element that appends its id to a [`DropLog`] on drop.
#[derive(Debug)]
pub struct Tracked {
    pub id: u32,
    log: DropLog,
}

impl Clone for Tracked {
    fn clone(&self) -> Self {
        self.log.track(self.id)
    }
}

impl PartialEq for Tracked {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.log.dropped.borrow_mut().push(self.id);
    }
}

/// Non-`Copy` element with heap-owned fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Person {
    pub name: String,
    pub birth_year: u32,
}

impl Person {
    pub fn new(name: &str, birth_year: u32) -> Self {
        Self {
            name: name.to_string(),
            birth_year,
        }
    }
}

/// Element whose `clone` panics once a shared budget of clones is spent.
#[derive(Debug)]
pub struct CloneBudget {
    pub id: u32,
    remaining: Rc<Cell<usize>>,
    log: DropLog,
}

impl CloneBudget {
    /// Elements sharing `remaining` may be cloned that many times in total.
    pub fn new(id: u32, remaining: &Rc<Cell<usize>>, log: &DropLog) -> Self {
        Self {
            id,
            remaining: Rc::clone(remaining),
            log: log.clone(),
        }
    }
}

impl Clone for CloneBudget {
    fn clone(&self) -> Self {
        let left = self.remaining.get();
        if left == 0 {
            panic!("clone budget exhausted at id {}", self.id);
        }
        self.remaining.set(left - 1);
        Self::new(self.id, &self.remaining, &self.log)
    }
}

impl Drop for CloneBudget {
    fn drop(&mut self) {
        self.log.dropped.borrow_mut().push(self.id);
    }
}
