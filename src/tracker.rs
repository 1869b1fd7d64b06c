//! Process-wide grid accounting
//!
//! The inversion allocates many padded grids and their combined footprint is
//! the dominant memory cost. A [`GridBudget`] counts live grids and bytes in
//! use; every grid holds a shared handle and reports its allocation and
//! release. Exceeding the soft limit records a diagnostic task and keeps
//! going; exceeding it with the hard ceiling armed terminates the process,
//! since continuing would risk silent out-of-memory corruption.
//!
//! The budget is an explicit object handed to grids at construction rather
//! than a global, so tests can inject their own.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, error, warn};

/// Shared handle to a [`GridBudget`]. The engine is single threaded.
pub type BudgetHandle = Rc<RefCell<GridBudget>>;

/// Live-grid and memory accounting with a soft limit and a hard ceiling.
#[derive(Debug)]
pub struct GridBudget {
    live: usize,
    peak_live: usize,
    bytes: usize,
    peak_bytes: usize,
    soft_limit: usize,
    terminate_on_overrun: bool,
    tasks: Vec<String>,
}

impl GridBudget {
    /// Create a budget allowing `soft_limit` live grids before complaining.
    pub fn new(soft_limit: usize) -> Self {
        GridBudget {
            live: 0,
            peak_live: 0,
            bytes: 0,
            peak_bytes: 0,
            soft_limit,
            terminate_on_overrun: false,
            tasks: Vec::new(),
        }
    }

    /// Create a shared handle, ready to pass to grids.
    pub fn handle(soft_limit: usize) -> BudgetHandle {
        Rc::new(RefCell::new(GridBudget::new(soft_limit)))
    }

    /// Arm the hard ceiling: overrunning the limit terminates the process.
    pub fn terminate_on_overrun(&mut self, terminate: bool) {
        self.terminate_on_overrun = terminate;
    }

    pub fn live(&self) -> usize {
        self.live
    }

    pub fn peak_live(&self) -> usize {
        self.peak_live
    }

    pub fn bytes_in_use(&self) -> usize {
        self.bytes
    }

    pub fn peak_bytes(&self) -> usize {
        self.peak_bytes
    }

    /// Diagnostic tasks recorded when the soft limit was exceeded.
    pub fn tasks(&self) -> &[String] {
        &self.tasks
    }

    /// Record a newly allocated grid of `bytes` bytes.
    pub(crate) fn register(&mut self, bytes: usize) {
        self.live += 1;
        self.peak_live = self.peak_live.max(self.live);

        if self.live > self.soft_limit {
            if self.terminate_on_overrun {
                error!(
                    live = self.live,
                    limit = self.soft_limit,
                    "allocated too many grids; the configured grid budget must be raised"
                );
                std::process::exit(1);
            } else if self.live == self.soft_limit + 1 {
                warn!(
                    live = self.live,
                    limit = self.soft_limit,
                    "grid budget exceeded; results are unaffected but memory use \
                     is higher than planned"
                );
                self.tasks.push(format!(
                    "The inversion needs more grid memory than expected \
                     ({} grids live, {} budgeted). The results are still correct.",
                    self.live, self.soft_limit
                ));
            }
        }

        self.bytes += bytes;
        if self.bytes > self.peak_bytes {
            self.peak_bytes = self.bytes;
            debug!(
                live = self.live,
                mb = self.bytes as f64 / (1024.0 * 1024.0),
                "new grid memory peak"
            );
        }
    }

    /// Record the release of a grid of `bytes` bytes.
    pub(crate) fn unregister(&mut self, bytes: usize) {
        debug_assert!(self.live > 0);
        self.live = self.live.saturating_sub(1);
        self.bytes = self.bytes.saturating_sub(bytes);
        debug!(live = self.live, "grid released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_unregister() {
        let mut budget = GridBudget::new(4);
        budget.register(1000);
        budget.register(2000);
        assert_eq!(budget.live(), 2);
        assert_eq!(budget.bytes_in_use(), 3000);
        budget.unregister(1000);
        assert_eq!(budget.live(), 1);
        assert_eq!(budget.bytes_in_use(), 2000);
        assert_eq!(budget.peak_live(), 2);
        assert_eq!(budget.peak_bytes(), 3000);
    }

    #[test]
    fn test_soft_limit_records_one_task() {
        let mut budget = GridBudget::new(1);
        budget.register(100);
        assert!(budget.tasks().is_empty());
        budget.register(100);
        assert_eq!(budget.tasks().len(), 1);
        // Going further past the limit does not repeat the task.
        budget.register(100);
        assert_eq!(budget.tasks().len(), 1);
    }
}
