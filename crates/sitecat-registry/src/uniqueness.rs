//! Deferred, debounced uniqueness checks.
//!
//! Every call to [`UniquenessChecker::check`] takes a new generation
//! number. After the debounce period the check runs against the latest
//! published tree, but only if no newer check was started meanwhile;
//! otherwise it resolves to [`CheckOutcome::Superseded`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use sitecat_core::tree::SiteTree;
use sitecat_core::validation::uniqueness::{Conflict, MatchMode, NameCandidate, UniquenessRules};
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Resolved(Vec<Conflict>),
    /// A newer check (or a cancellation) replaced this one.
    Superseded,
}

#[derive(Debug, Clone)]
pub struct UniquenessChecker {
    sites: watch::Receiver<Arc<SiteTree>>,
    generation: Arc<AtomicU64>,
    debounce: Duration,
    mode: MatchMode,
}

impl UniquenessChecker {
    pub fn new(sites: watch::Receiver<Arc<SiteTree>>, debounce: Duration, mode: MatchMode) -> Self {
        Self {
            sites,
            generation: Arc::new(AtomicU64::new(0)),
            debounce,
            mode,
        }
    }

    /// Start a check for `candidate`, excluding the site being edited.
    ///
    /// The generation is taken when this is called, not when the
    /// returned future is first polled.
    pub fn check(
        &self,
        candidate: NameCandidate,
        exclude: Option<Uuid>,
    ) -> impl Future<Output = CheckOutcome> + Send + 'static {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let this = self.clone();
        async move {
            tokio::time::sleep(this.debounce).await;
            if !this.is_current(ticket) {
                debug!(ticket, "Uniqueness check superseded before running");
                return CheckOutcome::Superseded;
            }
            let tree = Arc::clone(&this.sites.borrow());
            let conflicts = this.run(&tree, &candidate, exclude);
            if this.is_current(ticket) {
                CheckOutcome::Resolved(conflicts)
            } else {
                CheckOutcome::Superseded
            }
        }
    }

    /// Check immediately against the latest tree, without debounce.
    pub fn check_now(&self, candidate: &NameCandidate, exclude: Option<Uuid>) -> Vec<Conflict> {
        let tree = Arc::clone(&self.sites.borrow());
        self.run(&tree, candidate, exclude)
    }

    /// Supersede every check in flight.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn is_current(&self, ticket: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket
    }

    fn run(&self, tree: &SiteTree, candidate: &NameCandidate, exclude: Option<Uuid>) -> Vec<Conflict> {
        let rules = UniquenessRules::new(tree, self.mode);
        match exclude {
            Some(id) => rules.excluding(id).check(candidate),
            None => rules.check(candidate),
        }
    }
}
