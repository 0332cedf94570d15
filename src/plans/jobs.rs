use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use uuid::Uuid;

/// In-process single-flight registry: at most one live generation job per
/// user. Claims carry a job id so a stale task (or the watchdog racing it)
/// can never release a slot a newer job holds. Correct for a single instance
/// only; running multiple instances duplicates generation work but stays
/// safe because cache writes are last-writer-wins over re-derivable content.
#[derive(Clone, Default)]
pub struct JobRegistry {
    inner: Arc<Mutex<HashMap<Uuid, u64>>>,
    next_id: Arc<AtomicU64>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the user's job slot. Returns the claim's job id, or `None` when
    /// a job is already live.
    pub fn try_begin(&self, user_id: Uuid) -> Option<u64> {
        let mut inner = self.inner.lock().expect("job registry lock");
        if inner.contains_key(&user_id) {
            None
        } else {
            let job_id = self.next_id.fetch_add(1, Ordering::Relaxed);
            inner.insert(user_id, job_id);
            Some(job_id)
        }
    }

    pub fn is_live(&self, user_id: Uuid) -> bool {
        self.inner
            .lock()
            .expect("job registry lock")
            .contains_key(&user_id)
    }

    /// True while `job_id` is the claim currently holding the user's slot.
    pub fn holds(&self, user_id: Uuid, job_id: u64) -> bool {
        self.inner
            .lock()
            .expect("job registry lock")
            .get(&user_id)
            .is_some_and(|held| *held == job_id)
    }

    /// Release the slot, but only if `job_id` still holds it. A late finish
    /// from a job the watchdog already replaced is a no-op.
    pub fn finish(&self, user_id: Uuid, job_id: u64) {
        let mut inner = self.inner.lock().expect("job registry lock");
        if inner.get(&user_id) == Some(&job_id) {
            inner.remove(&user_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_begin_for_same_user_is_rejected() {
        let jobs = JobRegistry::new();
        let user = Uuid::new_v4();
        let job = jobs.try_begin(user).expect("slot free");
        assert!(jobs.try_begin(user).is_none());
        assert!(jobs.is_live(user));
        jobs.finish(user, job);
        assert!(!jobs.is_live(user));
        assert!(jobs.try_begin(user).is_some());
    }

    #[test]
    fn users_do_not_interfere() {
        let jobs = JobRegistry::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let job_a = jobs.try_begin(a).expect("slot free");
        assert!(jobs.try_begin(b).is_some());
        jobs.finish(a, job_a);
        assert!(jobs.is_live(b));
    }

    #[test]
    fn finish_is_idempotent() {
        let jobs = JobRegistry::new();
        let user = Uuid::new_v4();
        let job = jobs.try_begin(user).expect("slot free");
        jobs.finish(user, job);
        jobs.finish(user, job);
        assert!(!jobs.is_live(user));
    }

    #[test]
    fn stale_finish_does_not_release_a_newer_claim() {
        // A stalled job the watchdog already freed completes late, after a
        // new claim took the slot. Its finish must not open the gate for a
        // duplicate.
        let jobs = JobRegistry::new();
        let user = Uuid::new_v4();
        let first = jobs.try_begin(user).expect("slot free");
        jobs.finish(user, first);
        let second = jobs.try_begin(user).expect("slot free again");
        jobs.finish(user, first);
        assert!(jobs.is_live(user));
        assert!(jobs.holds(user, second));
        assert!(jobs.try_begin(user).is_none());
        jobs.finish(user, second);
        assert!(!jobs.is_live(user));
    }
}
