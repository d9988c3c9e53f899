//! Single-slot duplicate-submission cache.

use std::time::{Duration, Instant};

use crate::error::ExecutionError;

/// The remembered outcome of the most recent command.
#[derive(Debug, Clone)]
pub struct CachedResult {
    /// Command text as submitted.
    pub command: String,
    /// Output or error the command produced.
    pub outcome: Result<String, ExecutionError>,
    /// When the outcome became known.
    pub completed_at: Instant,
}

/// Remembers only the last command a shell ran.
///
/// An identical command resubmitted within the cooldown gets the stored
/// outcome back instead of running again, so a client retry can never
/// execute a side-effecting command twice.
#[derive(Debug)]
pub struct DuplicateCache {
    cooldown: Duration,
    slot: Option<CachedResult>,
}

impl DuplicateCache {
    /// Create an empty cache.
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            slot: None,
        }
    }

    /// The cooldown window.
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// The currently remembered entry, fresh or not.
    pub fn last(&self) -> Option<&CachedResult> {
        self.slot.as_ref()
    }

    /// Look up `command` against the current time.
    pub fn lookup(&self, command: &str) -> Option<Result<String, ExecutionError>> {
        self.lookup_at(command, Instant::now())
    }

    /// Look up `command` as of `now`.
    ///
    /// Hits only when the text is byte-identical and strictly less than
    /// the cooldown has passed since completion.
    pub fn lookup_at(&self, command: &str, now: Instant) -> Option<Result<String, ExecutionError>> {
        let entry = self.slot.as_ref()?;
        if entry.command != command {
            return None;
        }
        let age = now.saturating_duration_since(entry.completed_at);
        (age < self.cooldown).then(|| entry.outcome.clone())
    }

    /// Remember `outcome` for `command`, completed now.
    pub fn record(&mut self, command: &str, outcome: &Result<String, ExecutionError>) {
        self.record_at(command, outcome, Instant::now());
    }

    /// Remember `outcome` for `command`, completed at `at`.
    pub fn record_at(
        &mut self,
        command: &str,
        outcome: &Result<String, ExecutionError>,
        at: Instant,
    ) {
        self.slot = Some(CachedResult {
            command: command.to_string(),
            outcome: outcome.clone(),
            completed_at: at,
        });
    }

    /// Forget the remembered entry.
    pub fn clear(&mut self) {
        self.slot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COOLDOWN: Duration = Duration::from_secs(60);

    #[test]
    fn test_empty_cache_misses() {
        let cache = DuplicateCache::new(COOLDOWN);
        assert!(cache.lookup("echo hello").is_none());
        assert!(cache.last().is_none());
    }

    #[test]
    fn test_hit_within_cooldown() {
        let mut cache = DuplicateCache::new(COOLDOWN);
        let t0 = Instant::now();
        cache.record_at("echo hello", &Ok("hello".into()), t0);

        let hit = cache.lookup_at("echo hello", t0 + Duration::from_secs(59));
        assert_eq!(hit, Some(Ok("hello".to_string())));
    }

    #[test]
    fn test_miss_at_cooldown_boundary() {
        let mut cache = DuplicateCache::new(COOLDOWN);
        let t0 = Instant::now();
        cache.record_at("echo hello", &Ok("hello".into()), t0);

        assert!(cache.lookup_at("echo hello", t0 + COOLDOWN).is_none());
        assert!(cache
            .lookup_at("echo hello", t0 + Duration::from_secs(120))
            .is_none());
    }

    #[test]
    fn test_requires_identical_text() {
        let mut cache = DuplicateCache::new(COOLDOWN);
        let t0 = Instant::now();
        cache.record_at("echo hello", &Ok("hello".into()), t0);

        assert!(cache.lookup_at("echo hello ", t0).is_none());
        assert!(cache.lookup_at("echo Hello", t0).is_none());
    }

    #[test]
    fn test_errors_are_replayed() {
        let mut cache = DuplicateCache::new(COOLDOWN);
        let t0 = Instant::now();
        let timeout = ExecutionError::Timeout(Duration::from_secs(300));
        cache.record_at("sleep 9999", &Err(timeout.clone()), t0);

        assert_eq!(cache.lookup_at("sleep 9999", t0), Some(Err(timeout)));
    }

    #[test]
    fn test_single_slot_overwritten() {
        let mut cache = DuplicateCache::new(COOLDOWN);
        let t0 = Instant::now();
        cache.record_at("echo a", &Ok("a".into()), t0);
        cache.record_at("echo b", &Ok("b".into()), t0);

        assert!(cache.lookup_at("echo a", t0).is_none());
        assert_eq!(cache.lookup_at("echo b", t0), Some(Ok("b".to_string())));
        assert_eq!(cache.last().map(|e| e.command.as_str()), Some("echo b"));
    }

    #[test]
    fn test_clear() {
        let mut cache = DuplicateCache::new(COOLDOWN);
        cache.record("pwd", &Ok("/".into()));
        cache.clear();
        assert!(cache.lookup("pwd").is_none());
    }

    #[test]
    fn test_clock_before_completion_counts_as_fresh() {
        let mut cache = DuplicateCache::new(COOLDOWN);
        let t0 = Instant::now();
        cache.record_at("ls", &Ok(String::new()), t0 + Duration::from_secs(1));
        assert!(cache.lookup_at("ls", t0).is_some());
    }
}
