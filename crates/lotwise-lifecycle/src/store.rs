//! Suggestion storage with optimistic concurrency.
//!
//! `update` applies a mutation only if the stored version still equals
//! the version the caller read. The mutation runs on a copy that is
//! committed only if it succeeds, so a failed transition leaves the
//! stored record untouched.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use lotwise_core::SuggestionId;
use tracing::debug;

use crate::error::{LifecycleError, LifecycleResult};
use crate::status::SuggestionStatus;
use crate::suggestion::TradeSuggestion;

/// Persistent home of trade suggestions. Records are never deleted.
pub trait SuggestionStore: Send + Sync {
    fn insert(&self, suggestion: TradeSuggestion) -> LifecycleResult<()>;

    fn get(&self, id: &SuggestionId) -> LifecycleResult<TradeSuggestion>;

    /// All records, oldest first.
    fn list(&self) -> Vec<TradeSuggestion>;

    /// Mutate a record if its version is still `expected_version`.
    ///
    /// Returns the committed record.
    fn update(
        &self,
        id: &SuggestionId,
        expected_version: u64,
        mutate: &mut dyn FnMut(&mut TradeSuggestion) -> LifecycleResult<()>,
    ) -> LifecycleResult<TradeSuggestion>;

    /// Records whose stored status is `status`.
    fn list_by_status(&self, status: SuggestionStatus) -> Vec<TradeSuggestion> {
        self.list()
            .into_iter()
            .filter(|s| s.status() == status)
            .collect()
    }
}

/// Arc wrapper for SuggestionStore trait objects.
pub type SharedSuggestionStore = Arc<dyn SuggestionStore>;

/// In-process store backed by `DashMap`.
///
/// The shard write lock held by `get_mut` makes check-and-swap atomic per
/// record while leaving other records free for concurrent updates.
#[derive(Debug, Default)]
pub struct InMemorySuggestionStore {
    records: DashMap<SuggestionId, TradeSuggestion>,
}

impl InMemorySuggestionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl SuggestionStore for InMemorySuggestionStore {
    fn insert(&self, suggestion: TradeSuggestion) -> LifecycleResult<()> {
        match self.records.entry(suggestion.id().clone()) {
            Entry::Occupied(entry) => Err(LifecycleError::AlreadyExists(entry.key().clone())),
            Entry::Vacant(entry) => {
                debug!(id = %suggestion.id(), "Suggestion stored");
                entry.insert(suggestion);
                Ok(())
            }
        }
    }

    fn get(&self, id: &SuggestionId) -> LifecycleResult<TradeSuggestion> {
        self.records
            .get(id)
            .map(|r| r.value().clone())
            .ok_or_else(|| LifecycleError::NotFound(id.clone()))
    }

    fn list(&self) -> Vec<TradeSuggestion> {
        let mut all: Vec<TradeSuggestion> =
            self.records.iter().map(|r| r.value().clone()).collect();
        all.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        all
    }

    fn update(
        &self,
        id: &SuggestionId,
        expected_version: u64,
        mutate: &mut dyn FnMut(&mut TradeSuggestion) -> LifecycleResult<()>,
    ) -> LifecycleResult<TradeSuggestion> {
        let mut stored = self
            .records
            .get_mut(id)
            .ok_or_else(|| LifecycleError::NotFound(id.clone()))?;

        if stored.version() != expected_version {
            return Err(LifecycleError::Conflict {
                id: id.clone(),
                expected: expected_version,
                actual: stored.version(),
            });
        }

        let mut draft = stored.clone();
        mutate(&mut draft)?;
        *stored = draft.clone();
        Ok(draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suggestion::TransitionMeta;
    use chrono::{Duration, TimeZone, Utc};
    use lotwise_core::{Direction, Instrument, MarginSource, Price};
    use lotwise_sizing::SizingResult;
    use rust_decimal_macros::dec;
    use std::sync::Barrier;
    use std::thread;

    fn suggestion() -> TradeSuggestion {
        let sizing = SizingResult {
            recommended_lots: 4,
            max_affordable_lots: 8,
            safety_lots: 4,
            risk_based_lots: None,
            margin_required: dec!(400000),
            margin_utilization_pct: dec!(50),
            margin_per_lot: dec!(100000),
            margin_source: MarginSource::Estimated,
            price: Price::new(dec!(51000)),
            lot_size: 15,
            averaging_plan: Vec::new(),
        };
        TradeSuggestion::new(
            Instrument::new("BANKNIFTY"),
            Direction::Short,
            sizing,
            Utc.with_ymd_and_hms(2026, 3, 2, 9, 30, 0).unwrap(),
            Duration::hours(24),
        )
    }

    fn take(now: chrono::DateTime<Utc>) -> impl FnMut(&mut TradeSuggestion) -> LifecycleResult<()> {
        move |s: &mut TradeSuggestion| {
            s.apply(SuggestionStatus::Taken, &TransitionMeta::default(), now)
                .map(|_| ())
        }
    }

    #[test]
    fn test_insert_get_and_duplicate() {
        let store = InMemorySuggestionStore::new();
        let s = suggestion();
        let id = s.id().clone();

        store.insert(s.clone()).unwrap();
        assert_eq!(store.get(&id).unwrap(), s);
        assert!(matches!(
            store.insert(s),
            Err(LifecycleError::AlreadyExists(_))
        ));
        assert!(matches!(
            store.get(&SuggestionId::from_string("sug_missing".to_string())),
            Err(LifecycleError::NotFound(_))
        ));
    }

    #[test]
    fn test_update_with_stale_version_conflicts() {
        let store = InMemorySuggestionStore::new();
        let s = suggestion();
        let id = s.id().clone();
        let now = s.created_at();
        store.insert(s).unwrap();

        let updated = store.update(&id, 1, &mut take(now)).unwrap();
        assert_eq!(updated.status(), SuggestionStatus::Taken);
        assert_eq!(updated.version(), 2);

        let err = store.update(&id, 1, &mut take(now)).unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::Conflict {
                expected: 1,
                actual: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_failed_mutation_is_not_committed() {
        let store = InMemorySuggestionStore::new();
        let s = suggestion();
        let id = s.id().clone();
        let expired = s.expires_at() + Duration::seconds(1);
        store.insert(s).unwrap();

        let err = store.update(&id, 1, &mut take(expired)).unwrap_err();
        assert!(matches!(err, LifecycleError::Expired { .. }));

        let stored = store.get(&id).unwrap();
        assert_eq!(stored.status(), SuggestionStatus::Suggested);
        assert_eq!(stored.version(), 1);
    }

    #[test]
    fn test_concurrent_take_only_one_wins() {
        let store = Arc::new(InMemorySuggestionStore::new());
        let s = suggestion();
        let id = s.id().clone();
        let now = s.created_at();
        store.insert(s).unwrap();

        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                let id = id.clone();
                thread::spawn(move || {
                    barrier.wait();
                    store.update(&id, 1, &mut take(now)).is_ok()
                })
            })
            .collect();

        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(wins, 1);
        assert_eq!(store.get(&id).unwrap().history().len(), 1);
    }

    #[test]
    fn test_list_by_status() {
        let store = InMemorySuggestionStore::new();
        let a = suggestion();
        let b = suggestion();
        let b_id = b.id().clone();
        let now = b.created_at();
        store.insert(a).unwrap();
        store.insert(b).unwrap();
        store.update(&b_id, 1, &mut take(now)).unwrap();

        assert_eq!(store.list().len(), 2);
        assert_eq!(store.list_by_status(SuggestionStatus::Suggested).len(), 1);
        assert_eq!(store.list_by_status(SuggestionStatus::Taken)[0].id(), &b_id);
    }
}
