use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, MutexGuard,
};

type Observer<T> = Arc<dyn Fn(&T) + Send + Sync + 'static>;

/// Handle returned by [`Observable::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Cell<T> {
    value: T,
    observers: Vec<(SubscriptionId, Observer<T>)>,
}

/// A value plus the observers that want to hear when it changes.
///
/// Observers run synchronously on the thread calling [`Observable::set`],
/// after the cell's lock has been released, so they may read or subscribe to
/// the same cell.
pub struct Observable<T> {
    cell: Arc<Mutex<Cell<T>>>,
    next_id: Arc<AtomicU64>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
            next_id: self.next_id.clone(),
        }
    }
}

impl<T> Observable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(value: T) -> Self {
        Self {
            cell: Arc::new(Mutex::new(Cell {
                value,
                observers: Vec::new(),
            })),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Cell<T>> {
        match self.cell.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn get(&self) -> T {
        self.lock().value.clone()
    }

    /// Stores `value` and notifies observers if it differs from the current one.
    /// Returns whether a change happened.
    pub fn set(&self, value: T) -> bool {
        self.store(value, false)
    }

    /// Stores `value` and notifies observers even when it equals the current
    /// one. One-shot events use this so a repeated event is delivered again.
    pub fn raise(&self, value: T) {
        self.store(value, true);
    }

    fn store(&self, value: T, always_notify: bool) -> bool {
        let observers: Vec<Observer<T>> = {
            let mut guard = self.lock();
            if !always_notify && guard.value == value {
                return false;
            }
            guard.value = value.clone();
            guard.observers.iter().map(|(_, f)| f.clone()).collect()
        };

        for observer in observers {
            observer(&value);
        }
        true
    }

    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().observers.push((id, Arc::new(observer)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut guard = self.lock();
        let before = guard.observers.len();
        guard.observers.retain(|(existing, _)| *existing != id);
        guard.observers.len() != before
    }

    #[cfg(test)]
    fn observer_count(&self) -> usize {
        self.lock().observers.len()
    }

    /// A cell whose value is `f(source)`, recomputed whenever this one changes.
    pub fn map<U, F>(&self, f: F) -> Observable<U>
    where
        U: Clone + PartialEq + Send + Sync + 'static,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        let derived = Observable::new(f(&self.get()));
        let target = derived.clone();
        self.subscribe(move |value| {
            target.set(f(value));
        });
        derived
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[test]
    fn set_notifies_only_on_change() {
        let cell = Observable::new(0);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        cell.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(cell.set(1));
        assert!(!cell.set(1));
        assert!(cell.set(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cell.get(), 2);
    }

    #[test]
    fn raise_notifies_for_repeated_values() {
        let cell = Observable::new(false);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        cell.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        cell.raise(true);
        cell.raise(true);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cell.get());
    }

    #[test]
    fn unsubscribed_observers_stop_hearing() {
        let cell = Observable::new(String::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let id = cell.subscribe(move |value: &String| sink.lock().unwrap().push(value.clone()));

        cell.set("a".to_string());
        assert!(cell.unsubscribe(id));
        assert!(!cell.unsubscribe(id));
        cell.set("b".to_string());

        assert_eq!(*seen.lock().unwrap(), vec!["a".to_string()]);
        assert_eq!(cell.observer_count(), 0);
    }

    #[test]
    fn derived_cells_follow_their_source() {
        let source: Observable<Option<i64>> = Observable::new(None);
        let is_empty = source.map(|value| value.is_none());
        assert!(is_empty.get());

        source.set(Some(3));
        assert!(!is_empty.get());

        source.set(None);
        assert!(is_empty.get());
    }

    #[test]
    fn observers_may_read_the_cell_they_watch() {
        let cell = Observable::new(1);
        let reader = cell.clone();
        let seen = Arc::new(AtomicUsize::new(0));
        let sink = seen.clone();
        cell.subscribe(move |_| {
            sink.store(reader.get() as usize, Ordering::SeqCst);
        });

        cell.set(5);
        assert_eq!(seen.load(Ordering::SeqCst), 5);
    }
}
