//! Execution-local context stacks.
//!
//! A [`ContextStack`] keeps an independent LIFO stack of context objects per
//! execution identity. Identity is explicit: a tokio task id when running
//! inside a task, the OS thread id otherwise. Lookup happens on every
//! operation, so values never leak across tasks or threads.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Identity of the current execution context.
///
/// Tasks and plain threads get disjoint keys, so a stack pushed on a thread
/// is invisible to any tokio task running on that thread and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKey {
    /// A tokio task, identified by its task id.
    Task(tokio::task::Id),
    /// A plain OS thread.
    Thread(std::thread::ThreadId),
}

impl ContextKey {
    /// Returns the key for the current execution context.
    #[must_use]
    pub fn current() -> Self {
        tokio::task::try_id().map_or_else(|| Self::Thread(std::thread::current().id()), Self::Task)
    }
}

/// A per-task/thread LIFO stack of context objects.
///
/// Every operation resolves the current [`ContextKey`] fresh and works on
/// that identity's stack only.
///
/// # Example
///
/// ```
/// use rpckit_core::ContextStack;
///
/// let stack: ContextStack<u32> = ContextStack::new();
/// stack.push(1);
/// stack.push(2);
/// assert_eq!(stack.top(), Some(2));
/// assert_eq!(stack.pop(), Some(2));
/// assert_eq!(stack.pop(), Some(1));
/// assert_eq!(stack.pop(), None);
/// ```
#[derive(Debug)]
pub struct ContextStack<T> {
    slots: DashMap<ContextKey, Vec<T>>,
}

impl<T: Clone> ContextStack<T> {
    /// Creates an empty stack registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// Pushes a value onto the current identity's stack.
    pub fn push(&self, value: T) {
        self.slots.entry(ContextKey::current()).or_default().push(value);
    }

    /// Pops the top value off the current identity's stack.
    ///
    /// Returns `None` when the stack is empty. Popping the last element
    /// removes the identity's entry entirely, so short-lived tasks leave
    /// nothing behind.
    pub fn pop(&self) -> Option<T> {
        match self.slots.entry(ContextKey::current()) {
            Entry::Occupied(mut occupied) => {
                let value = occupied.get_mut().pop();
                if occupied.get().is_empty() {
                    occupied.remove();
                }
                value
            }
            Entry::Vacant(_) => None,
        }
    }

    /// Returns a clone of the top value without removing it.
    #[must_use]
    pub fn top(&self) -> Option<T> {
        self.slots
            .get(&ContextKey::current())
            .and_then(|stack| stack.last().cloned())
    }

    /// Drops the current identity's entire stack.
    pub fn release(&self) {
        self.slots.remove(&ContextKey::current());
    }

    /// Returns the depth of the current identity's stack.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.slots
            .get(&ContextKey::current())
            .map_or(0, |stack| stack.len())
    }

    /// Returns the number of identities currently holding a stack.
    #[must_use]
    pub fn identities(&self) -> usize {
        self.slots.len()
    }
}

impl<T: Clone> Default for ContextStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    #[test]
    fn test_push_pop_lifo() {
        let stack = ContextStack::new();
        stack.push("a");
        stack.push("b");
        stack.push("c");
        assert_eq!(stack.pop(), Some("c"));
        assert_eq!(stack.pop(), Some("b"));
        assert_eq!(stack.pop(), Some("a"));
        assert_eq!(stack.pop(), None);
    }

    #[test]
    fn test_top_is_non_destructive() {
        let stack = ContextStack::new();
        stack.push(7);
        assert_eq!(stack.top(), Some(7));
        assert_eq!(stack.top(), Some(7));
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn test_empty_pop_and_top() {
        let stack: ContextStack<u8> = ContextStack::new();
        assert_eq!(stack.pop(), None);
        assert_eq!(stack.top(), None);
    }

    #[test]
    fn test_entry_removed_when_emptied() {
        let stack = ContextStack::new();
        stack.push(1);
        assert_eq!(stack.identities(), 1);
        stack.pop();
        assert_eq!(stack.identities(), 0);
    }

    #[test]
    fn test_release_drops_whole_stack() {
        let stack = ContextStack::new();
        stack.push(1);
        stack.push(2);
        stack.release();
        assert_eq!(stack.pop(), None);
        assert_eq!(stack.identities(), 0);
    }

    #[test]
    fn test_thread_isolation() {
        let stack = Arc::new(ContextStack::new());
        stack.push(1);

        let other = Arc::clone(&stack);
        let handle = std::thread::spawn(move || {
            assert_eq!(other.top(), None);
            other.push(2);
            assert_eq!(other.pop(), Some(2));
        });
        handle.join().expect("thread panicked");

        assert_eq!(stack.top(), Some(1));
    }

    #[tokio::test]
    async fn test_task_isolation() {
        let stack = Arc::new(ContextStack::new());

        let a = Arc::clone(&stack);
        let b = Arc::clone(&stack);

        let task_a = tokio::spawn(async move {
            a.push("a");
            tokio::task::yield_now().await;
            assert_eq!(a.top(), Some("a"));
            assert_eq!(a.pop(), Some("a"));
        });
        let task_b = tokio::spawn(async move {
            b.push("b");
            tokio::task::yield_now().await;
            assert_eq!(b.top(), Some("b"));
            assert_eq!(b.pop(), Some("b"));
        });

        task_a.await.expect("task a panicked");
        task_b.await.expect("task b panicked");
        assert_eq!(stack.identities(), 0);
    }

    #[tokio::test]
    async fn test_task_and_thread_keys_are_disjoint() {
        let inside = tokio::spawn(async { ContextKey::current() })
            .await
            .expect("task panicked");
        assert!(matches!(inside, ContextKey::Task(_)));

        let outside = std::thread::spawn(ContextKey::current)
            .join()
            .expect("thread panicked");
        assert!(matches!(outside, ContextKey::Thread(_)));
    }

    proptest! {
        // Any interleaving of pushes and pops observes strict LIFO order.
        #[test]
        fn prop_lifo_order(ops in proptest::collection::vec(prop_oneof![
            (0u32..1000).prop_map(Some),
            Just(None),
        ], 0..64)) {
            let stack = ContextStack::new();
            let mut model = Vec::new();

            for op in ops {
                match op {
                    Some(value) => {
                        stack.push(value);
                        model.push(value);
                    }
                    None => {
                        prop_assert_eq!(stack.pop(), model.pop());
                    }
                }
                prop_assert_eq!(stack.top(), model.last().copied());
                prop_assert_eq!(stack.depth(), model.len());
            }

            // Drain so the identity entry is gone at the end.
            while stack.pop().is_some() {}
            prop_assert_eq!(stack.identities(), 0);
        }
    }
}
