//! BFS frontier for one namespace
//!
//! The frontier owns the queue of directories awaiting a scan and the set of
//! directories already dequeued. A path is marked visited when it is
//! dequeued, and a visited path is never handed out again, even if it was
//! discovered twice.

use std::collections::{BTreeSet, VecDeque};

/// Directory queue plus visited set, owned by a single scheduler
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frontier {
    queue: VecDeque<String>,
    visited: BTreeSet<String>,
}

impl Frontier {
    /// Fresh frontier holding only the share root
    pub fn with_root() -> Self {
        let mut frontier = Self::default();
        frontier.queue.push_back(String::new());
        frontier
    }

    /// Rebuild from checkpointed contents
    pub fn restore(queue: Vec<String>, visited: Vec<String>) -> Self {
        Self {
            queue: queue.into(),
            visited: visited.into_iter().collect(),
        }
    }

    /// Dequeue up to `width` unvisited paths, in insertion order, marking each visited
    pub fn next_wave(&mut self, width: usize) -> Vec<String> {
        let mut wave = Vec::with_capacity(width);
        while wave.len() < width {
            let Some(path) = self.queue.pop_front() else {
                break;
            };
            if self.visited.insert(path.clone()) {
                wave.push(path);
            }
        }
        wave
    }

    /// Queue a discovered directory unless it was already dequeued
    pub fn enqueue(&mut self, path: String) -> bool {
        if self.visited.contains(&path) {
            return false;
        }
        self.queue.push_back(path);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Paths waiting (duplicates included until they are skipped)
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    pub fn is_visited(&self, path: &str) -> bool {
        self.visited.contains(path)
    }

    /// Queue and visited set as checkpointed
    pub fn snapshot(&self) -> (Vec<String>, Vec<String>) {
        (
            self.queue.iter().cloned().collect(),
            self.visited.iter().cloned().collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_first() {
        let mut frontier = Frontier::with_root();
        assert_eq!(frontier.next_wave(10), vec![String::new()]);
        assert!(frontier.is_empty());
        assert!(frontier.is_visited(""));
    }

    #[test]
    fn test_wave_width_and_order() {
        let mut frontier = Frontier::default();
        for i in 0..25 {
            frontier.enqueue(format!("d{i:02}"));
        }

        let first = frontier.next_wave(10);
        assert_eq!(first.len(), 10);
        assert_eq!(first[0], "d00");
        assert_eq!(first[9], "d09");
        assert_eq!(frontier.next_wave(10).len(), 10);
        assert_eq!(frontier.next_wave(10).len(), 5);
        assert!(frontier.next_wave(10).is_empty());
    }

    #[test]
    fn test_visited_never_requeued() {
        let mut frontier = Frontier::with_root();
        frontier.next_wave(10);

        assert!(!frontier.enqueue(String::new()));
        assert!(frontier.enqueue("a".into()));
        // Discovered twice before being dequeued: handed out once
        assert!(frontier.enqueue("a".into()));
        assert_eq!(frontier.next_wave(10), vec!["a".to_string()]);
        assert!(frontier.is_empty());
        assert!(!frontier.enqueue("a".into()));
    }

    #[test]
    fn test_snapshot_restore() {
        let mut frontier = Frontier::with_root();
        frontier.next_wave(10);
        frontier.enqueue("x".into());
        frontier.enqueue("y".into());

        let (queue, visited) = frontier.snapshot();
        let restored = Frontier::restore(queue, visited);
        assert_eq!(restored, frontier);
    }
}
