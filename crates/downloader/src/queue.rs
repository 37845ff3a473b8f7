use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// one resolved episode waiting to be downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    /// episode identifier as shown by the site (`"12"`, `"12.5"`, `"ova"`).
    pub episode: String,
    /// direct download url chosen by the resolver.
    pub url: String,
}

impl QueueItem {
    pub fn new(episode: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            episode: episode.into(),
            url: url.into(),
        }
    }
}

/// fifo shared between the resolution phase and the download phase.
///
/// every operation takes the single lock, so a drain never races an enqueue
/// into losing or duplicating an item.
#[derive(Debug, Default)]
pub struct DownloadQueue {
    items: Mutex<VecDeque<QueueItem>>,
}

impl DownloadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    // a panic while holding the lock cannot leave the deque half-updated
    fn lock(&self) -> MutexGuard<'_, VecDeque<QueueItem>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn enqueue(&self, item: QueueItem) {
        self.lock().push_back(item);
    }

    /// atomically empties the queue and returns its contents in fifo order.
    pub fn drain_all(&self) -> Vec<QueueItem> {
        self.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn drain_preserves_fifo_order_and_empties() {
        let queue = DownloadQueue::new();
        queue.enqueue(QueueItem::new("1", "https://cdn/1.mp4"));
        queue.enqueue(QueueItem::new("2", "https://cdn/2.mp4"));
        assert_eq!(queue.len(), 2);

        let drained = queue.drain_all();
        assert_eq!(
            drained.iter().map(|i| i.episode.as_str()).collect::<Vec<_>>(),
            ["1", "2"]
        );
        assert!(queue.is_empty());
        assert!(queue.drain_all().is_empty());
    }

    #[test]
    fn concurrent_producers_and_drainers_neither_lose_nor_duplicate() {
        const PRODUCERS: usize = 8;
        const PER_PRODUCER: usize = 500;

        let queue = Arc::new(DownloadQueue::new());

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        queue.enqueue(QueueItem::new(format!("{p}-{i}"), "https://cdn/x"));
                    }
                })
            })
            .collect();

        let drainers: Vec<_> = (0..4)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    let mut seen = Vec::new();
                    for _ in 0..200 {
                        seen.extend(queue.drain_all());
                        thread::yield_now();
                    }
                    seen
                })
            })
            .collect();

        for producer in producers {
            producer.join().expect("producer thread");
        }

        let mut all = Vec::new();
        for drainer in drainers {
            all.extend(drainer.join().expect("drainer thread"));
        }
        all.extend(queue.drain_all());

        assert_eq!(all.len(), PRODUCERS * PER_PRODUCER);
        let unique: HashSet<_> = all.iter().map(|i| i.episode.clone()).collect();
        assert_eq!(unique.len(), PRODUCERS * PER_PRODUCER);
    }
}
