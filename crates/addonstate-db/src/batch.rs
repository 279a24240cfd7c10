/// Items processed between cooperative yields in long loops.
pub const BATCH_SIZE: usize = 64;

/// Counts processed items and yields to the scheduler after every batch.
#[derive(Debug, Clone)]
pub struct BatchYield {
    batch_size: usize,
    processed: usize,
}

impl BatchYield {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            processed: 0,
        }
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    pub async fn tick(&mut self) {
        self.processed += 1;
        if self.processed % self.batch_size == 0 {
            tokio::task::yield_now().await;
        }
    }
}

impl Default for BatchYield {
    fn default() -> Self {
        Self::new(BATCH_SIZE)
    }
}

pub async fn for_each_batched<I, F>(items: I, batch_size: usize, mut f: F) -> usize
where
    I: IntoIterator,
    F: FnMut(I::Item),
{
    let mut batch = BatchYield::new(batch_size);
    for item in items {
        f(item);
        batch.tick().await;
    }
    batch.processed()
}
