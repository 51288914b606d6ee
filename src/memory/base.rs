use rand::{seq::SliceRandom, Rng};

use crate::{
    ds::RingBuffer,
    env::Environment,
    error::{Error, Result},
};

use super::{Exp, ExpBatch};

/// A fixed-size memory storage for reinforcement learning experiences
///
/// This structure uses a ring buffer to store experiences, which are tuples of (state, action, next state, reward).
/// It automatically overwrites the oldest experiences once it reaches its capacity.
///
/// ### Type Parameters:
/// - `E`: Environment
pub struct ReplayMemory<E: Environment> {
    memory: RingBuffer<Exp<E>>,
    batch_size: usize,
}

impl<E: Environment> ReplayMemory<E> {
    /// Fails if `batch_size` is zero or larger than `capacity`
    pub fn new(capacity: usize, batch_size: usize) -> Result<Self> {
        if batch_size == 0 || batch_size > capacity {
            return Err(Error::InvalidHyperparameter {
                name: "batch_size",
                value: batch_size as f64,
                reason: "must be nonzero and no larger than the memory capacity",
            });
        }
        let memory = RingBuffer::new(capacity).ok_or(Error::InvalidHyperparameter {
            name: "memory_capacity",
            value: 0.0,
            reason: "must be greater than zero",
        })?;
        Ok(Self { memory, batch_size })
    }

    /// Add a new experience to the memory
    pub fn push(&mut self, exp: Exp<E>) {
        self.memory.push(exp);
    }

    /// Number of stored experiences
    pub fn len(&self) -> usize {
        self.memory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.memory.capacity()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Sample a batch of experiences uniformly at random without replacement
    ///
    /// ### Returns
    /// - `Some(experiences)` if `batch_size` is less than or equal to the buffer length
    /// - `None` otherwise
    pub fn sample(&self, rng: &mut impl Rng) -> Option<Vec<Exp<E>>> {
        (self.batch_size <= self.memory.len()).then(|| {
            self.memory
                .view()
                .choose_multiple(rng, self.batch_size)
                .cloned()
                .collect()
        })
    }

    /// Sample a random batch of experiences from the memory and zip the vector of tuples into a tuple of vectors
    ///
    /// ### Returns
    /// - `Some(batch)` if `batch_size` is less than or equal to the buffer length
    /// - `None` otherwise
    pub fn sample_zipped(&self, rng: &mut impl Rng) -> Option<ExpBatch<E>> {
        let experiences = self.sample(rng)?;
        Some(ExpBatch::from_iter(experiences, self.batch_size))
    }
}
