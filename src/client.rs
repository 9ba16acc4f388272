use std::sync::Arc;

/// A simulated participant: its data shard and its own learning rate.
///
/// Clients never keep a model between rounds, they get a copy of the global state every time
/// they're dispatched.
#[derive(Debug, Clone)]
pub struct Client {
    id: usize,
    shard: Arc<[usize]>,
    learning_rate: f32,
}

impl Client {
    /// Creates a new `Client`.
    ///
    /// # Arguments
    /// * `id` - The client's id, in `[0, N)`.
    /// * `shard` - The client's indices into the training dataset.
    /// * `learning_rate` - The learning rate of its first local training.
    ///
    /// # Returns
    /// A new `Client` instance.
    pub fn new(id: usize, shard: Vec<usize>, learning_rate: f32) -> Self {
        Self {
            id,
            shard: Arc::from(shard),
            learning_rate,
        }
    }

    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn shard(&self) -> &Arc<[usize]> {
        &self.shard
    }

    #[inline]
    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    /// Stores the learning rate returned by the client's last local training.
    pub fn set_learning_rate(&mut self, learning_rate: f32) {
        self.learning_rate = learning_rate;
    }
}
