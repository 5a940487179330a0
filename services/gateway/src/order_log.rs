//! Bounded log of recently admitted orders.
//!
//! Holds at most `capacity` orders. Appending past capacity evicts from the
//! front, so the log is always the most recent `capacity` orders in
//! admission order.

use parking_lot::Mutex;
use std::collections::VecDeque;
use types::order::Order;

pub struct OrderLog {
    entries: Mutex<VecDeque<Order>>,
    capacity: usize,
}

impl OrderLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Append `order`, evicting the oldest entries beyond capacity.
    pub fn append(&self, order: Order) {
        let mut entries = self.entries.lock();
        entries.push_back(order);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// Copy of the current contents, oldest first.
    ///
    /// The lock is released before the caller does anything with the copy.
    pub fn snapshot(&self) -> Vec<Order> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
