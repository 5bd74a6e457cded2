//! FIFO container backing the scheduler's thread sets.
//!
//! Items are raw pointers and pointer identity is the only notion of
//! equality: the same logical value may be queued several times and only
//! the exact occurrence passed to [`Queue::delete`] is removed. The queue
//! never dereferences its items.

struct Node<T> {
    data: *mut T,
    next: *mut Node<T>,
}

pub struct Queue<T> {
    head: *mut Node<T>,
    tail: *mut Node<T>,
    len: usize,
}

impl<T> Queue<T> {
    pub fn new() -> Self {
        Queue {
            head: std::ptr::null_mut(),
            tail: std::ptr::null_mut(),
            len: 0,
        }
    }

    /// Appends `item` at the tail. Null is rejected because a null payload
    /// would be indistinguishable from the empty sentinel.
    pub fn enqueue(&mut self, item: *mut T) -> crate::error::Result<()> {
        if item.is_null() {
            return Err(crate::error::Error::NullItem);
        }

        let node = Box::into_raw(Box::new(Node {
            data: item,
            next: std::ptr::null_mut(),
        }));

        if self.len == 0 {
            self.head = node;
        } else {
            unsafe { (*self.tail).next = node };
        }
        self.tail = node;
        self.len += 1;
        Ok(())
    }

    /// Removes and returns the oldest item.
    pub fn dequeue(&mut self) -> crate::error::Result<*mut T> {
        if self.len == 0 {
            return Err(crate::error::Error::QueueEmpty);
        }

        let node = unsafe { Box::from_raw(self.head) };
        self.head = node.next;
        if self.head.is_null() {
            self.tail = std::ptr::null_mut();
        }
        self.len -= 1;
        Ok(node.data)
    }

    /// Removes the first node whose payload pointer equals `item`.
    pub fn delete(&mut self, item: *mut T) -> crate::error::Result<()> {
        if item.is_null() {
            return Err(crate::error::Error::NullItem);
        }
        if self.len == 0 {
            return Err(crate::error::Error::ItemNotFound);
        }

        if unsafe { (*self.head).data } == item {
            self.dequeue()?;
            return Ok(());
        }

        let mut previous = self.head;
        let mut current = unsafe { (*self.head).next };
        while !current.is_null() {
            unsafe {
                if (*current).data == item {
                    (*previous).next = (*current).next;
                    if current == self.tail {
                        self.tail = previous;
                    }
                    drop(Box::from_raw(current));
                    self.len -= 1;
                    return Ok(());
                }
                previous = current;
                current = (*current).next;
            }
        }

        Err(crate::error::Error::ItemNotFound)
    }

    /// Visits every item in head-to-tail order. Each node's successor is
    /// captured before the visitor runs, so the visitor may delete the item
    /// it is handed (through [`Queue::delete`]) without corrupting the
    /// traversal. Deleting any *other* item during the walk is not
    /// supported.
    pub fn iterate<F>(&mut self, mut visit: F)
    where
        F: FnMut(&mut Self, *mut T),
    {
        let mut node = self.head;
        while !node.is_null() {
            let next = unsafe { (*node).next };
            let data = unsafe { (*node).data };
            visit(self, data);
            node = next;
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Consumes the queue. A queue that still holds items is handed back
    /// unchanged; silently dropping live entries would leak whatever they
    /// stand for.
    pub fn destroy(self) -> std::result::Result<(), Self> {
        if self.len != 0 { Err(self) } else { Ok(()) }
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for Queue<T> {
    fn drop(&mut self) {
        let mut node = self.head;
        while !node.is_null() {
            let boxed = unsafe { Box::from_raw(node) };
            node = boxed.next;
        }
    }
}
