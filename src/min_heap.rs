/// A posting list competing for one of the cache slots: score is recorded
/// usage times list length, the payoff of keeping its counts precomputed.
pub(crate) struct CacheCandidate<'a> {
    pub score: u64,
    pub id: u64,
    pub doc_ids: &'a [u32],
}

/// MinHeap implements a min-heap, a binary heap used as priority queue.
/// Maintains the top-k highest-scoring cache candidates; the root holds the
/// weakest kept candidate, so a newcomer only has to beat the root.
pub(crate) struct MinHeap<'a> {
    elements: Vec<CacheCandidate<'a>>,
    capacity: usize,
}

impl<'a> MinHeap<'a> {
    #[inline(always)]
    pub(crate) fn new(capacity: usize) -> MinHeap<'a> {
        MinHeap {
            elements: Vec::with_capacity(capacity),
            capacity,
        }
    }

    #[inline(always)]
    fn get_left_child_index(element_index: usize) -> usize {
        2 * element_index + 1
    }

    #[inline(always)]
    fn get_right_child_index(element_index: usize) -> usize {
        2 * element_index + 2
    }

    #[inline(always)]
    fn get_parent_index(element_index: usize) -> usize {
        (element_index - 1) / 2
    }

    #[inline(always)]
    fn has_left_child(&self, element_index: usize) -> bool {
        Self::get_left_child_index(element_index) < self.elements.len()
    }

    #[inline(always)]
    fn has_right_child(&self, element_index: usize) -> bool {
        Self::get_right_child_index(element_index) < self.elements.len()
    }

    #[inline(always)]
    fn is_root(element_index: usize) -> bool {
        element_index == 0
    }

    #[inline(always)]
    fn heapify_up(&mut self) {
        let mut index = self.elements.len() - 1;
        while !Self::is_root(index)
            && self.elements[index].score < self.elements[Self::get_parent_index(index)].score
        {
            let parent_index = Self::get_parent_index(index);
            self.elements.swap(parent_index, index);
            index = parent_index;
        }
    }

    #[inline(always)]
    fn heapify_down(&mut self) {
        let mut index: usize = 0;
        while self.has_left_child(index) {
            let mut smaller_index = Self::get_left_child_index(index);
            if self.has_right_child(index)
                && self.elements[Self::get_right_child_index(index)].score
                    < self.elements[smaller_index].score
            {
                smaller_index = Self::get_right_child_index(index);
            }

            if self.elements[smaller_index].score >= self.elements[index].score {
                break;
            }

            self.elements.swap(smaller_index, index);
            index = smaller_index;
        }
    }

    /// Offers a candidate; keeps it only while it ranks among the top-k.
    #[inline(always)]
    pub(crate) fn add_topk(&mut self, candidate: CacheCandidate<'a>) -> bool {
        if self.capacity == 0 {
            return false;
        }

        if self.elements.len() < self.capacity {
            self.elements.push(candidate);
            self.heapify_up();
            true
        } else if candidate.score > self.elements[0].score {
            self.elements[0] = candidate;
            self.heapify_down();
            true
        } else {
            false
        }
    }

    /// Consumes the heap; the kept candidates come back in heap order, which
    /// is all the cache rebuild needs to assign bit positions.
    pub(crate) fn into_elements(self) -> Vec<CacheCandidate<'a>> {
        self.elements
    }
}
