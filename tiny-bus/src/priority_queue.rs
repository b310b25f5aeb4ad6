//! 优先队列（PriorityQueue）
//!
//! 以稠密数组存储的二叉堆，排序规则由注入的比较函数 `higher(a, b)` 决定：
//! 返回 `true` 表示 `a` 的优先级严格高于 `b`。默认使用自然序（大者优先）。
//!
//! 注意：堆不保证相同优先级元素的先进先出顺序，需要 FIFO 的调用方应预先调整优先级。
//!
use std::fmt;

type Comparator<T> = Box<dyn Fn(&T, &T) -> bool + Send + Sync>;

pub struct PriorityQueue<T> {
    heap: Vec<T>,
    higher: Comparator<T>,
}

impl<T: Ord> PriorityQueue<T> {
    pub fn new() -> Self {
        Self::with_comparator(|a: &T, b: &T| a > b)
    }
}

impl<T: Ord> Default for PriorityQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PriorityQueue<T> {
    /// 使用自定义比较函数创建队列
    pub fn with_comparator<F>(higher: F) -> Self
    where
        F: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        Self {
            heap: Vec::new(),
            higher: Box::new(higher),
        }
    }

    /// 插入元素：追加到末尾后上浮
    pub fn push(&mut self, value: T) {
        self.heap.push(value);
        let mut pos = self.heap.len() - 1;

        while pos > 0 {
            let parent = (pos - 1) / 2;
            if !(self.higher)(&self.heap[pos], &self.heap[parent]) {
                break;
            }
            self.heap.swap(pos, parent);
            pos = parent;
        }
    }

    /// 取出并移除堆顶，空队列返回 `None`
    pub fn pop(&mut self) -> Option<T> {
        if self.heap.is_empty() {
            return None;
        }

        let last = self.heap.len() - 1;
        self.heap.swap(0, last);
        let top = self.heap.pop();
        self.sift_down(0);
        top
    }

    /// 查看堆顶但不移除
    pub fn top(&self) -> Option<&T> {
        self.heap.first()
    }

    /// 按谓词查找元素是否存在，沿内部节点及其直接子节点遍历
    pub fn contains_by<P>(&self, mut predicate: P) -> bool
    where
        P: FnMut(&T) -> bool,
    {
        let len = self.heap.len();

        for index in 0..len.div_ceil(2) {
            let node = std::iter::once(index).chain([2 * index + 1, 2 * index + 2]);
            for i in node.filter(|&i| i < len) {
                if predicate(&self.heap[i]) {
                    return true;
                }
            }
        }

        false
    }

    /// 以堆数组顺序（根在前，非完全有序）遍历
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.heap.iter()
    }

    /// 取出全部元素（堆数组顺序），队列随之清空
    pub fn drain(&mut self) -> Vec<T> {
        std::mem::take(&mut self.heap)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }

    fn sift_down(&mut self, mut index: usize) {
        let len = self.heap.len();

        loop {
            let left = 2 * index + 1;
            let right = left + 1;
            if left >= len {
                break;
            }

            let mut child = left;
            if right < len && (self.higher)(&self.heap[right], &self.heap[left]) {
                child = right;
            }

            if !(self.higher)(&self.heap[child], &self.heap[index]) {
                break;
            }

            self.heap.swap(index, child);
            index = child;
        }
    }
}

impl<T: PartialEq> PriorityQueue<T> {
    /// 是否包含与 `candidate` 相等的元素
    pub fn contains(&self, candidate: &T) -> bool {
        self.contains_by(|item| item == candidate)
    }
}

impl<T: Clone> PriorityQueue<T> {
    /// 堆数组顺序的快照副本
    pub fn to_vec(&self) -> Vec<T> {
        self.heap.clone()
    }
}

impl<T> Extend<T> for PriorityQueue<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.push(value);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for PriorityQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriorityQueue")
            .field("heap", &self.heap)
            .finish_non_exhaustive()
    }
}
