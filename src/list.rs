//! Ordered container operations used by repeatable template fields.

/// Homogeneous, ordered, append-only view of a container.
pub trait TlvList: Sized {
    type Item;

    fn new_list() -> Self;
    fn append(&mut self, item: Self::Item);
    fn len(&self) -> usize;
    fn element_at(&self, index: usize) -> Option<&Self::Item>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn iter(&self) -> ListIter<'_, Self> {
        ListIter { list: self, index: 0 }
    }
}

impl<T> TlvList for Vec<T> {
    type Item = T;

    fn new_list() -> Self {
        Vec::new()
    }

    fn append(&mut self, item: T) {
        self.push(item);
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn element_at(&self, index: usize) -> Option<&T> {
        self.get(index)
    }
}

/// Iterator built from `len` and `element_at`, so it works for any [`TlvList`].
pub struct ListIter<'a, L: TlvList> {
    list: &'a L,
    index: usize,
}

impl<'a, L: TlvList> Iterator for ListIter<'a, L> {
    type Item = &'a L::Item;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.list.element_at(self.index)?;
        self.index += 1;
        Some(item)
    }
}
