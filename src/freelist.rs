use crate::error::DbResult;
use crate::page::{FreePageMeta, Page, PagePtr, FILE_SIZE_OFF, FREELIST_PTR_OFF, NULL_PAGE};
use crate::stream::{self, ByteStream};
use log::debug;

/// The whole-page allocator. Keeps track of unused pages in a chain of
/// free pages sorted by ascending page number, and grows the file when
/// the chain runs out.
///
/// "Allocate" repurposes a free page into a different page type;
/// "deallocate" turns a page of any type back into a free page. The head
/// of the chain lives at a fixed offset in page 0, which stays the single
/// source of truth: the head is rewritten there whenever it changes.
///
/// The streams passed into the functions of one `FreeList` are expected
/// to point at the same database image.
#[derive(Debug, Clone, Copy)]
pub struct FreeList {
    first_free_pg: PagePtr,
}

impl FreeList {
    /// Creates an empty freelist on a fresh database image: one free page
    /// at `first_free_pg`, file size set to cover it, head stored in
    /// page 0.
    pub fn init<S: ByteStream>(first_free_pg: PagePtr, stream: &mut S) -> DbResult<Self> {
        // page numbers start at 0, file size counts pages
        stream::write_u32(stream, FILE_SIZE_OFF, first_free_pg + 1)?;
        FreePageMeta::new(first_free_pg, NULL_PAGE).write_to(stream)?;
        stream::write_u32(stream, FREELIST_PTR_OFF, first_free_pg)?;
        Ok(Self { first_free_pg })
    }

    /// Reads the freelist head back from page 0.
    pub fn load<S: ByteStream>(stream: &mut S) -> DbResult<Self> {
        let first_free_pg = stream::read_u32(stream, FREELIST_PTR_OFF)?;
        Ok(Self { first_free_pg })
    }

    pub fn head(&self) -> PagePtr {
        self.first_free_pg
    }

    /// Rewrites the head pointer at its slot in page 0.
    pub fn write_head<S: ByteStream>(&self, stream: &mut S) -> DbResult<()> {
        stream::write_u32(stream, FREELIST_PTR_OFF, self.first_free_pg)
    }

    /// Takes a page off the head of the chain, writes an empty page of
    /// type `T` there, and returns its metadata. After this call the head
    /// is always a valid free page.
    pub fn allocate<T: Page, S: ByteStream>(&mut self, stream: &mut S) -> DbResult<T> {
        let pg_num = self.next_free_page(stream)?;
        let page = T::init_at(pg_num);
        page.write_to(stream)?;
        Ok(page)
    }

    /// Splices `pg_num` back into the chain at the position that keeps it
    /// sorted by ascending page number. Deallocating the current head is
    /// a no-op; deallocating a page already in the chain is undefined.
    pub fn deallocate<S: ByteStream>(&mut self, stream: &mut S, pg_num: PagePtr) -> DbResult<()> {
        if pg_num == self.first_free_pg {
            // callers should not do this; a safety net
            return Ok(());
        }
        if self.first_free_pg == NULL_PAGE || self.first_free_pg > pg_num {
            FreePageMeta::new(pg_num, self.first_free_pg).write_to(stream)?;
            self.set_head(pg_num, stream)?;
            return Ok(());
        }
        // walk to the splice point
        let mut prev = FreePageMeta::read_from(self.first_free_pg, stream)?;
        loop {
            let next = prev.next_pg();
            if next == NULL_PAGE || next > pg_num {
                break;
            }
            prev = FreePageMeta::read_from(next, stream)?;
        }
        debug!("free list: splicing page {} after page {}", pg_num, prev.page_num());
        FreePageMeta::new(pg_num, prev.next_pg()).write_to(stream)?;
        prev.set_next_pg(pg_num);
        prev.write_to(stream)
    }

    /// Returns the current head and promotes its successor. If the head
    /// has none, the file grows by one page, the new free page is
    /// threaded after the head, and then the head is taken.
    fn next_free_page<S: ByteStream>(&mut self, stream: &mut S) -> DbResult<PagePtr> {
        let old_head = self.first_free_pg;
        let mut head_page = FreePageMeta::read_from(old_head, stream)?;
        let next = head_page.next_pg();
        if next != NULL_PAGE {
            self.set_head(next, stream)?;
            return Ok(old_head);
        }

        // out of free pages: grab a new one off the end of the file
        let file_size = stream::read_u32(stream, FILE_SIZE_OFF)? + 1;
        stream::write_u32(stream, FILE_SIZE_OFF, file_size)?;
        let new_pg = file_size - 1;
        FreePageMeta::new(new_pg, NULL_PAGE).write_to(stream)?;
        head_page.set_next_pg(new_pg);
        head_page.write_to(stream)?;
        debug!("free list: grew file to {} pages", file_size);
        self.set_head(new_pg, stream)?;
        Ok(old_head)
    }

    fn set_head<S: ByteStream>(&mut self, pg_num: PagePtr, stream: &mut S) -> DbResult<()> {
        self.first_free_pg = pg_num;
        self.write_head(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{BTreeLeafMeta, HeapPageMeta};
    use crate::stream::MemStream;
    use std::collections::HashSet;

    // walks the chain, asserting every page reads back as a free page
    // and the walk terminates
    fn collect_chain(fl: &FreeList, stream: &mut MemStream) -> Vec<PagePtr> {
        let mut seen = HashSet::new();
        let mut chain = Vec::new();
        let mut cur = fl.head();
        while cur != NULL_PAGE {
            assert!(seen.insert(cur), "free chain loops through page {cur}");
            chain.push(cur);
            cur = FreePageMeta::read_from(cur, stream).unwrap().next_pg();
        }
        chain
    }

    #[test]
    fn empty_init_round_trips() {
        let mut stream = MemStream::with_pages(2);
        FreeList::init(1, &mut stream).unwrap();

        let loaded = FreeList::load(&mut stream).unwrap();
        assert_eq!(loaded.head(), 1);
        assert_eq!(stream::read_u32(&mut stream, FREELIST_PTR_OFF).unwrap(), 1);
        assert_eq!(stream::read_u32(&mut stream, FILE_SIZE_OFF).unwrap(), 2);
    }

    #[test]
    fn allocate_grows_once_and_keeps_a_valid_head() {
        let mut stream = MemStream::with_pages(2);
        let mut fl = FreeList::init(1, &mut stream).unwrap();

        let page: BTreeLeafMeta = fl.allocate(&mut stream).unwrap();
        assert_eq!(page.page_num(), 1);
        assert_eq!(BTreeLeafMeta::read_from(1, &mut stream).unwrap(), page);

        // the chain had no successor, so the file grew by one page and
        // the appended page became the head
        assert_eq!(stream::read_u32(&mut stream, FILE_SIZE_OFF).unwrap(), 3);
        assert_eq!(fl.head(), 2);
        let head = FreePageMeta::read_from(2, &mut stream).unwrap();
        assert_eq!(head.next_pg(), NULL_PAGE);
    }

    #[test]
    fn consecutive_allocations_take_ascending_pages() {
        let mut stream = MemStream::with_pages(2);
        let mut fl = FreeList::init(1, &mut stream).unwrap();

        let first: BTreeLeafMeta = fl.allocate(&mut stream).unwrap();
        let second: HeapPageMeta = fl.allocate(&mut stream).unwrap();
        assert_eq!(first.page_num(), 1);
        assert_eq!(second.page_num(), 2);
        assert_eq!(fl.head(), 3);
        assert_eq!(stream::read_u32(&mut stream, FILE_SIZE_OFF).unwrap(), 4);
    }

    #[test]
    fn deallocate_keeps_the_chain_sorted() {
        let mut stream = MemStream::with_pages(2);
        let mut fl = FreeList::init(1, &mut stream).unwrap();
        for _ in 0..3 {
            let _: BTreeLeafMeta = fl.allocate(&mut stream).unwrap();
        }
        // pages 1, 2, 3 are b-tree leaves now; the head is page 4
        assert_eq!(fl.head(), 4);

        fl.deallocate(&mut stream, 2).unwrap();
        fl.deallocate(&mut stream, 1).unwrap();
        fl.deallocate(&mut stream, 3).unwrap();

        assert_eq!(collect_chain(&fl, &mut stream), vec![1, 2, 3, 4]);
    }

    #[test]
    fn deallocating_the_head_is_a_no_op() {
        let mut stream = MemStream::with_pages(2);
        let mut fl = FreeList::init(1, &mut stream).unwrap();
        fl.deallocate(&mut stream, 1).unwrap();
        assert_eq!(collect_chain(&fl, &mut stream), vec![1]);
    }

    #[test]
    fn file_size_never_decreases() {
        let mut stream = MemStream::with_pages(2);
        let mut fl = FreeList::init(1, &mut stream).unwrap();
        let mut last = stream::read_u32(&mut stream, FILE_SIZE_OFF).unwrap();

        let mut allocated = Vec::new();
        for _ in 0..4 {
            let page: BTreeLeafMeta = fl.allocate(&mut stream).unwrap();
            allocated.push(page.page_num());
            let size = stream::read_u32(&mut stream, FILE_SIZE_OFF).unwrap();
            assert!(size >= last);
            last = size;
        }
        for pg in allocated {
            fl.deallocate(&mut stream, pg).unwrap();
            let size = stream::read_u32(&mut stream, FILE_SIZE_OFF).unwrap();
            assert!(size >= last);
            last = size;
        }
        // reuse after deallocation starts from the lowest page again
        let page: BTreeLeafMeta = fl.allocate(&mut stream).unwrap();
        assert_eq!(page.page_num(), 1);
        collect_chain(&fl, &mut stream);
    }
}
