/*
A database file is an array of fixed-size pages. Page 0 holds the file
header; every other page opens with a 1-byte type tag.

File header (page 0), all integers little-endian:
Offset  Size    Description
0       2       Version major.
2       2       Version minor.
4       2       Version patch.
6       4       File size in pages.
10      4       Page number of the first free page (0 = none).
14      4       Page number of the first heap page (0 = none).
18      -       Table metadata, ASCII-delimited (see table module).

Page type tags:
A value of 0 means the page is a free page.
A value of 1 means the page is a b-tree leaf page.
A value of 2 means the page is a b-tree internal page.
A value of 3 means the page is a heap page.
Any other tag value is an error.

Free page: tag, then a 4-byte pointer to the next free page. Zero means
this is the last free page in the chain.

B-tree leaf page: tag, 2-byte row count, 2-byte first free offset. The
indexing layer on top of these pages is not implemented; only the header
codec exists.

B-tree internal page: tag, 2-byte key count, 2-byte first free offset.

Heap page: tag, 4-byte next heap page, 4-byte previous heap page, 2-byte
offset of the first free fragment, 2-byte size of the largest free
fragment, 2-byte offset of the largest free fragment. The header occupies
bytes 0-14; fragments tile the rest of the page (see heap module).
*/

use crate::error::{DbError, DbResult};
use crate::stream::ByteStream;
use std::convert::TryInto;

pub type PagePtr = u32;
pub type PageOff = u16;

pub const PAGE_SIZE: u16 = 4096;
pub const NULL_PAGE: PagePtr = 0;

pub const VERSION_MAJOR: u16 = 0;
pub const VERSION_MINOR: u16 = 1;
pub const VERSION_PATCH: u16 = 0;

// page 0 field offsets
pub const VERSION_MAJOR_OFF: u64 = 0;
pub const VERSION_MINOR_OFF: u64 = 2;
pub const VERSION_PATCH_OFF: u64 = 4;
pub const FILE_SIZE_OFF: u64 = 6;
pub const FREELIST_PTR_OFF: u64 = 10;
pub const HEAP_PTR_OFF: u64 = 14;
pub const TBL_OFF: u64 = 18;

/// Byte position of the start of a page.
pub fn page_base(pg_num: PagePtr) -> u64 {
    pg_num as u64 * PAGE_SIZE as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Free,
    BTreeLeaf,
    BTreeInternal,
    Heap,
}

impl PageKind {
    pub fn from_u8(val: u8) -> Option<Self> {
        match val {
            0 => Some(PageKind::Free),
            1 => Some(PageKind::BTreeLeaf),
            2 => Some(PageKind::BTreeInternal),
            3 => Some(PageKind::Heap),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            PageKind::Free => 0,
            PageKind::BTreeLeaf => 1,
            PageKind::BTreeInternal => 2,
            PageKind::Heap => 3,
        }
    }
}

/// A page's metadata header: a fixed layout at the start of the page,
/// serializable to and from a byte stream.
pub trait Page: Sized {
    const KIND: PageKind;

    fn page_num(&self) -> PagePtr;

    /// An empty page of this kind at the given page number.
    fn init_at(pg_num: PagePtr) -> Self;

    fn write_to<S: ByteStream>(&self, stream: &mut S) -> DbResult<()>;

    /// Reads the header back. Fails with `WrongPageType` if the tag byte
    /// does not match this page kind.
    fn read_from<S: ByteStream>(pg_num: PagePtr, stream: &mut S) -> DbResult<Self>;
}

fn check_tag<S: ByteStream>(pg_num: PagePtr, kind: PageKind, stream: &mut S) -> DbResult<()> {
    let found = crate::stream::read_u8(stream, page_base(pg_num))?;
    if PageKind::from_u8(found) != Some(kind) {
        return Err(DbError::WrongPageType {
            page: pg_num,
            expected: kind,
            found,
        });
    }
    Ok(())
}

/// Metadata of one free page. Free pages form a singly-linked chain
/// sorted in ascending page number, managed by the free list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreePageMeta {
    page_num: PagePtr,
    // offset 1: pointer to the next free page. Zero if this is the last
    // free page in the chain.
    next_pg: PagePtr,
}

impl FreePageMeta {
    pub fn new(page_num: PagePtr, next_pg: PagePtr) -> Self {
        Self { page_num, next_pg }
    }

    pub fn next_pg(&self) -> PagePtr {
        self.next_pg
    }

    pub fn set_next_pg(&mut self, next: PagePtr) {
        self.next_pg = next;
    }
}

impl Page for FreePageMeta {
    const KIND: PageKind = PageKind::Free;

    fn page_num(&self) -> PagePtr {
        self.page_num
    }

    fn init_at(pg_num: PagePtr) -> Self {
        Self::new(pg_num, NULL_PAGE)
    }

    fn write_to<S: ByteStream>(&self, stream: &mut S) -> DbResult<()> {
        let mut buf = [0u8; 5];
        buf[0] = Self::KIND.as_u8();
        buf[1..5].copy_from_slice(&self.next_pg.to_le_bytes());
        stream.write_at(page_base(self.page_num), &buf)
    }

    fn read_from<S: ByteStream>(pg_num: PagePtr, stream: &mut S) -> DbResult<Self> {
        check_tag(pg_num, Self::KIND, stream)?;
        let mut buf = [0u8; 4];
        stream.read_at(page_base(pg_num) + 1, &mut buf)?;
        Ok(Self::new(pg_num, PagePtr::from_le_bytes(buf)))
    }
}

/// Metadata of one b-tree leaf page. Rows would be stored inside, sorted
/// ascending by key, once the b-tree layer exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BTreeLeafMeta {
    page_num: PagePtr,
    // offset 1: 2 bytes, number of rows stored inside this leaf.
    n_rows: u16,
    // offset 3: 2 bytes, the first free offset. Defaults to 5, the first
    // byte after this header.
    first_free: PageOff,
}

impl BTreeLeafMeta {
    pub const DEFAULT_FREE_OFF: PageOff = 5;

    pub fn new(page_num: PagePtr, n_rows: u16, first_free: PageOff) -> Self {
        Self {
            page_num,
            n_rows,
            first_free,
        }
    }

    pub fn n_rows(&self) -> u16 {
        self.n_rows
    }

    pub fn first_free(&self) -> PageOff {
        self.first_free
    }
}

impl Page for BTreeLeafMeta {
    const KIND: PageKind = PageKind::BTreeLeaf;

    fn page_num(&self) -> PagePtr {
        self.page_num
    }

    fn init_at(pg_num: PagePtr) -> Self {
        Self::new(pg_num, 0, Self::DEFAULT_FREE_OFF)
    }

    fn write_to<S: ByteStream>(&self, stream: &mut S) -> DbResult<()> {
        let mut buf = [0u8; 5];
        buf[0] = Self::KIND.as_u8();
        buf[1..3].copy_from_slice(&self.n_rows.to_le_bytes());
        buf[3..5].copy_from_slice(&self.first_free.to_le_bytes());
        stream.write_at(page_base(self.page_num), &buf)
    }

    fn read_from<S: ByteStream>(pg_num: PagePtr, stream: &mut S) -> DbResult<Self> {
        check_tag(pg_num, Self::KIND, stream)?;
        let mut buf = [0u8; 4];
        stream.read_at(page_base(pg_num) + 1, &mut buf)?;
        let n_rows = u16::from_le_bytes(buf[0..2].try_into().unwrap());
        let first_free = PageOff::from_le_bytes(buf[2..4].try_into().unwrap());
        Ok(Self::new(pg_num, n_rows, first_free))
    }
}

/// Metadata of one b-tree internal page. Key-pointer pairs would be
/// stored inside once the b-tree layer exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BTreeInternalMeta {
    page_num: PagePtr,
    // offset 1: 2 bytes, number of keys stored inside this node.
    n_keys: u16,
    // offset 3: 2 bytes, the first free offset.
    first_free: PageOff,
}

impl BTreeInternalMeta {
    pub const DEFAULT_FREE_OFF: PageOff = 5;

    pub fn new(page_num: PagePtr, n_keys: u16, first_free: PageOff) -> Self {
        Self {
            page_num,
            n_keys,
            first_free,
        }
    }

    pub fn n_keys(&self) -> u16 {
        self.n_keys
    }

    pub fn first_free(&self) -> PageOff {
        self.first_free
    }
}

impl Page for BTreeInternalMeta {
    const KIND: PageKind = PageKind::BTreeInternal;

    fn page_num(&self) -> PagePtr {
        self.page_num
    }

    fn init_at(pg_num: PagePtr) -> Self {
        Self::new(pg_num, 0, Self::DEFAULT_FREE_OFF)
    }

    fn write_to<S: ByteStream>(&self, stream: &mut S) -> DbResult<()> {
        let mut buf = [0u8; 5];
        buf[0] = Self::KIND.as_u8();
        buf[1..3].copy_from_slice(&self.n_keys.to_le_bytes());
        buf[3..5].copy_from_slice(&self.first_free.to_le_bytes());
        stream.write_at(page_base(self.page_num), &buf)
    }

    fn read_from<S: ByteStream>(pg_num: PagePtr, stream: &mut S) -> DbResult<Self> {
        check_tag(pg_num, Self::KIND, stream)?;
        let mut buf = [0u8; 4];
        stream.read_at(page_base(pg_num) + 1, &mut buf)?;
        let n_keys = u16::from_le_bytes(buf[0..2].try_into().unwrap());
        let first_free = PageOff::from_le_bytes(buf[2..4].try_into().unwrap());
        Ok(Self::new(pg_num, n_keys, first_free))
    }
}

/// Metadata of one heap page. Heap pages form a doubly-linked list with
/// one another, ordered by allocation; inside each page the free
/// fragments form a singly-linked list sorted by offset. The largest
/// free fragment is cached in the header so the heap can route an
/// allocation without scanning every fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapPageMeta {
    page_num: PagePtr,
    // offset 1: 4 bytes, pointer to the next heap page. Zero means this
    // heap page is the last one.
    next_pg: PagePtr,
    // offset 5: 4 bytes, pointer to the previous heap page. Zero means
    // this heap page is the first one.
    prev_pg: PagePtr,
    // offset 9: 2 bytes, offset of the first free fragment. Zero means
    // the page has no free fragment.
    first_free: PageOff,
    // offset 11: 2 bytes, size of the largest free fragment.
    // offset 13: 2 bytes, offset of the largest free fragment.
    // (0, 0) means no free fragment.
    max_size: PageOff,
    max_off: PageOff,
}

impl HeapPageMeta {
    /// First byte after the heap page header; fragments start here.
    pub const DEFAULT_FREE_OFF: PageOff = 15;

    pub fn new(
        page_num: PagePtr,
        next_pg: PagePtr,
        prev_pg: PagePtr,
        first_free: PageOff,
        max_pair: (PageOff, PageOff),
    ) -> Self {
        Self {
            page_num,
            next_pg,
            prev_pg,
            first_free,
            max_size: max_pair.0,
            max_off: max_pair.1,
        }
    }

    pub fn next_pg(&self) -> PagePtr {
        self.next_pg
    }

    pub fn prev_pg(&self) -> PagePtr {
        self.prev_pg
    }

    pub fn first_free(&self) -> PageOff {
        self.first_free
    }

    /// The (size, offset) of the largest free fragment; (0, 0) when the
    /// page has none.
    pub fn max_pair(&self) -> (PageOff, PageOff) {
        (self.max_size, self.max_off)
    }

    pub fn set_next_pg(&mut self, next: PagePtr) {
        self.next_pg = next;
    }

    pub fn set_prev_pg(&mut self, prev: PagePtr) {
        self.prev_pg = prev;
    }

    pub fn set_first_free(&mut self, off: PageOff) {
        debug_assert!(off == 0 || (Self::DEFAULT_FREE_OFF..PAGE_SIZE).contains(&off));
        self.first_free = off;
    }

    pub fn set_max_pair(&mut self, pair: (PageOff, PageOff)) {
        self.max_size = pair.0;
        self.max_off = pair.1;
    }
}

impl Page for HeapPageMeta {
    const KIND: PageKind = PageKind::Heap;

    fn page_num(&self) -> PagePtr {
        self.page_num
    }

    fn init_at(pg_num: PagePtr) -> Self {
        // a fresh heap page holds one free fragment spanning the body
        let body = PAGE_SIZE - Self::DEFAULT_FREE_OFF as u16;
        Self::new(
            pg_num,
            NULL_PAGE,
            NULL_PAGE,
            Self::DEFAULT_FREE_OFF,
            (
                body - crate::heap::Fragment::FREE_HEADER,
                Self::DEFAULT_FREE_OFF,
            ),
        )
    }

    fn write_to<S: ByteStream>(&self, stream: &mut S) -> DbResult<()> {
        let mut buf = [0u8; Self::DEFAULT_FREE_OFF as usize];
        buf[0] = Self::KIND.as_u8();
        buf[1..5].copy_from_slice(&self.next_pg.to_le_bytes());
        buf[5..9].copy_from_slice(&self.prev_pg.to_le_bytes());
        buf[9..11].copy_from_slice(&self.first_free.to_le_bytes());
        buf[11..13].copy_from_slice(&self.max_size.to_le_bytes());
        buf[13..15].copy_from_slice(&self.max_off.to_le_bytes());
        stream.write_at(page_base(self.page_num), &buf)
    }

    fn read_from<S: ByteStream>(pg_num: PagePtr, stream: &mut S) -> DbResult<Self> {
        check_tag(pg_num, Self::KIND, stream)?;
        let mut buf = [0u8; 14];
        stream.read_at(page_base(pg_num) + 1, &mut buf)?;
        let next_pg = PagePtr::from_le_bytes(buf[0..4].try_into().unwrap());
        let prev_pg = PagePtr::from_le_bytes(buf[4..8].try_into().unwrap());
        let first_free = PageOff::from_le_bytes(buf[8..10].try_into().unwrap());
        let max_size = PageOff::from_le_bytes(buf[10..12].try_into().unwrap());
        let max_off = PageOff::from_le_bytes(buf[12..14].try_into().unwrap());
        Ok(Self::new(
            pg_num,
            next_pg,
            prev_pg,
            first_free,
            (max_size, max_off),
        ))
    }
}

/// Any page header: a tagged sum over the known page kinds, for the
/// places that need to serialize pages heterogeneously.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageMeta {
    Free(FreePageMeta),
    BTreeLeaf(BTreeLeafMeta),
    BTreeInternal(BTreeInternalMeta),
    Heap(HeapPageMeta),
}

impl PageMeta {
    pub fn kind(&self) -> PageKind {
        match self {
            PageMeta::Free(_) => PageKind::Free,
            PageMeta::BTreeLeaf(_) => PageKind::BTreeLeaf,
            PageMeta::BTreeInternal(_) => PageKind::BTreeInternal,
            PageMeta::Heap(_) => PageKind::Heap,
        }
    }

    pub fn page_num(&self) -> PagePtr {
        match self {
            PageMeta::Free(p) => p.page_num(),
            PageMeta::BTreeLeaf(p) => p.page_num(),
            PageMeta::BTreeInternal(p) => p.page_num(),
            PageMeta::Heap(p) => p.page_num(),
        }
    }

    pub fn write_to<S: ByteStream>(&self, stream: &mut S) -> DbResult<()> {
        match self {
            PageMeta::Free(p) => p.write_to(stream),
            PageMeta::BTreeLeaf(p) => p.write_to(stream),
            PageMeta::BTreeInternal(p) => p.write_to(stream),
            PageMeta::Heap(p) => p.write_to(stream),
        }
    }

    /// Reads whatever page header sits at `pg_num`, dispatching on the
    /// tag byte.
    pub fn read_any<S: ByteStream>(pg_num: PagePtr, stream: &mut S) -> DbResult<Self> {
        let tag = crate::stream::read_u8(stream, page_base(pg_num))?;
        match PageKind::from_u8(tag) {
            Some(PageKind::Free) => Ok(PageMeta::Free(FreePageMeta::read_from(pg_num, stream)?)),
            Some(PageKind::BTreeLeaf) => Ok(PageMeta::BTreeLeaf(BTreeLeafMeta::read_from(
                pg_num, stream,
            )?)),
            Some(PageKind::BTreeInternal) => Ok(PageMeta::BTreeInternal(
                BTreeInternalMeta::read_from(pg_num, stream)?,
            )),
            Some(PageKind::Heap) => Ok(PageMeta::Heap(HeapPageMeta::read_from(pg_num, stream)?)),
            None => Err(DbError::Corrupted("unknown page tag")),
        }
    }
}
