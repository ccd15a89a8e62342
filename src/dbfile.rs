use crate::error::DbResult;
use crate::freelist::FreeList;
use crate::heap::Heap;
use crate::page::{
    VERSION_MAJOR, VERSION_MAJOR_OFF, VERSION_MINOR, VERSION_MINOR_OFF, VERSION_PATCH,
    VERSION_PATCH_OFF,
};
use crate::stream::{self, ByteStream};
use crate::table::{ColType, ColumnMeta, TableMeta};

/// The database file itself: one stream holding the page-0 header, the
/// table metadata, and every allocated page, with the free list and the
/// heap layered on top.
///
/// There is no checking that an opened stream holds a valid image; the
/// bottleneck is the I/O anyways, so extensive checking could be added
/// later without changing the shape of this type.
pub struct DbFile<S: ByteStream> {
    stream: S,
    tbl: TableMeta,
    freelist: FreeList,
    heap: Heap,
}

impl<S: ByteStream> DbFile<S> {
    /// Reads an existing database image from the stream.
    pub fn construct_from(mut stream: S) -> DbResult<Self> {
        let freelist = FreeList::load(&mut stream)?;
        let heap = Heap::load(&mut stream)?;
        let tbl = TableMeta::read_from(&mut stream)?;
        Ok(Self {
            stream,
            tbl,
            freelist,
            heap,
        })
    }

    /// Formats the stream as a fresh database: version triple, a free
    /// list with one free page, no heap pages, an empty unnamed table.
    /// Running this on an already-formatted stream nukes it.
    pub fn new_empty(mut stream: S) -> DbResult<Self> {
        stream::write_u16(&mut stream, VERSION_MAJOR_OFF, VERSION_MAJOR)?;
        stream::write_u16(&mut stream, VERSION_MINOR_OFF, VERSION_MINOR)?;
        stream::write_u16(&mut stream, VERSION_PATCH_OFF, VERSION_PATCH)?;
        let freelist = FreeList::init(1, &mut stream)?;
        let heap = Heap::new_empty();
        heap.write_head(&mut stream)?;
        let tbl = TableMeta::default();
        tbl.write_to(&mut stream)?;
        Ok(Self {
            stream,
            tbl,
            freelist,
            heap,
        })
    }

    /// Rewrites the page-0 metadata: version, allocator heads, table.
    /// Column edits only reach the file through this call.
    pub fn write_init(&mut self) -> DbResult<()> {
        stream::write_u16(&mut self.stream, VERSION_MAJOR_OFF, VERSION_MAJOR)?;
        stream::write_u16(&mut self.stream, VERSION_MINOR_OFF, VERSION_MINOR)?;
        stream::write_u16(&mut self.stream, VERSION_PATCH_OFF, VERSION_PATCH)?;
        self.freelist.write_head(&mut self.stream)?;
        self.heap.write_head(&mut self.stream)?;
        self.tbl.write_to(&mut self.stream)
    }

    pub fn table(&self) -> &TableMeta {
        &self.tbl
    }

    /// Adds a column, assigning it the next column id and the next slot
    /// of the fixed-width row image.
    pub fn add_column(&mut self, name: impl Into<String>, coltype: ColType) -> DbResult<()> {
        let col_id = self
            .tbl
            .columns()
            .map(|c| c.col_id + 1)
            .max()
            .unwrap_or(0);
        let offset = self
            .tbl
            .columns()
            .max_by_key(|c| c.offset)
            .map(|c| c.offset + c.coltype.row_size())
            .unwrap_or(0);
        self.tbl.add_column(ColumnMeta {
            name: name.into(),
            coltype,
            col_id,
            offset,
        })
    }

    pub fn remove_column(&mut self, name: &str) -> DbResult<()> {
        self.tbl.remove_column(name)
    }

    pub fn set_key(&mut self, name: &str) -> DbResult<()> {
        self.tbl.set_key(name)
    }

    /// Hands out the allocators together with the stream, for callers
    /// that place their own data on the heap.
    pub fn allocators(&mut self) -> (&mut FreeList, &mut Heap, &mut S) {
        (&mut self.freelist, &mut self.heap, &mut self.stream)
    }
}
