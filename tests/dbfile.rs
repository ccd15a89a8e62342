use pagedb::dbfile::DbFile;
use pagedb::freelist::FreeList;
use pagedb::heap::{FragExtra, Fragment, Ptr};
use pagedb::page::{FreePageMeta, Page};
use pagedb::stream::ByteStream;
use pagedb::table::ColType;
use std::fs::{File, OpenOptions};
use std::path::Path;

fn open(path: &Path) -> File {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(path)
        .unwrap()
}

#[test]
fn database_file_round_trips_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.db");

    let head_ptr: Ptr;
    {
        let mut db = DbFile::new_empty(open(&path)).unwrap();
        db.add_column("id", ColType::UInt32).unwrap();
        db.add_column("note", ColType::Text(64)).unwrap();
        db.set_key("id").unwrap();
        db.write_init().unwrap();

        // a payload too large for one page, laid down as a two-link chain
        let (freelist, heap, stream) = db.allocators();
        let (mut first, first_off) = heap.malloc(4000, true, freelist, stream).unwrap();
        let (second, second_off) = heap.malloc(2000, true, freelist, stream).unwrap();
        assert_ne!(first.pos.pagenum, second.pos.pagenum);
        heap.chain(&mut first, &second, stream).unwrap();

        stream
            .write_at(first.pos.pos() + first_off as u64, &[b'a'; 4000])
            .unwrap();
        stream
            .write_at(second.pos.pos() + second_off as u64, &[b'b'; 2000])
            .unwrap();
        head_ptr = first.pos;
    }

    let mut db = DbFile::construct_from(open(&path)).unwrap();
    let tbl = db.table();
    assert_eq!(tbl.key(), "id");
    assert_eq!(tbl.columns().count(), 2);
    let note = tbl.get_column("note").unwrap();
    assert_eq!(note.coltype, ColType::Text(64));
    assert_eq!(note.offset, 4);

    // the chain walks back to the full payload
    let (_, heap, stream) = db.allocators();
    assert_eq!(heap.first_heap_pg(), head_ptr.pagenum);
    let mut payload = Vec::new();
    let mut cur = head_ptr;
    while !cur.is_null() {
        let frag = Fragment::read_from(cur, stream).unwrap();
        let mut buf = vec![0u8; frag.size as usize];
        stream.read_at(frag.payload_pos(), &mut buf).unwrap();
        payload.extend_from_slice(&buf);
        cur = match frag.extra {
            FragExtra::Chained { next } => next,
            other => panic!("chain runs through a non-chained fragment: {other:?}"),
        };
    }
    assert_eq!(payload.len(), 6000);
    assert!(payload[..4000].iter().all(|&b| b == b'a'));
    assert!(payload[4000..].iter().all(|&b| b == b'b'));

    // the free list survived the reopen with a valid free head
    let freelist = FreeList::load(stream).unwrap();
    let head = FreePageMeta::read_from(freelist.head(), stream).unwrap();
    assert_eq!(head.page_num(), freelist.head());
}
