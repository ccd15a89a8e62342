use crate::page::{PageKind, PageOff, PagePtr};
use thiserror::Error;

pub type DbResult<T> = std::result::Result<T, DbError>;

/// Everything the storage layer can report. Front-end errors live in
/// `token` and `parse`; they never mix with these.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("short read: wanted {expected} bytes at offset {offset}")]
    ShortRead { offset: u64, expected: usize },

    #[error("wrong page type on page {page}: expected {expected:?}, found tag {found}")]
    WrongPageType {
        page: PagePtr,
        expected: PageKind,
        found: u8,
    },

    #[error("wrong fragment type at page {page} offset {offset}: found tag {found}")]
    WrongFragmentType {
        page: PagePtr,
        offset: PageOff,
        found: u8,
    },

    #[error("allocation of {requested} bytes exceeds single-page capacity of {max}")]
    OutOfRange { requested: u32, max: u16 },

    #[error("duplicate column {0:?}")]
    DuplicateColumn(String),

    #[error("unknown column {0:?}")]
    UnknownColumn(String),

    #[error("corrupted database image: {0}")]
    Corrupted(&'static str),
}
