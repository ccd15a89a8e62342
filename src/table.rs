/*
Table metadata lives in page 0, right after the fixed file header.

Format, ASCII-delimited:
  <table-name> '{' <key-name> ';'
      ( <col-name> ',' <col-id:u8> <type-id:u8> <type-size:u64> <byte-off:u8> )*
  '}'

Everything from offset 18 up to the '{' is the table name; the key column
name runs to the ';'. Each column is its name up to the ',' followed by
four fixed-width numbers, so no further delimiters are needed between
them. type-size carries the declared size: the scalar width for numeric
columns, the declared capacity for text columns. byte-off is the column's
offset inside a fixed-width row image; a text column occupies one heap
pointer there, with the actual bytes on the heap.
*/

use crate::error::{DbError, DbResult};
use crate::heap::Ptr;
use crate::page::TBL_OFF;
use crate::stream::{self, ByteStream};
use itertools::Itertools;
use std::collections::HashMap;

/// A column's data type: ten numeric widths plus heap-backed text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
    /// Declared capacity in bytes. On a row this is a single `Ptr`.
    Text(u64),
}

impl ColType {
    pub fn type_id(&self) -> u8 {
        match self {
            ColType::Int8 => 0,
            ColType::UInt8 => 1,
            ColType::Int16 => 2,
            ColType::UInt16 => 3,
            ColType::Int32 => 4,
            ColType::UInt32 => 5,
            ColType::Int64 => 6,
            ColType::UInt64 => 7,
            ColType::Float32 => 8,
            ColType::Float64 => 9,
            ColType::Text(_) => 10,
        }
    }

    /// The reverse of `type_id`. Text columns take their declared size
    /// from the serialized size field.
    pub fn from_id(id: u8, size: u64) -> Option<Self> {
        match id {
            0 => Some(ColType::Int8),
            1 => Some(ColType::UInt8),
            2 => Some(ColType::Int16),
            3 => Some(ColType::UInt16),
            4 => Some(ColType::Int32),
            5 => Some(ColType::UInt32),
            6 => Some(ColType::Int64),
            7 => Some(ColType::UInt64),
            8 => Some(ColType::Float32),
            9 => Some(ColType::Float64),
            10 => Some(ColType::Text(size)),
            _ => None,
        }
    }

    /// Bytes this column occupies in a fixed-width row image.
    pub fn row_size(&self) -> u8 {
        match self {
            ColType::Int8 | ColType::UInt8 => 1,
            ColType::Int16 | ColType::UInt16 => 2,
            ColType::Int32 | ColType::UInt32 | ColType::Float32 => 4,
            ColType::Int64 | ColType::UInt64 | ColType::Float64 => 8,
            ColType::Text(_) => Ptr::SIZE as u8,
        }
    }

    /// The size field as serialized: declared capacity for text, scalar
    /// width otherwise.
    fn type_size(&self) -> u64 {
        match self {
            ColType::Text(size) => *size,
            other => other.row_size() as u64,
        }
    }
}

/// Metadata of one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    pub coltype: ColType,
    pub col_id: u8,
    /// Offset within the fixed-width row image.
    pub offset: u8,
}

/// The table metadata: a set of columns keyed by name, a designated key
/// column, and the table name. Insertion order is not preserved across a
/// write/read cycle; the on-disk image orders columns by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableMeta {
    name: String,
    key: String,
    columns: HashMap<String, ColumnMeta>,
}

impl TableMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn get_column(&self, name: &str) -> Option<&ColumnMeta> {
        self.columns.get(name)
    }

    pub fn columns(&self) -> impl Iterator<Item = &ColumnMeta> {
        self.columns.values()
    }

    pub fn add_column(&mut self, col: ColumnMeta) -> DbResult<()> {
        if self.columns.contains_key(&col.name) {
            return Err(DbError::DuplicateColumn(col.name));
        }
        self.columns.insert(col.name.clone(), col);
        Ok(())
    }

    pub fn remove_column(&mut self, name: &str) -> DbResult<()> {
        self.columns
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| DbError::UnknownColumn(name.to_string()))
    }

    /// Marks an existing column as the key. Must be set before the
    /// metadata is written out.
    pub fn set_key(&mut self, name: &str) -> DbResult<()> {
        if !self.columns.contains_key(name) {
            return Err(DbError::UnknownColumn(name.to_string()));
        }
        self.key = name.to_string();
        Ok(())
    }

    pub fn write_to<S: ByteStream>(&self, stream: &mut S) -> DbResult<()> {
        let mut buf = Vec::new();
        buf.extend_from_slice(self.name.as_bytes());
        buf.push(b'{');
        buf.extend_from_slice(self.key.as_bytes());
        buf.push(b';');
        for col in self.columns.values().sorted_by_key(|c| c.col_id) {
            buf.extend_from_slice(col.name.as_bytes());
            buf.push(b',');
            buf.push(col.col_id);
            buf.push(col.coltype.type_id());
            buf.extend_from_slice(&col.coltype.type_size().to_le_bytes());
            buf.push(col.offset);
        }
        buf.push(b'}');
        stream.write_at(TBL_OFF, &buf)
    }

    pub fn read_from<S: ByteStream>(stream: &mut S) -> DbResult<Self> {
        let mut pos = TBL_OFF;
        let name = read_delimited(stream, &mut pos, b'{')?;
        let key = read_delimited(stream, &mut pos, b';')?;
        let mut tbl = TableMeta::new(name);

        while stream::read_u8(stream, pos)? != b'}' {
            let colname = read_delimited(stream, &mut pos, b',')?;
            let col_id = stream::read_u8(stream, pos)?;
            let type_id = stream::read_u8(stream, pos + 1)?;
            let type_size = stream::read_u64(stream, pos + 2)?;
            let offset = stream::read_u8(stream, pos + 10)?;
            pos += 11;

            let coltype = ColType::from_id(type_id, type_size)
                .ok_or(DbError::Corrupted("unknown column type id"))?;
            tbl.add_column(ColumnMeta {
                name: colname,
                coltype,
                col_id,
                offset,
            })?;
        }
        if !key.is_empty() {
            tbl.set_key(&key)?;
        }
        Ok(tbl)
    }
}

/// Reads bytes up to (and consuming) the delimiter, advancing `pos`.
fn read_delimited<S: ByteStream>(stream: &mut S, pos: &mut u64, delim: u8) -> DbResult<String> {
    let mut bytes = Vec::new();
    loop {
        let byte = stream::read_u8(stream, *pos)?;
        *pos += 1;
        if byte == delim {
            break;
        }
        bytes.push(byte);
    }
    String::from_utf8(bytes).map_err(|_| DbError::Corrupted("table metadata is not valid UTF-8"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::MemStream;

    #[test]
    fn table_round_trips_through_page_zero() {
        let mut tbl = TableMeta::new("test");
        tbl.add_column(ColumnMeta {
            name: "col1".into(),
            coltype: ColType::UInt8,
            col_id: 1,
            offset: 0,
        })
        .unwrap();
        tbl.add_column(ColumnMeta {
            name: "col2".into(),
            coltype: ColType::Text(128),
            col_id: 2,
            offset: 1,
        })
        .unwrap();
        tbl.set_key("col1").unwrap();

        let mut stream = MemStream::with_pages(2);
        tbl.write_to(&mut stream).unwrap();
        let read = TableMeta::read_from(&mut stream).unwrap();

        assert_eq!(read, tbl);
        assert_eq!(read.key(), "col1");
        let col2 = read.get_column("col2").unwrap();
        assert_eq!(col2.coltype, ColType::Text(128));
        assert_eq!(col2.coltype.row_size(), crate::heap::Ptr::SIZE as u8);
    }

    #[test]
    fn empty_table_round_trips() {
        let tbl = TableMeta::new("");
        let mut stream = MemStream::with_pages(1);
        tbl.write_to(&mut stream).unwrap();
        assert_eq!(TableMeta::read_from(&mut stream).unwrap(), tbl);
    }

    #[test]
    fn duplicate_columns_are_rejected() {
        let mut tbl = TableMeta::new("t");
        let col = ColumnMeta {
            name: "a".into(),
            coltype: ColType::Int32,
            col_id: 1,
            offset: 0,
        };
        tbl.add_column(col.clone()).unwrap();
        assert!(matches!(
            tbl.add_column(col),
            Err(DbError::DuplicateColumn(_))
        ));
    }

    #[test]
    fn key_must_name_an_existing_column() {
        let mut tbl = TableMeta::new("t");
        assert!(matches!(
            tbl.set_key("nope"),
            Err(DbError::UnknownColumn(_))
        ));
        assert!(matches!(
            tbl.remove_column("nope"),
            Err(DbError::UnknownColumn(_))
        ));
    }

    #[test]
    fn every_type_id_round_trips() {
        let types = [
            ColType::Int8,
            ColType::UInt8,
            ColType::Int16,
            ColType::UInt16,
            ColType::Int32,
            ColType::UInt32,
            ColType::Int64,
            ColType::UInt64,
            ColType::Float32,
            ColType::Float64,
            ColType::Text(4000),
        ];
        for t in types {
            let mut tbl = TableMeta::new("t");
            tbl.add_column(ColumnMeta {
                name: "c".into(),
                coltype: t,
                col_id: 0,
                offset: 0,
            })
            .unwrap();
            let mut stream = MemStream::with_pages(1);
            tbl.write_to(&mut stream).unwrap();
            let read = TableMeta::read_from(&mut stream).unwrap();
            assert_eq!(read.get_column("c").unwrap().coltype, t);
        }
    }
}
