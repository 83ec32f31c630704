use std::io::{self, Cursor, Seek, SeekFrom};

/// A kinda hacky but alright way to avoid copying tons of data.
pub(crate) trait CursorExt {
    /// Replace this when `#[feature(cursor_remaining)]` is stabilised.
    fn std_remaining_slice(&self) -> &[u8];

    fn truncated(&self, length: u64) -> Self;
    fn with_truncated<T>(&mut self, length: u64, f: impl FnOnce(&mut Self, usize) -> T) -> T;
}

impl CursorExt for Cursor<&[u8]> {
    fn std_remaining_slice(&self) -> &[u8] {
        let inner = self.get_ref();
        let len = self.position().min(inner.len() as u64);
        &inner[(len as usize)..]
    }

    fn truncated(&self, to_length: u64) -> Self {
        let inner = self.get_ref();
        let len = inner.len() as u64;
        let start = self.position().min(len);
        let end = (start + to_length).min(len);
        Cursor::new(&inner[(start as usize)..(end as usize)])
    }

    fn with_truncated<T>(&mut self, length: u64, f: impl FnOnce(&mut Self, usize) -> T) -> T {
        let mut trunc = self.truncated(length);
        let len_hint = trunc.get_ref().len();
        let ret = f(&mut trunc, len_hint);
        self.seek(SeekFrom::Current(trunc.position() as i64)).unwrap();
        ret
    }
}

/// Something that decodes itself from a byte cursor, à la the `dns::Wire` trait.
pub(crate) trait ReadFromCursor: Sized {
    fn read_from(cursor: &mut Cursor<&[u8]>) -> io::Result<Self>;
}
