//! a cursor borrowing the backing store of a volume,
//! which puts the stream position back where the caller left it once it is dropped.
use std::io::{self, Read, Seek, SeekFrom, Write};

/// cursor struct
///
/// Created with [StoreCursor::at], which remembers the current position of
/// the store and seeks to the structure's offset.
/// [StoreCursor::restore] seeks back and reports a failed seek,
/// dropping the cursor without calling it (on an error path) seeks back on a best-effort basis.
#[derive(Debug)]
pub struct StoreCursor<'a, S>
where
    S: Seek,
{
    inner: &'a mut S,
    origin: u64,
    restored: bool,
}

impl<'a, S> StoreCursor<'a, S>
where
    S: Seek,
{
    /// save the current position of `inner` and move it to `offset`
    pub fn at(inner: &'a mut S, offset: u64) -> io::Result<Self> {
        let origin = inner.stream_position()?;
        inner.seek(SeekFrom::Start(offset))?;
        Ok(Self {
            inner,
            origin,
            restored: false,
        })
    }

    /// the position the store had before this cursor was created
    pub const fn origin(&self) -> u64 {
        self.origin
    }

    /// get the current position of the underlying store
    pub fn position(&mut self) -> io::Result<u64> {
        self.inner.stream_position()
    }

    /// move the store back to [origin](StoreCursor::origin)
    pub fn restore(mut self) -> io::Result<()> {
        self.restored = true;
        self.inner.seek(SeekFrom::Start(self.origin)).map(|_| ())
    }
}

impl<S> Drop for StoreCursor<'_, S>
where
    S: Seek,
{
    fn drop(&mut self) {
        if !self.restored {
            // nothing to report to, the original error is already on its way up
            let _ = self.inner.seek(SeekFrom::Start(self.origin));
        }
    }
}

impl<S> Read for StoreCursor<'_, S>
where
    S: Read + Seek,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<S> Write for StoreCursor<'_, S>
where
    S: Write + Seek,
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_restore_moves_back_to_origin() -> anyhow::Result<()> {
        let mut store = Cursor::new((0u8..32).collect::<Vec<_>>());
        store.set_position(5);

        let mut cursor = StoreCursor::at(&mut store, 20)?;
        assert_eq!(cursor.origin(), 5);
        let mut buf = [0u8; 2];
        cursor.read_exact(&mut buf)?;
        assert_eq!(buf, [20, 21]);
        assert_eq!(cursor.position()?, 22);
        cursor.restore()?;

        assert_eq!(store.position(), 5);
        Ok(())
    }

    #[test]
    fn test_drop_restores_after_failed_read() -> anyhow::Result<()> {
        let mut store = Cursor::new(vec![0u8; 8]);
        store.set_position(3);
        {
            let mut cursor = StoreCursor::at(&mut store, 6)?;
            let mut buf = [0u8; 4];
            assert!(cursor.read_exact(&mut buf).is_err());
        }
        assert_eq!(store.position(), 3);
        Ok(())
    }

    #[test]
    fn test_write_goes_to_offset() -> anyhow::Result<()> {
        let mut store = Cursor::new(vec![0u8; 8]);
        let mut cursor = StoreCursor::at(&mut store, 4)?;
        cursor.write_all(&[9, 9])?;
        cursor.flush()?;
        cursor.restore()?;
        assert_eq!(store.get_ref().as_slice(), &[0, 0, 0, 0, 9, 9, 0, 0]);
        assert_eq!(store.position(), 0);
        Ok(())
    }
}
