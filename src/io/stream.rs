use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Error, Result};

/// Buffered reader turning an arbitrarily chunked byte stream into delimited or sized pieces.
///
/// Bytes received from the stream but not yet handed out are kept in a pending buffer, which is
/// refilled with at most `chunk_size` bytes per receive whenever a read needs more data.
#[derive(Debug)]
pub struct ByteReader<R> {
    inner: R,
    pending: BytesMut,
    chunk_size: usize,
}

impl<R> ByteReader<R>
where
    R: AsyncRead + Unpin,
{
    #[inline]
    pub fn new(inner: R, chunk_size: usize) -> Self {
        // a zero-sized receive would be indistinguishable from a closed peer
        let chunk_size = chunk_size.max(1);
        Self {
            inner,
            pending: BytesMut::with_capacity(chunk_size),
            chunk_size,
        }
    }

    /// Number of bytes received but not consumed yet.
    #[inline]
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    #[inline]
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Drop any pending bytes and give back the underlying stream.
    #[inline]
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Receive one chunk into the pending buffer.
    async fn fill(&mut self) -> Result<usize> {
        self.pending.reserve(self.chunk_size);

        let mut chunk = (&mut self.inner).take(self.chunk_size as u64);
        let n = chunk.read_buf(&mut self.pending).await?;

        if n == 0 {
            return Err(Error::ConnectionClosed);
        }

        Ok(n)
    }

    /// Read up to and including the first occurrence of `terminator`.
    ///
    /// If `strip` is set, the terminator is removed from the returned data.
    pub async fn read_until(&mut self, terminator: &[u8], strip: bool) -> Result<Bytes> {
        if terminator.is_empty() {
            return Ok(Bytes::new());
        }

        let mut scanned = 0;

        loop {
            if let Some(at) = find(&self.pending[scanned..], terminator) {
                let end = scanned + at + terminator.len();
                let mut data = self.pending.split_to(end);
                if strip {
                    data.truncate(end - terminator.len());
                }
                return Ok(data.freeze());
            }

            // the terminator might straddle the boundary with the next chunk
            scanned = self.pending.len().saturating_sub(terminator.len() - 1);

            self.fill().await?;
        }
    }

    /// Read exactly `n` bytes.
    ///
    /// The buffer only grows with the data actually received, `n` comes straight off the wire.
    pub async fn read_n(&mut self, n: usize) -> Result<Bytes> {
        while self.pending.len() < n {
            self.fill().await?;
        }

        Ok(self.pending.split_to(n).freeze())
    }
}

#[inline]
fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
