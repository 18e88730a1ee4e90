//! Buffered reads and writes over an async byte stream.

use std::ops::Range;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};

use crate::buffer::{Cursor, ReadBuffer};
use crate::error::{Error, Result};
use crate::protocol::codec::{HEADER_LEN, read_header};

/// Make at least `n` unread bytes available in `buf`.
///
/// Returns immediately, without touching the stream, if they already are.
/// Otherwise the buffer is shifted or grown, the stream is read until `n`
/// bytes are present, and whatever else the socket has ready is drained into
/// the remaining free space.
pub async fn ensure_buffered<S>(stream: &mut S, buf: &mut ReadBuffer, n: usize) -> Result<Cursor>
where
    S: AsyncRead + Unpin,
{
    if buf.cursor().available() >= n {
        return Ok(buf.cursor());
    }

    buf.reserve(n);
    while buf.cursor().available() < n {
        let read = stream.read(buf.spare_mut()).await?;
        if read == 0 {
            return Err(Error::ConnectionClosed);
        }
        buf.commit(read);
    }

    drain_ready(stream, buf);
    Ok(buf.cursor())
}

/// Copy bytes the stream can deliver without waiting.
///
/// Stops at the first `Pending`, EOF or error; the latter two surface on the
/// next required read.
fn drain_ready<S>(stream: &mut S, buf: &mut ReadBuffer)
where
    S: AsyncRead + Unpin,
{
    let mut cx = Context::from_waker(Waker::noop());
    loop {
        let spare = buf.spare_mut();
        if spare.is_empty() {
            return;
        }
        let mut read_buf = ReadBuf::new(spare);
        match Pin::new(&mut *stream).poll_read(&mut cx, &mut read_buf) {
            Poll::Ready(Ok(())) => {
                let read = read_buf.filled().len();
                if read == 0 {
                    return;
                }
                buf.commit(read);
            }
            Poll::Ready(Err(e)) => {
                tracing::debug!(error = %e, "read error while draining; deferred");
                return;
            }
            Poll::Pending => return,
        }
    }
}

/// Read one complete message and consume it.
///
/// Returns the type byte and the payload's range in [`ReadBuffer::data`],
/// valid until the next read.
pub async fn read_message<S>(stream: &mut S, buf: &mut ReadBuffer) -> Result<(u8, Range<usize>)>
where
    S: AsyncRead + Unpin,
{
    let cursor = ensure_buffered(stream, buf, HEADER_LEN).await?;
    let (type_byte, len) = read_header(&buf.data()[cursor.pos..cursor.len])?
        .ok_or_else(|| Error::Protocol("incomplete message header".into()))?;

    let cursor = ensure_buffered(stream, buf, HEADER_LEN + len).await?;
    let start = cursor.pos + HEADER_LEN;
    buf.consume(HEADER_LEN + len);
    Ok((type_byte, start..start + len))
}

/// Write all bytes and flush.
pub async fn write_all<S>(stream: &mut S, data: &[u8]) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(data).await?;
    stream.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::io::{AsyncWriteExt, duplex};

    use super::*;
    use crate::buffer_pool::BufferPool;

    #[tokio::test]
    async fn satisfied_request_does_no_io() {
        let pool = Arc::new(BufferPool::new(4));
        let mut buf = ReadBuffer::new(&pool, 64);
        let (mut client, mut server) = duplex(64);
        server.write_all(b"abcdef").await.unwrap();

        ensure_buffered(&mut client, &mut buf, 6).await.unwrap();
        server.write_all(b"gh").await.unwrap();

        // Already buffered: the two new bytes stay in the pipe
        let cursor = ensure_buffered(&mut client, &mut buf, 4).await.unwrap();
        assert_eq!(cursor, Cursor { pos: 0, len: 6 });
    }

    #[tokio::test]
    async fn drains_ready_bytes() {
        let pool = Arc::new(BufferPool::new(4));
        let mut buf = ReadBuffer::new(&pool, 64);
        let (mut client, mut server) = duplex(64);
        server.write_all(&[7; 40]).await.unwrap();

        let cursor = ensure_buffered(&mut client, &mut buf, 1).await.unwrap();
        assert_eq!(cursor.available(), 40);
    }

    /// Hands out one chunk, then fails every read.
    struct ResetAfter {
        chunk: Option<Vec<u8>>,
    }

    impl AsyncRead for ResetAfter {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            match self.get_mut().chunk.take() {
                Some(chunk) => {
                    buf.put_slice(&chunk);
                    Poll::Ready(Ok(()))
                }
                None => Poll::Ready(Err(std::io::ErrorKind::ConnectionReset.into())),
            }
        }
    }

    #[tokio::test]
    async fn error_after_required_bytes_is_deferred() {
        let pool = Arc::new(BufferPool::new(4));
        let mut buf = ReadBuffer::new(&pool, 64);
        let mut stream = ResetAfter {
            chunk: Some(b"Z\0\0\0\x05I".to_vec()),
        };

        let cursor = ensure_buffered(&mut stream, &mut buf, 6).await.unwrap();
        assert_eq!(&buf.data()[cursor.pos..cursor.len], b"Z\0\0\0\x05I");

        // The reset shows up once more bytes are actually required
        assert!(matches!(
            ensure_buffered(&mut stream, &mut buf, 7).await,
            Err(Error::Io(_))
        ));
    }

    #[tokio::test]
    async fn grows_for_large_request() {
        let pool = Arc::new(BufferPool::new(4));
        let mut buf = ReadBuffer::new(&pool, 8);
        let (mut client, mut server) = duplex(1024);
        let payload: Vec<u8> = (0..100).collect();
        server.write_all(&payload).await.unwrap();

        let cursor = ensure_buffered(&mut client, &mut buf, 100).await.unwrap();
        assert!(buf.capacity() >= 100);
        assert_eq!(&buf.data()[cursor.pos..cursor.len], payload.as_slice());
    }

    #[tokio::test]
    async fn eof_is_connection_closed() {
        let pool = Arc::new(BufferPool::new(4));
        let mut buf = ReadBuffer::new(&pool, 8);
        let (mut client, mut server) = duplex(64);
        server.write_all(b"ab").await.unwrap();
        drop(server);

        assert!(matches!(
            ensure_buffered(&mut client, &mut buf, 4).await,
            Err(Error::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn reads_framed_message() {
        let pool = Arc::new(BufferPool::new(4));
        let mut buf = ReadBuffer::new(&pool, 8);
        let (mut client, mut server) = duplex(64);
        server
            .write_all(&[b'C', 0, 0, 0, 13, b'S', b'E', b'L', b'E', b'C', b'T', b' ', b'1', 0])
            .await
            .unwrap();

        let (type_byte, range) = read_message(&mut client, &mut buf).await.unwrap();
        assert_eq!(type_byte, b'C');
        assert_eq!(&buf.data()[range], b"SELECT 1\0");
        assert_eq!(buf.cursor().available(), 0);
    }
}
