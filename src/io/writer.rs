use bytes::{BufMut as _, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::Result;
use crate::io::{CRLF, SP};
use crate::Response;

/// Serialize the status line and header block (including the terminating blank line).
pub fn encode_head(response: &Response) -> BytesMut {
    let headers = response.headers();
    let size = headers
        .iter()
        .map(|(name, value)| name.len() + value.len() + 4)
        .sum::<usize>();

    let mut head = BytesMut::with_capacity(64 + size);

    let status = response.status();
    head.put_slice(&response.version().to_ascii_uppercase());
    head.put_slice(SP);
    head.put_slice(status.as_u16().to_string().as_bytes());
    head.put_slice(SP);
    head.put_slice(status.as_str().as_bytes());
    head.put_slice(CRLF);

    for (name, value) in headers.iter() {
        head.put_slice(name);
        head.put_slice(b": ");
        head.put_slice(value);
        head.put_slice(CRLF);
    }

    head.put_slice(CRLF);
    head
}

pub struct ResponseWriter<W> {
    writer: W,
}

impl<W> ResponseWriter<W>
where
    W: AsyncWrite + Unpin,
{
    #[inline]
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Write the head and the body of a finalized response as two separate writes.
    pub async fn write_response(&mut self, response: &Response) -> Result<()> {
        let head = encode_head(response);
        self.writer.write_all(&head).await?;

        if let Some(body) = response.body().filter(|body| !body.is_empty()) {
            self.writer.write_all(body).await?;
        }

        self.writer.flush().await?;
        Ok(())
    }
}
