use bytes::Bytes;
use nom::bytes::complete::{tag, take_until};
use nom::combinator::rest;
use nom::sequence::separated_pair;
use nom::IResult;
use tokio::io::AsyncRead;

use crate::error::{Error, Result};
use crate::header::{HeaderMap, CONTENT_LENGTH};
use crate::io::{ByteReader, CRLF, SP};
use crate::{Method, Request};

const HEADER_SEP: &[u8] = b": ";

/// Reads a single HTTP/1.x request off a byte stream, strictly front to back.
pub struct RequestReader<R> {
    stream: ByteReader<R>,
}

impl<R> RequestReader<R>
where
    R: AsyncRead + Unpin,
{
    #[inline]
    pub fn new(reader: R, chunk_size: usize) -> Self {
        Self {
            stream: ByteReader::new(reader, chunk_size),
        }
    }

    #[inline]
    pub fn get_mut(&mut self) -> &mut R {
        self.stream.get_mut()
    }

    #[inline]
    pub fn into_inner(self) -> R {
        self.stream.into_inner()
    }

    async fn read_request_line(&mut self) -> Result<RequestLine> {
        let method = self.stream.read_until(SP, true).await?;
        let method = Method::try_from(Bytes::from(method.to_ascii_uppercase()))?;

        let target = self.stream.read_until(SP, true).await?;
        let version = self.stream.read_until(CRLF, true).await?;

        Ok(RequestLine {
            method,
            target,
            version,
        })
    }

    async fn read_header(&mut self) -> Result<Option<(Bytes, Bytes)>> {
        let line = self.stream.read_until(CRLF, true).await?;

        if line.is_empty() {
            return Ok(None);
        }

        let Ok((_, (name, value))) = header_line(&line) else {
            return Err(Error::lossy(Error::MalformedHeader, &line));
        };

        let name = Bytes::from(name.to_ascii_lowercase());
        let value = line.slice_ref(value);

        Ok(Some((name, value)))
    }

    async fn read_headers(&mut self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        // names are lower-cased, so a repeated field overwrites the earlier value
        while let Some((name, value)) = self.read_header().await? {
            headers.insert(name, value);
        }

        Ok(headers)
    }

    async fn read_body(&mut self, headers: &HeaderMap) -> Result<Option<Bytes>> {
        let Some(value) = headers.get(CONTENT_LENGTH) else {
            return Ok(None);
        };

        let len = content_length(value)?;

        self.stream.read_n(len).await.map(Some)
    }

    pub async fn read_request(&mut self) -> Result<Request> {
        let RequestLine {
            method,
            target,
            version,
        } = self.read_request_line().await?;

        let headers = self.read_headers().await?;

        let body = self.read_body(&headers).await?;

        Ok(Request {
            method,
            path: target,
            version,
            headers,
            body,
        })
    }
}

#[derive(Debug)]
struct RequestLine {
    method: Method,
    target: Bytes,
    version: Bytes,
}

/// Splits `name: value` on the first separator.
fn header_line(input: &[u8]) -> IResult<&[u8], (&[u8], &[u8])> {
    separated_pair(take_until(HEADER_SEP), tag(HEADER_SEP), rest)(input)
}

fn content_length(value: &Bytes) -> Result<usize> {
    std::str::from_utf8(value)
        .ok()
        .and_then(|len| len.trim().parse().ok())
        .ok_or_else(|| Error::lossy(Error::InvalidContentLength, value))
}
