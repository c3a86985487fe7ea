use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt as _, AsyncWrite, AsyncWriteExt as _};
use tracing::{debug, info, Span};

use crate::config::ProtocolConfig;
use crate::error::{Error, Result};
use crate::io::{RequestReader, ResponseWriter};
use crate::{Request, ResponseBuilder};

/// Upper bound on the unread request bytes discarded when closing after a failed read.
const DRAIN_LIMIT: u64 = 64 * 1024;

/// How long closing waits for the rest of an unread request.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(100);

/// One request/response exchange over an accepted connection.
///
/// The session reads exactly one request and sends exactly one response, there is no keep-alive.
/// Events are reported to the span given by [`Session::with_span`].
pub struct Session<S> {
    reader: Option<RequestReader<S>>,
    protocol: ProtocolConfig,
    span: Span,
    request_read: bool,
    response_sent: bool,
    unread_input: bool,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, protocol: &ProtocolConfig) -> Self {
        Self {
            reader: Some(RequestReader::new(stream, protocol.chunk_size)),
            protocol: protocol.clone(),
            span: Span::none(),
            request_read: false,
            response_sent: false,
            unread_input: false,
        }
    }

    #[inline]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.reader.is_none()
    }

    pub async fn read_request(&mut self) -> Result<Request> {
        let reader = self.reader.as_mut().ok_or(Error::SessionClosed)?;

        if self.request_read {
            return Err(Error::SessionReused("read a request"));
        }
        self.request_read = true;

        let request = match reader.read_request().await {
            Ok(request) => request,
            Err(e) => {
                self.unread_input = true;
                return Err(e);
            }
        };

        debug!(
            parent: &self.span,
            request = %request,
            headers = %request.headers(),
            body = request.body().map(|body| body.len()),
            "request"
        );

        Ok(request)
    }

    /// Finalize the response and write it to the client.
    pub async fn send_response(&mut self, response: ResponseBuilder) -> Result<()> {
        if self.is_closed() {
            return Err(Error::SessionClosed);
        }

        if self.response_sent {
            return Err(Error::SessionReused("send a response"));
        }
        self.response_sent = true;

        let response = response.finalize(&self.protocol);

        info!(
            parent: &self.span,
            status = %response.status(),
            headers = %response.headers(),
            "response"
        );

        let reader = self.reader.as_mut().ok_or(Error::SessionClosed)?;

        ResponseWriter::new(reader.get_mut())
            .write_response(&response)
            .await
    }

    /// Shut down and release the connection. Closing a closed session does nothing.
    ///
    /// If the request was not read completely, a bounded amount of the remaining input is
    /// discarded after the shutdown so that the client still gets to read the response.
    pub async fn close(&mut self) -> Result<()> {
        let Some(reader) = self.reader.take() else {
            return Ok(());
        };

        let mut stream = reader.into_inner();

        let closed = match stream.shutdown().await {
            Ok(()) => Ok(()),
            // the peer might have gone already
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e.into()),
        };

        if self.unread_input && closed.is_ok() {
            drain(&mut stream, &self.span).await;
        }

        closed
    }
}

/// Discard pending input until EOF, [`DRAIN_LIMIT`] bytes or [`DRAIN_TIMEOUT`], whichever is first.
async fn drain<S>(stream: &mut S, span: &Span)
where
    S: AsyncRead + Unpin,
{
    let mut input = stream.take(DRAIN_LIMIT);
    let mut sink = tokio::io::sink();

    match tokio::time::timeout(DRAIN_TIMEOUT, tokio::io::copy(&mut input, &mut sink)).await {
        Ok(Ok(n)) => debug!(parent: span, bytes = n, "drained unread input"),
        Ok(Err(error)) => debug!(parent: span, %error, "cannot drain unread input"),
        Err(_) => debug!(parent: span, "gave up draining unread input"),
    }
}
