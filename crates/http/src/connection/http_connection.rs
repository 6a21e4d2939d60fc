use std::error::Error;
use std::fmt::Display;
use std::sync::Arc;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use http::header::CONNECTION;
use http::{HeaderValue, Method, Request, Response, StatusCode};
use http_body::Body;
use http_body_util::BodyExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info};

use crate::codec::{RequestDecoder, ResponseEncoder};
use crate::handler::Handler;
use crate::protocol::{HttpError, is_keep_alive};

/// Initial capacity of the read buffer
const READ_BUFFER_SIZE: usize = 8 * 1024;

/// An HTTP connection that reads requests, calls a handler and writes responses
///
/// Requests on one connection are answered strictly in order. The connection stays
/// open while the client asks for keep-alive and ends on EOF, on `Connection: close`
/// or on a request that cannot be decoded (which is answered with `400 Bad Request`).
///
/// # Type Parameters
///
/// * `R`: The async readable stream type
/// * `W`: The async writable stream type
pub struct HttpConnection<R, W> {
    framed_read: FramedRead<R, RequestDecoder>,
    framed_write: FramedWrite<W, ResponseEncoder>,
}

impl<R, W> std::fmt::Debug for HttpConnection<R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpConnection").finish_non_exhaustive()
    }
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            framed_read: FramedRead::with_capacity(reader, RequestDecoder::new(), READ_BUFFER_SIZE),
            framed_write: FramedWrite::new(writer, ResponseEncoder::new()),
        }
    }

    pub async fn process<H>(mut self, handler: Arc<H>) -> Result<(), HttpError>
    where
        H: Handler,
        <H::RespBody as Body>::Error: Display,
    {
        loop {
            match self.framed_read.next().await {
                Some(Ok(request)) => {
                    let keep_alive = is_keep_alive(&request);
                    let head_request = request.method() == Method::HEAD;
                    let response = call_handler(handler.as_ref(), request).await;
                    self.framed_write.encoder_mut().set_head_request(head_request);
                    self.send_response(response, keep_alive).await?;

                    if !keep_alive {
                        debug!("client asked to close, break this connection down");
                        return Ok(());
                    }
                }

                Some(Err(e)) => {
                    error!("can't receive next request, cause {}", e);
                    self.framed_write.encoder_mut().set_head_request(false);
                    self.send_response(build_error_response(StatusCode::BAD_REQUEST), false).await?;
                    return Err(e.into());
                }

                None => {
                    info!("cant read more request, break this connection down");
                    return Ok(());
                }
            }
        }
    }

    async fn send_response(&mut self, mut response: Response<Bytes>, keep_alive: bool) -> Result<(), HttpError> {
        if !keep_alive {
            response.headers_mut().insert(CONNECTION, HeaderValue::from_static("close"));
        }
        // send flushes, one response per round trip
        self.framed_write.send(response).await?;
        Ok(())
    }
}

async fn call_handler<H>(handler: &H, request: Request<Bytes>) -> Response<Bytes>
where
    H: Handler,
    <H::RespBody as Body>::Error: Display,
{
    let response = match handler.call(request).await {
        Ok(response) => response,
        Err(e) => {
            let cause: Box<dyn Error + Send + Sync> = e.into();
            error!("handle response error, cause: {}", cause);
            return build_error_response(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let (parts, body) = response.into_parts();
    match body.collect().await {
        Ok(collected) => Response::from_parts(parts, collected.to_bytes()),
        Err(e) => {
            error!("resolve response body error, cause: {}", e);
            build_error_response(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn build_error_response(status_code: StatusCode) -> Response<Bytes> {
    let mut response = Response::new(Bytes::new());
    *response.status_mut() = status_code;
    response
}
