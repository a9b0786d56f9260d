use crate::{
    request::{deserialize_request, request_len, serialize_response},
    server::{HttpError, Res},
};
use http::status::StatusCode;
use http::{response::Builder, Request, Response};
use mio::event::Event;
use mio::net::TcpStream;
use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// A connection that makes no progress for this long is dropped.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub enum ConnState {
    Read,
    ReadDone,
    Write,
    WriteDone,
}

/// One request, one response, then the connection is closed.
#[derive(Debug)]
pub struct Connection {
    pub stream: TcpStream,
    pub state: ConnState,
    incoming: Vec<u8>,
    outgoing: Option<Vec<u8>>,
    written: usize,
    last_active: Instant,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Self {
        Connection {
            stream,
            state: ConnState::Read,
            incoming: Vec::with_capacity(1024),
            outgoing: None,
            written: 0,
            last_active: Instant::now(),
        }
    }

    pub fn is_idle(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_active) >= IDLE_TIMEOUT
    }

    pub fn handle_event(
        &mut self,
        event: &Event,
        handle: impl FnMut(Request<String>, Builder) -> Res<Response<String>>,
    ) -> Res<&ConnState> {
        if event.is_readable() && matches!(self.state, ConnState::Read) {
            let mut buff = [0_u8; 1024];

            // Drain the socket; a request may span several readiness events.
            loop {
                match self.stream.read(&mut buff) {
                    Ok(0) => return Err(HttpError::Closed),
                    Ok(size) => {
                        self.incoming.extend_from_slice(&buff[..size]);
                        self.last_active = Instant::now();
                    }
                    Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e.into()),
                }
                if self.check_incoming() {
                    break;
                }
            }
        }

        if event.is_writable() && matches!(self.state, ConnState::Write) {
            let outgoing = match self.outgoing.take() {
                Some(bytes) => bytes,
                None => respond(&self.incoming, handle).into_bytes(),
            };

            loop {
                match self.stream.write(&outgoing[self.written..]) {
                    Ok(0) => return Err(HttpError::Closed),
                    Ok(n) => {
                        self.written += n;
                        self.last_active = Instant::now();
                    }
                    Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e.into()),
                }
                if self.written == outgoing.len() {
                    break;
                }
            }

            if self.written == outgoing.len() {
                let _ = self.stream.flush();
                self.state = ConnState::WriteDone;
            } else {
                self.outgoing = Some(outgoing);
            }
        }

        Ok(&self.state)
    }

    /// Moves to `ReadDone` once a whole request is buffered, or once it is
    /// clear the request will be refused, with the error response queued.
    fn check_incoming(&mut self) -> bool {
        match request_len(&self.incoming) {
            Ok(None) => return false,
            Ok(Some(len)) => self.incoming.truncate(len),
            Err(e) => {
                let status = status_for(&e);
                warn!(%status, error = %e, "refusing request");
                self.incoming.clear();
                self.outgoing = Some(send_err(status, e.to_string()).into_bytes());
            }
        }
        self.state = ConnState::ReadDone;
        true
    }
}

fn status_for(e: &HttpError) -> StatusCode {
    match e {
        HttpError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        HttpError::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        _ => StatusCode::BAD_REQUEST,
    }
}

/// Runs the handler, turning any failure into an error response.
fn respond(
    incoming: &[u8],
    handle: impl FnMut(Request<String>, Builder) -> Res<Response<String>>,
) -> String {
    match send_res(incoming, handle) {
        Ok(serialized) => serialized,
        Err(e) => {
            let status = status_for(&e);
            warn!(%status, error = %e, "request failed");
            send_err(status, e.to_string())
        }
    }
}

fn send_err(status_code: StatusCode, msg: String) -> String {
    let mut response = Response::new(msg);
    *response.status_mut() = status_code;
    serialize_response(response)
}

fn send_res(
    incoming: &[u8],
    mut handle: impl FnMut(Request<String>, Builder) -> Res<Response<String>>,
) -> Res<String> {
    let request = deserialize_request(std::str::from_utf8(incoming)?)?;
    debug!(method = %request.method(), uri = %request.uri(), "request");
    let response = (handle)(request, Response::builder())?;
    Ok(serialize_response(response))
}
