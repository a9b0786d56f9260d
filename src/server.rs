use crate::connection::{ConnState, Connection, IDLE_TIMEOUT};
use http::{response::Builder, Request, Response};
use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token};
use std::net::SocketAddr;
use std::time::Instant;
use std::{collections::HashMap, io::ErrorKind};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum HttpError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("request is not utf-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("malformed request: {0}")]
    Malformed(String),
    #[error("unsupported method: {0}")]
    Method(String),
    #[error("invalid header name: {0}")]
    HeaderName(#[from] http::header::InvalidHeaderName),
    #[error("invalid header value: {0}")]
    HeaderValue(#[from] http::header::InvalidHeaderValue),
    #[error("http error: {0}")]
    Http(#[from] http::Error),
    #[error("invalid json body: {0}")]
    Json(#[from] serde_json::Error),
    #[error("request exceeds {0} bytes")]
    TooLarge(usize),
    #[error("connection closed before the request was complete")]
    Closed,
}

pub type Res<T> = Result<T, HttpError>;

const SERVER: Token = Token(0);

/// Single-threaded readiness loop. Requests are handed to `handle` one at a
/// time, in the order their connections become ready. Connections idle for
/// `IDLE_TIMEOUT` are closed.
pub struct Server<'a> {
    handle: Box<dyn FnMut(Request<String>, Builder) -> Res<Response<String>> + 'a>,
}

impl<'a> Server<'a> {
    pub fn new(handle: impl FnMut(Request<String>, Builder) -> Res<Response<String>> + 'a) -> Self {
        Server {
            handle: Box::new(handle),
        }
    }

    pub fn listen(&mut self, addr: SocketAddr) -> Res<()> {
        let mut listener = TcpListener::bind(addr)?;
        let mut poll = Poll::new()?;
        let mut events = Events::with_capacity(128);

        poll.registry()
            .register(&mut listener, SERVER, Interest::READABLE)?;
        info!(%addr, "listening for webhook requests");

        let mut connections = HashMap::new();
        let mut next_token = Token(SERVER.0);

        loop {
            if let Err(e) = poll.poll(&mut events, Some(IDLE_TIMEOUT)) {
                if e.kind() == ErrorKind::Interrupted {
                    continue;
                }
                return Err(e.into());
            }

            for event in &events {
                match event.token() {
                    SERVER => loop {
                        let (mut stream, peer) = match listener.accept() {
                            Ok(conn) => conn,
                            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                                break;
                            }
                            Err(e) => Err(e)?,
                        };

                        next_token = Token(next_token.0 + 1);
                        debug!(%peer, token = next_token.0, "accepted connection");

                        poll.registry()
                            .register(&mut stream, next_token, Interest::READABLE)?;

                        connections.insert(next_token, Connection::new(stream));
                    },
                    token => {
                        if let Some(connection) = connections.get_mut(&token) {
                            match connection.handle_event(event, &mut self.handle) {
                                Ok(ConnState::Read) => {}
                                Ok(ConnState::Write) => {}
                                Ok(ConnState::ReadDone) => {
                                    let _ = poll.registry().reregister(
                                        &mut connection.stream,
                                        token,
                                        Interest::WRITABLE,
                                    );
                                    connection.state = ConnState::Write;
                                }
                                Ok(ConnState::WriteDone) => {
                                    connections.remove(&token);
                                }
                                Err(e) => {
                                    warn!(token = token.0, error = %e, "dropping connection");
                                    connections.remove(&token);
                                }
                            }
                        }
                    }
                }
            }

            let now = Instant::now();
            connections.retain(|token: &Token, connection: &mut Connection| {
                let idle = connection.is_idle(now);
                if idle {
                    debug!(token = token.0, "closing idle connection");
                }
                !idle
            });
        }
    }
}
