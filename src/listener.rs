//! TCP listener and per-connection request loop
//!
//! Every accepted connection gets its own thread running
//! [`serve_connection`]. Connections are kept alive across requests until
//! the client closes, asks for `Connection: close`, or a write fails.
//! Requests that do not reach the mounted handler, or that it declines, get
//! a plain default answer: `404 Not Found`, or `405 Method Not Allowed` when
//! only the method was wrong.

use crate::config::ServerConfig;
use crate::handler::{self, Declined, Handler, Outcome};
use crate::http::session::FdSessionOps;
use crate::http::{self, HttpRequest, HttpResponse, HttpServer, SessionOps, Status};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// A handler mounted on one path
#[derive(Debug)]
pub struct Router<H> {
    path: String,
    handler: H,
}

impl<H: Handler> Router<H> {
    pub fn new(path: impl Into<String>, handler: H) -> Self {
        Router {
            path: path.into(),
            handler,
        }
    }

    /// Mount path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Answer one request, falling back to the default responses
    pub fn dispatch<S: SessionOps>(
        &self,
        request: &HttpRequest,
        server: &mut HttpServer<S>,
    ) -> Result<Dispatch, handler::Error> {
        if request.path() != self.path {
            tracing::debug!(uri = request.uri(), "no handler for path");
            server.send_error(Status::NOT_FOUND, "Not Found")?;
            return Ok(Dispatch::NotFound);
        }

        let outcome = self.handler.handle(request, server)?;
        match outcome {
            Outcome::Declined(Declined::Method(method)) => {
                tracing::debug!(%method, "method declined");
                let response = HttpResponse::builder()
                    .status(Status::METHOD_NOT_ALLOWED)
                    .header("Allow", "GET, HEAD")
                    .header("Content-Length", "0")
                    .build();
                server.send_response(&response)?;
            }
            Outcome::Declined(Declined::Version(version)) => {
                tracing::debug!(%version, "protocol version declined");
                server.send_error(Status::NOT_FOUND, "Not Found")?;
            }
            _ => {}
        }
        Ok(Dispatch::Handled(outcome))
    }
}

/// Result of routing one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Path not mounted, 404 sent
    NotFound,
    /// Reached the handler; declined outcomes already got a default answer
    Handled(Outcome),
}

/// Serve requests on one connection until it closes
pub fn serve_connection<S: SessionOps, H: Handler>(
    server: &mut HttpServer<S>,
    router: &Router<H>,
) -> Result<(), handler::Error> {
    loop {
        let request = match server.receive_request() {
            Ok(Some(request)) => request,
            Ok(None) => break,
            Err(
                err @ (http::Error::Parse(_)
                | http::Error::InvalidMethod(_)
                | http::Error::InvalidVersion(_)
                | http::Error::InvalidHeader(_)),
            ) => {
                tracing::debug!(error = %err, "malformed request");
                let response = HttpResponse::builder()
                    .status(Status::BAD_REQUEST)
                    .header("Content-Length", "0")
                    .header("Connection", "close")
                    .build();
                server.send_response(&response)?;
                break;
            }
            Err(err) => return Err(err.into()),
        };

        router.dispatch(&request, server)?;

        if request.wants_close() {
            break;
        }
    }

    server.close()?;
    Ok(())
}

/// Bound listening socket with a mounted handler
pub struct Listener<H> {
    socket: TcpListener,
    router: Arc<Router<H>>,
    timeout: Duration,
}

impl<H: Handler + 'static> Listener<H> {
    /// Bind according to `config` and mount `handler` on `config.path`
    pub fn bind(config: &ServerConfig, handler: H) -> io::Result<Self> {
        let domain = Domain::for_address(config.listen);
        let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&config.listen.into())?;
        socket.listen(config.backlog)?;

        Ok(Listener {
            socket: socket.into(),
            router: Arc::new(Router::new(config.path.clone(), handler)),
            timeout: config.timeout,
        })
    }

    /// Address actually bound, useful with port 0
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Accept connections forever, one thread each
    pub fn run(self) -> io::Result<()> {
        tracing::info!(
            addr = %self.local_addr()?,
            path = self.router.path(),
            "listening"
        );

        for stream in self.socket.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(err) => {
                    tracing::warn!(error = %err, "accept failed");
                    continue;
                }
            };

            let peer = stream.peer_addr().ok();
            let router = Arc::clone(&self.router);
            let timeout = self.timeout;

            thread::spawn(move || {
                tune_stream(&stream, peer);
                let mut server = HttpServer::new(FdSessionOps::new(stream));
                server.set_timeout(timeout);
                if let Err(err) = serve_connection(&mut server, &router) {
                    tracing::warn!(?peer, error = %err, "connection aborted");
                }
            });
        }

        Ok(())
    }
}

/// Disable Nagle so each chunk leaves as soon as it is written
fn tune_stream(stream: &TcpStream, peer: Option<SocketAddr>) {
    if let Err(err) = stream.set_nodelay(true) {
        tracing::debug!(?peer, error = %err, "set_nodelay failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::RandomChunkHandler;
    use crate::http::chunked::split_chunks;
    use crate::http::session::MemorySessionOps;
    use crate::http::Method;

    fn router() -> Router<RandomChunkHandler> {
        Router::new("/random_chunk", RandomChunkHandler::default())
    }

    fn serve(input: &[u8]) -> MemorySessionOps {
        let mut server = HttpServer::new(MemorySessionOps::new(input.to_vec()));
        serve_connection(&mut server, &router()).unwrap();
        std::mem::take(server.session_mut().get_mut())
    }

    /// Split concatenated responses that all use chunked bodies
    fn chunked_bodies(wire: &[u8]) -> Vec<Vec<Vec<u8>>> {
        let mut bodies = Vec::new();
        let mut rest = wire;
        while let Some(end) = rest.windows(4).position(|w| w == b"\r\n\r\n") {
            rest = &rest[end + 4..];
            let body_end = rest
                .windows(5)
                .position(|w| w == b"0\r\n\r\n")
                .map(|pos| pos + 5)
                .unwrap_or(rest.len());
            bodies.push(split_chunks(&rest[..body_end]).unwrap());
            rest = &rest[body_end..];
        }
        bodies
    }

    #[test]
    fn test_unknown_path_is_404() {
        let router = router();
        let mut server = HttpServer::new(MemorySessionOps::new(Vec::new()));
        let request = HttpRequest::new(Method::Get, "/elsewhere?0,10");

        assert_eq!(router.dispatch(&request, &mut server).unwrap(), Dispatch::NotFound);
        let out = String::from_utf8(server.session().get_ref().output()).unwrap();
        assert!(out.starts_with("HTTP/1.1 404 Not Found\r\n"));
    }

    #[test]
    fn test_wrong_method_is_405() {
        let out = serve(b"DELETE /random_chunk?0,10 HTTP/1.1\r\n\r\n");
        let out = String::from_utf8(out.output()).unwrap();
        assert!(out.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"));
        assert!(out.contains("Allow: GET, HEAD\r\n"));
    }

    #[test]
    fn test_http10_falls_through() {
        let out = serve(b"GET /random_chunk?0,10 HTTP/1.0\r\n\r\n");
        let out = String::from_utf8(out.output()).unwrap();
        assert!(out.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(!out.contains("__END__"));
    }

    #[test]
    fn test_keep_alive_serves_each_request() {
        let out = serve(
            b"GET /random_chunk?0,2 HTTP/1.1\r\n\r\n\
              GET /random_chunk?0,3 HTTP/1.1\r\n\r\n",
        );
        let bodies = chunked_bodies(&out.output());

        assert_eq!(bodies.len(), 2);
        assert_eq!(bodies[0].last().unwrap(), b"__END__:2");
        assert_eq!(bodies[1].last().unwrap(), b"__END__:3");
        assert!(out.is_closed());
    }

    #[test]
    fn test_connection_close_stops_loop() {
        let out = serve(
            b"GET /random_chunk?0,1 HTTP/1.1\r\nConnection: close\r\n\r\n\
              GET /random_chunk?0,5 HTTP/1.1\r\n\r\n",
        );
        let bodies = chunked_bodies(&out.output());

        assert_eq!(bodies, vec![vec![b"1".to_vec(), b"__END__:1".to_vec()]]);
        assert!(out.is_closed());
    }

    #[test]
    fn test_malformed_request_gets_400() {
        let out = serve(b"NONSENSE\r\n\r\n");
        let out = String::from_utf8(out.output()).unwrap();
        assert!(out.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(out.contains("Connection: close\r\n"));
    }

    #[test]
    fn test_oversized_head_gets_400() {
        let mut input = b"GET /random_chunk?0,10 HTTP/1.1\r\nX-Long: ".to_vec();
        input.resize(input.len() + http::MAX_HEAD_SIZE, b'z');
        let out = serve(&input);
        let out = String::from_utf8(out.output()).unwrap();
        assert!(out.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    }

    #[test]
    fn test_transport_error_propagates() {
        let mut server =
            HttpServer::new(MemorySessionOps::new(b"GET /random_chunk?0,10 HTTP/1.1\r\n\r\n".to_vec()).fail_after(2));
        let err = serve_connection(&mut server, &router()).unwrap_err();
        assert!(matches!(err, handler::Error::Emit(_)));
    }

    #[test]
    fn test_tune_stream_disables_nagle() {
        let socket = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(socket.local_addr().unwrap()).unwrap();
        let (stream, peer) = socket.accept().unwrap();

        tune_stream(&stream, Some(peer));
        assert!(stream.nodelay().unwrap());
        drop(client);
    }
}
