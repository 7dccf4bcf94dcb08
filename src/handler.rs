//! Request handler serving generated chunked traffic
//!
//! `GET <path>?<seed>,<count>` over HTTP/1.1 streams `count` generated
//! segments as chunks followed by the `__END__:<total>` trailer chunk.
//! `HEAD` gets the same headers and no body. Other methods and HTTP/1.0 are
//! declined so the host can answer them its own way. A missing or malformed
//! query still gets a 200 with a fixed usage message as the body.

use crate::emitter::{EmissionResult, EmitError, EmitOptions, Emitter};
use crate::generator::{ConfigError, GeneratorConfig, USAGE_MESSAGE};
use crate::http::{self, HttpRequest, HttpResponse, HttpServer, Method, SessionOps, Status, Version};

/// Content type of generated responses
pub const CONTENT_TYPE: &str = "text/html";

/// Why a request was left to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Declined {
    /// Only GET and HEAD are served
    Method(Method),
    /// Chunked responses need HTTP/1.1
    Version(Version),
}

/// What the handler did with a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing was written; the host must answer
    Declined(Declined),
    /// HEAD request, headers sent
    HeadersOnly,
    /// Query unusable, usage message sent
    Usage(ConfigError),
    /// Generated stream sent in full
    Sent {
        config: GeneratorConfig,
        result: EmissionResult,
    },
}

/// Handler failures; the response is unusable and the connection must go
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to write response: {0}")]
    Http(#[from] http::Error),

    #[error("stream aborted: {0}")]
    Emit(#[from] EmitError),
}

/// Something that can answer requests on a mounted path
pub trait Handler: Send + Sync {
    /// Handle one request, writing the response through `server` unless
    /// the request is declined
    fn handle<S: SessionOps>(
        &self,
        request: &HttpRequest,
        server: &mut HttpServer<S>,
    ) -> Result<Outcome, Error>;
}

/// The chunked traffic generator as a request handler
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomChunkHandler {
    emitter: Emitter,
}

impl RandomChunkHandler {
    pub fn new(options: EmitOptions) -> Self {
        RandomChunkHandler {
            emitter: Emitter::new(options),
        }
    }

    fn response_head() -> HttpResponse {
        HttpResponse::builder()
            .status(Status::OK)
            .header("Content-Type", CONTENT_TYPE)
            .build()
    }
}

impl Handler for RandomChunkHandler {
    fn handle<S: SessionOps>(
        &self,
        request: &HttpRequest,
        server: &mut HttpServer<S>,
    ) -> Result<Outcome, Error> {
        if request.version() != Version::Http11 {
            return Ok(Outcome::Declined(Declined::Version(request.version())));
        }

        match request.method() {
            Method::Get => {}
            Method::Head => {
                let mut head = Self::response_head();
                head.headers_mut().insert("Transfer-Encoding", "chunked");
                server.send_response_headers(&head)?;
                return Ok(Outcome::HeadersOnly);
            }
            other => return Ok(Outcome::Declined(Declined::Method(other))),
        }

        let config = match GeneratorConfig::from_query(request.query()) {
            Ok(config) => config,
            Err(err) => {
                tracing::debug!(uri = request.uri(), error = %err, "rejecting query");
                let mut body = server.start_chunked_response(&Self::response_head())?;
                body.write_chunk(USAGE_MESSAGE.as_bytes())?;
                body.finish()?;
                return Ok(Outcome::Usage(err));
            }
        };

        let mut body = server.start_chunked_response(&Self::response_head())?;
        let result = self.emitter.emit(config.segments(), &mut body)?;
        body.finish()?;

        tracing::info!(
            seed = config.seed(),
            count = config.count(),
            "sent {} bytes",
            result.total_bytes_written
        );

        Ok(Outcome::Sent { config, result })
    }
}
