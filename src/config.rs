//! Command line and environment configuration
//!
//! Arguments are parsed with `clap`; every server setting can also come from
//! a `RANDOM_CHUNK_*` environment variable. [`ServerConfig`] is the validated
//! form the listener runs with.

use crate::emitter::EmitOptions;
use clap::{Args, Parser, Subcommand};
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

/// Default mount path, matching the classic handler location
pub const DEFAULT_PATH: &str = "/random_chunk";

/// Longest idle timeout `poll(2)` can express in milliseconds
pub const MAX_TIMEOUT_SECS: u64 = i32::MAX as u64 / 1000;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot resolve listen address {0:?}")]
    InvalidListen(String),

    #[error("mount path must start with '/' and contain no '?': {0:?}")]
    InvalidPath(String),

    #[error("backlog must be positive, got {0}")]
    InvalidBacklog(i32),

    #[error("timeout must be at least one second")]
    ZeroTimeout,

    #[error("timeout must not exceed {max} seconds, got {0}", max = MAX_TIMEOUT_SECS)]
    TimeoutTooLarge(u64),
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "random-chunk",
    version,
    about = "Deterministic HTTP chunked transfer-encoding traffic generator"
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Serve generated streams over HTTP/1.1
    Serve(ServeArgs),
    /// Write one generated stream to stdout
    Generate(GenerateArgs),
    /// List the segments a query would produce
    Describe(DescribeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Address to listen on.
    ///
    /// Environment variable: `RANDOM_CHUNK_LISTEN`
    #[arg(long, env = "RANDOM_CHUNK_LISTEN", default_value_t = String::from("127.0.0.1:8080"))]
    pub listen: String,

    /// Path the generator is mounted on. Requests look like
    /// `GET <path>?<seed>,<count>`.
    ///
    /// Environment variable: `RANDOM_CHUNK_PATH`
    #[arg(long, env = "RANDOM_CHUNK_PATH", default_value_t = String::from(DEFAULT_PATH))]
    pub path: String,

    /// Listen backlog.
    ///
    /// Environment variable: `RANDOM_CHUNK_BACKLOG`
    #[arg(long, env = "RANDOM_CHUNK_BACKLOG", default_value_t = 128)]
    pub backlog: i32,

    /// Per read/write timeout on client connections, in seconds.
    ///
    /// Environment variable: `RANDOM_CHUNK_TIMEOUT_SECS`
    #[arg(long, env = "RANDOM_CHUNK_TIMEOUT_SECS", default_value_t = 10)]
    pub timeout_secs: u64,

    /// Flush the socket for every empty segment so the boundary shows up as
    /// a separate TCP write.
    ///
    /// Environment variable: `RANDOM_CHUNK_FLUSH_ON_EMPTY`
    #[arg(long, env = "RANDOM_CHUNK_FLUSH_ON_EMPTY", default_value_t = false)]
    pub flush_on_empty: bool,
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    /// Query of the form `<seed>,<count>`, e.g. `0,1000` or `0x2a,010`
    pub query: String,

    /// Emit chunked framing (size lines and terminator) instead of the bare
    /// body
    #[arg(long, default_value_t = false)]
    pub chunked: bool,

    /// Flush stdout for every empty segment
    #[arg(long, default_value_t = false)]
    pub flush_on_empty: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DescribeArgs {
    /// Query of the form `<seed>,<count>`
    pub query: String,
}

/// Validated server settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    pub path: String,
    pub backlog: i32,
    pub timeout: Duration,
    pub emit: EmitOptions,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen: SocketAddr::from(([127, 0, 0, 1], 8080)),
            path: DEFAULT_PATH.to_string(),
            backlog: 128,
            timeout: Duration::from_secs(10),
            emit: EmitOptions::default(),
        }
    }
}

impl TryFrom<ServeArgs> for ServerConfig {
    type Error = Error;

    fn try_from(args: ServeArgs) -> Result<Self, Self::Error> {
        let listen = args
            .listen
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| Error::InvalidListen(args.listen.clone()))?;

        if !args.path.starts_with('/') || args.path.contains('?') {
            return Err(Error::InvalidPath(args.path));
        }

        if args.backlog <= 0 {
            return Err(Error::InvalidBacklog(args.backlog));
        }

        if args.timeout_secs == 0 {
            return Err(Error::ZeroTimeout);
        }
        if args.timeout_secs > MAX_TIMEOUT_SECS {
            return Err(Error::TimeoutTooLarge(args.timeout_secs));
        }

        Ok(ServerConfig {
            listen,
            path: args.path,
            backlog: args.backlog,
            timeout: Duration::from_secs(args.timeout_secs),
            emit: EmitOptions {
                flush_on_empty: args.flush_on_empty,
            },
        })
    }
}
