//! random-chunk command line entry point

use anyhow::{Context, Result};
use clap::Parser;
use random_chunk::config::{CliArgs, Command, DescribeArgs, GenerateArgs, ServerConfig};
use random_chunk::emitter::{EmitOptions, Emitter, RawSink};
use random_chunk::generator::{GeneratorConfig, MAX_SEGMENT};
use random_chunk::handler::RandomChunkHandler;
use random_chunk::http::chunked::ChunkedEncoder;
use random_chunk::listener::Listener;
use std::io::{self, BufWriter, Write};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    match CliArgs::parse().command {
        Command::Serve(args) => {
            let config = ServerConfig::try_from(args).context("invalid server configuration")?;
            let handler = RandomChunkHandler::new(config.emit);
            let listener = Listener::bind(&config, handler)
                .with_context(|| format!("failed to bind {}", config.listen))?;
            listener.run().context("listener failed")
        }
        Command::Generate(args) => generate(&args),
        Command::Describe(args) => describe(&args),
    }
}

fn generate(args: &GenerateArgs) -> Result<()> {
    let config = GeneratorConfig::from_query(Some(&args.query))?;
    let emitter = Emitter::new(EmitOptions {
        flush_on_empty: args.flush_on_empty,
    });
    let stdout = BufWriter::new(io::stdout().lock());

    let result = if args.chunked {
        let mut encoder = ChunkedEncoder::new(stdout);
        let result = emitter.emit(config.segments(), &mut encoder)?;
        encoder.finish()?;
        result
    } else {
        let mut sink = RawSink::new(stdout);
        let result = emitter.emit(config.segments(), &mut sink)?;
        sink.into_inner().flush()?;
        result
    };

    tracing::info!(
        seed = config.seed(),
        count = config.count(),
        "sent {} bytes",
        result.total_bytes_written
    );
    Ok(())
}

fn describe(args: &DescribeArgs) -> Result<()> {
    let config = GeneratorConfig::from_query(Some(&args.query))?;
    let mut out = BufWriter::new(io::stdout().lock());

    let mut buf = [0u8; MAX_SEGMENT as usize];
    let mut total: u64 = 0;
    for (index, segment) in config.segments().enumerate() {
        let payload = segment.payload(&mut buf);
        total += payload.len() as u64;
        match payload.first() {
            Some(&byte) => writeln!(
                out,
                "{index:>8} {:<6} {:>2} {:?}",
                segment.kind(),
                payload.len(),
                byte as char
            )?,
            None => writeln!(out, "{index:>8} {:<6} {:>2}", segment.kind(), 0)?,
        }
    }
    writeln!(out, "total {total} bytes")?;
    out.flush()?;
    Ok(())
}
