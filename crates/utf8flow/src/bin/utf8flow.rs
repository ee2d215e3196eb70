//! utf8flow - re-encode a file as UTF-8 at a bounded CPU usage.
//!
//! Invalid input sequences come out as U+FFFD. Set `RUST_LOG=utf8flow=debug`
//! to watch the rate controller.

use std::{
    cell::RefCell,
    fs::File,
    io::{self, BufWriter, Write},
    path::PathBuf,
    rc::Rc,
};

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, ValueHint};
use tracing_subscriber::EnvFilter;
use utf8flow::{
    AdaptiveOptions, ChunkSource, EncoderOptions, PipelineOptions, Progress, ReaderSource,
    SystemClock, TracingSink, TranscodePipeline,
};

#[derive(Parser)]
#[command(name = "utf8flow", version, about, long_about = None)]
struct Cli {
    /// Input file, or `-` for stdin
    #[arg(value_hint = ValueHint::FilePath, default_value = "-")]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(long, short = 'o', value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,

    /// Fraction of wall-clock time spent transcoding, in (0, 1]
    #[arg(long, default_value_t = AdaptiveOptions::default().target_usage_fraction)]
    target_usage: f64,

    /// Weight of the newest sample in the controller's moving averages
    #[arg(long, default_value_t = AdaptiveOptions::default().smoothing_factor)]
    smoothing: f64,

    /// Bytes read per cycle
    #[arg(long, default_value_t = AdaptiveOptions::default().chunk_size)]
    chunk_size: usize,

    /// Bytes per output chunk
    #[arg(long, default_value_t = EncoderOptions::default().output_capacity)]
    output_capacity: usize,

    /// Log progress once per this many input bytes
    #[arg(long, value_name = "BYTES")]
    progress_every: Option<u64>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn options(&self) -> PipelineOptions {
        PipelineOptions {
            source: AdaptiveOptions {
                target_usage_fraction: self.target_usage,
                smoothing_factor: self.smoothing,
                progress_threshold: self.progress_every,
                chunk_size: self.chunk_size,
            },
            encoder: EncoderOptions {
                output_capacity: self.output_capacity,
            },
        }
    }

    fn source(&self) -> Result<Box<dyn ChunkSource>> {
        if self.input.as_os_str() == "-" {
            return Ok(Box::new(ReaderSource::new(io::stdin().lock())));
        }
        let source = ReaderSource::open(&self.input)
            .with_context(|| format!("cannot open {}", self.input.display()))?;
        Ok(Box::new(source))
    }

    fn sink(&self) -> Result<Box<dyn Write>> {
        Ok(match &self.output {
            Some(path) => Box::new(BufWriter::new(
                File::create(path).with_context(|| format!("cannot create {}", path.display()))?,
            )),
            None => Box::new(BufWriter::new(io::stdout().lock())),
        })
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut pipeline =
        TranscodePipeline::new(cli.source()?, SystemClock::new(), &cli.options(), TracingSink)?;

    let writer = Rc::new(RefCell::new(cli.sink()?));
    let write_error = Rc::new(RefCell::new(None::<io::Error>));
    {
        let writer = Rc::clone(&writer);
        let write_error = Rc::clone(&write_error);
        pipeline.connect_output(move |chunk| {
            if write_error.borrow().is_some() {
                return;
            }
            if let Err(err) = writer.borrow_mut().write_all(&chunk) {
                *write_error.borrow_mut() = Some(err);
            }
        });
    }
    pipeline.on_progress(|p: &Progress| {
        tracing::info!(
            bytes = p.bytes_consumed,
            total = p.total,
            usage = p.usage,
            "progress"
        );
    });

    let status = pipeline.run_to_completion();
    if let Some(err) = write_error.borrow_mut().take() {
        return Err(err).context("cannot write output");
    }
    if !status.result()? {
        bail!("transcode stopped before the input ended");
    }
    writer.borrow_mut().flush().context("cannot write output")?;
    Ok(())
}
