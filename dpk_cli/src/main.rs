mod stream;
mod synth;

use std::fs::File;
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};

use dpk_codecs::{compressor_by_id, compressor_by_name};
use dpk_core::format::{self, FrameHeader, STAGE_STORED, TAG_LOSSLESS, TAG_LOSSY};
use dpk_core::{ByteCompressor, DepthCodec, Lossless, Lossy, Quantizer};

use stream::{StreamReader, StreamWriter};

/// Frame rate used for the bandwidth figures in reports.
const REPORT_FPS: f64 = 30.0;

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "dpk",
    about = "Depth-frame codec for 16-bit depth camera streams",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress raw depth frames (u16 LE, row-major, back to back) into a DPK stream
    Compress {
        /// Raw depth file ("-" reads stdin)
        input: PathBuf,
        /// Destination DPK stream file
        output: PathBuf,
        /// Frame width in pixels
        #[arg(long)]
        width: u32,
        /// Frame height in pixels
        #[arg(long)]
        height: u32,
        /// Use the bounded-error tier instead of the exact one
        #[arg(long)]
        lossy: bool,
        /// Second stage: none | zstd | lz4
        #[arg(short, long, default_value = "zstd")]
        compressor: String,
        /// Zstd compression level (only used with --compressor zstd)
        #[arg(long, default_value_t = 1)]
        zstd_level: i32,
        /// Emit a keyframe every N frames (0 = first frame only)
        #[arg(short, long, default_value_t = 30)]
        keyframe_interval: u32,
    },
    /// Decompress a DPK stream back to raw u16 LE depth frames
    Decompress {
        /// Source DPK stream file
        input: PathBuf,
        /// Destination raw file ("-" writes to stdout)
        output: PathBuf,
    },
    /// Print frame headers and size statistics of a DPK stream
    Inspect {
        /// DPK stream file to inspect
        file: PathBuf,
        /// Print per-frame details
        #[arg(long)]
        frames: bool,
    },
    /// Benchmark both tiers on a synthetic depth scene
    Bench {
        #[arg(long, default_value_t = 320)]
        width: u32,
        #[arg(long, default_value_t = 288)]
        height: u32,
        /// Number of frames in the sequence
        #[arg(short, long, default_value_t = 30)]
        frames: u32,
        /// Emit a keyframe every N frames (0 = first frame only)
        #[arg(short, long, default_value_t = 30)]
        keyframe_interval: u32,
        /// Zstd level for the zstd rows
        #[arg(long, default_value_t = 1)]
        zstd_level: i32,
        /// Fixed scene seed for reproducibility
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.2} {}", v, UNITS[unit])
    }
}

/// Average compressed bits per second at `REPORT_FPS`, in Mbps.
fn mbps(bytes: u64, frames: u64) -> f64 {
    if frames == 0 {
        return 0.0;
    }
    (bytes as f64 / frames as f64) * 8.0 * REPORT_FPS / 1_000_000.0
}

fn is_keyframe_index(index: u64, interval: u32) -> bool {
    index == 0 || (interval != 0 && index % interval as u64 == 0)
}

fn samples_to_le_bytes(depth: &[u16]) -> Vec<u8> {
    depth.iter().flat_map(|d| d.to_le_bytes()).collect()
}

fn le_bytes_to_samples(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect()
}

/// Fill `buf` completely, or report a clean end of input with `false`.
fn read_frame(src: &mut dyn Read, buf: &mut [u8]) -> anyhow::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match src.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    if filled == 0 {
        return Ok(false);
    }
    if filled < buf.len() {
        anyhow::bail!(
            "input ends with a partial frame ({} of {} bytes)",
            filled,
            buf.len()
        );
    }
    Ok(true)
}

fn build_codec<Q: Quantizer>(
    quantizer: Q,
    compressor: Option<Box<dyn ByteCompressor>>,
) -> DepthCodec<Q> {
    match compressor {
        Some(c) => DepthCodec::with_compressor(quantizer, c),
        None => DepthCodec::new(quantizer),
    }
}

// ── Subcommand implementations ─────────────────────────────────────────────

struct CompressArgs {
    input: PathBuf,
    output: PathBuf,
    width: u32,
    height: u32,
    lossy: bool,
    compressor: String,
    zstd_level: i32,
    keyframe_interval: u32,
}

fn run_compress(args: CompressArgs) -> anyhow::Result<()> {
    let compressor = compressor_by_name(&args.compressor, args.zstd_level)?;
    if args.lossy {
        compress_frames(build_codec(Lossy, compressor), &args)
    } else {
        compress_frames(build_codec(Lossless, compressor), &args)
    }
}

fn compress_frames<Q: Quantizer>(mut codec: DepthCodec<Q>, args: &CompressArgs) -> anyhow::Result<()> {
    let pixels = format::pixel_count(args.width, args.height)
        .with_context(|| format!("invalid resolution {}x{}", args.width, args.height))?;

    let mut src: Box<dyn Read> = if args.input.to_str() == Some("-") {
        Box::new(io::stdin().lock())
    } else {
        Box::new(BufReader::new(
            File::open(&args.input).with_context(|| format!("opening input file {:?}", args.input))?,
        ))
    };
    let mut writer = StreamWriter::create(&args.output)?;

    let mut raw = vec![0u8; pixels * 2];
    let mut index = 0u64;
    let mut keyframes = 0u64;
    let t0 = Instant::now();

    while read_frame(&mut src, &mut raw)? {
        let depth = le_bytes_to_samples(&raw);
        let keyframe = is_keyframe_index(index, args.keyframe_interval);
        let buf = codec
            .compress(args.width, args.height, &depth, keyframe)
            .with_context(|| format!("compressing frame {}", index))?;
        writer.write_frame(&buf)?;
        index += 1;
        keyframes += keyframe as u64;
    }

    let (frames, written) = writer.finish()?;
    let elapsed = t0.elapsed();
    let raw_total = frames * pixels as u64 * 2;

    eprintln!("  tier        : {}", codec.quantizer().name());
    eprintln!(
        "  compressor  : {}",
        codec.compressor().map_or("none", |c| c.name())
    );
    eprintln!("  resolution  : {}x{}", args.width, args.height);
    eprintln!("  frames      : {} ({} keyframes)", frames, keyframes);
    eprintln!("  raw size    : {}", human_bytes(raw_total));
    eprintln!("  compressed  : {}", human_bytes(written));
    if written > 0 {
        eprintln!("  ratio       : {:.2}x", raw_total as f64 / written as f64);
    }
    eprintln!("  bandwidth   : {:.2} Mbps @ {} FPS", mbps(written, frames), REPORT_FPS);
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn run_decompress(input: PathBuf, output: PathBuf) -> anyhow::Result<()> {
    // The first frame's tag decides the tier for the whole stream.
    let tag = {
        let mut reader = StreamReader::open(&input)?;
        match reader.next_frame()? {
            Some(buf) => FrameHeader::peek(&buf).context("reading first frame header")?.tag,
            None => anyhow::bail!("stream {:?} contains no frames", input),
        }
    };

    match tag {
        TAG_LOSSLESS => decompress_frames(DepthCodec::new(Lossless), &input, &output),
        TAG_LOSSY => decompress_frames(DepthCodec::new(Lossy), &input, &output),
        other => anyhow::bail!("unknown format tag 0x{:02x}", other),
    }
}

fn decompress_frames<Q: Quantizer>(
    mut codec: DepthCodec<Q>,
    input: &Path,
    output: &Path,
) -> anyhow::Result<()> {
    let mut reader = StreamReader::open(input)?;

    let is_stdout = output.to_str() == Some("-");
    let mut dst: Box<dyn Write> = if is_stdout {
        Box::new(io::stdout())
    } else {
        Box::new(BufWriter::new(
            File::create(output).with_context(|| format!("creating output file {:?}", output))?,
        ))
    };

    let t0 = Instant::now();
    let mut frames = 0u64;
    let mut total_raw = 0u64;

    while let Some(buf) = reader.next_frame()? {
        let header = FrameHeader::peek(&buf).with_context(|| format!("frame {}", frames))?;
        let have = codec.compressor().map(|c| c.id());
        if header.stage != STAGE_STORED && have != Some(header.stage) {
            log::info!("frame {}: switching second stage to {}", frames, format::stage_name(header.stage));
            codec.set_compressor(compressor_by_id(header.stage)?);
        }

        let frame = codec
            .decompress(&buf)
            .with_context(|| format!("decompressing frame {}", frames))?;
        let bytes = samples_to_le_bytes(&frame.depth);
        dst.write_all(&bytes)?;
        total_raw += bytes.len() as u64;
        frames += 1;
    }
    dst.flush()?;

    let elapsed = t0.elapsed();
    eprintln!("  tier        : {}", codec.quantizer().name());
    eprintln!("  frames      : {}", frames);
    eprintln!("  raw size    : {}", human_bytes(total_raw));
    eprintln!(
        "  throughput  : {}/s",
        human_bytes((total_raw as f64 / elapsed.as_secs_f64()) as u64)
    );
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn run_inspect(file: PathBuf, show_frames: bool) -> anyhow::Result<()> {
    let mut reader = StreamReader::open(&file)?;
    let file_size = std::fs::metadata(&file)?.len();

    let mut headers = Vec::new();
    while let Some(buf) = reader.next_frame()? {
        let header = FrameHeader::peek(&buf)
            .with_context(|| format!("frame {} has no valid header", headers.len()))?;
        headers.push(header);
    }

    let frames = headers.len() as u64;
    let keyframes = headers.iter().filter(|h| h.keyframe).count();
    let raw: u64 = headers
        .iter()
        .map(|h| h.width as u64 * h.height as u64 * 2)
        .sum();
    let payload: u64 = headers.iter().map(|h| h.payload_len as u64).sum();

    println!("=== DPK stream: {:?} ===", file);
    println!();
    if let Some(first) = headers.first() {
        println!("  tier           : {}", format::tag_name(first.tag));
        println!("  resolution     : {}x{}", first.width, first.height);
    }
    println!("  frames         : {} ({} keyframes)", frames, keyframes);
    println!("  raw size       : {}", human_bytes(raw));
    println!("  payload        : {}", human_bytes(payload));
    println!("  file on disk   : {}", human_bytes(file_size));
    if file_size > 0 {
        println!("  ratio          : {:.2}x", raw as f64 / file_size as f64);
    }
    println!(
        "  bandwidth      : {:.2} Mbps @ {} FPS",
        mbps(file_size, frames),
        REPORT_FPS
    );

    if show_frames {
        println!();
        println!(
            "  {:>6}  {:>6}  {:>8}  {:>11}  {:>7}  {:>12}  {:>12}",
            "index", "number", "kind", "resolution", "stage", "vle", "payload"
        );
        println!("  {}", "-".repeat(74));
        for (i, h) in headers.iter().enumerate() {
            println!(
                "  {:>6}  {:>6}  {:>8}  {:>11}  {:>7}  {:>12}  {:>12}",
                i,
                h.frame_number,
                if h.keyframe { "key" } else { "delta" },
                format!("{}x{}", h.width, h.height),
                format::stage_name(h.stage),
                human_bytes(h.raw_len as u64),
                human_bytes(h.payload_len as u64),
            );
        }
    }

    Ok(())
}

/// Result of running one codec configuration over the synthetic sequence.
struct BenchRow {
    label: String,
    bytes: u64,
    compress: Duration,
    decompress: Duration,
    max_error: u32,
}

fn bench_config<Q: Quantizer + Copy>(
    quantizer: Q,
    compressor: Option<&str>,
    zstd_level: i32,
    frames: &[Vec<u16>],
    width: u32,
    height: u32,
    keyframe_interval: u32,
) -> anyhow::Result<BenchRow> {
    let stage = |name: Option<&str>| -> anyhow::Result<Option<Box<dyn ByteCompressor>>> {
        match name {
            Some(n) => compressor_by_name(n, zstd_level),
            None => Ok(None),
        }
    };
    let mut encoder = build_codec(quantizer, stage(compressor)?);
    let mut decoder = build_codec(quantizer, stage(compressor)?);

    let mut row = BenchRow {
        label: format!("{} + {}", quantizer.name(), compressor.unwrap_or("none")),
        bytes: 0,
        compress: Duration::ZERO,
        decompress: Duration::ZERO,
        max_error: 0,
    };

    for (i, depth) in frames.iter().enumerate() {
        let keyframe = is_keyframe_index(i as u64, keyframe_interval);

        let t = Instant::now();
        let buf = encoder.compress(width, height, depth, keyframe)?;
        row.compress += t.elapsed();

        let t = Instant::now();
        let out = decoder.decompress(&buf)?;
        row.decompress += t.elapsed();

        row.bytes += buf.len() as u64;
        let err = depth
            .iter()
            .zip(&out.depth)
            .map(|(&a, &b)| (a as i32 - b as i32).unsigned_abs())
            .max()
            .unwrap_or(0);
        row.max_error = row.max_error.max(err);
    }

    Ok(row)
}

fn run_bench(
    width: u32,
    height: u32,
    frame_count: u32,
    keyframe_interval: u32,
    zstd_level: i32,
    seed: u64,
) -> anyhow::Result<()> {
    format::pixel_count(width, height)
        .with_context(|| format!("invalid resolution {}x{}", width, height))?;
    if frame_count == 0 {
        anyhow::bail!("need at least one frame");
    }

    let frames: Vec<Vec<u16>> = (0..frame_count)
        .map(|t| synth::scene(width, height, t, seed))
        .collect();
    let raw_bytes = frames.len() as u64 * width as u64 * height as u64 * 2;

    eprintln!(
        "benchmarking {} synthetic {}x{} frames (keyframe every {})...",
        frame_count, width, height, keyframe_interval
    );

    let mut rows = Vec::new();
    for stage in [None, Some("zstd"), Some("lz4")] {
        rows.push(bench_config(Lossless, stage, zstd_level, &frames, width, height, keyframe_interval)?);
        rows.push(bench_config(Lossy, stage, zstd_level, &frames, width, height, keyframe_interval)?);
    }

    let n = frames.len() as u32;
    println!();
    println!("=== Depth Codec Benchmark ===");
    println!("  raw size : {} ({:.2} Mbps @ {} FPS)", human_bytes(raw_bytes), mbps(raw_bytes, n as u64), REPORT_FPS);
    println!();
    println!(
        "  {:<18}  {:>10}  {:>8}  {:>10}  {:>12}  {:>12}  {:>7}",
        "config", "size", "ratio", "Mbps", "compress", "decompress", "max err"
    );
    println!("  {}", "-".repeat(89));
    for row in &rows {
        println!(
            "  {:<18}  {:>10}  {:>7.2}x  {:>10.2}  {:>9.3} ms  {:>9.3} ms  {:>7}",
            row.label,
            human_bytes(row.bytes),
            raw_bytes as f64 / row.bytes as f64,
            mbps(row.bytes, n as u64),
            (row.compress / n).as_secs_f64() * 1000.0,
            (row.decompress / n).as_secs_f64() * 1000.0,
            row.max_error,
        );
    }

    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Compress {
            input,
            output,
            width,
            height,
            lossy,
            compressor,
            zstd_level,
            keyframe_interval,
        } => run_compress(CompressArgs {
            input,
            output,
            width,
            height,
            lossy,
            compressor,
            zstd_level,
            keyframe_interval,
        }),
        Commands::Decompress { input, output } => run_decompress(input, output),
        Commands::Inspect { file, frames } => run_inspect(file, frames),
        Commands::Bench {
            width,
            height,
            frames,
            keyframe_interval,
            zstd_level,
            seed,
        } => run_bench(width, height, frames, keyframe_interval, zstd_level, seed),
    }
}
