//! Command-line flasher.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use log::info;

use bootlink::flash::programmer::Programmer;
use bootlink::rpc::service::{AppId, BootAction, BootloaderClient};
use bootlink::rpc::transport::SerialTransport;
use bootlink::BoardConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Board {
    V71,
    Rh71,
}

/// Flash a firmware image onto a target over its serial bootloader.
#[derive(Parser, Debug)]
#[command(about, version)]
struct Args {
    /// Serial device, e.g. /dev/ttyUSB0
    #[arg(short, long)]
    device: String,

    /// Firmware image to write
    #[arg(short, long)]
    write: PathBuf,

    /// Application slot to program and boot (1 or 2)
    #[arg(short, long, default_value_t = 1)]
    app: u8,

    /// Board preset
    #[arg(long, value_enum, default_value_t = Board::V71)]
    board: Board,

    /// Override the preset's page size in bytes
    #[arg(long)]
    page_size: Option<usize>,

    /// Override the preset's chunk payload size in bytes
    #[arg(long)]
    payload_size: Option<usize>,

    /// Override the preset's baud rate
    #[arg(long)]
    baud: Option<u32>,

    /// Override the preset's reply timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Leave the target in the bootloader instead of booting the app
    #[arg(long)]
    no_boot: bool,
}

/// Board preset with command-line overrides applied and validated.
fn board_config(args: &Args) -> Result<BoardConfig> {
    let mut config = match args.board {
        Board::V71 => BoardConfig::v71(),
        Board::Rh71 => BoardConfig::rh71(),
    };
    if let Some(page_size) = args.page_size {
        if page_size == 0 {
            bail!("page size must be nonzero");
        }
        config.page_size = page_size;
    }
    if let Some(payload_size) = args.payload_size {
        if payload_size == 0 || payload_size >= 256 {
            bail!("payload size must be between 1 and 255 bytes");
        }
        config.payload_size = payload_size;
    }
    if let Some(baud) = args.baud {
        config.baud_rate = baud;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.read_timeout_ms = timeout_ms;
    }
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let app = match args.app {
        1 => AppId::App1,
        2 => AppId::App2,
        other => bail!("invalid app slot {other}; expected 1 or 2"),
    };

    let config = board_config(&args)?;

    let image = std::fs::read(&args.write)
        .with_context(|| format!("reading firmware image {}", args.write.display()))?;
    if image.is_empty() {
        bail!("firmware image {} is empty", args.write.display());
    }

    let mut transport = SerialTransport::open(
        &args.device,
        config.baud_rate,
        Duration::from_millis(config.read_timeout_ms),
    )
    .with_context(|| format!("opening serial device {}", args.device))?;
    transport.flush_input().context("flushing stale serial input")?;

    let client = BootloaderClient::new(transport);
    let mut programmer = Programmer::new(client, &config);

    programmer.sync().context("synchronising with bootloader")?;
    programmer
        .program(&image, app)
        .context("programming firmware")?;

    if args.no_boot {
        // Confirm the target is still responsive after the transfer.
        programmer.sync().context("post-transfer ping")?;
        info!("done; target left in bootloader");
    } else {
        programmer
            .boot(BootAction::from(app))
            .context("booting application")?;
        info!("done; target booting app {}", args.app);
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
