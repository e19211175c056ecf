use clap::Parser;
use serial_device::backend::current_platform;
use serial_device::config::{Config, ConfigLoader, LogFormat, OutputFormat};
use serial_device::{CancelToken, Device};
use std::io::Write;
use std::path::PathBuf;
use tokio::signal;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Minimal serial monitor: connect, optionally send a line, print what arrives.",
    long_about = "Connects to the serial device configured for the running platform, applies raw 8N1 mode at the requested baud rate and prints every chunk received until Ctrl-C or the read limit."
)]
struct Args {
    /// Configuration file (defaults to the standard lookup order).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Device identifier for the running platform, e.g. /dev/ttyUSB0.
    #[arg(short, long)]
    device: Option<String>,

    /// Baud rate.
    #[arg(short, long)]
    baud: Option<u32>,

    /// Text to send (and flush) once connected.
    #[arg(short, long)]
    send: Option<String>,

    /// Stop after this many successful reads.
    #[arg(short, long)]
    reads: Option<u64>,

    /// Print received bytes as hex.
    #[arg(long)]
    hex: bool,
}

impl Args {
    /// Fold command-line flags over the loaded configuration.
    fn apply(&self, config: &mut Config) {
        if let Some(device) = &self.device {
            config.device.set_identifier(current_platform(), device.clone());
        }
        if let Some(baud) = self.baud {
            config.device.baud_rate = baud;
        }
        if let Some(reads) = self.reads {
            config.monitor.max_reads = Some(reads);
        }
        if self.hex {
            config.monitor.output = OutputFormat::Hex;
        }
    }
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    // Logs go to stderr so stdout only carries device data.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let result = match config.logging.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
    if let Err(e) = result {
        eprintln!("Logging already initialized: {}", e);
    }
}

fn render(bytes: &[u8], output: OutputFormat) -> String {
    match output {
        OutputFormat::Text => String::from_utf8_lossy(bytes).into_owned(),
        OutputFormat::Hex => {
            let mut line = bytes
                .iter()
                .map(|b| format!("{:02X}", b))
                .collect::<Vec<_>>()
                .join(" ");
            line.push('\n');
            line
        }
    }
}

// --- Main Application Entry Point ---
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ConfigLoader::load_from(path)?.into_config(),
        None => ConfigLoader::load()?.into_config(),
    };
    args.apply(&mut config);
    config.validate()?;

    init_logging(&config);
    debug!("Effective configuration: {:?}", config);

    let token = CancelToken::new();
    let interrupt = token.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, cancelling");
            interrupt.cancel();
        }
    });

    let Some(device) =
        Device::connect_async(&config.device.identifiers, config.device.baud_rate, &token).await
    else {
        error!(
            "No device connected for platform '{}' (identifiers: {:?})",
            current_platform(),
            config.device.identifiers
        );
        std::process::exit(1);
    };

    let output = config.monitor.output;
    device.subscribe(move |bytes| {
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(render(bytes, output).as_bytes());
        let _ = stdout.flush();
    });

    if let Some(text) = &args.send {
        if !device.write_text_async(text, &token).await? {
            warn!("Nothing was written to the device");
        }
        device.flush_async(&token).await?;
    }

    let mut reads = 0u64;
    while config.monitor.max_reads.map_or(true, |max| reads < max) {
        match device.read_async(&token).await {
            Ok(true) => reads += 1,
            Ok(false) => {
                warn!("Read failed, closing device");
                break;
            }
            Err(e) if e.is_cancelled() => break,
            Err(e) => return Err(e.into()),
        }
    }

    info!("Received {} chunks", reads);
    device.dispose();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_hex() {
        assert_eq!(render(&[0x41, 0x0D, 0x0A], OutputFormat::Hex), "41 0D 0A\n");
    }

    #[test]
    fn test_render_text_is_lossy() {
        assert_eq!(render(b"ok\xff", OutputFormat::Text), "ok\u{FFFD}");
    }

    #[test]
    fn test_flags_override_config() {
        let args = Args::parse_from([
            "serial-monitor",
            "--device",
            "/dev/ttyUSB9",
            "--baud",
            "115200",
            "--hex",
            "--reads",
            "3",
        ]);
        let mut config = Config::default();
        args.apply(&mut config);

        assert_eq!(
            config.device.identifier_for(current_platform()),
            Some("/dev/ttyUSB9")
        );
        assert_eq!(config.device.baud_rate, 115200);
        assert_eq!(config.monitor.output, OutputFormat::Hex);
        assert_eq!(config.monitor.max_reads, Some(3));
    }
}
