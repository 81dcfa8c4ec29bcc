//! fx2eeprom
//!
//! Reads or writes the configuration EEPROM of a USB device running helper
//! firmware with the `0xA2` vendor EEPROM request (for example a Cypress FX2
//! loaded with `vend_ax.hex`).
//!
//! EEPROM bytes go to stdout on read and come from stdin on write. All
//! diagnostics go to stderr.

mod config;
mod usb;

use anyhow::{Context, Result};
use clap::Parser;
use clap::error::ErrorKind;
use common::{Session, TransferEngine, TransferSummary, UsbAccess, setup_logging};
use config::ToolConfig;
use protocol::Direction;
use std::io::{self, Read, Write};
use std::process::ExitCode;
use tracing::{debug, info};
use usb::RusbAccess;

/// Exit status for every failure (`-1` as seen by the shell)
const EXIT_FAILURE: u8 = 255;

#[derive(Parser, Debug)]
#[command(name = "fx2eeprom")]
#[command(
    author,
    version,
    about = "Read or write a USB device EEPROM through vendor control requests"
)]
#[command(long_about = "
Reads or writes the EEPROM of a USB device running helper firmware that
implements the 0xA2 vendor request (e.g. an FX2 with vend_ax.hex loaded).

EXAMPLES:
    # Dump 45 bytes of EEPROM
    fx2eeprom r 0x04b4 0x8613 45 > eeprom.raw

    # Write them back
    fx2eeprom w 0x04b4 0x8613 45 < eeprom.raw

CONFIGURATION:
    Protocol constants and USB settings are read from the first of:
    1. Path specified with --config
    2. ~/.config/fx2eeprom/config.toml
    3. /etc/fx2eeprom/config.toml
    4. Built-in defaults
")]
struct Args {
    /// Mode: r/R reads the EEPROM to stdout, anything else writes stdin to it
    #[arg(allow_hyphen_values = true)]
    mode: String,

    /// USB vendor ID (0x-prefixed hex or decimal)
    #[arg(value_parser = parse_u16)]
    vid: u16,

    /// USB product ID (0x-prefixed hex or decimal)
    #[arg(value_parser = parse_u16)]
    pid: u16,

    /// Number of bytes to transfer (0x-prefixed hex or decimal)
    #[arg(value_parser = parse_length)]
    length: usize,

    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Interface to claim
    #[arg(long, value_name = "N")]
    interface: Option<u8>,

    /// Timeout per control transfer in milliseconds
    #[arg(long, value_name = "MS", value_parser = parse_u32)]
    timeout_ms: Option<u32>,

    /// Maximum bytes per control transfer
    #[arg(long, value_name = "BYTES", value_parser = parse_length)]
    chunk_size: Option<usize>,

    /// Leave the kernel driver detached afterwards
    #[arg(long)]
    no_reattach: bool,
}

impl Args {
    fn direction(&self) -> Direction {
        Direction::from_mode(&self.mode)
    }

    /// Config file, then command-line overrides
    fn resolve_config(&self) -> Result<ToolConfig> {
        let path = self.config.as_deref().map(config::expand_path);
        let mut config =
            ToolConfig::discover(path.as_deref()).context("Failed to load configuration")?;

        if let Some(level) = &self.log_level {
            config.tool.log_level = level.clone();
        }
        if let Some(interface) = self.interface {
            config.usb.interface = interface;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.protocol.timeout_ms = timeout_ms;
        }
        if let Some(chunk_size) = self.chunk_size {
            config.protocol.chunk_size = chunk_size;
        }
        if self.no_reattach {
            config.usb.reattach_kernel_driver = false;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    let args = match Args::try_parse_from(std::env::args_os()) {
        Ok(args) => args,
        Err(e) => {
            let status = report_usage(&e, &program_name(), &mut io::stdout());
            return ExitCode::from(status);
        }
    };

    match run(&args) {
        Ok(summary) => {
            eprintln!("{}", summary);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

/// Report an argument error and return the exit status
///
/// The usage line goes to `out` (stdout in `main`), the parse error to
/// stderr. Nothing USB-related has been touched yet.
fn report_usage<W: Write>(err: &clap::Error, program: &str, out: &mut W) -> u8 {
    if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
        let _ = write!(out, "{}", err.render());
        return 0;
    }

    let _ = writeln!(out, "{}", usage_line(program));
    eprint!("{}", err.render());
    EXIT_FAILURE
}

fn usage_line(program: &str) -> String {
    format!("{} w/r VID PID size", program)
}

fn program_name() -> String {
    std::env::args_os()
        .next()
        .map(|arg| arg.to_string_lossy().into_owned())
        .unwrap_or_else(|| env!("CARGO_BIN_NAME").to_string())
}

fn run(args: &Args) -> Result<TransferSummary> {
    let config = args.resolve_config()?;

    setup_logging(&config.tool.log_level).context("Failed to setup logging")?;
    debug!("fx2eeprom v{}", env!("CARGO_PKG_VERSION"));

    let stdin = io::stdin();
    let stdout = io::stdout();
    execute(
        args,
        &config,
        RusbAccess::new,
        &mut stdin.lock(),
        &mut stdout.lock(),
    )
}

/// Acquire the device, run the transfer, tear down
///
/// `connect` creates the USB context. The session is dropped before the
/// context, so the interface is released and the handle closed first.
fn execute<A, F, R, W>(
    args: &Args,
    config: &ToolConfig,
    connect: F,
    input: &mut R,
    output: &mut W,
) -> Result<TransferSummary>
where
    A: UsbAccess,
    F: FnOnce() -> common::Result<A>,
    R: Read,
    W: Write,
{
    let access = connect()?;

    let direction = args.direction();
    info!(
        "{} {} bytes, device {:04x}:{:04x}",
        direction, args.length, args.vid, args.pid
    );

    let mut session = Session::acquire(&access, &config.session_config(args.vid, args.pid))?;
    let summary = TransferEngine::new(&config.protocol).run(
        &mut session,
        direction,
        args.length,
        input,
        output,
    )?;

    Ok(summary)
}

/// Parse an unsigned integer, `0x`/`0X`-prefixed hex or decimal
fn parse_int(s: &str) -> std::result::Result<u64, String> {
    let s = s.trim();
    let (digits, radix) = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => (hex, 16),
        None => (s, 10),
    };

    u64::from_str_radix(digits, radix).map_err(|e| format!("invalid number '{}': {}", s, e))
}

fn parse_u16(s: &str) -> std::result::Result<u16, String> {
    let value = parse_int(s)?;
    u16::try_from(value).map_err(|_| format!("{} does not fit in 16 bits", s))
}

fn parse_u32(s: &str) -> std::result::Result<u32, String> {
    let value = parse_int(s)?;
    u32::try_from(value).map_err(|_| format!("{} does not fit in 32 bits", s))
}

fn parse_length(s: &str) -> std::result::Result<usize, String> {
    let value = parse_int(s)?;
    usize::try_from(value).map_err(|_| format!("{} is too large", s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::test_utils::{MockUsb, UsbCall, pattern};
    use std::cell::Cell;
    use std::ffi::OsString;
    use std::io::Cursor;

    fn args(argv: &[&str]) -> std::result::Result<Args, clap::Error> {
        let mut full: Vec<OsString> = vec!["fx2eeprom".into()];
        full.extend(argv.iter().map(OsString::from));
        Args::try_parse_from(full)
    }

    #[test]
    fn test_parse_int_bases() {
        assert_eq!(parse_int("0x10"), Ok(16));
        assert_eq!(parse_int("0X1f"), Ok(31));
        assert_eq!(parse_int("45"), Ok(45));
        assert_eq!(parse_int("010"), Ok(10));
        assert!(parse_int("0x").is_err());
        assert!(parse_int("abc").is_err());
        assert!(parse_int("-1").is_err());
    }

    #[test]
    fn test_parse_u16_range() {
        assert_eq!(parse_u16("0xffff"), Ok(0xffff));
        assert!(parse_u16("0x10000").is_err());
    }

    #[test]
    fn test_four_positionals() {
        let args = args(&["r", "0x04b4", "0x8613", "45"]).unwrap();
        assert_eq!(args.direction(), Direction::Read);
        assert_eq!(args.vid, 0x04b4);
        assert_eq!(args.pid, 0x8613);
        assert_eq!(args.length, 45);
    }

    #[test]
    fn test_mode_other_than_r_writes() {
        assert_eq!(args(&["w", "1", "2", "3"]).unwrap().direction(), Direction::Write);
        assert_eq!(args(&["W", "1", "2", "3"]).unwrap().direction(), Direction::Write);
        assert_eq!(args(&["x", "1", "2", "3"]).unwrap().direction(), Direction::Write);
        assert_eq!(args(&["R", "1", "2", "3"]).unwrap().direction(), Direction::Read);
    }

    #[test]
    fn test_wrong_argument_count_never_touches_usb() {
        let usb = MockUsb::new().with_device(0x04b4, 0x8613, 64);
        let connects = Cell::new(0);

        for argv in [
            &["r", "0x04b4", "0x8613"][..],
            &["r", "0x04b4", "0x8613", "45", "extra"][..],
            &[][..],
        ] {
            if let Ok(args) = args(argv) {
                let _ = execute(
                    &args,
                    &ToolConfig::default(),
                    || {
                        connects.set(connects.get() + 1);
                        Ok(usb.clone())
                    },
                    &mut io::empty(),
                    &mut io::sink(),
                );
            }
        }

        assert_eq!(connects.get(), 0);
        assert!(usb.calls().is_empty());
    }

    #[test]
    fn test_usage_goes_to_stdout_with_failure_status() {
        for argv in [&["r", "0x04b4", "0x8613"][..], &["r", "1", "2", "3", "4"][..]] {
            let err = args(argv).unwrap_err();
            let mut out = Vec::new();

            let status = report_usage(&err, "fx2eeprom", &mut out);

            assert_eq!(status, EXIT_FAILURE);
            assert_ne!(status, 0);
            assert_eq!(
                String::from_utf8(out).unwrap(),
                "fx2eeprom w/r VID PID size\n"
            );
        }
    }

    #[test]
    fn test_invalid_number_reports_usage() {
        let err = args(&["r", "0xzz", "2", "3"]).unwrap_err();
        let mut out = Vec::new();

        assert_eq!(report_usage(&err, "fx2eeprom", &mut out), EXIT_FAILURE);
        assert!(String::from_utf8(out).unwrap().starts_with("fx2eeprom w/r"));
    }

    #[test]
    fn test_help_exits_successfully() {
        let err = args(&["--help"]).unwrap_err();
        let mut out = Vec::new();

        assert_eq!(report_usage(&err, "fx2eeprom", &mut out), 0);
        assert!(String::from_utf8(out).unwrap().contains("Usage"));
    }

    #[test]
    fn test_hyphenated_mode_is_write() {
        let args_dash_r = args(&["-r", "1", "2", "3"]).unwrap();
        assert_eq!(args_dash_r.mode, "-r");
        assert_eq!(args_dash_r.direction(), Direction::Write);

        let args_dash = args(&["-", "1", "2", "3"]).unwrap();
        assert_eq!(args_dash.direction(), Direction::Write);
    }

    #[test]
    fn test_options_after_positionals() {
        let args = args(&["r", "1", "2", "3", "--interface", "2"]).unwrap();
        assert_eq!(args.direction(), Direction::Read);
        assert_eq!(args.interface, Some(2));
    }

    #[test]
    fn test_usage_line() {
        assert_eq!(usage_line("fx2eeprom"), "fx2eeprom w/r VID PID size");
    }

    #[test]
    fn test_execute_read() {
        let usb = MockUsb::new().with_eeprom(0x04b4, 0x8613, pattern(256));
        let args = args(&["r", "0x04b4", "0x8613", "200"]).unwrap();
        let mut out = Vec::new();

        let summary = execute(
            &args,
            &ToolConfig::default(),
            || Ok(usb.clone()),
            &mut io::empty(),
            &mut out,
        )
        .unwrap();

        assert_eq!(summary.to_string(), "Read 200 bytes");
        assert_eq!(out, pattern(200));
        assert_eq!(usb.calls().last(), Some(&UsbCall::Close));
    }

    #[test]
    fn test_execute_short_input() {
        let usb = MockUsb::new().with_device(0x04b4, 0x8613, 8192);
        let args = args(&["w", "0x04b4", "0x8613", "4096"]).unwrap();

        let err = execute(
            &args,
            &ToolConfig::default(),
            || Ok(usb.clone()),
            &mut Cursor::new(pattern(3000)),
            &mut io::sink(),
        )
        .unwrap_err();

        assert_eq!(
            format!("{:#}", err),
            "Wrong size from stdin, expected 4096 read 3000"
        );
        assert!(usb.control_calls().is_empty());
    }

    #[test]
    fn test_execute_device_not_found() {
        let usb = MockUsb::new();
        let args = args(&["r", "0x04b4", "0x8613", "16"]).unwrap();

        let err = execute(
            &args,
            &ToolConfig::default(),
            || Ok(usb.clone()),
            &mut io::empty(),
            &mut io::sink(),
        )
        .unwrap_err();

        assert!(format!("{}", err).contains("Unable to find device 04b4:8613"));
    }

    #[test]
    fn test_execute_usb_init_failure() {
        let args = args(&["r", "1", "2", "16"]).unwrap();

        let err = execute::<MockUsb, _, _, _>(
            &args,
            &ToolConfig::default(),
            || Err(common::Error::UsbInit(protocol::UsbError::Other {
                message: "no backend".to_string(),
            })),
            &mut io::empty(),
            &mut io::sink(),
        )
        .unwrap_err();

        assert!(format!("{}", err).contains("Unable to init libusb"));
    }

    #[test]
    fn test_cli_overrides_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[protocol]\nchunk_size = 128\ntimeout_ms = 100\n").unwrap();
        let path = path.to_string_lossy().into_owned();

        let args = args(&[
            "r",
            "1",
            "2",
            "3",
            "--config",
            &path,
            "--chunk-size",
            "0x40",
            "--interface",
            "1",
            "--no-reattach",
        ])
        .unwrap();
        let config = args.resolve_config().unwrap();

        assert_eq!(config.protocol.chunk_size, 64);
        assert_eq!(config.protocol.timeout_ms, 100);
        assert_eq!(config.usb.interface, 1);
        assert!(!config.usb.reattach_kernel_driver);
    }

    #[test]
    fn test_invalid_override_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();
        let path = path.to_string_lossy().into_owned();

        let args = args(&["r", "1", "2", "3", "--config", &path, "--chunk-size", "0"]).unwrap();
        assert!(args.resolve_config().is_err());
    }
}
