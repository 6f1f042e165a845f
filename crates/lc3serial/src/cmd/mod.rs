use clap::{Args, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Duration;

use lc3serial_image::{ByteOrder, ImageFormat, LoaderConfig, ObjectImage};
use lc3serial_redirect::LineEnding;
use lc3serial_transport::{LineState, Parity, SerialConfig, SerialPort, DEFAULT_BAUD_RATE};

use crate::exit::{channel_error, image_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod dump;
pub mod info;
pub mod program;
pub mod run;
pub mod version;

/// Serial device used when `--port` is not given.
pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Optionally program the board, then redirect its console.
    Run(RunArgs),
    /// Send an object image to the board and exit.
    Program(ProgramArgs),
    /// Validate an image and print its header.
    Info(InfoArgs),
    /// Hex dump an image's payload at its load addresses.
    Dump(DumpArgs),
    /// Show version information.
    Version(VersionArgs),
}

impl Command {
    pub fn quiet(&self) -> bool {
        match self {
            Command::Run(args) => args.quiet,
            Command::Program(args) => args.quiet,
            _ => false,
        }
    }
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Program(args) => program::run(args),
        Command::Info(args) => info::run(args, format),
        Command::Dump(args) => dump::run(args),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug, Clone)]
pub struct SerialArgs {
    /// Serial device connected to the board.
    #[arg(long, short = 'p', env = "LC3SERIAL_PORT", default_value = DEFAULT_PORT)]
    pub port: PathBuf,
    /// Line speed in bits per second.
    #[arg(long, short = 'b', default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,
    /// Parity: N, E or O.
    #[arg(long, default_value = "N")]
    pub parity: Parity,
    /// Enable RTS/CTS hardware flow control.
    #[arg(long)]
    pub rtscts: bool,
    /// Enable XON/XOFF software flow control.
    #[arg(long)]
    pub xonxoff: bool,
    /// Initial RTS level (0 or 1).
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=1))]
    pub rts: Option<u8>,
    /// Initial DTR level (0 or 1).
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=1))]
    pub dtr: Option<u8>,
}

impl SerialArgs {
    pub fn serial_config(&self) -> SerialConfig {
        SerialConfig {
            baud_rate: self.baud,
            parity: self.parity,
            rtscts: self.rtscts,
            xonxoff: self.xonxoff,
        }
    }

    pub fn line_state(&self) -> LineState {
        LineState {
            rts: self.rts.map(|level| level == 1),
            dtr: self.dtr.map(|level| level == 1),
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ImageKind {
    /// Count-prefixed serial image.
    Ser,
    /// Assembler output (origin first, no count).
    Obj,
}

impl From<ImageKind> for ImageFormat {
    fn from(kind: ImageKind) -> Self {
        match kind {
            ImageKind::Ser => ImageFormat::Ser,
            ImageKind::Obj => ImageFormat::Obj,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ImageArgs {
    /// Byte order of words in the image file (big, little, native).
    #[arg(long, default_value = "big")]
    pub byte_order: ByteOrder,
    /// Image layout. Default: detected from the file extension.
    #[arg(long, value_enum)]
    pub image_format: Option<ImageKind>,
}

impl ImageArgs {
    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            source_byte_order: self.byte_order,
            format: self.image_format.map(ImageFormat::from),
        }
    }

    pub fn load(&self, path: &Path) -> CliResult<ObjectImage> {
        ObjectImage::load(path, &self.loader_config()).map_err(image_error)
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// File whose lines are sent to the board.
    #[arg(
        value_name = "IN_FILE",
        required_unless_present = "stdio",
        conflicts_with = "stdio"
    )]
    pub in_file: Option<PathBuf>,
    /// File receiving everything the board sends.
    #[arg(
        value_name = "OUT_FILE",
        required_unless_present = "stdio",
        conflicts_with = "stdio"
    )]
    pub out_file: Option<PathBuf>,
    /// Use standard input and output instead of files.
    #[arg(long, short = 's')]
    pub stdio: bool,
    /// Program this image before redirecting.
    #[arg(long, short = 'O', value_name = "IMAGE")]
    pub objfile: Option<PathBuf>,
    #[command(flatten)]
    pub serial: SerialArgs,
    #[command(flatten)]
    pub image: ImageArgs,
    /// Terminate each sent line with LF (default).
    #[arg(long, conflicts_with_all = ["cr", "crlf"])]
    pub lf: bool,
    /// Terminate each sent line with CR.
    #[arg(long, conflicts_with_all = ["lf", "crlf"])]
    pub cr: bool,
    /// Terminate each sent line with CR LF.
    #[arg(long, conflicts_with_all = ["lf", "cr"])]
    pub crlf: bool,
    /// Only log warnings and errors.
    #[arg(long, short = 'q')]
    pub quiet: bool,
    /// Device poll interval; bounds how fast a stop is noticed (e.g. 1s, 200ms).
    #[arg(long, default_value = "1s")]
    pub read_timeout: String,
    /// Time allowed for trailing device output after the input ends.
    #[arg(long, default_value = "3s")]
    pub grace: String,
}

impl RunArgs {
    pub fn line_ending(&self) -> LineEnding {
        if self.cr {
            LineEnding::Cr
        } else if self.crlf {
            LineEnding::CrLf
        } else {
            LineEnding::Lf
        }
    }
}

#[derive(Args, Debug)]
pub struct ProgramArgs {
    /// Image to send.
    pub image_path: PathBuf,
    #[command(flatten)]
    pub serial: SerialArgs,
    #[command(flatten)]
    pub image: ImageArgs,
    /// Only log warnings and errors.
    #[arg(long, short = 'q')]
    pub quiet: bool,
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Image to inspect.
    pub image_path: PathBuf,
    #[command(flatten)]
    pub image: ImageArgs,
}

#[derive(Args, Debug)]
pub struct DumpArgs {
    /// Image to dump.
    pub image_path: PathBuf,
    #[command(flatten)]
    pub image: ImageArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Open the port and apply the requested control-line levels.
pub fn open_port(args: &SerialArgs) -> CliResult<SerialPort> {
    let mut port = SerialPort::open(&args.port, &args.serial_config())
        .map_err(|err| channel_error("open failed", err))?;
    args.line_state()
        .apply(&mut port)
        .map_err(|err| channel_error("setting control lines failed", err))?;
    Ok(port)
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
