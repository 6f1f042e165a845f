use std::fmt;
use std::str::FromStr;

/// Baud rate used by the board's serial loader.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Parity bit setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

impl Parity {
    /// Single-letter form used in the port banner (`N`, `E`, `O`).
    pub fn letter(self) -> char {
        match self {
            Parity::None => 'N',
            Parity::Even => 'E',
            Parity::Odd => 'O',
        }
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl FromStr for Parity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "N" | "NONE" => Ok(Parity::None),
            "E" | "EVEN" => Ok(Parity::Even),
            "O" | "ODD" => Ok(Parity::Odd),
            other => Err(format!("parity must be one of N, E, O (got {other})")),
        }
    }
}

/// Line settings applied when a port is opened. Always 8 data bits, 1 stop bit.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Line speed in bits per second. Default: 115200.
    pub baud_rate: u32,
    /// Parity bit. Default: none.
    pub parity: Parity,
    /// Hardware (RTS/CTS) flow control.
    pub rtscts: bool,
    /// Software (XON/XOFF) flow control.
    pub xonxoff: bool,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            parity: Parity::None,
            rtscts: false,
            xonxoff: false,
        }
    }
}

/// Initial control-line levels, applied once before streaming begins.
///
/// `None` leaves the line as the driver set it on open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineState {
    pub rts: Option<bool>,
    pub dtr: Option<bool>,
}

impl LineState {
    /// Apply the requested levels to a channel.
    pub fn apply<C: crate::DuplexChannel>(&self, channel: &mut C) -> crate::Result<()> {
        if let Some(level) = self.rts {
            tracing::debug!(port = channel.name(), level, "setting RTS");
            channel.set_rts(level)?;
        }
        if let Some(level) = self.dtr {
            tracing::debug!(port = channel.name(), level, "setting DTR");
            channel.set_dtr(level)?;
        }
        Ok(())
    }
}
