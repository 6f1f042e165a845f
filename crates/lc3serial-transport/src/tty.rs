use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Read, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::{Parity, SerialConfig};
use crate::error::{ChannelError, Result};
use crate::traits::DuplexChannel;

/// A unix tty device configured as a raw 8-bit serial line.
///
/// Reads wait with `poll(2)` so a timeout never leaves the descriptor in a
/// half-read state. The port is closed when the last handle is dropped.
pub struct SerialPort {
    file: File,
    name: String,
}

impl SerialPort {
    /// Open and configure a serial device.
    ///
    /// The device is opened non-blocking so a missing carrier cannot stall
    /// `open(2)`, then switched back to blocking mode once `CLOCAL` is set.
    pub fn open(port: impl AsRef<Path>, config: &SerialConfig) -> Result<Self> {
        let path = port.as_ref();
        let name = path.display().to_string();
        let speed = baud_to_speed(config.baud_rate)?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
            .open(path)
            .map_err(|source| ChannelError::Open {
                port: name.clone(),
                source,
            })?;

        configure(file.as_raw_fd(), speed, config).map_err(|source| ChannelError::Configure {
            port: name.clone(),
            source,
        })?;

        info!(
            port = %name,
            baud = config.baud_rate,
            parity = %config.parity,
            rtscts = config.rtscts,
            xonxoff = config.xonxoff,
            "serial port open"
        );

        Ok(Self { file, name })
    }

    fn set_modem_bit(&self, bit: libc::c_int, level: bool) -> Result<()> {
        let request = if level {
            libc::TIOCMBIS
        } else {
            libc::TIOCMBIC
        };
        // SAFETY: the descriptor is open for the lifetime of `self` and `bit`
        // outlives the call.
        let rc = unsafe {
            libc::ioctl(
                self.file.as_raw_fd(),
                request,
                &bit as *const libc::c_int,
            )
        };
        cvt(rc)?;
        Ok(())
    }
}

impl DuplexChannel for SerialPort {
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        if buf.is_empty() || !wait_readable(self.file.as_raw_fd(), timeout)? {
            return Ok(0);
        }
        loop {
            match self.file.read(buf) {
                Ok(n) => return Ok(n),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(0),
                Err(err) => return Err(ChannelError::Io(err)),
            }
        }
    }

    fn bytes_to_read(&self) -> Result<usize> {
        let mut available: libc::c_int = 0;
        // SAFETY: FIONREAD writes a single c_int through the provided pointer.
        let rc = unsafe {
            libc::ioctl(
                self.file.as_raw_fd(),
                libc::FIONREAD,
                &mut available as *mut libc::c_int,
            )
        };
        cvt(rc)?;
        Ok(usize::try_from(available).unwrap_or(0))
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let mut offset = 0usize;
        while offset < data.len() {
            match self.file.write(&data[offset..]) {
                Ok(0) => return Err(ChannelError::Closed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(ChannelError::Io(err)),
            }
        }
        Ok(())
    }

    fn set_rts(&mut self, level: bool) -> Result<()> {
        self.set_modem_bit(libc::TIOCM_RTS, level)
    }

    fn set_dtr(&mut self, level: bool) -> Result<()> {
        self.set_modem_bit(libc::TIOCM_DTR, level)
    }

    fn try_clone(&self) -> Result<Self> {
        let file = self.file.try_clone()?;
        Ok(Self {
            file,
            name: self.name.clone(),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for SerialPort {
    fn drop(&mut self) {
        debug!(port = %self.name, "closing serial handle");
    }
}

impl std::fmt::Debug for SerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialPort")
            .field("name", &self.name)
            .field("fd", &self.file.as_raw_fd())
            .finish()
    }
}

fn baud_to_speed(baud: u32) -> Result<libc::speed_t> {
    let speed = match baud {
        1200 => libc::B1200,
        2400 => libc::B2400,
        4800 => libc::B4800,
        9600 => libc::B9600,
        19_200 => libc::B19200,
        38_400 => libc::B38400,
        57_600 => libc::B57600,
        115_200 => libc::B115200,
        230_400 => libc::B230400,
        other => return Err(ChannelError::UnsupportedBaud(other)),
    };
    Ok(speed)
}

fn configure(fd: RawFd, speed: libc::speed_t, config: &SerialConfig) -> io::Result<()> {
    // SAFETY: termios is plain old data; tcgetattr fills it in before use.
    let mut tio: libc::termios = unsafe { std::mem::zeroed() };
    // SAFETY: `fd` is an open descriptor and `tio` is a valid termios.
    cvt(unsafe { libc::tcgetattr(fd, &mut tio) })?;
    // SAFETY: `tio` was initialized by tcgetattr above.
    unsafe { libc::cfmakeraw(&mut tio) };

    tio.c_cflag &= !(libc::CSIZE | libc::CSTOPB | libc::PARENB | libc::PARODD);
    tio.c_cflag |= libc::CS8 | libc::CLOCAL | libc::CREAD;
    match config.parity {
        Parity::None => {}
        Parity::Even => {
            tio.c_cflag |= libc::PARENB;
            tio.c_iflag |= libc::INPCK;
        }
        Parity::Odd => {
            tio.c_cflag |= libc::PARENB | libc::PARODD;
            tio.c_iflag |= libc::INPCK;
        }
    }

    if config.rtscts {
        tio.c_cflag |= libc::CRTSCTS;
    } else {
        tio.c_cflag &= !libc::CRTSCTS;
    }
    if config.xonxoff {
        tio.c_iflag |= libc::IXON | libc::IXOFF;
    } else {
        tio.c_iflag &= !(libc::IXON | libc::IXOFF | libc::IXANY);
    }

    // Reads are gated by poll(), so the driver never waits on its own.
    tio.c_cc[libc::VMIN] = 0;
    tio.c_cc[libc::VTIME] = 0;

    // SAFETY: `tio` is a valid termios for all three calls.
    cvt(unsafe { libc::cfsetispeed(&mut tio, speed) })?;
    cvt(unsafe { libc::cfsetospeed(&mut tio, speed) })?;
    cvt(unsafe { libc::tcsetattr(fd, libc::TCSANOW, &tio) })?;

    // SAFETY: F_GETFL/F_SETFL only touch the descriptor's status flags.
    let flags = cvt(unsafe { libc::fcntl(fd, libc::F_GETFL) })?;
    cvt(unsafe { libc::fcntl(fd, libc::F_SETFL, flags & !libc::O_NONBLOCK) })?;
    Ok(())
}

/// Wait until `fd` is readable. `Ok(false)` means the timeout expired.
fn wait_readable(fd: RawFd, timeout: Duration) -> Result<bool> {
    let millis = libc::c_int::try_from(timeout.as_millis()).unwrap_or(libc::c_int::MAX);
    let mut pfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    loop {
        // SAFETY: `pfd` is a single valid pollfd for the duration of the call.
        let rc = unsafe { libc::poll(&mut pfd, 1, millis) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == ErrorKind::Interrupted {
                continue;
            }
            return Err(ChannelError::Io(err));
        }
        if rc == 0 {
            return Ok(false);
        }
        if pfd.revents & libc::POLLIN != 0 {
            return Ok(true);
        }
        // Hangup or error with nothing left to read: the device went away.
        return Err(ChannelError::Closed);
    }
}

fn cvt(rc: libc::c_int) -> io::Result<libc::c_int> {
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(rc)
    }
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use std::ffi::CStr;
    use std::os::fd::FromRawFd;
    use std::path::PathBuf;
    use std::time::Instant;

    use super::*;

    struct Pty {
        master: File,
        slave_path: PathBuf,
    }

    fn open_pty() -> Option<Pty> {
        // SAFETY: plain libc calls on a descriptor owned by this function.
        unsafe {
            let fd = libc::posix_openpt(libc::O_RDWR | libc::O_NOCTTY);
            if fd < 0 {
                return None;
            }
            let master = File::from_raw_fd(fd);
            if libc::grantpt(fd) != 0 || libc::unlockpt(fd) != 0 {
                return None;
            }
            let mut buf = [0 as libc::c_char; 128];
            if libc::ptsname_r(fd, buf.as_mut_ptr(), buf.len()) != 0 {
                return None;
            }
            let name = CStr::from_ptr(buf.as_ptr()).to_string_lossy().into_owned();
            Some(Pty {
                master,
                slave_path: PathBuf::from(name),
            })
        }
    }

    fn read_exactly(port: &mut SerialPort, len: usize) -> Vec<u8> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut out = Vec::new();
        let mut buf = [0u8; 64];
        while out.len() < len && Instant::now() < deadline {
            let n = port.read(&mut buf, Duration::from_millis(100)).unwrap();
            out.extend_from_slice(&buf[..n]);
        }
        out
    }

    #[test]
    fn open_missing_device_fails_with_open_error() {
        let result = SerialPort::open("/dev/lc3serial-does-not-exist", &SerialConfig::default());
        assert!(matches!(result, Err(ChannelError::Open { .. })));
    }

    #[test]
    fn unsupported_baud_is_rejected_before_open() {
        let config = SerialConfig {
            baud_rate: 12_345,
            ..SerialConfig::default()
        };
        let result = SerialPort::open("/dev/lc3serial-does-not-exist", &config);
        assert!(matches!(result, Err(ChannelError::UnsupportedBaud(12_345))));
    }

    #[test]
    fn read_times_out_with_zero_bytes() {
        let Some(pty) = open_pty() else { return };
        let mut port = SerialPort::open(&pty.slave_path, &SerialConfig::default()).unwrap();

        let start = Instant::now();
        let mut buf = [0u8; 8];
        let n = port.read(&mut buf, Duration::from_millis(50)).unwrap();
        assert_eq!(n, 0);
        assert!(start.elapsed() >= Duration::from_millis(40));
        drop(pty);
    }

    #[test]
    fn read_after_hangup_is_an_error() {
        let Some(pty) = open_pty() else { return };
        let mut port = SerialPort::open(&pty.slave_path, &SerialConfig::default()).unwrap();
        drop(pty);

        let mut buf = [0u8; 8];
        let result = port.read(&mut buf, Duration::from_millis(200));
        assert!(
            matches!(result, Err(ChannelError::Closed | ChannelError::Io(_))),
            "hangup should not look like a quiet line: {result:?}"
        );
    }

    #[test]
    fn bytes_flow_in_both_directions() {
        let Some(mut pty) = open_pty() else { return };
        let mut port = SerialPort::open(&pty.slave_path, &SerialConfig::default()).unwrap();

        pty.master.write_all(b"ping").unwrap();
        assert_eq!(read_exactly(&mut port, 4), b"ping");

        port.write_all(b"pong").unwrap();
        let mut buf = [0u8; 4];
        pty.master.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"pong");
    }

    #[test]
    fn bytes_to_read_reports_pending_input() {
        let Some(mut pty) = open_pty() else { return };
        let mut port = SerialPort::open(&pty.slave_path, &SerialConfig::default()).unwrap();

        pty.master.write_all(b"abc").unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while port.bytes_to_read().unwrap() < 3 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(port.bytes_to_read().unwrap(), 3);
        assert_eq!(read_exactly(&mut port, 3), b"abc");
        assert_eq!(port.bytes_to_read().unwrap(), 0);
    }

    #[test]
    fn cloned_handle_shares_the_device() {
        let Some(mut pty) = open_pty() else { return };
        let port = SerialPort::open(&pty.slave_path, &SerialConfig::default()).unwrap();
        let mut writer = port.try_clone().unwrap();
        assert_eq!(writer.name(), port.name());

        writer.write_all(b"x").unwrap();
        let mut buf = [0u8; 1];
        pty.master.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"x");
    }
}
