use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;

/// A byte-level physical channel.
///
/// This is the contract the packet layer needs from a link: push bytes out,
/// pull whatever bytes are pending (or learn that none are), and wait for
/// readiness with a bounded or infinite timeout.
pub trait PhysicalChannel {
    /// Write as many bytes as the link accepts right now.
    fn send(&mut self, bytes: &[u8]) -> std::io::Result<usize>;

    /// Read pending bytes into `buf`.
    ///
    /// Returns an error of kind `WouldBlock` when the link is non-blocking
    /// and nothing is pending, and `Ok(0)` once the peer has closed.
    fn receive(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;

    /// Wait until the link has bytes to read (or has been closed).
    ///
    /// `None` waits forever. Returns `false` on timeout.
    fn poll(&self, timeout: Option<Duration>) -> Result<bool>;
}

/// A connected link stream implementing `Read + Write`.
///
/// On Unix this wraps a Unix domain socket stream, either accepted from a
/// [`crate::UnixDomainSocket`] or created as one end of a socket pair.
pub struct LinkStream {
    inner: LinkStreamInner,
}

enum LinkStreamInner {
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl Read for LinkStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for LinkStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => stream.flush(),
        }
    }
}

impl PhysicalChannel for LinkStream {
    fn send(&mut self, bytes: &[u8]) -> std::io::Result<usize> {
        self.write(bytes)
    }

    fn receive(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.read(buf)
    }

    fn poll(&self, timeout: Option<Duration>) -> Result<bool> {
        self.poll_readable(timeout)
    }
}

impl LinkStream {
    /// Create a LinkStream from a Unix domain socket stream.
    #[cfg(unix)]
    pub(crate) fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: LinkStreamInner::Unix(stream),
        }
    }

    /// Create two connected link ends.
    ///
    /// Stands in for a serial line between two endpoints in the same process.
    #[cfg(unix)]
    pub fn pair() -> Result<(Self, Self)> {
        let (left, right) = std::os::unix::net::UnixStream::pair()?;
        Ok((Self::from_unix(left), Self::from_unix(right)))
    }

    /// Switch the stream between blocking and non-blocking reads and writes.
    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => stream.set_nonblocking(nonblocking).map_err(Into::into),
        }
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
        }
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => {
                let cloned = stream.try_clone()?;
                Ok(Self::from_unix(cloned))
            }
        }
    }

    /// Wait until the stream is readable, closed, or the timeout expires.
    #[cfg(unix)]
    pub fn poll_readable(&self, timeout: Option<Duration>) -> Result<bool> {
        use std::os::fd::AsRawFd;

        let fd = match &self.inner {
            LinkStreamInner::Unix(stream) => stream.as_raw_fd(),
        };
        poll_fd_readable(fd, timeout)
    }
}

/// Wait until `fd` is readable (or hung up). `None` waits forever.
#[cfg(unix)]
pub(crate) fn poll_fd_readable(fd: std::os::fd::RawFd, timeout: Option<Duration>) -> Result<bool> {
    let timeout_ms = match timeout {
        Some(timeout) => timeout.as_millis().min(i32::MAX as u128) as libc::c_int,
        None => -1,
    };

    loop {
        let mut pollfd = libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        };

        // SAFETY: `pollfd` is a valid, writable array of length one and `fd`
        // is an open descriptor borrowed from the caller for this call.
        let rc = unsafe { libc::poll(&mut pollfd, 1, timeout_ms) };

        if rc < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err.into());
        }

        return Ok(rc > 0 && pollfd.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0);
    }
}

impl std::fmt::Debug for LinkStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(_) => f.debug_struct("LinkStream").field("type", &"unix").finish(),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::ErrorKind;

    use super::*;

    #[test]
    fn pair_carries_bytes_both_ways() {
        let (mut left, mut right) = LinkStream::pair().unwrap();

        left.write_all(&[0xFF, 0xFF, 0x01]).unwrap();
        let mut buf = [0u8; 3];
        right.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [0xFF, 0xFF, 0x01]);

        right.write_all(b"ack").unwrap();
        let mut buf = [0u8; 3];
        left.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ack");
    }

    #[test]
    fn poll_times_out_without_data() {
        let (_left, right) = LinkStream::pair().unwrap();
        let ready = right.poll_readable(Some(Duration::from_millis(10))).unwrap();
        assert!(!ready);
    }

    #[test]
    fn poll_reports_pending_bytes() {
        let (mut left, right) = LinkStream::pair().unwrap();
        left.write_all(&[0x00]).unwrap();
        assert!(right.poll(Some(Duration::from_millis(100))).unwrap());
    }

    #[test]
    fn poll_reports_closed_peer() {
        let (left, right) = LinkStream::pair().unwrap();
        drop(left);
        assert!(right.poll_readable(Some(Duration::from_millis(100))).unwrap());
    }

    #[test]
    fn nonblocking_receive_would_block() {
        let (_left, mut right) = LinkStream::pair().unwrap();
        right.set_nonblocking(true).unwrap();

        let mut buf = [0u8; 8];
        let err = PhysicalChannel::receive(&mut right, &mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WouldBlock);
    }

    #[test]
    fn cloned_handle_shares_the_link() {
        let (mut left, right) = LinkStream::pair().unwrap();
        let mut reader = right.try_clone().unwrap();

        PhysicalChannel::send(&mut left, b"z").unwrap();
        let mut buf = [0u8; 1];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"z");
        drop(right);
    }
}
