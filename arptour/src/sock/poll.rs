//! Readiness multiplexer
//!
//! Both daemons are single-threaded event loops blocked on `poll(2)`
//! across their owned descriptors. `EINTR` is retried transparently.

use std::{io, os::fd::RawFd, time::Duration};

use crate::Result;

/// Wait until any of `fds` becomes readable (or errors/hangs up, which
/// also reads as readiness so the owner can observe the condition).
///
/// Returns one flag per descriptor. `timeout` of `None` blocks forever;
/// an elapsed timeout yields all-false flags.
pub fn wait_readable(fds: &[RawFd], timeout: Option<Duration>) -> Result<Vec<bool>> {
    let mut pollfds: Vec<libc::pollfd> = fds
        .iter()
        .map(|&fd| libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        })
        .collect();

    let timeout_ms: libc::c_int = match timeout {
        Some(d) => d.as_millis().min(libc::c_int::MAX as u128) as libc::c_int,
        None => -1,
    };

    loop {
        // SAFETY: pollfds points at pollfds.len() valid pollfd entries.
        let r = unsafe { libc::poll(pollfds.as_mut_ptr(), pollfds.len() as libc::nfds_t, timeout_ms) };
        if r < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err.into());
        }
        break;
    }

    Ok(pollfds
        .iter()
        .map(|p| p.revents & (libc::POLLIN | libc::POLLERR | libc::POLLHUP) != 0)
        .collect())
}

/// Wait for a single descriptor; `false` means the deadline elapsed.
pub fn wait_readable_one(fd: RawFd, timeout: Duration) -> Result<bool> {
    Ok(wait_readable(&[fd], Some(timeout))?[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::fd::AsRawFd;
    use std::os::unix::net::UnixStream;

    #[test]
    fn test_readable_after_write() {
        let (mut a, b) = UnixStream::pair().unwrap();
        a.write_all(b"x").unwrap();
        let ready = wait_readable(&[b.as_raw_fd()], Some(Duration::from_millis(100))).unwrap();
        assert!(ready[0]);
    }

    #[test]
    fn test_timeout_elapses() {
        let (_a, b) = UnixStream::pair().unwrap();
        let ready = wait_readable_one(b.as_raw_fd(), Duration::from_millis(10)).unwrap();
        assert!(!ready);
    }

    #[test]
    fn test_hangup_reads_as_ready() {
        let (a, b) = UnixStream::pair().unwrap();
        drop(a);
        let ready = wait_readable_one(b.as_raw_fd(), Duration::from_millis(100)).unwrap();
        assert!(ready);
    }
}
