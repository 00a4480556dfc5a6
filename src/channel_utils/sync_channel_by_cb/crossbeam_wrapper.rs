use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, SendError, Sender};
use std::io::{Error, ErrorKind, Read, Result, Write};
use std::time::Duration;

/// Writing half of an in-process byte pipe.
pub struct CrossbeamSender(Sender<u8>);

/// Reading half of an in-process byte pipe. A read that gets no byte within `timeout` fails with
/// [ErrorKind::TimedOut].
pub struct CrossbeamReceiver {
    inner: Receiver<u8>,
    timeout: Duration,
}

impl Write for CrossbeamSender {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        for &v in buf {
            if let Err(SendError(v)) = self.0.send(v) {
                return Err(Error::new(ErrorKind::BrokenPipe, SendError(v)));
            }
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl Read for CrossbeamReceiver {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        // block for the first byte only, then drain what is already there
        match self.inner.recv_timeout(self.timeout) {
            Ok(v) => buf[0] = v,
            Err(RecvTimeoutError::Timeout) => {
                return Err(Error::new(ErrorKind::TimedOut, RecvTimeoutError::Timeout))
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(Error::new(
                    ErrorKind::BrokenPipe,
                    RecvTimeoutError::Disconnected,
                ))
            }
        }

        let mut n = 1;
        while n < buf.len() {
            match self.inner.try_recv() {
                Ok(v) => {
                    buf[n] = v;
                    n += 1;
                }
                Err(_) => break,
            }
        }

        Ok(n)
    }
}

/// One-directional pipe whose reads give up after `timeout`.
pub fn cbch_pair(timeout: Duration) -> (CrossbeamSender, CrossbeamReceiver) {
    let (s, r) = unbounded();
    (
        CrossbeamSender(s),
        CrossbeamReceiver { inner: r, timeout },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(100);

    #[test]
    fn test() {
        let (mut s1, mut r1) = cbch_pair(TIMEOUT);

        let handle = std::thread::spawn(move || {
            let mut v = vec![0u8; 3];
            r1.read_exact(&mut v).unwrap();
            assert_eq!(v, [1, 2, 3]);
        });

        s1.write_all(&[1, 2, 3]).unwrap();

        handle.join().unwrap();
    }

    #[test]
    fn test_timed_out() {
        let (_s1, mut r1) = cbch_pair(TIMEOUT);

        let mut v = vec![0u8; 3];
        let e = r1.read_exact(&mut v).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::TimedOut);
    }

    #[test]
    fn test_broken_pipe() {
        let (mut s1, mut r1) = cbch_pair(TIMEOUT);

        let handle = std::thread::spawn(move || {
            let mut v = vec![0u8; 3];
            r1.read_exact(&mut v).unwrap();
            assert_eq!(v, [1, 2, 3]);

            let mut v = vec![0u8; 3];
            let e = r1.read_exact(&mut v).unwrap_err();
            assert_eq!(e.kind(), ErrorKind::BrokenPipe);
        });

        s1.write_all(&[1, 2, 3]).unwrap();
        drop(s1);

        handle.join().unwrap();
    }
}
