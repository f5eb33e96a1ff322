// Copyright Rouven Bauer
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use log::warn;
use std::io::{self, ErrorKind, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use crate::time::Instant;
use crate::{Neo4jError, Result};

/// Wraps a connection's stream, arming the socket's read/write timeout for
/// the duration of each call so a stalled server surfaces as a timeout
/// rather than hanging the calling thread forever. `on_error` is invoked
/// with every I/O error observed, giving the caller a chance to mark the
/// connection broken and shut down the underlying socket.
pub(crate) struct DeadlineIO<'tcp, S, F: FnMut(&io::Error)> {
    stream: S,
    deadline: Option<Instant>,
    socket: Option<&'tcp TcpStream>,
    on_error: F,
    error_during: Option<ErrorDuring>,
}

enum ErrorDuring {
    GetTimeout,
    SetTimeout,
    Io,
}

impl<'tcp, S, F: FnMut(&io::Error)> DeadlineIO<'tcp, S, F> {
    pub(crate) fn new(
        stream: S,
        deadline: Option<Instant>,
        socket: Option<&'tcp TcpStream>,
        on_error: F,
    ) -> Self {
        Self {
            stream,
            deadline,
            socket,
            on_error,
            error_during: None,
        }
    }

    fn with_deadline<T, WORK: FnOnce(&mut Self) -> io::Result<T>>(
        &mut self,
        work: WORK,
    ) -> io::Result<T> {
        let (Some(deadline), Some(socket)) = (self.deadline, self.socket) else {
            let res = work(self);
            return self.note_io_error(res);
        };
        let old_timeout = match socket.read_timeout() {
            Ok(t) => t,
            Err(err) => {
                self.error_during = Some(ErrorDuring::GetTimeout);
                (self.on_error)(&err);
                return Err(err);
            }
        };
        let timeout = match deadline.checked_duration_since(Instant::now()) {
            None => Duration::from_nanos(1),
            Some(timeout) => timeout,
        };
        if let Err(err) = set_socket_timeout(socket, Some(timeout)) {
            self.error_during = Some(ErrorDuring::SetTimeout);
            (self.on_error)(&err);
            return Err(err);
        }
        let res = work(self);
        let res = self.note_io_error(res);
        if let Err(err) = set_socket_timeout(socket, old_timeout) {
            warn!("failed to restore socket timeout: {err}");
        }
        res
    }

    fn note_io_error<T>(&mut self, res: io::Result<T>) -> io::Result<T> {
        if let Err(err) = &res {
            self.error_during = Some(ErrorDuring::Io);
            (self.on_error)(err);
        }
        res
    }

    /// Turns a failed [`Result`] into `Neo4jError::Timeout` when the
    /// underlying I/O error was a timeout/would-block that occurred while
    /// this wrapper's deadline was armed; otherwise passes it through.
    pub(crate) fn rewrite_error<T>(&self, res: Result<T>) -> Result<T> {
        let Err(Neo4jError::Disconnect {
            message,
            source: Some(io_err),
            during_commit,
        }) = &res
        else {
            return res;
        };
        if !matches!(self.error_during, Some(ErrorDuring::Io)) {
            return res;
        }
        match io_err.kind() {
            ErrorKind::WouldBlock | ErrorKind::TimedOut => {
                assert!(
                    !*during_commit,
                    "tried to rewrite io error to timeout error during commit"
                );
                Err(Neo4jError::Timeout {
                    message: message.clone(),
                })
            }
            _ => res,
        }
    }
}

fn set_socket_timeout(socket: &TcpStream, timeout: Option<Duration>) -> io::Result<()> {
    socket.set_read_timeout(timeout)?;
    socket.set_write_timeout(timeout)
}

impl<'tcp, S: Read, F: FnMut(&io::Error)> Read for DeadlineIO<'tcp, S, F> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.with_deadline(|self_| self_.stream.read(buf))
    }
}

impl<'tcp, S: Write, F: FnMut(&io::Error)> Write for DeadlineIO<'tcp, S, F> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.with_deadline(|self_| self_.stream.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.with_deadline(|self_| self_.stream.flush())
    }
}
