use std::io::Write;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use crate::reader::MessageReader;
use crate::{CancelToken, Error};

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// One accepted debugger connection.
///
/// DBGP engines dial the IDE, so the connection is obtained by listening.
/// Exactly one connection exists per debugging session, and it is owned by
/// the [`crate::Client`] built on top of it.
pub struct Connection {
    stream: Option<TcpStream>,
    peer: SocketAddr,
}

impl Connection {
    /// Block until a debugger engine connects.
    ///
    /// The accept loop is non-blocking and polls on a short cadence so
    /// that the cancellation token is observed while waiting. Fails with
    /// [`Error::Timeout`] when the deadline passes and
    /// [`Error::Interrupted`] when the token fires.
    pub fn listen(
        host: &str,
        port: u16,
        timeout: Duration,
        cancel: Option<&CancelToken>,
    ) -> crate::Result<Self> {
        let host = if host.is_empty() { "0.0.0.0" } else { host };
        let listener = TcpListener::bind((host, port))?;
        listener.set_nonblocking(true)?;
        tracing::info!(%host, port, "waiting for a debugger connection");

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(token) = cancel {
                if token.is_cancelled() {
                    return Err(Error::Interrupted);
                }
            }
            match listener.accept() {
                Ok((stream, peer)) => {
                    stream.set_nonblocking(false)?;
                    tracing::info!(%peer, "debugger engine connected");
                    return Ok(Self {
                        stream: Some(stream),
                        peer,
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Err(Error::Timeout);
                    }
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Cheap liveness check; never fails.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Write one command, NUL-terminated as the protocol requires.
    pub fn send_command(&mut self, command: &str) -> crate::Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::ConnectionClosed)?;
        let mut framed = Vec::with_capacity(command.len() + 1);
        framed.extend_from_slice(command.as_bytes());
        framed.push(0);
        if stream.write_all(&framed).is_err() {
            self.close();
            return Err(Error::ConnectionClosed);
        }
        Ok(())
    }

    /// Block for one `<length>\0<payload>\0` framed message from the
    /// engine and return the payload as text.
    pub fn receive_message(&mut self) -> crate::Result<String> {
        let stream = self.stream.as_mut().ok_or(Error::ConnectionClosed)?;
        let result = MessageReader::new(&mut *stream).read_message();
        if result.is_err() {
            self.close();
        }
        result
    }

    /// Idempotent: closing an already-closed connection is a no-op.
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            tracing::debug!("closing the socket");
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpStream;
    use std::thread;
    use std::time::Duration;

    use crate::bindings::get_random_tcp_port;
    use crate::{CancelToken, Error};

    use super::Connection;

    #[test]
    fn listen_times_out_without_a_connection() {
        let port = get_random_tcp_port().expect("getting random port");
        let result = Connection::listen("127.0.0.1", port, Duration::from_millis(100), None);
        assert!(matches!(result, Err(Error::Timeout)));
    }

    #[test]
    fn listen_observes_cancellation() {
        let port = get_random_tcp_port().expect("getting random port");
        let token = CancelToken::new();
        token.cancel();
        let result =
            Connection::listen("127.0.0.1", port, Duration::from_secs(30), Some(&token));
        assert!(matches!(result, Err(Error::Interrupted)));
    }

    #[test]
    fn round_trip_with_a_connected_engine() {
        let port = get_random_tcp_port().expect("getting random port");

        let engine = thread::spawn(move || {
            let mut stream = connect_with_retry(port);
            stream.write_all(b"5\0hello\0").expect("sending message");

            // read the NUL-terminated command back
            let mut received = Vec::new();
            let mut byte = [0u8; 1];
            loop {
                stream.read_exact(&mut byte).expect("reading command");
                if byte[0] == 0 {
                    break;
                }
                received.push(byte[0]);
            }
            String::from_utf8(received).expect("command is utf-8")
        });

        let mut conn =
            Connection::listen("127.0.0.1", port, Duration::from_secs(5), None).expect("listening");
        assert!(conn.is_connected());

        assert_eq!(conn.receive_message().expect("receiving"), "hello");
        conn.send_command("status -i 1").expect("sending");

        assert_eq!(engine.join().unwrap(), "status -i 1");
    }

    #[test]
    fn close_is_idempotent() {
        let port = get_random_tcp_port().expect("getting random port");

        let engine = thread::spawn(move || {
            let _stream = connect_with_retry(port);
        });

        let mut conn =
            Connection::listen("127.0.0.1", port, Duration::from_secs(5), None).expect("listening");
        engine.join().unwrap();

        conn.close();
        conn.close();
        assert!(!conn.is_connected());
        assert!(matches!(
            conn.send_command("status -i 1"),
            Err(Error::ConnectionClosed)
        ));
        assert!(matches!(
            conn.receive_message(),
            Err(Error::ConnectionClosed)
        ));
    }

    fn connect_with_retry(port: u16) -> TcpStream {
        for _ in 0..100 {
            if let Ok(stream) = TcpStream::connect(format!("127.0.0.1:{port}")) {
                return stream;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("engine could not connect to 127.0.0.1:{port}");
    }
}
