use std::io::{self, Read};

use crate::Error;

/// Reader for the DBGP message framing: `<length>\0<payload>\0`, where
/// the length is the decimal byte count of the payload.
pub struct MessageReader<R> {
    input: R,
}

impl<R> MessageReader<R>
where
    R: Read,
{
    pub fn new(input: R) -> Self {
        Self { input }
    }

    /// Block until one full framed message has been read, and return the
    /// payload as text.
    pub fn read_message(&mut self) -> crate::Result<String> {
        let length = self.read_length()?;
        let body = self.read_body(length)?;
        self.read_null()?;
        Ok(body)
    }

    fn read_byte(&mut self) -> crate::Result<u8> {
        let mut buf = [0u8; 1];
        loop {
            match self.input.read(&mut buf) {
                Ok(0) => return Err(Error::ConnectionClosed),
                Ok(_) => return Ok(buf[0]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => return Err(Error::ConnectionClosed),
            }
        }
    }

    fn read_length(&mut self) -> crate::Result<usize> {
        let mut length = String::new();
        loop {
            let c = self.read_byte()?;
            if c == 0 {
                return length
                    .parse()
                    .map_err(|_| Error::Protocol(format!("invalid message length {length:?}")));
            }
            if c.is_ascii_digit() {
                length.push(c as char);
            }
        }
    }

    fn read_body(&mut self, length: usize) -> crate::Result<String> {
        let mut body = vec![0; length];
        let mut total = 0;
        while total < length {
            match self.input.read(&mut body[total..]) {
                Ok(0) => return Err(Error::ConnectionClosed),
                Ok(n) => total += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => return Err(Error::ConnectionClosed),
            }
        }
        String::from_utf8(body)
            .map_err(|_| Error::Protocol("message payload is not valid utf-8".to_string()))
    }

    fn read_null(&mut self) -> crate::Result<()> {
        loop {
            if self.read_byte()? == 0 {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io::Write,
        net::{TcpListener, TcpStream},
    };

    use crate::{bindings::get_random_tcp_port, Error};

    use super::MessageReader;

    macro_rules! execute_test {
        ($($body:expr),+ => $($expected:expr),+) => {{
            let port = get_random_tcp_port().expect("getting random port");
            let server =
                TcpListener::bind(format!("127.0.0.1:{port}")).expect("binding to address");
            let mut client =
                TcpStream::connect(format!("127.0.0.1:{port}")).expect("connecting to server");
            let (conn, _) = server.accept().expect("accepting connection");

            let mut reader = MessageReader::new(conn);

            $(client.write_all($body).expect("sending message");)+

            $(
            let message = reader.read_message().expect("reading message");
            assert_eq!(message, $expected);
            )+
        }};
    }

    #[test]
    fn single_message() {
        execute_test!(b"5\0hello\0" => "hello");
    }

    #[test]
    fn split_between_writes() {
        execute_test!(b"11\0hel", b"lo world\0" => "hello world");
    }

    #[test]
    fn multiple_messages() {
        execute_test!(b"3\0one\0", b"3\0two\0" => "one", "two");
    }

    #[test]
    fn closed_socket_is_connection_closed() {
        let port = get_random_tcp_port().expect("getting random port");
        let server = TcpListener::bind(format!("127.0.0.1:{port}")).expect("binding to address");
        let client =
            TcpStream::connect(format!("127.0.0.1:{port}")).expect("connecting to server");
        let (conn, _) = server.accept().expect("accepting connection");
        drop(client);

        let mut reader = MessageReader::new(conn);
        assert!(matches!(
            reader.read_message(),
            Err(Error::ConnectionClosed)
        ));
    }

    #[test]
    fn garbage_length_is_a_protocol_error() {
        let port = get_random_tcp_port().expect("getting random port");
        let server = TcpListener::bind(format!("127.0.0.1:{port}")).expect("binding to address");
        let mut client =
            TcpStream::connect(format!("127.0.0.1:{port}")).expect("connecting to server");
        let (conn, _) = server.accept().expect("accepting connection");

        client.write_all(b"\0payload\0").expect("sending message");

        let mut reader = MessageReader::new(conn);
        assert!(matches!(reader.read_message(), Err(Error::Protocol(_))));
    }
}
