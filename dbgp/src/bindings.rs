use std::net::TcpListener;

/// A free TCP port to listen for an engine on, picked by binding port 0
/// and letting the OS choose.
pub fn get_random_tcp_port() -> crate::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}
