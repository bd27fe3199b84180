pub mod connection;
pub mod framing;
pub mod gateway;
pub mod protocol;
pub mod server_loop;
pub mod tls;
pub mod transport;
