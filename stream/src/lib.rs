pub mod mjpeg;
pub mod registry;
pub mod server;
