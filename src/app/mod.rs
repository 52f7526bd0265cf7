pub mod dispatch;
pub mod gateway;
pub mod ports;
pub mod status;
