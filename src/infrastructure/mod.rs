pub mod http_gateway;
pub mod in_memory;
pub mod notify;
pub mod simulated;
