pub mod abi;
pub mod client;
pub mod reader;
pub mod rpc;
