//! Field names the engine itself reads or writes.

pub const CONTENT_LENGTH: &str = "Content-Length";
pub const TRANSFER_ENCODING: &str = "Transfer-Encoding";
pub const CONTENT_TYPE: &str = "Content-Type";
pub const CONNECTION: &str = "Connection";
pub const EXPECT: &str = "Expect";
pub const HOST: &str = "Host";
