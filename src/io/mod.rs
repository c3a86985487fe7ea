pub(crate) mod reader;
pub(crate) mod stream;
pub(crate) mod writer;

pub use reader::RequestReader;
pub use stream::ByteReader;
pub use writer::{encode_head, ResponseWriter};

pub(crate) const CRLF: &[u8] = b"\r\n";
pub(crate) const SP: &[u8] = b" ";
