mod reader;
mod writer;

pub use reader::DumpReader;
pub use writer::{DumpWriter, dump_path, file_timestamp};
