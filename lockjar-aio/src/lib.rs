// lockjar-aio/src/lib.rs
//! File-system side of lockjar (checksums, atomic writes, json, packaging)

pub mod checksum;
pub mod fs;
pub mod json_io;
pub mod pack;

pub use checksum::sha256_file_async;
pub use fs::{atomic_write_file, atomic_write_file_async, read_to_string_async};
pub use json_io::{read_json_async, write_json_async};
pub use pack::pack;
