//! Test support: a harness that surfaces event-loop failures on the test
//! thread, and small fixture helpers.
//!
//! Tests usually go through the `#[tether::test]` attribute, which starts a
//! [`TestHarness`], hands it to the test body and finishes it afterwards.

mod harness;

pub use harness::{HarnessBuilder, TestHarness, init_tracing};

use std::fs;
use std::io;
use std::path::Path;

/// Creates or overwrites the file at `path` with `content`, creating
/// missing parent directories.
pub fn setup_file(path: impl AsRef<Path>, content: impl AsRef<[u8]>) -> io::Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(path, content)
}
