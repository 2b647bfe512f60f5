use std::sync::Arc;

use argh::FromArgs;
use firstfit::{Allocator, ArenaConfig};
use log::info;
use memfs::FileSystem;
use snafu::ResultExt as _;
use snafu_utils::GenericError;

/// Store two files, then allocate and free two raw regions (default).
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "tour")]
pub struct TourArgs {}

const FILES: [(&str, &[u8]); 2] = [
    ("/hello.txt", b"Hello, World!"),
    ("/animals.txt", b"lion\ntiger\nmouse\ncow\npeacock\n"),
];

pub fn run(config: &ArenaConfig) -> Result<(), GenericError> {
    let allocator =
        Arc::new(Allocator::new(config).whatever_context("failed to create allocator")?);
    let fs = FileSystem::new(Arc::clone(&allocator));

    for (path, content) in FILES {
        fs.create_file(path, content)
            .with_whatever_context(|_| format!("failed to create file, path={path}"))?;
    }

    println!("file tree:");
    for (path, metadata) in fs.walk() {
        if metadata.is_dir() {
            println!("  {path:<16} <dir>");
        } else {
            println!("  {path:<16} {} bytes", metadata.len);
        }
    }

    for (path, _) in FILES {
        let content = fs
            .read_file(path)
            .with_whatever_context(|_| format!("failed to read file, path={path}"))?;
        println!("{path}:");
        println!("{}", String::from_utf8_lossy(&content));
    }

    let first = allocator
        .allocate(1024)
        .whatever_context("failed to allocate first region")?;
    let second = allocator
        .allocate(1024)
        .whatever_context("failed to allocate second region")?;
    println!("allocated region at offset {first}");
    println!("allocated region at offset {second}");
    crate::print_stats(&allocator.stats());

    allocator
        .free(first)
        .whatever_context("failed to free first region")?;
    allocator
        .free(second)
        .whatever_context("failed to free second region")?;
    allocator
        .check_invariants()
        .whatever_context("block list is inconsistent")?;

    info!("tour finished, {} blocks left", allocator.blocks().len());
    Ok(())
}
