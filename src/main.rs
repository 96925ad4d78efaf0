//! epub-checker - Validate EPUB books with EPUBCheck

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = epub_checker::cli::run() {
        eprintln!("Error: {:#}", e);
        // -1 as an 8-bit exit status
        ExitCode::from(255)
    } else {
        ExitCode::SUCCESS
    }
}
