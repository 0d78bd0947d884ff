//! Console output sink

use std::io::Write;

use crate::traits::OutputSink;

/// Prints execution output straight to the terminal
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl OutputSink for ConsoleSink {
    fn chunk(&self, text: &str) {
        print!("{text}");
        let _ = std::io::stdout().flush();
    }

    fn status(&self, status: &str) {
        println!(" [{status}]");
    }

    fn notice(&self, message: &str) {
        println!("{message}");
    }
}
