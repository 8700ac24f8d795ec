use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use log::debug;

pub const HEADER_RULE_WIDTH: usize = 80;
pub const SUMMARY_RULE_WIDTH: usize = 60;

/// Human-readable run log.
///
/// The file is opened once per run and every line is flushed as soon as it is
/// written, so an interrupted run leaves a log that matches what was copied.
/// Every message is echoed to stdout as well.
pub struct ScanLog {
    file: Option<BufWriter<File>>,
    path: Option<PathBuf>,
}

impl ScanLog {
    /// Creates (truncating) the log file at `path`, or a console-only log when
    /// `path` is `None`.
    pub fn create(path: Option<&Path>) -> io::Result<Self> {
        let file = match path {
            Some(path) => {
                debug!("Opening scan log {}", path.display());
                Some(BufWriter::new(File::create(path)?))
            }
            None => None,
        };

        Ok(Self {
            file,
            path: path.map(Path::to_path_buf),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// File-only header block with the run time and, when given, the analyzed
    /// directory.
    pub fn write_header(
        &mut self,
        now: DateTime<Local>,
        input_dir: Option<&Path>,
    ) -> io::Result<()> {
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };
        let rule = "=".repeat(HEADER_RULE_WIDTH);
        writeln!(
            file,
            "IMAGE CLASSIFICATION LOG - {}",
            now.format("%d/%m/%Y %H:%M:%S")
        )?;
        writeln!(file, "{rule}")?;
        if let Some(dir) = input_dir {
            writeln!(file, "Analyzed directory: {}", dir.display())?;
            writeln!(file, "{rule}")?;
        }
        writeln!(file)?;
        file.flush()
    }

    pub fn line(&mut self, message: impl AsRef<str>) -> io::Result<()> {
        let message = message.as_ref();
        println!("{message}");
        if let Some(file) = self.file.as_mut() {
            writeln!(file, "{message}")?;
            file.flush()?;
        }
        Ok(())
    }

    pub fn blank(&mut self) -> io::Result<()> {
        self.line("")
    }

    pub fn rule(&mut self) -> io::Result<()> {
        self.line("=".repeat(SUMMARY_RULE_WIDTH))
    }
}

impl Drop for ScanLog {
    fn drop(&mut self) {
        if let Some(file) = self.file.as_mut() {
            let _ = file.flush();
        }
    }
}
