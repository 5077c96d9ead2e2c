use std::{
    io::{self, BufWriter},
    path::PathBuf,
};

/// Possible choices for output streams.
/// * "-" and "<out>" are treated as stdout.
/// * "<err>" is treated as stderr.
/// * "<null>" is treated as a null output stream.
/// * All other strings are treated as file paths.
#[derive(Debug, Clone)]
pub enum OutputFile {
    Null,
    Stdout,
    Stderr,
    File {
        path: PathBuf,
        // Has the writer been initialized?
        init: bool,
    },
}

impl OutputFile {
    pub fn file(path: PathBuf) -> Self {
        OutputFile::File { path, init: false }
    }

    pub fn as_path_string(&self) -> String {
        match self {
            OutputFile::Null => "<null>".to_string(),
            OutputFile::Stdout => "<stdout>".to_string(),
            OutputFile::Stderr => "<stderr>".to_string(),
            OutputFile::File { path, .. } => path.to_string_lossy().to_string(),
        }
    }

    pub fn get_write(&mut self) -> io::Result<Box<dyn io::Write>> {
        Ok(match self {
            OutputFile::Stdout => Box::new(BufWriter::new(std::io::stdout())),
            OutputFile::Stderr => Box::new(BufWriter::new(std::io::stderr())),
            OutputFile::File { path, init } => {
                // On the first write the file is created; later writes append.
                let buf = if *init {
                    BufWriter::new(
                        std::fs::OpenOptions::new().append(true).open(path)?,
                    )
                } else {
                    *init = true;
                    BufWriter::new(std::fs::File::create(path)?)
                };
                Box::new(buf)
            }
            OutputFile::Null => Box::new(io::sink()),
        })
    }
}
