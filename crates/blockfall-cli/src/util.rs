use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::Context;

/// Destination of command results: stdout, or a file given on the command line.
#[derive(Debug)]
pub enum Output {
    Stdout(io::Stdout),
    File {
        writer: BufWriter<File>,
        path: PathBuf,
    },
}

impl Output {
    /// Writes `value` as pretty JSON to `path`, or to stdout without one.
    pub fn save_json<T>(value: &T, path: Option<PathBuf>) -> anyhow::Result<()>
    where
        T: serde::Serialize,
    {
        let mut output = match path {
            Some(path) => Output::create(path)?,
            None => Output::stdout(),
        };
        output.write_json(value)
    }

    pub fn stdout() -> Self {
        Output::Stdout(io::stdout())
    }

    pub fn create(path: PathBuf) -> anyhow::Result<Self> {
        let file = File::create(&path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        Ok(Output::File {
            writer: BufWriter::new(file),
            path,
        })
    }

    fn name(&self) -> String {
        match self {
            Output::Stdout(_) => "stdout".to_owned(),
            Output::File { path, .. } => path.display().to_string(),
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Output::Stdout(stdout) => stdout,
            Output::File { writer, .. } => writer,
        }
    }

    pub fn write_json<T>(&mut self, value: &T) -> anyhow::Result<()>
    where
        T: serde::Serialize + ?Sized,
    {
        let writer = self.writer();
        serde_json::to_writer_pretty(&mut *writer, value)
            .map_err(anyhow::Error::from)
            .and_then(|()| {
                writeln!(writer)?;
                writer.flush()?;
                Ok(())
            })
            .with_context(|| format!("Failed to write JSON to {}", self.name()))
    }

    /// Writes one text block and flushes it, so frames show up as they are produced.
    pub fn write_frame(&mut self, frame: &str) -> anyhow::Result<()> {
        let writer = self.writer();
        writer
            .write_all(frame.as_bytes())
            .and_then(|()| writer.flush())
            .with_context(|| format!("Failed to write frame to {}", self.name()))
    }
}

pub fn read_json_file<T, P>(file_kind: &str, path: P) -> anyhow::Result<T>
where
    T: serde::de::DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open {file_kind} file: {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse {file_kind} file: {}", path.display()))
}
