//! Where message records come from.
//!
//! A [`MessageStore`] hands the view a snapshot of every message record.  The view never writes
//! through it; [`TranscriptStore::save`] is offered for tools that want to persist a transcript.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::error::Result;
use crate::types::Message;

/// Version written to, and required of, transcript files.
pub const TRANSCRIPT_VERSION: u8 = 1;

/// A source of message records.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Every message record, in arrival order.
    async fn messages(&self) -> Result<Vec<Message>>;
}

#[async_trait]
impl MessageStore for Vec<Message> {
    async fn messages(&self) -> Result<Vec<Message>> {
        Ok(self.clone())
    }
}

/// Serialization format of a transcript file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptFormat {
    /// JSON.
    Json,
    /// YAML.
    Yaml,
}

impl TranscriptFormat {
    /// Picks the format from a path's extension: `.yaml` and `.yml` are YAML, anything else JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                TranscriptFormat::Yaml
            }
            _ => TranscriptFormat::Json,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct TranscriptFile {
    version: u8,
    messages: Vec<Message>,
}

impl TranscriptFile {
    fn new(messages: &[Message]) -> Self {
        Self {
            version: TRANSCRIPT_VERSION,
            messages: messages.to_vec(),
        }
    }
}

/// Parses a transcript document.
pub fn parse_transcript(text: &str, format: TranscriptFormat) -> Result<Vec<Message>> {
    let transcript: TranscriptFile = match format {
        TranscriptFormat::Json => serde_json::from_str(text).map_err(|err| {
            Error::serialization("failed to parse transcript", Some(Box::new(err)))
        })?,
        TranscriptFormat::Yaml => serde_yaml::from_str(text).map_err(|err| {
            Error::serialization("failed to parse transcript", Some(Box::new(err)))
        })?,
    };
    if transcript.version != TRANSCRIPT_VERSION {
        return Err(Error::validation(
            format!("unsupported transcript version {}", transcript.version),
            Some("version".to_string()),
        ));
    }
    Ok(transcript.messages)
}

/// A transcript file on disk.
#[derive(Debug, Clone)]
pub struct TranscriptStore {
    path: PathBuf,
    format: TranscriptFormat,
}

impl TranscriptStore {
    /// A store for `path`, with the format picked from its extension.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = TranscriptFormat::from_path(&path);
        Self { path, format }
    }

    /// Overrides the format.
    pub fn with_format(mut self, format: TranscriptFormat) -> Self {
        self.format = format;
        self
    }

    /// The transcript path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The transcript format.
    pub fn format(&self) -> TranscriptFormat {
        self.format
    }

    /// Writes `messages` to the transcript file, replacing it.
    pub fn save(&self, messages: &[Message]) -> Result<()> {
        let transcript = TranscriptFile::new(messages);
        let file = File::create(&self.path)
            .map_err(|err| Error::io("failed to create transcript file", err))?;
        let writer = BufWriter::new(file);
        match self.format {
            TranscriptFormat::Json => serde_json::to_writer_pretty(writer, &transcript)
                .map_err(|err| {
                    Error::serialization("failed to serialize transcript", Some(Box::new(err)))
                }),
            TranscriptFormat::Yaml => serde_yaml::to_writer(writer, &transcript).map_err(|err| {
                Error::serialization("failed to serialize transcript", Some(Box::new(err)))
            }),
        }?;
        tracing::debug!(path = %self.path.display(), messages = messages.len(), "saved transcript");
        Ok(())
    }
}

#[async_trait]
impl MessageStore for TranscriptStore {
    async fn messages(&self) -> Result<Vec<Message>> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|err| Error::io("failed to open transcript file", err))?;
        let messages = parse_transcript(&text, self.format)?;
        tracing::debug!(path = %self.path.display(), messages = messages.len(), "loaded transcript");
        Ok(messages)
    }
}
