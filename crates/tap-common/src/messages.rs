//! Singer message output
//!
//! Records, schemas and state all leave the tap through an [`Emitter`].
//! `write_state` must be durable by the time it returns: drivers call it
//! after every bookmark change and rely on it as their resume point.

use crate::error::Result;
use crate::state::State;
use serde::Serialize;
use serde_json::{Map, Value};
use std::io::Write;

/// Destination for schemas, records and state
pub trait Emitter: Send {
    fn write_schema(&mut self, stream: &str, schema: &Value, key_properties: &[String])
        -> Result<()>;

    fn write_record(&mut self, stream: &str, record: &Map<String, Value>) -> Result<()>;

    fn write_state(&mut self, state: &State) -> Result<()>;
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
enum Message<'a> {
    Schema {
        stream: &'a str,
        schema: &'a Value,
        key_properties: &'a [String],
    },
    Record {
        stream: &'a str,
        record: &'a Map<String, Value>,
    },
    State {
        value: &'a State,
    },
}

/// Writes Singer messages as JSON lines
pub struct SingerWriter<W: Write + Send> {
    out: W,
}

impl SingerWriter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> SingerWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_message(&mut self, message: &Message<'_>) -> Result<()> {
        serde_json::to_writer(&mut self.out, message)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }
}

impl<W: Write + Send> Emitter for SingerWriter<W> {
    fn write_schema(
        &mut self,
        stream: &str,
        schema: &Value,
        key_properties: &[String],
    ) -> Result<()> {
        self.write_message(&Message::Schema {
            stream,
            schema,
            key_properties,
        })
    }

    fn write_record(&mut self, stream: &str, record: &Map<String, Value>) -> Result<()> {
        self.write_message(&Message::Record { stream, record })
    }

    fn write_state(&mut self, state: &State) -> Result<()> {
        self.write_message(&Message::State { value: state })?;
        self.out.flush()?;
        Ok(())
    }
}
