// src/ingest/lines.rs
use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};

use super::types::{MessageSource, RawMessage};

/// Reads `<topic> <payload>` lines, e.g. piped from `mosquitto_sub -v`.
pub struct LineSource<R> {
    lines: Lines<R>,
}

impl<R: AsyncBufRead + Unpin + Send> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }
}

impl LineSource<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

/// Split a line at the first whitespace; blank lines yield `None`.
pub fn parse_line(line: &str) -> Option<RawMessage> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (topic, payload) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    Some(RawMessage {
        topic: topic.to_string(),
        payload: payload.trim().to_string(),
    })
}

#[async_trait::async_trait]
impl<R: AsyncBufRead + Unpin + Send> MessageSource for LineSource<R> {
    async fn next_message(&mut self) -> Result<Option<RawMessage>> {
        loop {
            let Some(line) = self.lines.next_line().await.context("read input line")? else {
                return Ok(None);
            };
            if let Some(msg) = parse_line(&line) {
                return Ok(Some(msg));
            }
        }
    }

    fn name(&self) -> &'static str {
        "lines"
    }
}
