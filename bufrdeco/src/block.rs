use std::ops::Deref;

use crate::errors::Result;
use crate::gts::GtsHeader;
use crate::structs::versions::{BUFRMessage, MessageVersion, check_framing};

/// One parsed message with where it came from.
#[derive(Clone, Debug)]
pub struct MessageBlock {
    message: BUFRMessage,
    offset: u64,
    gts: Option<GtsHeader>,
    notes: Vec<String>,
}

impl std::fmt::Display for MessageBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(gts) = &self.gts {
            writeln!(f, "GTS heading: {}", gts)?;
        }
        write!(f, "{}", self.message)
    }
}

impl Deref for MessageBlock {
    type Target = BUFRMessage;

    fn deref(&self) -> &Self::Target {
        &self.message
    }
}

impl MessageBlock {
    pub fn new(message: BUFRMessage) -> Self {
        MessageBlock {
            message,
            offset: 0,
            gts: None,
            notes: vec![],
        }
    }

    /// Framing checks, then section parsing. Length disagreements that still
    /// leave a usable message are kept as notes.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let total = check_framing(bytes)?;
        let message = BUFRMessage::parse(&bytes[..total])?;

        let mut notes = vec![];
        if total != bytes.len() {
            notes.push(format!(
                "declared length {} but {} bytes were supplied",
                total,
                bytes.len()
            ));
        }
        let encoded = message.encoded_length();
        if encoded != total {
            notes.push(format!(
                "sections add up to {} bytes, section 0 declares {}",
                encoded, total
            ));
        }

        Ok(MessageBlock {
            message,
            offset: 0,
            gts: None,
            notes,
        })
    }

    pub fn with_origin(mut self, offset: u64, gts: Option<GtsHeader>) -> Self {
        self.offset = offset;
        self.gts = gts;
        self
    }

    pub fn message(&self) -> &BUFRMessage {
        &self.message
    }

    /// Byte offset of `BUFR` in the source file.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn gts(&self) -> Option<&GtsHeader> {
        self.gts.as_ref()
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }
}

#[derive(Default)]
pub struct BUFRFile {
    messages: Vec<MessageBlock>,
}

impl BUFRFile {
    pub fn new() -> Self {
        BUFRFile {
            messages: Vec::new(),
        }
    }

    pub(crate) fn push_message(&mut self, message: MessageBlock) {
        self.messages.push(message);
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn message_at(&self, index: usize) -> Option<&MessageBlock> {
        self.messages.get(index)
    }

    pub fn messages(&self) -> &[MessageBlock] {
        &self.messages
    }
}

impl IntoIterator for BUFRFile {
    type Item = MessageBlock;
    type IntoIter = std::vec::IntoIter<MessageBlock>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.into_iter()
    }
}
