//! Sequential archive reader.
//!
//! ```text
//! Start ──► HeaderValidated ──► PayloadDecoded × num_payloads ──► Done
//!                 │                       │
//!                 └──────── Failed ◄──────┘
//! ```
//!
//! The header carries no offset table, so each payload's start is only
//! known once the previous body has been consumed.  Any failure is final:
//! the reader stops and yields nothing further.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use log::debug;

use crate::archive::Archive;
use crate::error::{Error, Result};
use crate::header::ArchiveHeader;
use crate::payload::{read_payload, Payload, PayloadHeader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadState {
    /// Header validated; `decoded` payloads consumed so far.
    Decoding { decoded: u16 },
    /// All `num_payloads` payloads decoded.
    Done,
    /// A payload failed to decode; nothing further is read.
    Failed,
}

pub struct Reader<R: Read> {
    reader: R,
    header: ArchiveHeader,
    state:  ReadState,
}

impl Reader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref()).map_err(Error::Io)?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read> Reader<R> {
    /// Read and validate the archive header.  Nothing past the header is
    /// consumed until payloads are requested.
    pub fn new(mut reader: R) -> Result<Self> {
        let header = ArchiveHeader::read_from(&mut reader)?;
        header.validate()?;
        let state = if header.num_payloads == 0 {
            ReadState::Done
        } else {
            ReadState::Decoding { decoded: 0 }
        };
        Ok(Self { reader, header, state })
    }

    pub fn header(&self) -> &ArchiveHeader {
        &self.header
    }

    pub fn state(&self) -> ReadState {
        self.state
    }

    /// Decode the next payload block, or `None` once the archive is
    /// exhausted or a previous block failed.
    pub fn next_payload(&mut self) -> Option<Result<(PayloadHeader, Payload)>> {
        let ReadState::Decoding { decoded } = self.state else {
            return None;
        };
        match read_payload(&mut self.reader) {
            Ok(block) => {
                let decoded = decoded + 1;
                self.state = if decoded == self.header.num_payloads {
                    debug!("all {decoded} payload(s) decoded");
                    ReadState::Done
                } else {
                    ReadState::Decoding { decoded }
                };
                Some(Ok(block))
            }
            Err(e) => {
                debug!("payload {} of {} failed: {e}", decoded + 1, self.header.num_payloads);
                self.state = ReadState::Failed;
                Some(Err(e))
            }
        }
    }

    /// Iterate the remaining payload blocks in archive order.
    pub fn payloads(&mut self) -> Payloads<'_, R> {
        Payloads { reader: self }
    }

    /// Decode every payload into an owned [`Archive`].
    pub fn read_all(mut self) -> Result<Archive> {
        let payloads = self
            .payloads()
            .map(|block| block.map(|(_, payload)| payload))
            .collect::<Result<Vec<_>>>()?;
        Ok(Archive { header: self.header, payloads })
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

pub struct Payloads<'a, R: Read> {
    reader: &'a mut Reader<R>,
}

impl<R: Read> Iterator for Payloads<'_, R> {
    type Item = Result<(PayloadHeader, Payload)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.next_payload()
    }
}

impl<R: Read> std::iter::FusedIterator for Payloads<'_, R> {}
