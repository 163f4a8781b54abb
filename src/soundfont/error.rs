// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

/// Typed error for sample bank parse failures.
#[derive(Debug, thiserror::Error)]
pub enum SoundFontError {
    #[error("Unexpected end of data")]
    UnexpectedEof,
    #[error("Expected chunk {expected}, found {found}")]
    InvalidChunk {
        expected: &'static str,
        found: String,
    },
    #[error("Missing {0} chunk")]
    MissingChunk(&'static str),
    #[error("Chunk {chunk} is {size} bytes, which is not a multiple of {record}")]
    InvalidRecordSize {
        chunk: &'static str,
        size: usize,
        record: usize,
    },
    #[error("{kind} {index} has a zone without its terminal generator")]
    MissingTerminalGenerator { kind: &'static str, index: usize },
    #[error("Invalid {kind} reference {index}")]
    InvalidReference { kind: &'static str, index: usize },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
