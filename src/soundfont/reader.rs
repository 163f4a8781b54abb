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

//! Little endian reads over RIFF chunks.

use super::error::SoundFontError;

type Result<T> = std::result::Result<T, SoundFontError>;

/// A cursor over a byte slice.
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> ByteReader<'a> {
        ByteReader { data, position: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.position >= self.data.len()
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .position
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(SoundFontError::UnexpectedEof)?;
        let bytes = &self.data[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.read_bytes(N)?);
        Ok(array)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(i8::from_le_bytes(self.read_array()?))
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_fourcc(&mut self) -> Result<[u8; 4]> {
        self.read_array()
    }

    /// Reads a fixed width, NUL padded name.
    pub fn read_name(&mut self, len: usize) -> Result<String> {
        let bytes = self.read_bytes(len)?;
        let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).trim_end().to_string())
    }
}

/// One RIFF chunk.
#[derive(Clone, Copy)]
pub(crate) struct Chunk<'a> {
    pub id: [u8; 4],
    pub data: &'a [u8],
}

impl<'a> Chunk<'a> {
    /// Reads the next chunk, skipping the pad byte after odd sized data.
    pub fn read(reader: &mut ByteReader<'a>) -> Result<Chunk<'a>> {
        let id = reader.read_fourcc()?;
        let size = reader.read_u32()? as usize;
        let data = reader.read_bytes(size)?;
        if size % 2 == 1 && !reader.is_empty() {
            reader.read_u8()?;
        }
        Ok(Chunk { id, data })
    }

    pub fn id_str(&self) -> String {
        String::from_utf8_lossy(&self.id).to_string()
    }

    /// Opens a RIFF or LIST chunk with the given form type and returns its children.
    pub fn children(&self, form: &'static str) -> Result<Vec<Chunk<'a>>> {
        let mut reader = ByteReader::new(self.data);
        let found = reader.read_fourcc()?;
        if found != form.as_bytes() {
            return Err(SoundFontError::InvalidChunk {
                expected: form,
                found: String::from_utf8_lossy(&found).to_string(),
            });
        }

        let mut children = Vec::new();
        while !reader.is_empty() {
            children.push(Chunk::read(&mut reader)?);
        }
        Ok(children)
    }

    /// Checks the chunk id.
    pub fn expect(self, id: &'static str) -> Result<Chunk<'a>> {
        if self.id != id.as_bytes() {
            return Err(SoundFontError::InvalidChunk {
                expected: id,
                found: self.id_str(),
            });
        }
        Ok(self)
    }
}

/// Finds the child with the given id.
pub(crate) fn find<'a>(chunks: &[Chunk<'a>], id: &'static str) -> Result<Chunk<'a>> {
    chunks
        .iter()
        .find(|chunk| chunk.id == id.as_bytes())
        .copied()
        .ok_or(SoundFontError::MissingChunk(id))
}

/// Finds a LIST child by its form type.
pub(crate) fn find_list<'a>(chunks: &[Chunk<'a>], form: &'static str) -> Result<Vec<Chunk<'a>>> {
    chunks
        .iter()
        .filter(|chunk| &chunk.id == b"LIST")
        .find(|chunk| chunk.data.get(..4) == Some(form.as_bytes()))
        .ok_or(SoundFontError::MissingChunk(form))?
        .children(form)
}
