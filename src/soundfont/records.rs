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

//! The fixed size records of the `pdta` list.

use super::error::SoundFontError;
use super::reader::{find, ByteReader, Chunk};

type Result<T> = std::result::Result<T, SoundFontError>;

const NAME_LEN: usize = 20;

/// Sample type bit marking data that lives in ROM rather than the file.
pub const ROM_SAMPLE: u16 = 0x8000;

#[derive(Clone, Debug, PartialEq)]
pub struct PresetHeader {
    pub name: String,
    pub program: u16,
    pub bank: u16,
    /// First bag of this preset. The next header's index ends the run.
    pub bag_index: u16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bag {
    pub generator_index: u16,
}

/// One generator. The amount is kept raw since its meaning depends on the operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GeneratorRecord {
    pub operator: u16,
    pub amount: u16,
}

impl GeneratorRecord {
    pub fn signed(&self) -> i16 {
        self.amount as i16
    }

    /// Low and high bytes, for key and velocity ranges.
    pub fn range(&self) -> [u8; 2] {
        self.amount.to_le_bytes()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct InstrumentHeader {
    pub name: String,
    pub bag_index: u16,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SampleHeader {
    pub name: String,
    /// Offsets into the `smpl` chunk, in sample points.
    pub start: u32,
    pub end: u32,
    pub loop_start: u32,
    pub loop_end: u32,
    pub sample_rate: u32,
    pub original_pitch: u8,
    /// Cents.
    pub pitch_correction: i8,
    pub sample_type: u16,
}

impl SampleHeader {
    pub fn is_rom(&self) -> bool {
        self.sample_type & ROM_SAMPLE != 0
    }
}

/// Every table of the `pdta` list, terminal records included.
#[derive(Debug, Default)]
pub(crate) struct Tables {
    pub presets: Vec<PresetHeader>,
    pub preset_bags: Vec<Bag>,
    pub preset_generators: Vec<GeneratorRecord>,
    pub instruments: Vec<InstrumentHeader>,
    pub instrument_bags: Vec<Bag>,
    pub instrument_generators: Vec<GeneratorRecord>,
    pub samples: Vec<SampleHeader>,
}

impl Tables {
    pub fn read(pdta: &[Chunk<'_>]) -> Result<Tables> {
        // Modulators are not used, but a table of the wrong size still means a bad file.
        read_table(find(pdta, "pmod")?, "pmod", 10, |_| Ok(()))?;
        read_table(find(pdta, "imod")?, "imod", 10, |_| Ok(()))?;

        Ok(Tables {
            presets: read_table(find(pdta, "phdr")?, "phdr", 38, read_preset)?,
            preset_bags: read_table(find(pdta, "pbag")?, "pbag", 4, read_bag)?,
            preset_generators: read_table(find(pdta, "pgen")?, "pgen", 4, read_generator)?,
            instruments: read_table(find(pdta, "inst")?, "inst", 22, read_instrument)?,
            instrument_bags: read_table(find(pdta, "ibag")?, "ibag", 4, read_bag)?,
            instrument_generators: read_table(find(pdta, "igen")?, "igen", 4, read_generator)?,
            samples: read_table(find(pdta, "shdr")?, "shdr", 46, read_sample)?,
        })
    }
}

/// Splits a chunk into records of `record` bytes.
fn read_table<T>(
    chunk: Chunk<'_>,
    name: &'static str,
    record: usize,
    parse: impl Fn(&mut ByteReader<'_>) -> Result<T>,
) -> Result<Vec<T>> {
    if chunk.data.len() % record != 0 {
        return Err(SoundFontError::InvalidRecordSize {
            chunk: name,
            size: chunk.data.len(),
            record,
        });
    }

    chunk
        .data
        .chunks_exact(record)
        .map(|bytes| parse(&mut ByteReader::new(bytes)))
        .collect()
}

fn read_preset(reader: &mut ByteReader<'_>) -> Result<PresetHeader> {
    let name = reader.read_name(NAME_LEN)?;
    let program = reader.read_u16()?;
    let bank = reader.read_u16()?;
    let bag_index = reader.read_u16()?;
    // Library, genre and morphology are reserved.
    Ok(PresetHeader {
        name,
        program,
        bank,
        bag_index,
    })
}

fn read_bag(reader: &mut ByteReader<'_>) -> Result<Bag> {
    Ok(Bag {
        generator_index: reader.read_u16()?,
    })
}

fn read_generator(reader: &mut ByteReader<'_>) -> Result<GeneratorRecord> {
    Ok(GeneratorRecord {
        operator: reader.read_u16()?,
        amount: reader.read_u16()?,
    })
}

fn read_instrument(reader: &mut ByteReader<'_>) -> Result<InstrumentHeader> {
    Ok(InstrumentHeader {
        name: reader.read_name(NAME_LEN)?,
        bag_index: reader.read_u16()?,
    })
}

fn read_sample(reader: &mut ByteReader<'_>) -> Result<SampleHeader> {
    let name = reader.read_name(NAME_LEN)?;
    let start = reader.read_u32()?;
    let end = reader.read_u32()?;
    let loop_start = reader.read_u32()?;
    let loop_end = reader.read_u32()?;
    let sample_rate = reader.read_u32()?;
    let original_pitch = reader.read_u8()?;
    let pitch_correction = reader.read_i8()?;
    let _sample_link = reader.read_u16()?;
    let sample_type = reader.read_u16()?;
    Ok(SampleHeader {
        name,
        start,
        end,
        loop_start,
        loop_end,
        sample_rate,
        original_pitch,
        pitch_correction,
        sample_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_size_must_divide() {
        let chunk = Chunk {
            id: *b"pbag",
            data: &[0, 0, 0, 0, 1, 0],
        };
        assert!(matches!(
            read_table(chunk, "pbag", 4, read_bag),
            Err(SoundFontError::InvalidRecordSize {
                chunk: "pbag",
                size: 6,
                record: 4
            })
        ));
    }

    #[test]
    fn test_generator_amounts() {
        let chunk = Chunk {
            id: *b"igen",
            data: &[43, 0, 36, 72, 48, 0, 0x9c, 0xff],
        };
        let generators = read_table(chunk, "igen", 4, read_generator).unwrap();
        assert_eq!(generators[0].operator, 43);
        assert_eq!(generators[0].range(), [36, 72]);
        assert_eq!(generators[1].signed(), -100);
    }
}
