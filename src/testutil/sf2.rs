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

//! Assembles small SoundFont 2 files in memory.

use std::f32::consts::PI;

/// One sample header plus its PCM.
#[derive(Clone, Debug)]
pub struct TestSample {
    pub name: String,
    pub data: Vec<i16>,
    /// Relative to the first point of `data`.
    pub loop_start: u32,
    pub loop_end: u32,
    pub sample_rate: u32,
    pub original_pitch: u8,
    pub pitch_correction: i8,
    pub sample_type: u16,
}

impl TestSample {
    /// A mono 441 Hz sine at 44.1 kHz that loops over whole periods.
    pub fn sine(name: &str, frames: usize) -> TestSample {
        let data = (0..frames)
            .map(|i| ((2.0 * PI * 441.0 * i as f32 / 44100.0).sin() * 16000.0) as i16)
            .collect();
        TestSample {
            name: name.to_string(),
            data,
            loop_start: 0,
            loop_end: (frames - frames % 100) as u32,
            sample_rate: 44100,
            original_pitch: 69,
            pitch_correction: 0,
            sample_type: 1,
        }
    }
}

/// A generator as (operator, raw amount).
pub type Generator = (u16, u16);

pub fn generator(operator: u16, amount: i16) -> Generator {
    (operator, amount as u16)
}

pub fn range(operator: u16, lo: u8, hi: u8) -> Generator {
    (operator, u16::from_le_bytes([lo, hi]))
}

/// Builds a bank from samples, instruments and presets added in order. Zones are
/// written exactly as given, so malformed layouts can be built too.
#[derive(Debug, Default)]
pub struct Sf2Builder {
    name: String,
    samples: Vec<TestSample>,
    instruments: Vec<(String, Vec<Vec<Generator>>)>,
    presets: Vec<(String, u16, u16, Vec<Vec<Generator>>)>,
}

impl Sf2Builder {
    pub fn new(name: &str) -> Sf2Builder {
        Sf2Builder {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn add_sample(&mut self, sample: TestSample) -> u16 {
        self.samples.push(sample);
        (self.samples.len() - 1) as u16
    }

    pub fn add_instrument(&mut self, name: &str, zones: Vec<Vec<Generator>>) -> u16 {
        self.instruments.push((name.to_string(), zones));
        (self.instruments.len() - 1) as u16
    }

    pub fn add_preset(&mut self, name: &str, bank: u16, program: u16, zones: Vec<Vec<Generator>>) {
        self.presets.push((name.to_string(), bank, program, zones));
    }

    pub fn build(&self) -> Vec<u8> {
        let mut info = Vec::new();
        info.extend(chunk(b"ifil", &[2, 0, 1, 0]));
        info.extend(chunk(b"INAM", &name_bytes(&self.name, self.name.len() + 1)));

        let mut smpl = Vec::new();
        let mut shdr = Vec::new();
        let mut position = 0u32;
        for sample in &self.samples {
            for point in &sample.data {
                smpl.extend(point.to_le_bytes());
            }
            // Sample data is followed by 46 zero points.
            smpl.extend([0u8; 92]);

            let start = position;
            let end = start + sample.data.len() as u32;
            shdr.extend(name_bytes(&sample.name, 20));
            for value in [
                start,
                end,
                start + sample.loop_start,
                start + sample.loop_end,
                sample.sample_rate,
            ] {
                shdr.extend(value.to_le_bytes());
            }
            shdr.push(sample.original_pitch);
            shdr.push(sample.pitch_correction as u8);
            shdr.extend(0u16.to_le_bytes());
            shdr.extend(sample.sample_type.to_le_bytes());
            position = end + 46;
        }
        shdr.extend(name_bytes("EOS", 20));
        shdr.extend([0u8; 26]);

        let (phdr, pbag, pgen) = headers(
            self.presets.iter().map(|(name, bank, program, zones)| {
                let mut fields = Vec::new();
                fields.extend(program.to_le_bytes());
                fields.extend(bank.to_le_bytes());
                (name.as_str(), fields, zones.as_slice())
            }),
            "EOP",
            vec![0u8; 4],
            vec![0u8; 12],
        );
        let (inst, ibag, igen) = headers(
            self.instruments
                .iter()
                .map(|(name, zones)| (name.as_str(), Vec::new(), zones.as_slice())),
            "EOI",
            Vec::new(),
            Vec::new(),
        );

        let mut pdta = Vec::new();
        pdta.extend(chunk(b"phdr", &phdr));
        pdta.extend(chunk(b"pbag", &pbag));
        pdta.extend(chunk(b"pmod", &[0u8; 10]));
        pdta.extend(chunk(b"pgen", &pgen));
        pdta.extend(chunk(b"inst", &inst));
        pdta.extend(chunk(b"ibag", &ibag));
        pdta.extend(chunk(b"imod", &[0u8; 10]));
        pdta.extend(chunk(b"igen", &igen));
        pdta.extend(chunk(b"shdr", &shdr));

        let mut body = b"sfbk".to_vec();
        body.extend(list(b"INFO", &info));
        body.extend(list(b"sdta", &chunk(b"smpl", &smpl)));
        body.extend(list(b"pdta", &pdta));
        chunk(b"RIFF", &body)
    }
}

/// Writes a header table with its bag and generator tables. Each entry's fields go
/// between the name and the bag index, and `after` follows the bag index.
fn headers<'a>(
    entries: impl Iterator<Item = (&'a str, Vec<u8>, &'a [Vec<Generator>])>,
    terminal: &str,
    terminal_fields: Vec<u8>,
    after: Vec<u8>,
) -> (Vec<u8>, Vec<u8>, Vec<u8>) {
    let (mut table, mut bags, mut generators) = (Vec::new(), Vec::new(), Vec::new());
    let (mut bag_count, mut generator_count) = (0u16, 0u16);

    for (name, fields, zones) in entries {
        table.extend(name_bytes(name, 20));
        table.extend(fields);
        table.extend(bag_count.to_le_bytes());
        table.extend(&after);
        for zone in zones {
            bags.extend(generator_count.to_le_bytes());
            bags.extend(0u16.to_le_bytes());
            for (operator, amount) in zone {
                generators.extend(operator.to_le_bytes());
                generators.extend(amount.to_le_bytes());
            }
            generator_count += zone.len() as u16;
            bag_count += 1;
        }
    }

    table.extend(name_bytes(terminal, 20));
    table.extend(terminal_fields);
    table.extend(bag_count.to_le_bytes());
    table.extend(&after);
    bags.extend(generator_count.to_le_bytes());
    bags.extend(0u16.to_le_bytes());
    generators.extend([0u8; 4]);
    (table, bags, generators)
}

fn name_bytes(name: &str, len: usize) -> Vec<u8> {
    let mut bytes = name.as_bytes().to_vec();
    bytes.resize(len, 0);
    bytes
}

fn chunk(id: &[u8; 4], data: &[u8]) -> Vec<u8> {
    let mut bytes = id.to_vec();
    bytes.extend((data.len() as u32).to_le_bytes());
    bytes.extend(data);
    if data.len() % 2 == 1 {
        bytes.push(0);
    }
    bytes
}

fn list(form: &[u8; 4], data: &[u8]) -> Vec<u8> {
    let mut body = form.to_vec();
    body.extend(data);
    chunk(b"LIST", &body)
}
