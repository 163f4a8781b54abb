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

//! SoundFont 2 sample bank loading.
//!
//! A bank is a RIFF file with three lists: `INFO` metadata, `sdta` 16 bit PCM, and
//! `pdta` tables linking presets to instruments to samples. Each level is split
//! into zones carrying generators. Parsing resolves every preset zone against
//! every instrument zone it references and produces one [`SampleParameter`] per
//! pair, ready to load into a [`SynthEngine`](crate::synth::SynthEngine).

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::synth::{ImmediateEvent, SampleId, SampleParameter, SampleRange};

mod convert;
pub mod error;
pub mod generator;
mod reader;
pub mod records;
pub mod zone;


pub use error::SoundFontError;

use generator::{INSTRUMENT, SAMPLE_ID};
use reader::{find, find_list, ByteReader, Chunk};
use records::{SampleHeader, Tables};
use zone::zone_lists;

/// Summary of one preset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PresetInfo {
    pub name: String,
    pub bank: u16,
    pub program: u16,
    /// Playable zones the preset resolved to.
    pub zone_count: usize,
}

/// A playable zone and where it sits in the lookup table.
#[derive(Clone, Debug, PartialEq)]
pub struct SoundFontZone {
    pub parameter: Arc<SampleParameter>,
    pub range: SampleRange,
}

/// A parsed sample bank.
pub struct SoundFont {
    name: String,
    version: (u16, u16),
    presets: Vec<PresetInfo>,
    zones: Vec<SoundFontZone>,
    samples: BTreeMap<SampleId, Arc<[f32]>>,
}

impl SoundFont {
    /// Reads and parses a bank from disk.
    pub fn from_file(path: &Path) -> Result<SoundFont, SoundFontError> {
        info!(path = ?path, "Loading sound font");
        let data = std::fs::read(path)?;
        let sound_font = SoundFont::parse(&data)?;
        info!(
            name = %sound_font.name,
            presets = sound_font.presets.len(),
            zones = sound_font.zones.len(),
            samples = sound_font.samples.len(),
            "Loaded sound font"
        );
        Ok(sound_font)
    }

    /// Parses a bank held in memory.
    pub fn parse(data: &[u8]) -> Result<SoundFont, SoundFontError> {
        let mut reader = ByteReader::new(data);
        let riff = Chunk::read(&mut reader)?.expect("RIFF")?;
        let lists = riff.children("sfbk")?;

        let (name, version) = read_info(&find_list(&lists, "INFO")?)?;
        let pcm = read_pcm(find(&find_list(&lists, "sdta")?, "smpl")?)?;
        let tables = Tables::read(&find_list(&lists, "pdta")?)?;
        debug!(
            name = %name,
            major = version.0,
            minor = version.1,
            frames = pcm.len(),
            "Read sound font chunks"
        );

        let mut builder = Builder {
            pcm: &pcm,
            headers: &tables.samples,
            samples: BTreeMap::new(),
            zones: Vec::new(),
        };
        let presets = builder.resolve(&tables)?;

        Ok(SoundFont {
            name,
            version,
            presets,
            zones: builder.zones,
            samples: builder.samples,
        })
    }

    /// The bank name from the `INAM` chunk.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The format version from the `ifil` chunk.
    pub fn version(&self) -> (u16, u16) {
        self.version
    }

    pub fn presets(&self) -> &[PresetInfo] {
        &self.presets
    }

    pub fn zones(&self) -> &[SoundFontZone] {
        &self.zones
    }

    /// Decoded PCM for every sample a zone plays.
    pub fn samples(&self) -> impl Iterator<Item = (SampleId, &Arc<[f32]>)> {
        self.samples.iter().map(|(id, data)| (*id, data))
    }

    /// The events that load this bank into an engine. Sample data comes first.
    pub fn into_events(self) -> Vec<ImmediateEvent> {
        let samples = self
            .samples
            .into_iter()
            .map(|(sample_id, data)| ImmediateEvent::LoadSample { sample_id, data });
        let zones = self
            .zones
            .into_iter()
            .map(|zone| ImmediateEvent::LoadSampleParameter {
                parameter: zone.parameter,
                range: zone.range,
            });
        samples.chain(zones).collect()
    }
}

impl std::fmt::Debug for SoundFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundFont")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("presets", &self.presets.len())
            .field("zones", &self.zones.len())
            .field("samples", &self.samples.len())
            .finish()
    }
}

fn read_info(info: &[Chunk<'_>]) -> Result<(String, (u16, u16)), SoundFontError> {
    let mut ifil = ByteReader::new(find(info, "ifil")?.data);
    let version = (ifil.read_u16()?, ifil.read_u16()?);
    let name = match find(info, "INAM") {
        Ok(chunk) => ByteReader::new(chunk.data).read_name(chunk.data.len())?,
        Err(_) => String::new(),
    };
    Ok((name, version))
}

fn read_pcm(smpl: Chunk<'_>) -> Result<Vec<i16>, SoundFontError> {
    if smpl.data.len() % 2 != 0 {
        return Err(SoundFontError::InvalidRecordSize {
            chunk: "smpl",
            size: smpl.data.len(),
            record: 2,
        });
    }
    Ok(smpl
        .data
        .chunks_exact(2)
        .map(|bytes| i16::from_le_bytes([bytes[0], bytes[1]]))
        .collect())
}

/// Accumulates zones and decoded samples while resolving presets.
struct Builder<'a> {
    pcm: &'a [i16],
    headers: &'a [SampleHeader],
    samples: BTreeMap<SampleId, Arc<[f32]>>,
    zones: Vec<SoundFontZone>,
}

impl<'a> Builder<'a> {
    fn resolve(&mut self, tables: &Tables) -> Result<Vec<PresetInfo>, SoundFontError> {
        let preset_bags: Vec<u16> = tables.presets.iter().map(|p| p.bag_index).collect();
        let preset_zones = zone_lists(
            "preset",
            &preset_bags,
            &tables.preset_bags,
            &tables.preset_generators,
            INSTRUMENT,
        )?;
        let instrument_bags: Vec<u16> = tables.instruments.iter().map(|i| i.bag_index).collect();
        let instrument_zones = zone_lists(
            "instrument",
            &instrument_bags,
            &tables.instrument_bags,
            &tables.instrument_generators,
            SAMPLE_ID,
        )?;

        let mut presets = Vec::with_capacity(preset_zones.len());
        for (preset, zones) in tables.presets.iter().zip(preset_zones.iter()) {
            let Ok(program) = u8::try_from(preset.program) else {
                warn!(
                    preset = %preset.name,
                    program = preset.program,
                    "Preset program out of range, skipping"
                );
                continue;
            };

            let before = self.zones.len();
            for (instrument, preset_generators) in zones.resolved() {
                let instrument_list =
                    instrument_zones
                        .get(instrument)
                        .ok_or(SoundFontError::InvalidReference {
                            kind: "instrument",
                            index: instrument,
                        })?;

                for (sample, mut generators) in instrument_list.resolved() {
                    let Some((key_range, vel_range)) =
                        generators.intersect_ranges(&preset_generators)
                    else {
                        continue;
                    };
                    generators.add_preset(&preset_generators);

                    let Some((sample_id, header, frames)) = self.sample(sample)? else {
                        continue;
                    };
                    let parameter =
                        convert::sample_parameter(&generators, header, sample_id, frames);
                    self.zones.push(SoundFontZone {
                        parameter: Arc::new(parameter),
                        range: SampleRange {
                            bank: preset.bank,
                            instrument: program,
                            key_range,
                            vel_range,
                        },
                    });
                }
            }

            presets.push(PresetInfo {
                name: preset.name.clone(),
                bank: preset.bank,
                program: preset.program,
                zone_count: self.zones.len() - before,
            });
        }
        Ok(presets)
    }

    /// Decodes a sample the first time a zone references it. Returns `None` for
    /// samples that can't be played.
    fn sample(
        &mut self,
        index: usize,
    ) -> Result<Option<(SampleId, &'a SampleHeader, usize)>, SoundFontError> {
        // The last header is the terminal record.
        let header = self
            .headers
            .get(index)
            .filter(|_| index + 1 < self.headers.len())
            .ok_or(SoundFontError::InvalidReference {
                kind: "sample",
                index,
            })?;
        if header.is_rom() {
            warn!(sample = %header.name, "Skipping ROM sample");
            return Ok(None);
        }

        let sample_id = SampleId::try_from(index).map_err(|_| SoundFontError::InvalidReference {
            kind: "sample",
            index,
        })?;
        if let Some(data) = self.samples.get(&sample_id) {
            return Ok(Some((sample_id, header, data.len())));
        }

        let pcm = self
            .pcm
            .get(header.start as usize..header.end as usize)
            .ok_or(SoundFontError::InvalidReference {
                kind: "sample data",
                index,
            })?;
        let data: Arc<[f32]> = pcm.iter().map(|s| f32::from(*s) / 32767.0).collect();
        let frames = data.len();
        self.samples.insert(sample_id, data);
        Ok(Some((sample_id, header, frames)))
    }
}
