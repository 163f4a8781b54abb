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

use std::error::Error;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use wavesynth::audio::{self, OutputDevice};
use wavesynth::config::SynthConfig;
use wavesynth::player::{Player, PlayerError};
use wavesynth::playsync::CancelHandle;
use wavesynth::render::midi_file::MidiSong;
use wavesynth::render::{RenderOptions, Renderer};
use wavesynth::soundfont::SoundFont;
use wavesynth::synth::{log_channel, message_channel, EngineSettings, SynthEngine};

/// How long playback keeps running after the last event so releases can ring out.
const PLAYBACK_TAIL: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A SoundFont wavetable synthesizer."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the presets in a SoundFont.
    Inspect {
        /// The path to the SoundFont.
        soundfont: PathBuf,
    },
    /// Renders a MIDI file to a wav file.
    Render {
        /// The path to the SoundFont.
        soundfont: PathBuf,
        /// The MIDI file to render.
        midi: PathBuf,
        /// Where to write the wav file.
        output: PathBuf,
        /// The path to the synth config.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Lists the available audio output devices.
    Devices {},
    /// Plays a MIDI file through an audio device.
    Play {
        /// The path to the SoundFont.
        soundfont: PathBuf,
        /// The MIDI file to play.
        midi: PathBuf,
        /// The device name to play through. Defaults to the system default.
        #[arg(short, long)]
        device: Option<String>,
        /// The path to the synth config.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { soundfont } => {
            let soundfont = SoundFont::from_file(&soundfont)?;
            let (major, minor) = soundfont.version();
            println!("{} (version {}.{})", soundfont.name(), major, minor);
            println!(
                "Zones: {}, samples: {}",
                soundfont.zones().len(),
                soundfont.samples().count()
            );

            println!("Presets (count: {}):", soundfont.presets().len());
            for preset in soundfont.presets() {
                println!(
                    "- {:03}:{:03} {} (zones: {})",
                    preset.bank, preset.program, preset.name, preset.zone_count
                );
            }
        }
        Commands::Render {
            soundfont,
            midi,
            output,
            config,
        } => {
            let config = SynthConfig::load(config.as_deref())?;
            let options = RenderOptions::from_config(&config)?;
            let soundfont = SoundFont::from_file(&soundfont)?;
            let song = MidiSong::from_file(&midi, config.sample_rate())?;

            let audio = Renderer::new(options)
                .on_progress(|done, total| {
                    info!(
                        percent = (done as f64 / total.max(1) as f64 * 100.0).round(),
                        "Rendering"
                    );
                })
                .render(soundfont.into_events(), &song.events)?;
            audio.write_wav(&output)?;
            info!(
                path = %output.display(),
                seconds = audio.duration().as_secs_f64(),
                "Wrote wav file"
            );
        }
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Play {
            soundfont,
            midi,
            device,
            config,
        } => play(&soundfont, &midi, device, config.as_deref())?,
    }

    Ok(())
}

fn play(
    soundfont: &Path,
    midi: &Path,
    device: Option<String>,
    config: Option<&Path>,
) -> Result<(), Box<dyn Error>> {
    let config = SynthConfig::load(config)?;
    let playback = config.playback();
    let lookahead = playback.lookahead()?;
    let device = OutputDevice::open(device.as_deref().or(playback.device()))?;

    let soundfont = SoundFont::from_file(soundfont)?;
    let song = MidiSong::from_file(midi, config.sample_rate())?;

    let (sender, receiver) = message_channel(config.message_capacity());
    let (log_sink, log_drain) = log_channel(config.log_capacity());
    let drain_thread = log_drain.spawn();

    let engine = SynthEngine::new(EngineSettings::from(&config))
        .with_receiver(receiver)
        .with_log_sink(log_sink);
    let player = Player::new(sender, engine.clock(), engine.sample_rate(), lookahead);
    let stream = device.start(engine, config.buffer_size())?;

    player.load_bank(soundfont)?;

    let cancel = CancelHandle::new();
    {
        let cancel = cancel.clone();
        thread::spawn(move || {
            let mut line = String::new();
            if std::io::stdin().lock().read_line(&mut line).is_ok() {
                cancel.cancel();
            }
        });
    }
    println!("Playing through {}. Press enter to stop.", device);

    match player.play(&song.events, &cancel) {
        Ok(()) => {
            cancel.wait_timeout(PLAYBACK_TAIL);
        }
        Err(PlayerError::Cancelled) => {
            info!("Playback stopped");
            // Let all sounds off take effect before the stream goes away.
            thread::sleep(lookahead.max(Duration::from_millis(50)));
        }
        Err(e) => return Err(e.into()),
    }

    drop(stream);
    drop(player);
    if drain_thread.join().is_err() {
        warn!("Log drain thread panicked");
    }
    Ok(())
}
