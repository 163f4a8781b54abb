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

//! The control change state machine.
//!
//! Bank select and registered parameters span several messages. [`ControllerState`]
//! accumulates them per channel and turns each message into a [`ControllerAction`]
//! for the engine to apply.

pub const BANK_SELECT_MSB: u8 = 0;
pub const MODULATION: u8 = 1;
pub const DATA_ENTRY_MSB: u8 = 6;
pub const VOLUME: u8 = 7;
pub const PAN: u8 = 10;
pub const EXPRESSION: u8 = 11;
pub const BANK_SELECT_LSB: u8 = 32;
pub const DATA_ENTRY_LSB: u8 = 38;
pub const HOLD: u8 = 64;
pub const NRPN_LSB: u8 = 98;
pub const NRPN_MSB: u8 = 99;
pub const RPN_LSB: u8 = 100;
pub const RPN_MSB: u8 = 101;
pub const ALL_SOUNDS_OFF: u8 = 120;
pub const RESET_ALL_CONTROLLERS: u8 = 121;
pub const ALL_NOTES_OFF: u8 = 123;

/// The RPN selector value that deselects everything.
const RPN_NULL: u8 = 127;

/// Registered parameter numbers as (MSB, LSB).
const RPN_PITCH_BEND_SENSITIVITY: (u8, u8) = (0, 0);
const RPN_FINE_TUNING: (u8, u8) = (0, 1);
const RPN_COARSE_TUNING: (u8, u8) = (0, 2);

/// What a control change asks the channel to do.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ControllerAction {
    /// Accumulated, nothing to apply yet.
    None,
    BankSelect(u16),
    Modulation(u8),
    Volume(u8),
    Pan(u8),
    Expression(u8),
    Hold(bool),
    /// Semitones.
    PitchBendSensitivity(f32),
    /// Semitones, within one either way.
    FineTuning(f32),
    /// Semitones.
    CoarseTuning(f32),
    AllSoundsOff,
    AllNotesOff,
    ResetControllers,
    /// A controller number the engine doesn't handle.
    Unknown,
    /// Data entry with no registered parameter selected.
    DataEntryWithoutRpn,
    /// Data entry for a registered parameter the engine doesn't handle.
    UnsupportedRpn { msb: u8, lsb: u8 },
}

/// An in-progress registered parameter sequence.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct RpnAccumulator {
    msb: Option<u8>,
    lsb: Option<u8>,
    data_msb: Option<u8>,
    data_lsb: Option<u8>,
}

impl RpnAccumulator {
    fn selected(&self) -> Option<(u8, u8)> {
        Some((self.msb?, self.lsb?))
    }

    fn select(&mut self, msb: Option<u8>, lsb: Option<u8>) {
        *self = RpnAccumulator {
            msb,
            lsb,
            ..Default::default()
        };
    }

    /// The 14 bit data entry value. A missing LSB counts as zero.
    fn data(&self) -> u16 {
        (u16::from(self.data_msb.unwrap_or(0)) << 7) | u16::from(self.data_lsb.unwrap_or(0))
    }
}

/// Multi-message controller state for one channel.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ControllerState {
    /// Bank select MSB waiting for its LSB.
    bank_msb: Option<u8>,
    rpn: RpnAccumulator,
}

impl ControllerState {
    pub fn new() -> ControllerState {
        ControllerState::default()
    }

    /// Feeds one control change through the state machine.
    pub fn apply(&mut self, controller: u8, value: u8) -> ControllerAction {
        match controller {
            BANK_SELECT_MSB => {
                self.bank_msb = Some(value);
                ControllerAction::None
            }
            BANK_SELECT_LSB => match self.bank_msb {
                Some(msb) => ControllerAction::BankSelect((u16::from(msb) << 7) | u16::from(value)),
                None => ControllerAction::None,
            },
            NRPN_MSB | NRPN_LSB => {
                // NRPN data must not land on a previously selected RPN.
                self.rpn = RpnAccumulator::default();
                ControllerAction::None
            }
            RPN_MSB => {
                if value == RPN_NULL {
                    self.rpn = RpnAccumulator::default();
                } else {
                    self.rpn.select(Some(value), self.rpn.lsb);
                }
                ControllerAction::None
            }
            RPN_LSB => {
                if value == RPN_NULL {
                    self.rpn = RpnAccumulator::default();
                } else {
                    self.rpn.select(self.rpn.msb, Some(value));
                }
                ControllerAction::None
            }
            DATA_ENTRY_MSB => self.data_entry_msb(value),
            DATA_ENTRY_LSB => self.data_entry_lsb(value),
            MODULATION => ControllerAction::Modulation(value),
            VOLUME => ControllerAction::Volume(value),
            PAN => ControllerAction::Pan(value),
            EXPRESSION => ControllerAction::Expression(value),
            HOLD => ControllerAction::Hold(value >= 64),
            ALL_SOUNDS_OFF => ControllerAction::AllSoundsOff,
            ALL_NOTES_OFF => ControllerAction::AllNotesOff,
            RESET_ALL_CONTROLLERS => {
                *self = ControllerState::default();
                ControllerAction::ResetControllers
            }
            _ => ControllerAction::Unknown,
        }
    }

    fn data_entry_msb(&mut self, value: u8) -> ControllerAction {
        let Some(selected) = self.rpn.selected() else {
            return ControllerAction::DataEntryWithoutRpn;
        };
        self.rpn.data_msb = Some(value);
        self.rpn.data_lsb = None;

        match selected {
            // Applied without waiting for the LSB, which is rarely sent.
            RPN_PITCH_BEND_SENSITIVITY => ControllerAction::PitchBendSensitivity(f32::from(value)),
            RPN_FINE_TUNING => ControllerAction::FineTuning(fine_tuning(self.rpn.data())),
            RPN_COARSE_TUNING => ControllerAction::CoarseTuning(f32::from(value) - 64.0),
            (msb, lsb) => ControllerAction::UnsupportedRpn { msb, lsb },
        }
    }

    fn data_entry_lsb(&mut self, value: u8) -> ControllerAction {
        let Some(selected) = self.rpn.selected() else {
            return ControllerAction::DataEntryWithoutRpn;
        };
        self.rpn.data_lsb = Some(value);

        match selected {
            RPN_PITCH_BEND_SENSITIVITY => ControllerAction::PitchBendSensitivity(
                f32::from(self.rpn.data_msb.unwrap_or(0)) + f32::from(value) / 100.0,
            ),
            RPN_FINE_TUNING => ControllerAction::FineTuning(fine_tuning(self.rpn.data())),
            RPN_COARSE_TUNING => ControllerAction::None,
            (msb, lsb) => ControllerAction::UnsupportedRpn { msb, lsb },
        }
    }
}

/// Maps a 14 bit fine tuning value to semitones.
fn fine_tuning(data: u16) -> f32 {
    (f32::from(data) - 8192.0) / 8192.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(state: &mut ControllerState, messages: &[(u8, u8)]) -> Vec<ControllerAction> {
        messages
            .iter()
            .map(|&(controller, value)| state.apply(controller, value))
            .collect()
    }

    #[test]
    fn test_bank_select_waits_for_lsb() {
        let mut state = ControllerState::new();
        assert_eq!(state.apply(BANK_SELECT_MSB, 1), ControllerAction::None);
        assert_eq!(
            state.apply(BANK_SELECT_LSB, 2),
            ControllerAction::BankSelect((1 << 7) | 2)
        );
    }

    #[test]
    fn test_lone_bank_lsb_is_ignored() {
        let mut state = ControllerState::new();
        assert_eq!(state.apply(BANK_SELECT_LSB, 2), ControllerAction::None);
    }

    #[test]
    fn test_pitch_bend_sensitivity_applies_on_msb() {
        let mut state = ControllerState::new();
        let actions = feed(&mut state, &[(RPN_MSB, 0), (RPN_LSB, 0), (DATA_ENTRY_MSB, 12)]);
        assert_eq!(actions[2], ControllerAction::PitchBendSensitivity(12.0));

        assert_eq!(
            state.apply(DATA_ENTRY_LSB, 50),
            ControllerAction::PitchBendSensitivity(12.5)
        );
    }

    #[test]
    fn test_nrpn_clears_rpn() {
        let mut state = ControllerState::new();
        let actions = feed(
            &mut state,
            &[(RPN_MSB, 0), (RPN_LSB, 0), (NRPN_MSB, 1), (NRPN_LSB, 8), (DATA_ENTRY_MSB, 40)],
        );
        assert_eq!(actions[4], ControllerAction::DataEntryWithoutRpn);
    }

    #[test]
    fn test_null_rpn_disables_data_entry() {
        let mut state = ControllerState::new();
        let actions = feed(
            &mut state,
            &[(RPN_MSB, 0), (RPN_LSB, 0), (RPN_MSB, 127), (DATA_ENTRY_MSB, 24)],
        );
        assert_eq!(actions[3], ControllerAction::DataEntryWithoutRpn);
    }

    #[test]
    fn test_tuning_rpns() {
        let mut state = ControllerState::new();
        let actions = feed(&mut state, &[(RPN_MSB, 0), (RPN_LSB, 2), (DATA_ENTRY_MSB, 66)]);
        assert_eq!(actions[2], ControllerAction::CoarseTuning(2.0));

        let actions = feed(
            &mut state,
            &[(RPN_LSB, 1), (DATA_ENTRY_MSB, 0x60), (DATA_ENTRY_LSB, 0)],
        );
        // 0x60 << 7 is 0x3000, half way to the top of the range.
        assert_eq!(actions[1], ControllerAction::FineTuning(0.5));
        assert_eq!(actions[2], ControllerAction::FineTuning(0.5));
    }

    #[test]
    fn test_reset_forgets_pending_bank_msb() {
        let mut state = ControllerState::new();
        state.apply(BANK_SELECT_MSB, 1);
        assert_eq!(
            state.apply(RESET_ALL_CONTROLLERS, 0),
            ControllerAction::ResetControllers
        );
        assert_eq!(state, ControllerState::new());
        assert_eq!(state.apply(BANK_SELECT_LSB, 2), ControllerAction::None);
    }

    #[test]
    fn test_unsupported_rpn() {
        let mut state = ControllerState::new();
        let actions = feed(&mut state, &[(RPN_MSB, 0), (RPN_LSB, 5), (DATA_ENTRY_MSB, 1)]);
        assert_eq!(actions[2], ControllerAction::UnsupportedRpn { msb: 0, lsb: 5 });
    }

    #[test]
    fn test_simple_controllers() {
        let mut state = ControllerState::new();
        assert_eq!(state.apply(HOLD, 64), ControllerAction::Hold(true));
        assert_eq!(state.apply(HOLD, 63), ControllerAction::Hold(false));
        assert_eq!(state.apply(VOLUME, 90), ControllerAction::Volume(90));
        assert_eq!(state.apply(ALL_NOTES_OFF, 0), ControllerAction::AllNotesOff);
        assert_eq!(state.apply(74, 10), ControllerAction::Unknown);
    }
}
