use bitflags::bitflags;

bitflags! {
    /// Modifier bits that participate in hotkey matching.
    #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
    pub struct Modifiers: u8 {
        /// Either Control key.
        const CTRL = 1;
        /// Either Alt key.
        const ALT = 1 << 1;
        /// Either Shift key.
        const SHIFT = 1 << 2;
    }
}

impl Modifiers {
    /// Canonical modifier names for the bits in this set, in the fixed order Ctrl, Alt, Shift.
    pub fn spec_names(self) -> impl Iterator<Item = &'static str> {
        [
            (Self::CTRL, "Ctrl"),
            (Self::ALT, "Alt"),
            (Self::SHIFT, "Shift"),
        ]
        .into_iter()
        .filter(move |(bit, _)| self.contains(*bit))
        .map(|(_, name)| name)
    }
}

/// A modifier token as written in a key-combination string.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Modifier {
    /// `Ctrl` or `Control`.
    Ctrl,
    /// `Alt`.
    Alt,
    /// `Shift`.
    Shift,
    /// `Win` or `Windows`. Recognised so the token is not mistaken for a base
    /// key, but OS-reserved combinations are not supported and it contributes
    /// no bit.
    Win,
}

impl Modifier {
    /// Parses a modifier token, case-insensitively.
    pub fn from_spec(s: &str) -> Option<Self> {
        let lowered = s.to_ascii_lowercase();
        match lowered.as_str() {
            "ctrl" | "control" => Some(Self::Ctrl),
            "alt" => Some(Self::Alt),
            "shift" => Some(Self::Shift),
            "win" | "windows" => Some(Self::Win),
            _ => None,
        }
    }

    /// The bit this modifier sets; empty for `Win`.
    pub fn flag(self) -> Modifiers {
        match self {
            Self::Ctrl => Modifiers::CTRL,
            Self::Alt => Modifiers::ALT,
            Self::Shift => Modifiers::SHIFT,
            Self::Win => Modifiers::empty(),
        }
    }
}
