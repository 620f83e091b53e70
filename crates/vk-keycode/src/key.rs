use std::fmt;

// Central key table: variant, virtual key code, canonical name, then any
// parse-only aliases. Extend this list to support more base keys.
macro_rules! key_table {
    ( $( $variant:ident = $code:literal => $name:literal $( | $alias:literal )* ; )* ) => {
        /// A base (non-modifier) key, valued with its platform virtual key code.
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
        #[repr(u16)]
        pub enum Key {
            $(
                #[allow(missing_docs)]
                $variant = $code,
            )*
        }

        impl Key {
            /// Every key in the table, in table order.
            pub const ALL: &'static [Self] = &[ $( Self::$variant, )* ];

            /// Canonical display name for this key (e.g. `"PageUp"`).
            pub fn name(self) -> &'static str {
                match self {
                    $( Self::$variant => $name, )*
                }
            }

            /// Parse-only alternative spellings for this key.
            fn aliases(self) -> &'static [&'static str] {
                match self {
                    $( Self::$variant => &[ $( $alias ),* ], )*
                }
            }
        }
    };
}

key_table! {
    A = 0x41 => "A";
    B = 0x42 => "B";
    C = 0x43 => "C";
    D = 0x44 => "D";
    E = 0x45 => "E";
    F = 0x46 => "F";
    G = 0x47 => "G";
    H = 0x48 => "H";
    I = 0x49 => "I";
    J = 0x4A => "J";
    K = 0x4B => "K";
    L = 0x4C => "L";
    M = 0x4D => "M";
    N = 0x4E => "N";
    O = 0x4F => "O";
    P = 0x50 => "P";
    Q = 0x51 => "Q";
    R = 0x52 => "R";
    S = 0x53 => "S";
    T = 0x54 => "T";
    U = 0x55 => "U";
    V = 0x56 => "V";
    W = 0x57 => "W";
    X = 0x58 => "X";
    Y = 0x59 => "Y";
    Z = 0x5A => "Z";

    Digit0 = 0x30 => "0" | "d0";
    Digit1 = 0x31 => "1" | "d1";
    Digit2 = 0x32 => "2" | "d2";
    Digit3 = 0x33 => "3" | "d3";
    Digit4 = 0x34 => "4" | "d4";
    Digit5 = 0x35 => "5" | "d5";
    Digit6 = 0x36 => "6" | "d6";
    Digit7 = 0x37 => "7" | "d7";
    Digit8 = 0x38 => "8" | "d8";
    Digit9 = 0x39 => "9" | "d9";

    F1 = 0x70 => "F1";
    F2 = 0x71 => "F2";
    F3 = 0x72 => "F3";
    F4 = 0x73 => "F4";
    F5 = 0x74 => "F5";
    F6 = 0x75 => "F6";
    F7 = 0x76 => "F7";
    F8 = 0x77 => "F8";
    F9 = 0x78 => "F9";
    F10 = 0x79 => "F10";
    F11 = 0x7A => "F11";
    F12 = 0x7B => "F12";

    Space = 0x20 => "Space" | "spacebar";
    Enter = 0x0D => "Enter" | "return";
    Tab = 0x09 => "Tab";
    Escape = 0x1B => "Escape" | "esc";
    Backspace = 0x08 => "Backspace" | "back";
    Delete = 0x2E => "Delete" | "del";
    Insert = 0x2D => "Insert" | "ins";
    Home = 0x24 => "Home";
    End = 0x23 => "End";
    PageUp = 0x21 => "PageUp" | "pgup" | "prior";
    PageDown = 0x22 => "PageDown" | "pgdn" | "next";

    Left = 0x25 => "Left" | "leftarrow" | "arrowleft";
    Up = 0x26 => "Up" | "uparrow" | "arrowup";
    Right = 0x27 => "Right" | "rightarrow" | "arrowright";
    Down = 0x28 => "Down" | "downarrow" | "arrowdown";

    Numpad0 = 0x60 => "Numpad0" | "num0";
    Numpad1 = 0x61 => "Numpad1" | "num1";
    Numpad2 = 0x62 => "Numpad2" | "num2";
    Numpad3 = 0x63 => "Numpad3" | "num3";
    Numpad4 = 0x64 => "Numpad4" | "num4";
    Numpad5 = 0x65 => "Numpad5" | "num5";
    Numpad6 = 0x66 => "Numpad6" | "num6";
    Numpad7 = 0x67 => "Numpad7" | "num7";
    Numpad8 = 0x68 => "Numpad8" | "num8";
    Numpad9 = 0x69 => "Numpad9" | "num9";
    Multiply = 0x6A => "Multiply" | "numpadmultiply" | "*";
    Add = 0x6B => "Add" | "numpadadd";
    Subtract = 0x6D => "Subtract" | "numpadsubtract";
    Decimal = 0x6E => "Decimal" | "numpaddecimal";
    Divide = 0x6F => "Divide" | "numpaddivide";

    Semicolon = 0xBA => "Semicolon" | "oemsemicolon" | "oem1" | ";";
    Equals = 0xBB => "Equals" | "oemplus" | "plus" | "=";
    Comma = 0xBC => "Comma" | "oemcomma" | ",";
    Minus = 0xBD => "Minus" | "oemminus" | "-";
    Period = 0xBE => "Period" | "oemperiod" | ".";
    Slash = 0xBF => "Slash" | "oemquestion" | "oem2" | "/";
    Backquote = 0xC0 => "Backquote" | "oemtilde" | "oem3" | "tilde" | "grave" | "`";
    LeftBracket = 0xDB => "LeftBracket" | "oemopenbrackets" | "oem4" | "[";
    Backslash = 0xDC => "Backslash" | "oempipe" | "oem5" | "\\";
    RightBracket = 0xDD => "RightBracket" | "oemclosebrackets" | "oem6" | "]";
    Quote = 0xDE => "Quote" | "oemquotes" | "oem7" | "'";
}

impl Key {
    /// Parses a base-key token, case-insensitively, by name or alias.
    ///
    /// The token is expected to be trimmed already. Modifier names are not
    /// base keys and return `None`.
    pub fn from_spec(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| {
            k.name().eq_ignore_ascii_case(s) || k.aliases().iter().any(|a| a.eq_ignore_ascii_case(s))
        })
    }

    /// Looks up a key by its virtual key code.
    pub fn from_vk(code: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.vk_code() == code)
    }

    /// The platform virtual key code.
    pub fn vk_code(self) -> u32 {
        u32::from(self as u16)
    }

    /// Canonical spec string: the table name upper-cased (`"PAGEUP"`, `"A"`).
    pub fn to_spec(self) -> String {
        self.name().to_ascii_uppercase()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
