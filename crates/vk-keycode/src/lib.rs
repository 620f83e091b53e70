//! vk-keycode: Virtual key codes and key-combination strings for floatview hotkeys.
//!
//! - `Key`: Enum of the supported base keys, assigned their platform virtual key codes.
//! - `Modifier` / `Modifiers`: Modifier tokens and the bit set they produce.
//! - `KeyCombination`: A modifier set plus one base key, parsed from strings
//!   like `"Ctrl+Shift+A"` and rendered back in canonical form.
//!
//! The key table is fixed. Names are matched case-insensitively and a handful
//! of aliases (symbols for punctuation, `Esc`, `PgUp`, ...) resolve to the same
//! entry, so every alias canonicalises identically.

mod key;
pub use key::Key;

mod modifiers;
pub use modifiers::{Modifier, Modifiers};

mod combo;
pub use combo::{KeyCombination, ParseError};
