use std::fmt;

use uuid::Uuid;

/// Identity of whoever is selecting and driving scripts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Selector {
    Player(Uuid),
    Console,
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Player(id) => write!(f, "player:{}", id),
            Selector::Console => write!(f, "console"),
        }
    }
}

/// What kind of sender issued a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    Player { id: Uuid },
    Console,
    /// A command block at the given position
    CommandBlock { world: String, x: i32, y: i32, z: i32 },
    /// Remote console or another plugin
    Remote,
}

/// The caller of a script command, supplied by the host front end
pub trait CommandSource: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> SourceKind;

    fn send_message(&self, message: &str);

    fn has_permission(&self, permission: &str) -> bool;
}
