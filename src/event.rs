use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Bitmask over the inotify event kinds a monitor filter can select.
///
/// Each named constant maps 1:1 onto the corresponding `IN_*` bit, so a mask
/// can be handed to `inotify_add_watch` unchanged and intersected with the
/// mask field of raw event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EventMask(u32);

impl EventMask {
    pub const NONE: EventMask = EventMask(0);
    pub const ACCESS: EventMask = EventMask(libc::IN_ACCESS);
    pub const ATTRIB: EventMask = EventMask(libc::IN_ATTRIB);
    pub const CLOSE_WRITE: EventMask = EventMask(libc::IN_CLOSE_WRITE);
    pub const CLOSE_NOWRITE: EventMask = EventMask(libc::IN_CLOSE_NOWRITE);
    pub const CREATE: EventMask = EventMask(libc::IN_CREATE);
    pub const DELETE: EventMask = EventMask(libc::IN_DELETE);
    pub const DELETE_SELF: EventMask = EventMask(libc::IN_DELETE_SELF);
    pub const MODIFY: EventMask = EventMask(libc::IN_MODIFY);
    pub const MOVE_SELF: EventMask = EventMask(libc::IN_MOVE_SELF);
    pub const MOVED_FROM: EventMask = EventMask(libc::IN_MOVED_FROM);
    pub const MOVED_TO: EventMask = EventMask(libc::IN_MOVED_TO);
    pub const OPEN: EventMask = EventMask(libc::IN_OPEN);
    pub const ALL: EventMask = EventMask(libc::IN_ALL_EVENTS);

    /// Every single-bit kind paired with its kebab-case name.
    const KINDS: &'static [(EventMask, &'static str)] = &[
        (Self::ACCESS, "access"),
        (Self::ATTRIB, "attrib"),
        (Self::CLOSE_WRITE, "close-write"),
        (Self::CLOSE_NOWRITE, "close-nowrite"),
        (Self::CREATE, "create"),
        (Self::DELETE, "delete"),
        (Self::DELETE_SELF, "delete-self"),
        (Self::MODIFY, "modify"),
        (Self::MOVE_SELF, "move-self"),
        (Self::MOVED_FROM, "moved-from"),
        (Self::MOVED_TO, "moved-to"),
        (Self::OPEN, "open"),
    ];

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True when any bit of `other` is also set in `self`.
    pub const fn intersects(self, other: EventMask) -> bool {
        self.0 & other.0 != 0
    }

    /// True when every bit of `other` is set in `self`.
    pub const fn contains(self, other: EventMask) -> bool {
        self.0 & other.0 == other.0
    }

    /// Resolve a kebab-case kind name (as used by the CLI and the config
    /// file) to its mask. `"all"` selects every kind.
    pub fn from_name(name: &str) -> Option<EventMask> {
        if name == "all" {
            return Some(Self::ALL);
        }
        Self::KINDS
            .iter()
            .find(|(_, kind)| *kind == name)
            .map(|(mask, _)| *mask)
    }

    /// Names of the individual kinds set in this mask, in bit order.
    pub fn kind_names(self) -> Vec<&'static str> {
        Self::KINDS
            .iter()
            .filter(|(mask, _)| self.intersects(*mask))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl BitOr for EventMask {
    type Output = EventMask;

    fn bitor(self, rhs: EventMask) -> EventMask {
        EventMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for EventMask {
    fn bitor_assign(&mut self, rhs: EventMask) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for EventMask {
    type Output = EventMask;

    fn bitand(self, rhs: EventMask) -> EventMask {
        EventMask(self.0 & rhs.0)
    }
}

impl fmt::Display for EventMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        if *self == Self::ALL {
            return f.write_str("all");
        }
        f.write_str(&self.kind_names().join("|"))
    }
}
