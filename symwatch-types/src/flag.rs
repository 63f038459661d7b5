//! Named event flags and the per-flag queries on [`Event`].

use crate::event::Event;
use crate::mask::Mask;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

macro_rules! flags {
    ($(
        $(#[$doc:meta])*
        $variant:ident => $is:ident, $name:literal, $mask:expr, $watchable:literal, $description:literal;
    )*) => {
        /// A named flag an [`Event`] can be queried for.
        #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        #[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
        pub enum Flag {
            $(
                $(#[$doc])*
                $variant,
            )*
        }

        impl Flag {
            /// Every flag, in table order.
            pub const ALL: &'static [Flag] = &[$(Flag::$variant),*];

            /// The bits this flag stands for.
            pub fn mask(self) -> Mask {
                match self {
                    $(Flag::$variant => $mask,)*
                }
            }

            /// Lowercase name, e.g. `close_write`.
            pub fn name(self) -> &'static str {
                match self {
                    $(Flag::$variant => $name,)*
                }
            }

            /// Whether the flag can be requested on a watch, or only appears on events.
            pub fn is_watchable(self) -> bool {
                match self {
                    $(Flag::$variant => $watchable,)*
                }
            }

            /// What an event carrying this flag means.
            pub fn description(self) -> &'static str {
                match self {
                    $(Flag::$variant => $description,)*
                }
            }
        }

        impl Event {
            $(
                #[doc = concat!("Tests for `", $name, "`: ", $description)]
                pub fn $is(&self) -> bool {
                    self.has(Flag::$variant)
                }
            )*
        }
    };
}

flags! {
    Access => is_access, "access", Mask::ACCESS, true, "File was accessed";
    Modify => is_modify, "modify", Mask::MODIFY, true, "File was modified";
    Attrib => is_attrib, "attrib", Mask::ATTRIB, true, "Attribute of a directory entry was changed";
    /// Either `CloseWrite` or `CloseNowrite`.
    Close => is_close, "close", Mask::CLOSE, true, "File was closed";
    CloseWrite => is_close_write, "close_write", Mask::CLOSE_WRITE, true, "File was closed after being written to";
    CloseNowrite => is_close_nowrite, "close_nowrite", Mask::CLOSE_NOWRITE, true, "File was closed without being written to";
    Open => is_open, "open", Mask::OPEN, true, "File was opened";
    /// Either `MovedFrom` or `MovedTo`.
    Move => is_move, "move", Mask::MOVE, true, "Directory entry was renamed";
    MovedFrom => is_moved_from, "moved_from", Mask::MOVED_FROM, true, "Directory entry was renamed from this name";
    MovedTo => is_moved_to, "moved_to", Mask::MOVED_TO, true, "Directory entry was renamed to this name";
    Create => is_create, "create", Mask::CREATE, true, "Directory entry was created";
    Delete => is_delete, "delete", Mask::DELETE, true, "Directory entry was deleted";
    DeleteSelf => is_delete_self, "delete_self", Mask::DELETE_SELF, true, "The watched directory entry was deleted";
    MoveSelf => is_move_self, "move_self", Mask::MOVE_SELF, true, "The watched directory entry was renamed";
    /// Synthetic, never produced by the kernel.
    LinkChanged => is_link_changed, "link_changed", Mask::LINK_CHANGED, true, "The named path no longer resolves to the same file";
    Unmount => is_unmount, "unmount", Mask::UNMOUNT, false, "Directory was unmounted, and can no longer be watched";
    QOverflow => is_q_overflow, "q_overflow", Mask::Q_OVERFLOW, false, "Kernel dropped events due to queue overflow";
    Ignored => is_ignored, "ignored", Mask::IGNORED, false, "Directory entry is no longer being watched";
    Isdir => is_isdir, "isdir", Mask::ISDIR, false, "Event occurred on a directory";
}
