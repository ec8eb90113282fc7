//! In-memory packet tags mirroring link-protocol header fields.
//!
//! Tags travel with a packet inside the forwarder and are written to /
//! read from the wire by the [`crate::lp`] codec.

use crate::announcement::PrefixAnnouncement;

/// The set of link-protocol tags a packet can carry.
///
/// `NonDiscoveryTag` is presence-only; `PrefixAnnouncementTag` wraps a
/// signed Prefix Announcement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagSet {
    non_discovery: bool,
    prefix_ann: Option<PrefixAnnouncement>,
}

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the `NonDiscoveryTag` is present.
    pub fn has_non_discovery(&self) -> bool {
        self.non_discovery
    }

    /// Adds or removes the `NonDiscoveryTag`.
    pub fn set_non_discovery(&mut self, present: bool) {
        self.non_discovery = present;
    }

    /// The attached Prefix Announcement, if any.
    pub fn prefix_ann(&self) -> Option<&PrefixAnnouncement> {
        self.prefix_ann.as_ref()
    }

    /// Attaches a Prefix Announcement, replacing an existing one.
    pub fn set_prefix_ann(&mut self, pa: PrefixAnnouncement) {
        self.prefix_ann = Some(pa);
    }

    /// Removes the Prefix Announcement tag.
    pub fn clear_prefix_ann(&mut self) {
        self.prefix_ann = None;
    }

    /// True when no tag is set (the lp codec then emits a bare packet).
    pub fn is_empty(&self) -> bool {
        !self.non_discovery && self.prefix_ann.is_none()
    }
}
