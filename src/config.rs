//! # Dispatch Configuration
//!
//! Process-wide tunables for the posted-event pipeline.
//!
//! The one behavioral knob today is the compression set: the event kinds for
//! which posting is idempotent per receiver. A newly posted event of a
//! compressible kind is silently discarded when the receiver already has a
//! pending entry of the same kind, so repeated deferred-destroy or quit
//! requests collapse to one queued entry.

use std::sync::OnceLock;

use crate::constants::kinds;
use crate::event::EventKind;

static INSTALLED: OnceLock<DispatchConfig> = OnceLock::new();

/// Process-wide configuration for the dispatch core
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Event kinds deduplicated per receiver at post time
    pub compressible_kinds: Vec<EventKind>,
    /// Initial capacity reserved for each thread's posted-event queue
    pub queue_reserve: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            compressible_kinds: vec![kinds::DEFERRED_DELETE, kinds::QUIT],
            queue_reserve: 0,
        }
    }
}

impl DispatchConfig {
    /// Install this configuration process-wide.
    ///
    /// Must be called before the first post; once any component has read the
    /// configuration the installed value is frozen and later installs are
    /// ignored (returned as `Err` with the rejected config).
    pub fn install(self) -> std::result::Result<(), DispatchConfig> {
        INSTALLED.set(self)
    }

    /// The active process-wide configuration (defaults if none installed)
    pub fn get() -> &'static DispatchConfig {
        INSTALLED.get_or_init(DispatchConfig::default)
    }

    /// Whether posting an event of `kind` coalesces with a pending entry of
    /// the same kind for the same receiver
    pub fn is_compressible(&self, kind: EventKind) -> bool {
        self.compressible_kinds.contains(&kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_compression_set_covers_destroy_and_quit() {
        let config = DispatchConfig::default();
        assert!(config.is_compressible(kinds::DEFERRED_DELETE));
        assert!(config.is_compressible(kinds::QUIT));
        assert!(!config.is_compressible(kinds::USER));
    }

    #[test]
    fn custom_compression_set_is_honored() {
        let config = DispatchConfig {
            compressible_kinds: vec![EventKind(kinds::USER.0 + 9)],
            queue_reserve: 16,
        };
        assert!(config.is_compressible(EventKind(kinds::USER.0 + 9)));
        assert!(!config.is_compressible(kinds::QUIT));
    }
}
