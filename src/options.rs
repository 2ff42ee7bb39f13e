//! Per-context configuration.

/// Options fixed for the lifetime of one `MapContext`.
///
/// With `preserve_references` set, every resolution made through the
/// context selects the cache-aware mapper: shared sources map to shared
/// targets and cycles terminate. Without it no cache exists and a cyclic
/// source graph recurses without bound.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct MapOptions {
    pub preserve_references: bool,
}

impl MapOptions {
    pub const fn new() -> Self {
        Self {
            preserve_references: false,
        }
    }

    pub const fn preserving() -> Self {
        Self {
            preserve_references: true,
        }
    }

    pub const fn preserve_references(mut self, preserve: bool) -> Self {
        self.preserve_references = preserve;
        self
    }
}
