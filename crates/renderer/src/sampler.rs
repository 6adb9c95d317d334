//! Sampler uniform naming: `<prefix><ordinal>` with one counter per texture kind.

use asset::TextureKind;

/// Per-draw ordinal table. Each recognized kind counts from 1 on its own.
#[derive(Clone, Debug)]
pub struct SamplerNames {
    next: [u32; TextureKind::COUNT],
}

impl SamplerNames {
    pub fn new() -> Self {
        Self {
            next: [1; TextureKind::COUNT],
        }
    }

    /// Name for the next texture of `kind`, e.g. `texture_diffuse2`.
    /// Unrecognized kinds get their raw tag without an ordinal.
    pub fn next_name(&mut self, kind: &TextureKind) -> String {
        match kind.counter_slot() {
            Some(slot) => {
                let ordinal = self.next[slot];
                self.next[slot] += 1;
                format!("{}{}", kind.sampler_prefix(), ordinal)
            }
            None => kind.sampler_prefix().to_owned(),
        }
    }
}

impl Default for SamplerNames {
    fn default() -> Self {
        Self::new()
    }
}
