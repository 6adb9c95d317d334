//! Texture references attached to a mesh.
//! The device texture itself is owned by an external cache; a mesh only keeps the handle.

use std::fmt;
use std::str::FromStr;

/// Semantic role of a texture. Decides the sampler name it is bound to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TextureKind {
    Diffuse,
    Specular,
    Normal,
    Height,
    /// Unrecognized tag, kept verbatim.
    Other(String),
}

impl TextureKind {
    /// Number of recognized kinds.
    pub const COUNT: usize = 4;

    /// Recognized kinds in counter-table order.
    pub const KNOWN: [TextureKind; Self::COUNT] = [
        TextureKind::Diffuse,
        TextureKind::Specular,
        TextureKind::Normal,
        TextureKind::Height,
    ];

    /// Parse a type tag. Accepts both `texture_diffuse` and `diffuse`.
    pub fn from_tag(tag: &str) -> Self {
        let short = tag.strip_prefix("texture_").unwrap_or(tag);
        match short {
            "diffuse" => Self::Diffuse,
            "specular" => Self::Specular,
            "normal" => Self::Normal,
            "height" => Self::Height,
            _ => {
                log::debug!("Unrecognized texture tag '{}'", tag);
                Self::Other(tag.to_owned())
            }
        }
    }

    /// Sampler uniform prefix, e.g. `texture_diffuse`. `Other` returns its raw tag.
    pub fn sampler_prefix(&self) -> &str {
        match self {
            Self::Diffuse => "texture_diffuse",
            Self::Specular => "texture_specular",
            Self::Normal => "texture_normal",
            Self::Height => "texture_height",
            Self::Other(tag) => tag,
        }
    }

    /// Position in [`TextureKind::KNOWN`], `None` for `Other`.
    #[inline]
    pub fn counter_slot(&self) -> Option<usize> {
        match self {
            Self::Diffuse => Some(0),
            Self::Specular => Some(1),
            Self::Normal => Some(2),
            Self::Height => Some(3),
            Self::Other(_) => None,
        }
    }
}

impl FromStr for TextureKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_tag(s))
    }
}

impl fmt::Display for TextureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sampler_prefix())
    }
}

/// A device texture handle with its role and source path.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureRef<H> {
    pub handle: H,
    pub kind: TextureKind,
    /// Source path; only used by callers to deduplicate loads.
    pub path: String,
}

impl<H> TextureRef<H> {
    pub fn new(handle: H, kind: TextureKind, path: impl Into<String>) -> Self {
        Self {
            handle,
            kind,
            path: path.into(),
        }
    }
}
