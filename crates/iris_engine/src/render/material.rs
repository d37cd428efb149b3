//! Material texture path convention
//!
//! A material path ending in a separator names a directory holding one PNG per
//! channel; any other path is a single texture bound as albedo. Each channel
//! maps to one binding of descriptor set 1.

use std::path::PathBuf;

/// Entries in each material texture array (set 1)
pub const TEXTURE_ARRAY_SIZE: u32 = 1024;

/// Descriptor set holding the material texture arrays
pub const MATERIAL_SET: u32 = 1;

/// How a texture's texels are stored on the GPU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureEncoding {
    /// 4-channel color, sRGB transfer
    Srgb,
    /// 4-channel linear data
    Linear,
    /// One linear channel
    SingleChannel,
}

/// Material texture channel, in binding order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureChannel {
    /// Base color
    Albedo,
    /// Tangent-space normal map
    Normal,
    /// Metalness
    Metallic,
    /// Height / displacement
    Height,
    /// Roughness
    Roughness,
    /// Ambient occlusion
    Ao,
}

impl TextureChannel {
    /// All channels in binding order
    pub const ALL: [Self; 6] = [
        Self::Albedo,
        Self::Normal,
        Self::Metallic,
        Self::Height,
        Self::Roughness,
        Self::Ao,
    ];

    /// Binding within set 1
    pub fn binding(self) -> u32 {
        self as u32
    }

    /// File name inside a material directory
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Albedo => "albedo.png",
            Self::Normal => "normal.png",
            Self::Metallic => "metallic.png",
            Self::Height => "height.png",
            Self::Roughness => "roughness.png",
            Self::Ao => "ao.png",
        }
    }

    /// Storage encoding for this channel
    pub fn encoding(self) -> TextureEncoding {
        match self {
            Self::Albedo => TextureEncoding::Srgb,
            Self::Normal => TextureEncoding::Linear,
            Self::Metallic | Self::Height | Self::Roughness | Self::Ao => TextureEncoding::SingleChannel,
        }
    }
}

/// A texture file to load and the binding it goes to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureSource {
    /// Channel, and therefore binding
    pub channel: TextureChannel,
    /// File to decode
    pub path: PathBuf,
}

/// Whether a material path names a directory of channel maps
pub fn is_material_directory(texture: &str) -> bool {
    texture.ends_with('/') || texture.ends_with(std::path::MAIN_SEPARATOR)
}

/// Texture files a material path expands to
///
/// Empty paths yield nothing, which renders the entity untextured.
pub fn texture_sources(texture: &str) -> Vec<TextureSource> {
    if texture.is_empty() {
        return Vec::new();
    }

    if is_material_directory(texture) {
        TextureChannel::ALL
            .iter()
            .map(|&channel| TextureSource {
                channel,
                path: PathBuf::from(texture).join(channel.file_name()),
            })
            .collect()
    } else {
        vec![TextureSource {
            channel: TextureChannel::Albedo,
            path: PathBuf::from(texture),
        }]
    }
}

/// Texture array slot for an entity index, `None` past the array bound
pub fn texture_slot(entity_index: u32) -> Option<u32> {
    (entity_index < TEXTURE_ARRAY_SIZE).then_some(entity_index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_expands_to_all_channels() {
        let sources = texture_sources("resources/textures/brick/");
        assert_eq!(sources.len(), 6);

        let bindings: Vec<u32> = sources.iter().map(|s| s.channel.binding()).collect();
        assert_eq!(bindings, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(sources[0].path, PathBuf::from("resources/textures/brick/albedo.png"));
        assert_eq!(sources[5].path, PathBuf::from("resources/textures/brick/ao.png"));
    }

    #[test]
    fn test_single_file_binds_albedo() {
        let sources = texture_sources("resources/textures/crate.png");
        assert_eq!(
            sources,
            vec![TextureSource {
                channel: TextureChannel::Albedo,
                path: PathBuf::from("resources/textures/crate.png"),
            }]
        );
        assert!(texture_sources("").is_empty());
    }

    #[test]
    fn test_channel_encodings() {
        assert_eq!(TextureChannel::Albedo.encoding(), TextureEncoding::Srgb);
        assert_eq!(TextureChannel::Normal.encoding(), TextureEncoding::Linear);
        assert_eq!(TextureChannel::Roughness.encoding(), TextureEncoding::SingleChannel);
    }

    #[test]
    fn test_texture_slot_bound() {
        assert_eq!(texture_slot(0), Some(0));
        assert_eq!(texture_slot(TEXTURE_ARRAY_SIZE - 1), Some(TEXTURE_ARRAY_SIZE - 1));
        assert_eq!(texture_slot(TEXTURE_ARRAY_SIZE), None);
    }
}
