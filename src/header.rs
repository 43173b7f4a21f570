use crate::error::{Error, Result};

/// Fixed size of the planar header image.
pub const HEADER_SIZE_PLANAR: usize = 127;
/// Fixed size of the cubic header image.
pub const HEADER_SIZE_CUBIC: usize = 262;
/// Fixed span at the start of every archive holding the header, root
/// directories and metadata; the tile data region always begins here.
pub const PRELUDE_SIZE: usize = 98_304;

const MAGIC_PLANAR: [u8; 2] = *b"PM";
const MAGIC_CUBIC: [u8; 2] = *b"S2";
const SPEC_VERSION_PLANAR: u8 = 3;
const SPEC_VERSION_CUBIC: u8 = 1;

/// Compression algorithm tag, stored one byte each for the internal
/// (directory + metadata) and tile streams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Compression {
    /// a different or unspecified algorithm; cannot be (de)compressed here
    Unknown = 0,
    /// no compression
    #[default]
    None = 1,
    /// gzip
    Gzip = 2,
    /// brotli
    Brotli = 3,
    /// zstd
    Zstd = 4,
}

impl Compression {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Brotli => "br",
            Self::Zstd => "zstd",
        }
    }
}

impl From<u8> for Compression {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::None,
            2 => Self::Gzip,
            3 => Self::Brotli,
            4 => Self::Zstd,
            _ => Self::Unknown,
        }
    }
}

impl From<Compression> for u8 {
    fn from(compression: Compression) -> Self {
        compression as Self
    }
}

/// Payload format tag carried in the header; opaque to this crate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TileType {
    /// unknown/other
    #[default]
    Unknown = 0,
    /// vector tiles
    Pbf = 1,
    /// image tiles
    Png = 2,
    /// image tiles
    Jpeg = 3,
    /// image tiles
    Webp = 4,
    /// image tiles
    Avif = 5,
}

impl TileType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Pbf => "pbf",
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Webp => "webp",
            Self::Avif => "avif",
        }
    }
}

impl From<u8> for TileType {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Pbf,
            2 => Self::Png,
            3 => Self::Jpeg,
            4 => Self::Webp,
            5 => Self::Avif,
            _ => Self::Unknown,
        }
    }
}

impl From<TileType> for u8 {
    fn from(tile_type: TileType) -> Self {
        tile_type as Self
    }
}

/// One of the six planes of the cubed-sphere projection.
///
/// Planar archives only ever touch [`Face::Face0`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Face {
    /// face 0; doubles as the planar quadtree
    #[default]
    Face0 = 0,
    /// face 1
    Face1 = 1,
    /// face 2
    Face2 = 2,
    /// face 3
    Face3 = 3,
    /// face 4
    Face4 = 4,
    /// face 5
    Face5 = 5,
}

impl Face {
    /// All six faces in storage order.
    pub const ALL: [Self; 6] = [
        Self::Face0,
        Self::Face1,
        Self::Face2,
        Self::Face3,
        Self::Face4,
        Self::Face5,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Which of the two wire flavors an archive uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Flavor {
    /// one root directory over a single quadtree; magic `"PM"`
    #[default]
    Planar,
    /// six root directories, one per cubed-sphere face; magic `"S2"`
    Cubic,
}

impl Flavor {
    /// Byte length of this flavor's header image.
    pub const fn header_size(self) -> usize {
        match self {
            Self::Planar => HEADER_SIZE_PLANAR,
            Self::Cubic => HEADER_SIZE_CUBIC,
        }
    }
}

/// The fixed-layout archive header.
///
/// Face 0 lives in the planar-compatible first 127 bytes; the cubic extension
/// appends root and leaf slots for faces 1 through 5. Per-face state is held
/// in arrays indexed by [`Face::index`], slot 0 being the planar fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    /// wire flavor, detected from the magic on decode
    pub flavor: Flavor,
    /// absolute offset of each face's root directory
    pub root_offsets: [u64; 6],
    /// length of each face's root directory
    pub root_lengths: [u64; 6],
    /// absolute offset of the JSON metadata blob
    pub metadata_offset: u64,
    /// length of the JSON metadata blob
    pub metadata_length: u64,
    /// absolute offset of each face's leaf directory block
    pub leaf_offsets: [u64; 6],
    /// length of each face's leaf directory block
    pub leaf_lengths: [u64; 6],
    /// absolute offset of the tile data region; always [`PRELUDE_SIZE`]
    pub tile_data_offset: u64,
    /// length of the tile data region
    pub tile_data_length: u64,
    /// total tiles addressed (sum of run lengths at write time)
    pub num_addressed_tiles: u64,
    /// face-0 entry count
    pub num_tile_entries: u64,
    /// distinct tile payloads stored
    pub num_tile_contents: u64,
    /// whether tiles were supplied in ascending tile-id order
    pub clustered: bool,
    /// compression applied to directories and metadata
    pub internal_compression: Compression,
    /// compression applied to tile payloads
    pub tile_compression: Compression,
    /// payload format tag
    pub tile_type: TileType,
    /// lowest zoom written
    pub min_zoom: u8,
    /// highest zoom written
    pub max_zoom: u8,
}

impl Header {
    /// `(offset, length)` of a face's root directory.
    pub const fn root_slot(&self, face: Face) -> (u64, u64) {
        (
            self.root_offsets[face.index()],
            self.root_lengths[face.index()],
        )
    }

    /// `(offset, length)` of a face's leaf directory block.
    pub const fn leaf_slot(&self, face: Face) -> (u64, u64) {
        (
            self.leaf_offsets[face.index()],
            self.leaf_lengths[face.index()],
        )
    }

    /// Encode to the flavor's fixed-size image (127 or 262 bytes).
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.flavor.header_size()];

        match self.flavor {
            Flavor::Planar => {
                buf[0..2].copy_from_slice(&MAGIC_PLANAR);
                buf[7] = SPEC_VERSION_PLANAR;
            }
            Flavor::Cubic => {
                buf[0..2].copy_from_slice(&MAGIC_CUBIC);
                buf[7] = SPEC_VERSION_CUBIC;
            }
        }

        put_u64(&mut buf, 8, self.root_offsets[0]);
        put_u64(&mut buf, 16, self.root_lengths[0]);
        put_u64(&mut buf, 24, self.metadata_offset);
        put_u64(&mut buf, 32, self.metadata_length);
        put_u64(&mut buf, 40, self.leaf_offsets[0]);
        put_u64(&mut buf, 48, self.leaf_lengths[0]);
        put_u64(&mut buf, 56, self.tile_data_offset);
        put_u64(&mut buf, 64, self.tile_data_length);
        put_u64(&mut buf, 72, self.num_addressed_tiles);
        put_u64(&mut buf, 80, self.num_tile_entries);
        put_u64(&mut buf, 88, self.num_tile_contents);
        buf[96] = u8::from(self.clustered);
        buf[97] = self.internal_compression.into();
        buf[98] = self.tile_compression.into();
        buf[99] = self.tile_type.into();
        buf[100] = self.min_zoom;
        buf[101] = self.max_zoom;

        if self.flavor == Flavor::Cubic {
            for face in 1..6 {
                let root_at = 102 + 16 * (face - 1);
                put_u64(&mut buf, root_at, self.root_offsets[face]);
                put_u64(&mut buf, root_at + 8, self.root_lengths[face]);

                let leaf_at = 182 + 16 * (face - 1);
                put_u64(&mut buf, leaf_at, self.leaf_offsets[face]);
                put_u64(&mut buf, leaf_at + 8, self.leaf_lengths[face]);
            }
        }

        buf
    }

    /// Decode a header from the front of a prelude buffer.
    ///
    /// # Errors
    /// [`Error::MalformedHeader`] on an unrecognized magic, a spec version
    /// this crate does not speak, or a buffer too short for the flavor.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE_PLANAR {
            return Err(Error::MalformedHeader(format!(
                "{} bytes is shorter than a planar header",
                data.len()
            )));
        }

        let flavor = match [data[0], data[1]] {
            MAGIC_PLANAR => Flavor::Planar,
            MAGIC_CUBIC => Flavor::Cubic,
            other => {
                return Err(Error::MalformedHeader(format!(
                    "unrecognized magic {other:02x?}"
                )))
            }
        };
        let expected_version = match flavor {
            Flavor::Planar => SPEC_VERSION_PLANAR,
            Flavor::Cubic => SPEC_VERSION_CUBIC,
        };
        if data[7] != expected_version {
            return Err(Error::MalformedHeader(format!(
                "unsupported spec version {}",
                data[7]
            )));
        }
        if flavor == Flavor::Cubic && data.len() < HEADER_SIZE_CUBIC {
            return Err(Error::MalformedHeader(format!(
                "{} bytes is shorter than a cubic header",
                data.len()
            )));
        }

        let mut header = Self {
            flavor,
            metadata_offset: get_u64(data, 24),
            metadata_length: get_u64(data, 32),
            tile_data_offset: get_u64(data, 56),
            tile_data_length: get_u64(data, 64),
            num_addressed_tiles: get_u64(data, 72),
            num_tile_entries: get_u64(data, 80),
            num_tile_contents: get_u64(data, 88),
            clustered: data[96] == 1,
            internal_compression: Compression::from(data[97]),
            tile_compression: Compression::from(data[98]),
            tile_type: TileType::from(data[99]),
            min_zoom: data[100],
            max_zoom: data[101],
            ..Self::default()
        };
        header.root_offsets[0] = get_u64(data, 8);
        header.root_lengths[0] = get_u64(data, 16);
        header.leaf_offsets[0] = get_u64(data, 40);
        header.leaf_lengths[0] = get_u64(data, 48);

        if flavor == Flavor::Cubic {
            for face in 1..6 {
                let root_at = 102 + 16 * (face - 1);
                header.root_offsets[face] = get_u64(data, root_at);
                header.root_lengths[face] = get_u64(data, root_at + 8);

                let leaf_at = 182 + 16 * (face - 1);
                header.leaf_offsets[face] = get_u64(data, leaf_at);
                header.leaf_lengths[face] = get_u64(data, leaf_at + 8);
            }
        }

        Ok(header)
    }
}

fn put_u64(buf: &mut [u8], at: usize, value: u64) {
    buf[at..at + 8].copy_from_slice(&value.to_le_bytes());
}

fn get_u64(buf: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(bytes)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_compression_tags() {
        for value in 0..=4u8 {
            assert_eq!(u8::from(Compression::from(value)), value);
        }
        assert_eq!(Compression::from(200), Compression::Unknown);
        assert_eq!(Compression::Brotli.label(), "br");
    }

    #[test]
    fn test_tile_type_tags() {
        for value in 0..=5u8 {
            assert_eq!(u8::from(TileType::from(value)), value);
        }
        assert_eq!(TileType::from(200), TileType::Unknown);
        assert_eq!(TileType::default(), TileType::Unknown);
    }

    #[test]
    fn test_planar_default_bytes() {
        let header = Header::default();
        let bytes = header.encode();

        let mut expected = vec![0u8; HEADER_SIZE_PLANAR];
        expected[0] = b'P';
        expected[1] = b'M';
        expected[7] = 3;
        expected[97] = 1;
        expected[98] = 1;
        assert_eq!(bytes, expected);

        assert_eq!(Header::decode(&bytes).unwrap(), header);
    }

    #[test]
    fn test_planar_round_trip() {
        let mut header = Header {
            flavor: Flavor::Planar,
            metadata_offset: 3,
            metadata_length: 4,
            tile_data_offset: 7,
            tile_data_length: 8,
            num_addressed_tiles: 9,
            num_tile_entries: 10,
            num_tile_contents: 11,
            clustered: true,
            internal_compression: Compression::Brotli,
            tile_compression: Compression::Zstd,
            tile_type: TileType::Jpeg,
            min_zoom: 12,
            max_zoom: 13,
            ..Header::default()
        };
        header.root_offsets[0] = 1;
        header.root_lengths[0] = 2;
        header.leaf_offsets[0] = 5;
        header.leaf_lengths[0] = 6;

        let bytes = header.encode();
        assert_eq!(bytes.len(), HEADER_SIZE_PLANAR);
        assert_eq!(Header::decode(&bytes).unwrap(), header);
    }

    #[test]
    fn test_cubic_round_trip() {
        let mut header = Header {
            flavor: Flavor::Cubic,
            metadata_offset: 3,
            metadata_length: 4,
            tile_data_offset: 7,
            tile_data_length: 8,
            num_addressed_tiles: 9,
            num_tile_entries: 10,
            num_tile_contents: 11,
            clustered: true,
            internal_compression: Compression::None,
            tile_compression: Compression::Gzip,
            tile_type: TileType::Pbf,
            min_zoom: 0,
            max_zoom: 14,
            ..Header::default()
        };
        for face in 0..6 {
            header.root_offsets[face] = 100 + face as u64;
            header.root_lengths[face] = 200 + face as u64;
            header.leaf_offsets[face] = 300 + face as u64;
            header.leaf_lengths[face] = 400 + face as u64;
        }

        let bytes = header.encode();
        assert_eq!(bytes.len(), HEADER_SIZE_CUBIC);
        assert_eq!(&bytes[0..2], b"S2");
        assert_eq!(bytes[7], 1);

        let decoded = Header::decode(&bytes).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(decoded.root_slot(Face::Face3), (103, 203));
        assert_eq!(decoded.leaf_slot(Face::Face5), (305, 405));
    }

    #[test]
    fn test_cubic_extension_offsets() {
        let mut header = Header {
            flavor: Flavor::Cubic,
            ..Header::default()
        };
        header.root_offsets[1] = 0xAABB_CCDD;
        header.leaf_offsets[1] = 0x1122_3344;

        let bytes = header.encode();
        // face 1's root slot sits at byte 102, its leaf slot at byte 182
        assert_eq!(get_u64(&bytes, 102), 0xAABB_CCDD);
        assert_eq!(get_u64(&bytes, 182), 0x1122_3344);
    }

    #[test]
    fn test_decode_rejects_bad_magic_and_version() {
        let mut bytes = Header::default().encode();
        bytes[0] = b'X';
        assert!(matches!(
            Header::decode(&bytes),
            Err(Error::MalformedHeader(_))
        ));

        let mut bytes = Header::default().encode();
        bytes[7] = 9;
        assert!(matches!(
            Header::decode(&bytes),
            Err(Error::MalformedHeader(_))
        ));

        assert!(matches!(
            Header::decode(&[0u8; 16]),
            Err(Error::MalformedHeader(_))
        ));

        // cubic magic on a planar-sized buffer
        let mut bytes = Header::default().encode();
        bytes[0] = b'S';
        bytes[1] = b'2';
        bytes[7] = 1;
        assert!(matches!(
            Header::decode(&bytes),
            Err(Error::MalformedHeader(_))
        ));
    }
}
