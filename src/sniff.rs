//! Guessing a binary's file kind from its leading bytes.
//!
//! The table is ordered and the order is part of the contract: several entries
//! share a pattern (`jpg`/`jpeg`, `bmp`/`dib`, the `OggS` family) and the first
//! matching entry always wins.

use serde::Serialize;
use tracing::debug;

/// One row of the signature table.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct Signature {
    pub display: &'static str,
    pub description: &'static str,
    /// May be empty for markers that do not map to a file extension.
    pub extension: &'static str,
    pub offset: usize,
    /// `None` positions match any byte.
    #[serde(skip)]
    pub pattern: &'static [Option<u8>],
}

impl Signature {
    /// Whether `bytes` carries this signature at its offset.
    #[must_use]
    pub fn matches(&self, bytes: &[u8]) -> bool {
        let Some(window) = bytes.get(self.offset..self.offset + self.pattern.len()) else {
            return false;
        };
        self.pattern
            .iter()
            .zip(window)
            .all(|(expected, actual)| expected.is_none_or(|b| b == *actual))
    }
}

macro_rules! sig {
    (@byte _) => { None };
    (@byte $b:literal) => { Some($b) };
    ($display:expr, $description:expr, $extension:expr, $offset:expr, [$($byte:tt),* $(,)?]) => {
        Signature {
            display: $display,
            description: $description,
            extension: $extension,
            offset: $offset,
            pattern: &[$(sig!(@byte $byte)),*],
        }
    };
}

const JPEG: &str = "JPEG raw or in the JFIF or Exif file format";
const OGG: &str = "Ogg, an open source media container format";

pub static SIGNATURES: &[Signature] = &[
    sig!("GIF87a", "Graphics Interchange Format", "gif", 0, [71, 73, 70, 56, 55, 97]),
    sig!("GIF89a", "Graphics Interchange Format", "gif", 0, [71, 73, 70, 56, 57, 97]),
    sig!("II*.", "Tagged Image File Format (little endian)", "tif", 0, [73, 73, 42, 0]),
    sig!("MM.*", "Tagged Image File Format (big endian)", "tif", 0, [77, 77, 0, 42]),
    sig!("II*.....CR", "Canon RAW, based on TIFF", "cr2", 0, [73, 73, 42, 0, 16, 0, 0, 0, 67, 82]),
    sig!("II*.....CR", "Canon RAW Format Version 2", "cr2", 0, [73, 73, 42, 0, 16, 0, 0, 0, 67, 82]),
    sig!(".*_\u{d7}", "Kodak Cineon image", "cin", 0, [128, 42, 95, 215]),
    sig!("RNC.RNC.", "Rob Northen Compression (version 1 and 2)", "", 0, [82, 78, 67, 1, 82, 78, 67, 2]),
    sig!("SDPX", "SMPTE DPX image (big endian)", "dpx", 0, [83, 68, 80, 88]),
    sig!("XPDS", "SMPTE DPX image (little endian)", "dpx", 0, [88, 80, 68, 83]),
    sig!("v/1.", "OpenEXR image", "exr", 0, [118, 47, 49, 1]),
    sig!("BPG\u{fb}", "Better Portable Graphics", "bpg", 0, [66, 80, 71, 251]),
    sig!("\u{ff}\u{d8}\u{ff}\u{db}", JPEG, "jpg", 0, [255, 216, 255, 219]),
    sig!("\u{ff}\u{d8}\u{ff}\u{db}", JPEG, "jpeg", 0, [255, 216, 255, 219]),
    sig!("\u{ff}\u{d8}\u{ff}\u{e0}..JFIF..", JPEG, "jpg", 0, [255, 216, 255, 224, _, _, 74, 70, 73, 70, 0, 1]),
    sig!("\u{ff}\u{d8}\u{ff}\u{e0}..JFIF..", JPEG, "jpeg", 0, [255, 216, 255, 224, _, _, 74, 70, 73, 70, 0, 1]),
    sig!("\u{ff}\u{d8}\u{ff}\u{e1}..Exif..", JPEG, "jpg", 0, [255, 216, 255, 225, _, _, 69, 120, 105, 102, 0, 0]),
    sig!("\u{ff}\u{d8}\u{ff}\u{e1}..Exif..", JPEG, "jpeg", 0, [255, 216, 255, 225, _, _, 69, 120, 105, 102, 0, 0]),
    sig!(".PNG....", "Portable Network Graphics", "png", 0, [137, 80, 78, 71, 13, 10, 26, 10]),
    sig!("\u{ef}\u{bb}\u{bf}", "UTF-8 byte order mark", "", 0, [239, 187, 191]),
    sig!("OggS", OGG, "ogg", 0, [79, 103, 103, 83]),
    sig!("OggS", OGG, "oga", 0, [79, 103, 103, 83]),
    sig!("OggS", OGG, "ogv", 0, [79, 103, 103, 83]),
    sig!("RIFF....WAVE", "Waveform Audio File Format", "wav", 0, [82, 73, 70, 70, _, _, _, _, 87, 65, 86, 69]),
    sig!("RIFF....AVI ", "Audio Video Interleave", "avi", 0, [82, 73, 70, 70, _, _, _, _, 65, 86, 73, 32]),
    sig!("\u{ff}\u{fb}", "MPEG-1 Layer 3 without an ID3v2 tag", "mp3", 0, [255, 251]),
    sig!("ID3", "MP3 with an ID3v2 container", "mp3", 0, [73, 68, 51]),
    sig!("BM", "Windows bitmap", "bmp", 0, [66, 77]),
    sig!("BM", "Windows bitmap", "dib", 0, [66, 77]),
    sig!("BM", "Windows bitmap", "dib", 0, [66, 77]),
    sig!(
        "SIMPLE  =                    T",
        "Flexible Image Transport System",
        "fits",
        0,
        [
            83, 73, 77, 80, 76, 69, 32, 32, 61, 32, 32, 32, 32, 32, 32, 32, 32, 32, 32, 32, 32, 32,
            32, 32, 32, 32, 32, 32, 32, 84,
        ]
    ),
    sig!("fLaC", "Free Lossless Audio Codec", "flac", 0, [102, 76, 97, 67]),
    sig!("MThd", "MIDI sound file", "mid", 0, [77, 84, 104, 100]),
    sig!("MThd", "MIDI sound file", "midi", 0, [77, 84, 104, 100]),
    sig!("KDM", "VMDK disk image", "vmdk", 0, [75, 68, 77]),
    sig!(".E\u{df}\u{a3}", "Matroska media container, including WebM", "mkv", 0, [26, 69, 223, 163]),
    sig!("\u{cf}..", "Lepton compressed JPEG", "lep", 0, [207, 132, 1]),
    sig!("RIFF....", "Google WebP image", "webp", 0, [82, 73, 70, 70, _, _, _, _]),
    sig!("WEBP", "", "", 0, [87, 69, 66, 80]),
    sig!("ftypisom", "ISO Base Media file (MPEG-4)", "mp4", 4, [0x66, 0x74, 0x79, 0x70, 0x69, 0x73, 0x6f, 0x6d]),
    sig!("ftypMSNV", "MPEG-4 video file", "mp4", 4, [0x66, 0x74, 0x79, 0x70, 0x4d, 0x53, 0x4e, 0x56]),
];

/// Return the first table entry matching `bytes`, or `None` when nothing does.
#[must_use]
pub fn sniff(bytes: &[u8]) -> Option<&'static Signature> {
    let found = SIGNATURES.iter().find(|sig| sig.matches(bytes));
    match found {
        Some(sig) => debug!(extension = sig.extension, display = sig.display, "Sniffed signature"),
        None => debug!(len = bytes.len(), "Signature sniffing inconclusive"),
    }
    found
}
