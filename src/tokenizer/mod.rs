pub mod assets;
pub mod hf;

pub use assets::ModelAssets;
pub use hf::HfTokenizer;

use anyhow::Result;

/// Token id <-> text conversion as seen by the segmentation engine.
pub trait TokenCodec {
    /// Encode raw text without adding special tokens.
    fn encode(&self, text: &str) -> Result<Vec<u32>>;
    /// Decode ids; `keep_special` keeps control-token text verbatim.
    fn decode(&self, ids: &[u32], keep_special: bool) -> Result<String>;
}
