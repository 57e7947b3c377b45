use std::path::Path;

use anyhow::{anyhow, Result};
use tokenizers::Tokenizer;

use super::TokenCodec;

/// Hugging Face `tokenizer.json` backed codec.
#[derive(Debug, Clone)]
pub struct HfTokenizer {
    inner: Tokenizer,
    clean_up_spaces: bool,
}

impl HfTokenizer {
    pub fn from_file(path: &Path) -> Result<Self> {
        let inner = Tokenizer::from_file(path)
            .map_err(|e| anyhow!("load tokenizer {}: {}", path.display(), e))?;
        Ok(Self { inner, clean_up_spaces: false })
    }

    /// Apply transformers' `clean_up_tokenization_spaces` pass after every decode.
    pub fn with_space_cleanup(mut self, on: bool) -> Self {
        self.clean_up_spaces = on;
        self
    }

    pub fn vocab_size(&self) -> usize { self.inner.get_vocab_size(true) }
}

impl TokenCodec for HfTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let enc = self.inner
            .encode(text, false)
            .map_err(|e| anyhow!("{}", e))?;
        Ok(enc.get_ids().to_vec())
    }

    fn decode(&self, ids: &[u32], keep_special: bool) -> Result<String> {
        let text = self.inner
            .decode(ids, !keep_special)
            .map_err(|e| anyhow!("{}", e))?;
        Ok(if self.clean_up_spaces { clean_up_tokenization(&text) } else { text })
    }
}

// same replacements, same order, as transformers' `clean_up_tokenization`
fn clean_up_tokenization(text: &str) -> String {
    text.replace(" .", ".")
        .replace(" ?", "?")
        .replace(" !", "!")
        .replace(" ,", ",")
        .replace(" ' ", "'")
        .replace(" n't", "n't")
        .replace(" 'm", "'m")
        .replace(" 's", "'s")
        .replace(" 've", "'ve")
        .replace(" 're", "'re")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    // word-level vocab, whitespace split, no decoder (tokens rejoin with a space),
    // <bos> added by the post-processor when specials are requested
    const TOKENIZER_JSON: &str = r#"{
      "version": "1.0",
      "truncation": null,
      "padding": null,
      "added_tokens": [
        {"id": 4, "content": "<eot>", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
        {"id": 5, "content": "<bos>", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true}
      ],
      "normalizer": null,
      "pre_tokenizer": {"type": "Whitespace"},
      "post_processor": {
        "type": "TemplateProcessing",
        "single": [{"SpecialToken": {"id": "<bos>", "type_id": 0}}, {"Sequence": {"id": "A", "type_id": 0}}],
        "pair": [{"Sequence": {"id": "A", "type_id": 0}}, {"Sequence": {"id": "B", "type_id": 1}}],
        "special_tokens": {"<bos>": {"id": "<bos>", "ids": [5], "tokens": ["<bos>"]}}
      },
      "decoder": null,
      "model": {
        "type": "WordLevel",
        "vocab": {"[UNK]": 0, "a": 1, "b": 2, "n't": 3, "<eot>": 4, "<bos>": 5, "do": 6, ".": 7},
        "unk_token": "[UNK]"
      }
    }"#;

    fn load() -> HfTokenizer {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tokenizer.json");
        std::fs::write(&path, TOKENIZER_JSON).unwrap();
        HfTokenizer::from_file(&path).unwrap()
    }

    #[test]
    fn encode_adds_no_special_tokens() {
        let tok = load();
        assert_eq!(tok.encode("a b").unwrap(), vec![1, 2]);
        assert_eq!(tok.encode("a <eot> b").unwrap(), vec![1, 4, 2]);
    }

    #[test]
    fn decode_keeps_special_markers_on_request() {
        let tok = load();
        let ids = [1, 4, 2];
        assert_eq!(tok.decode(&ids, true).unwrap(), "a <eot> b");
        assert_eq!(tok.decode(&ids, false).unwrap(), "a b");
    }

    #[test]
    fn space_cleanup_follows_config_flag() {
        let ids = [6, 3, 1, 7];
        assert_eq!(load().decode(&ids, true).unwrap(), "do n't a .");
        assert_eq!(load().with_space_cleanup(true).decode(&ids, true).unwrap(), "don't a.");
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        let err = HfTokenizer::from_file(&dir.path().join("tokenizer.json")).unwrap_err();
        assert!(err.to_string().starts_with("load tokenizer"));
    }
}
