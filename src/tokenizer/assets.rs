use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use hf_hub::api::sync::Api;
use hf_hub::api::RepoInfo;
use serde_json::Value;

const TOKENIZER_FILE: &str = "tokenizer.json";
const TOKENIZER_CONFIG_FILE: &str = "tokenizer_config.json";

/// Files needed from a model checkpoint: the tokenizer and its config (chat template, bos/eos).
#[derive(Debug, Clone)]
pub struct ModelAssets {
    pub tokenizer_json: PathBuf,
    pub tokenizer_config: Option<Value>,
}

impl ModelAssets {
    /// `model` is a local checkpoint directory or a Hugging Face Hub repo id.
    pub fn resolve(model: &str) -> Result<Self> {
        let dir = Path::new(model);
        if dir.is_dir() {
            return Self::from_dir(dir);
        }
        Self::from_hub(model)
    }

    pub fn from_dir(dir: &Path) -> Result<Self> {
        let tokenizer_json = dir.join(TOKENIZER_FILE);
        if !tokenizer_json.is_file() {
            bail!("{} not found in {}", TOKENIZER_FILE, dir.display());
        }
        let cfg_path = dir.join(TOKENIZER_CONFIG_FILE);
        let tokenizer_config = if cfg_path.is_file() { Some(read_config(&cfg_path)?) } else { None };
        Ok(Self { tokenizer_json, tokenizer_config })
    }

    fn from_hub(repo_id: &str) -> Result<Self> {
        let api = Api::new()?;
        let repo = api.model(repo_id.to_string());
        let tokenizer_json = repo
            .get(TOKENIZER_FILE)
            .with_context(|| format!("fetch {} from {}", TOKENIZER_FILE, repo_id))?;
        let info = repo
            .info()
            .with_context(|| format!("list files of {}", repo_id))?;
        // not every repo ships a tokenizer_config.json; a listed one that fails to fetch is fatal
        let tokenizer_config = if lists_file(&info, TOKENIZER_CONFIG_FILE) {
            let p = repo
                .get(TOKENIZER_CONFIG_FILE)
                .with_context(|| format!("fetch {} from {}", TOKENIZER_CONFIG_FILE, repo_id))?;
            Some(read_config(&p)?)
        } else {
            None
        };
        Ok(Self { tokenizer_json, tokenizer_config })
    }

    pub fn chat_template(&self) -> Option<&str> {
        self.tokenizer_config.as_ref()?.get("chat_template")?.as_str()
    }

    /// transformers' `clean_up_tokenization_spaces`, off when the config omits it.
    pub fn clean_up_tokenization_spaces(&self) -> bool {
        self.tokenizer_config
            .as_ref()
            .and_then(|c| c.get("clean_up_tokenization_spaces"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn bos_token(&self) -> Option<String> { self.special_token("bos_token") }
    pub fn eos_token(&self) -> Option<String> { self.special_token("eos_token") }

    // a special token is either a plain string or {"content": "..."}
    fn special_token(&self, key: &str) -> Option<String> {
        let v = self.tokenizer_config.as_ref()?.get(key)?;
        v.as_str()
            .map(String::from)
            .or_else(|| v.get("content").and_then(|c| c.as_str()).map(String::from))
    }
}

fn lists_file(info: &RepoInfo, name: &str) -> bool {
    info.siblings.iter().any(|s| s.rfilename == name)
}

fn read_config(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn local_dir_requires_tokenizer_json() {
        let dir = tempdir().unwrap();
        let err = ModelAssets::from_dir(dir.path()).unwrap_err();
        assert!(err.to_string().contains("tokenizer.json not found"));
    }

    #[test]
    fn local_dir_reads_optional_config() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(TOKENIZER_FILE), "{}").unwrap();
        let assets = ModelAssets::from_dir(dir.path()).unwrap();
        assert!(assets.tokenizer_config.is_none());
        assert!(assets.chat_template().is_none());

        let cfg = json!({
            "chat_template": "{{ bos_token }}",
            "bos_token": "<s>",
            "eos_token": {"content": "</s>", "lstrip": false}
        });
        std::fs::write(dir.path().join(TOKENIZER_CONFIG_FILE), cfg.to_string()).unwrap();
        let assets = ModelAssets::resolve(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(assets.chat_template(), Some("{{ bos_token }}"));
        assert_eq!(assets.bos_token().as_deref(), Some("<s>"));
        assert_eq!(assets.eos_token().as_deref(), Some("</s>"));
    }

    #[test]
    fn cleanup_flag_defaults_off() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(TOKENIZER_FILE), "{}").unwrap();
        assert!(!ModelAssets::from_dir(dir.path()).unwrap().clean_up_tokenization_spaces());

        std::fs::write(dir.path().join(TOKENIZER_CONFIG_FILE), r#"{"clean_up_tokenization_spaces": true}"#).unwrap();
        assert!(ModelAssets::from_dir(dir.path()).unwrap().clean_up_tokenization_spaces());
    }

    #[test]
    fn config_presence_comes_from_repo_listing() {
        let info: RepoInfo = serde_json::from_value(json!({
            "sha": "abc",
            "siblings": [{"rfilename": "tokenizer.json"}, {"rfilename": "config.json"}]
        }))
        .unwrap();
        assert!(lists_file(&info, TOKENIZER_FILE));
        assert!(!lists_file(&info, TOKENIZER_CONFIG_FILE));
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(TOKENIZER_FILE), "{}").unwrap();
        std::fs::write(dir.path().join(TOKENIZER_CONFIG_FILE), "{not json").unwrap();
        assert!(ModelAssets::from_dir(dir.path()).is_err());
    }
}
