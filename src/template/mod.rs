use anyhow::{anyhow, Result};
use minijinja::{Environment, ErrorKind};

use crate::tokenizer::ModelAssets;

/// Turns a raw user prompt into the model's input text.
pub trait PromptRenderer {
    fn render(&self, prompt: &str, add_generation_prompt: bool) -> Result<String>;
}

/// Jinja chat template from `tokenizer_config.json`, rendered with a single user turn.
pub struct ChatTemplate {
    env: Environment<'static>,
    bos_token: String,
    eos_token: String,
}

impl ChatTemplate {
    pub fn new(template_str: &str, bos_token: Option<String>, eos_token: Option<String>) -> Result<Self> {
        let mut env = Environment::new();
        // HF renders chat templates with these two on
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        // templates call Python str/dict methods (`.strip()`, `.startswith()`, `.items()`)
        env.set_unknown_method_callback(minijinja_contrib::pycompat::unknown_method_callback);
        env.add_function("raise_exception", |msg: String| -> Result<String, minijinja::Error> {
            Err(minijinja::Error::new(ErrorKind::InvalidOperation, msg))
        });
        env.add_template_owned("chat", template_str.to_string())
            .map_err(|e| anyhow!("chat template parse error: {e}"))?;
        Ok(Self {
            env,
            bos_token: bos_token.unwrap_or_default(),
            eos_token: eos_token.unwrap_or_default(),
        })
    }

    pub fn chatml_default() -> Result<Self> {
        Self::new(CHATML_TEMPLATE, None, None)
    }

    /// Template from the model config, ChatML when the config has none.
    pub fn from_assets(assets: &ModelAssets) -> Result<Self> {
        match assets.chat_template() {
            Some(t) => Self::new(t, assets.bos_token(), assets.eos_token()),
            None => Self::chatml_default(),
        }
    }
}

impl PromptRenderer for ChatTemplate {
    fn render(&self, prompt: &str, add_generation_prompt: bool) -> Result<String> {
        let tmpl = self
            .env
            .get_template("chat")
            .map_err(|e| anyhow!("{e}"))?;

        let msgs = vec![minijinja::context! { role => "user", content => prompt }];

        tmpl.render(minijinja::context! {
            messages => msgs,
            add_generation_prompt => add_generation_prompt,
            bos_token => self.bos_token.as_str(),
            eos_token => self.eos_token.as_str(),
        })
        .map_err(|e| anyhow!("chat template render error: {e}"))
    }
}

const CHATML_TEMPLATE: &str = "{% for message in messages %}<|im_start|>{{ message.role }}\n{{ message.content }}<|im_end|>\n{% endfor %}{% if add_generation_prompt %}<|im_start|>assistant\n{% endif %}";
