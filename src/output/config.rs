use std::env;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputConfig {
    pub pretty: bool,
}

impl OutputConfig {
    pub fn from_env() -> Self {
        let pretty = match env::var("SPECDRAFT_OUTPUT_PRETTY").ok().as_deref() {
            Some(v) if v.eq_ignore_ascii_case("1") || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes") => true,
            _ => false,
        };
        OutputConfig { pretty }
    }
}
