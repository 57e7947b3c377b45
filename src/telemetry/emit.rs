use anyhow::Result;
use serde::Serialize;

use crate::output::config::OutputConfig;
use crate::output::types::{Envelope, Meta};
use crate::output::Emitter;

pub fn print_result<T: Serialize>(op: &'static str, result: &T, meta: Option<Meta>) -> Result<()> {
    let env = Envelope::result(op, result, meta)?;
    let emitter = Emitter::from_config(OutputConfig::from_env());
    emitter.emit(&env)?;
    Ok(())
}
