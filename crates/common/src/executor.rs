//! Script executor contract
//!
//! The engine never talks to a browser directly. Drivers (WebDriver, CDP,
//! extension tabs) implement [`ScriptExecutor`] and the engine expresses every
//! page query or mutation as a script plus JSON arguments.

use async_trait::async_trait;
use serde_json::Value;

use crate::Result;

/// Evaluates JavaScript in the current frame of a page
#[async_trait]
pub trait ScriptExecutor: Send + Sync {
    /// Run `script` with `args` bound to `arguments[0..]` and return its result.
    ///
    /// Implementations surface driver failures as errors carrying the
    /// underlying message.
    async fn execute_script(&self, script: &str, args: Vec<Value>) -> Result<Value>;
}

/// Read a `[a, b]` numeric pair from a script result
pub fn value_to_pair(value: &Value) -> Option<(i32, i32)> {
    let items = value.as_array()?;
    if items.len() != 2 {
        return None;
    }
    let a = items[0].as_f64()?;
    let b = items[1].as_f64()?;
    Some((a.round() as i32, b.round() as i32))
}
