use serde_json::{Map, Value};
use tracing::debug;

use crate::dispatcher::{Dispatcher, Outcome};
use crate::error::Fault;
use crate::params::RequestParams;
use crate::reply::Reply;
use crate::status::Status;

/// Maximum number of entries executed from one envelope; the rest are ignored.
pub const MAX_BATCH_ENTRIES: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub struct BatchEntry {
    pub label: String,
    pub encoded: String,
}

/// Splits `label,base64(params);label,base64(params);...` into entries.
///
/// Entries are split on their first comma; entries without one or with an
/// empty label or payload are skipped.
pub fn parse_envelope(envelope: &str) -> Vec<BatchEntry> {
    envelope
        .split(';')
        .filter_map(|entry| {
            let (label, encoded) = entry.trim().split_once(',')?;
            let (label, encoded) = (label.trim(), encoded.trim());
            if label.is_empty() || encoded.is_empty() {
                return None;
            }
            Some(BatchEntry {
                label: label.to_string(),
                encoded: encoded.to_string(),
            })
        })
        .take(MAX_BATCH_ENTRIES)
        .collect()
}

impl Dispatcher {
    /// Runs every entry of `envelope` in order, each against the original
    /// request parameters overlaid with the entry's own, and replies once
    /// with the results keyed by label.
    pub fn run_batch(&mut self, envelope: &str) -> Outcome {
        let entries = parse_envelope(envelope);
        debug!(entries = entries.len(), "running batch");

        let original = self.params().clone();
        self.batch = true;

        let mut results = Map::with_capacity(entries.len());
        for entry in entries {
            let result = match RequestParams::from_encoded(&entry.encoded) {
                Some(overrides) => {
                    self.set_params(original.overlay(&overrides).with_route(None));
                    self.run_entry()
                }
                None => Reply::error(Status::InvalidData, "Invalid batch entry encoding").into_value(),
            };

            debug!(label = %entry.label, status = ?result.get("response"), "batch entry done");
            results.insert(entry.label, result);
        }

        self.batch = false;
        self.set_params(original);

        self.emit(Value::Object(results));
        Outcome::Terminated
    }

    fn run_entry(&mut self) -> Value {
        let Some(path) = self.params().function_name() else {
            let fault = Fault::FunctionNotFound(self.params().get("f").unwrap_or_default().into());
            return Reply::error(fault.status(), fault.to_string()).into_value();
        };

        match self.process(&path, true) {
            Outcome::Completed(_) | Outcome::Terminated => Value::Null,
            Outcome::EarlyReturn(reply) | Outcome::SuppressedEmit(reply) => reply.into_value(),
            Outcome::Fault(fault) => {
                debug!(path = %path, %fault, "batch entry failed");
                Reply::error(Status::CustomError, fault.to_string()).into_value()
            }
        }
    }
}
