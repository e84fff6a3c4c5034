//! Assembles one check submission into the encoded record buffer.

use crate::error::Error;
use crate::lineproto::{FieldValue, Metric};
use crate::perfdata;

/// The inputs of one send invocation.
#[derive(Debug, Clone)]
pub struct CheckSubmission {
    pub host: String,
    pub service: String,
    pub state: i64,
    pub output: String,
    /// Raw `name=value` tokens, kept in the order supplied.
    pub variables: Vec<String>,
    pub perfdata: String,
    /// Nanoseconds since the Unix epoch, shared by all emitted records.
    pub timestamp: i64,
}

/// Encodes all records for one submission: one `metric` line per
/// parseable perfdata sample, in parse order, then exactly one `state`
/// line.
pub fn assemble(submission: &CheckSubmission) -> Result<Vec<u8>, Error> {
    let base = base_tags(submission)?;
    let mut out = String::new();

    for sample in perfdata::parse(&submission.perfdata) {
        let mut metric = Metric::new("metric", submission.timestamp);
        metric.add_tag("label", sample.label.as_str());
        for (key, value) in &base {
            metric.add_tag(key.as_str(), value.as_str());
        }
        if let Some(uom) = &sample.uom {
            metric.add_tag("uom", uom.as_str());
        }
        metric.add_field("value", FieldValue::Float(sample.value));
        if let Some(warn) = sample.warn {
            metric.add_field("warn", FieldValue::Float(warn));
        }
        if let Some(crit) = sample.crit {
            metric.add_field("crit", FieldValue::Float(crit));
        }
        if let Some(min) = sample.min {
            metric.add_field("min", FieldValue::Float(min));
        }
        if let Some(max) = sample.max {
            metric.add_field("max", FieldValue::Float(max));
        }
        metric.encode_to(&mut out);
    }

    let mut state = Metric::new("state", submission.timestamp);
    for (key, value) in &base {
        state.add_tag(key.as_str(), value.as_str());
    }
    state.add_field("value", FieldValue::Integer(submission.state));
    if !submission.output.is_empty() {
        state.add_field("output", FieldValue::String(submission.output.clone()));
    }
    state.encode_to(&mut out);

    Ok(out.into_bytes())
}

// host and service first, then each user variable in supplied order.
// Values may themselves contain `=`, so split on the first one only.
fn base_tags(submission: &CheckSubmission) -> Result<Vec<(String, String)>, Error> {
    let mut tags = vec![
        ("host".to_string(), submission.host.clone()),
        ("service".to_string(), submission.service.clone()),
    ];
    for variable in &submission.variables {
        let (name, value) = variable.split_once('=').ok_or_else(|| {
            Error::malformed_input(format!("variable '{}' is missing '='", variable))
        })?;
        tags.push((name.to_string(), value.to_string()));
    }
    Ok(tags)
}
