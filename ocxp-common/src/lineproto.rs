//! Line-protocol encoding: `measurement,tagset fieldset timestamp`.
//!
//! Tag and field order is preserved exactly as inserted; escaping is
//! applied per token, never to the whole line.

/// Typed field value. Integers are wire-tagged with an `i` suffix,
/// strings are double-quoted.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    String(String),
}

/// One encodable record.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    name: String,
    tags: Vec<(String, String)>,
    fields: Vec<(String, FieldValue)>,
    timestamp: i64,
}

impl Metric {
    pub fn new(name: impl Into<String>, timestamp: i64) -> Self {
        Self {
            name: name.into(),
            tags: Vec::new(),
            fields: Vec::new(),
            timestamp,
        }
    }

    pub fn add_tag(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.tags.push((key.into(), value.into()));
    }

    pub fn add_field(&mut self, key: impl Into<String>, value: FieldValue) {
        self.fields.push((key.into(), value));
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &[(String, String)] {
        &self.tags
    }

    pub fn fields(&self) -> &[(String, FieldValue)] {
        &self.fields
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Appends one `\n`-terminated line to `out`.
    pub fn encode_to(&self, out: &mut String) {
        escape_measurement(&self.name, out);
        for (key, value) in &self.tags {
            out.push(',');
            escape_token(key, out);
            out.push('=');
            escape_token(value, out);
        }
        out.push(' ');
        for (index, (key, value)) in self.fields.iter().enumerate() {
            if index > 0 {
                out.push(',');
            }
            escape_token(key, out);
            out.push('=');
            encode_field_value(value, out);
        }
        out.push(' ');
        out.push_str(&self.timestamp.to_string());
        out.push('\n');
    }

    pub fn encode(&self) -> String {
        let mut out = String::new();
        self.encode_to(&mut out);
        out
    }
}

fn escape_measurement(token: &str, out: &mut String) {
    for c in token.chars() {
        if c == ',' || c == ' ' {
            out.push('\\');
        }
        out.push(c);
    }
}

// Tag keys, tag values and field keys share one escaping alphabet.
fn escape_token(token: &str, out: &mut String) {
    for c in token.chars() {
        if c == ',' || c == '=' || c == ' ' {
            out.push('\\');
        }
        out.push(c);
    }
}

fn encode_field_value(value: &FieldValue, out: &mut String) {
    match value {
        FieldValue::Integer(v) => {
            out.push_str(&v.to_string());
            out.push('i');
        }
        // f64 Display is the shortest representation that round-trips.
        FieldValue::Float(v) => out.push_str(&v.to_string()),
        FieldValue::String(v) => {
            out.push('"');
            for c in v.chars() {
                if c == '"' || c == '\\' {
                    out.push('\\');
                }
                out.push(c);
            }
            out.push('"');
        }
    }
}
