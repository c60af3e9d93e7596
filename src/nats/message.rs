//! Pub/sub wire message.

use bytes::Bytes;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Message {
    pub subject: String,
    pub data: Bytes,
    pub headers: Vec<(String, String)>,
}

impl Message {
    pub fn new(subject: impl Into<String>) -> Self {
        Self { subject: subject.into(), ..Self::default() }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Full subject for `subject` under `prefix`: `prefix.subject`, or `subject`
/// unchanged when the prefix is empty.
pub fn full_subject(prefix: &str, subject: &str) -> String {
    if prefix.is_empty() {
        subject.to_owned()
    } else {
        format!("{prefix}.{subject}")
    }
}
