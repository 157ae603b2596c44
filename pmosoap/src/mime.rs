//! Transport-level (MIME) headers attached to a SOAP message.

/// A single MIME header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeHeader {
    pub name: String,
    pub value: String,
}

/// Ordered, multi-valued MIME header set.
///
/// Names compare case-insensitively; insertion order is preserved and
/// a name may appear several times.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MimeHeaders {
    headers: Vec<MimeHeader>,
}

impl MimeHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every value of `name` with `value`.
    ///
    /// The first existing entry keeps its position, the others are dropped.
    /// Unknown names are appended.
    pub fn set(&mut self, name: &str, value: &str) {
        let mut replaced = false;
        self.headers.retain_mut(|header| {
            if !header.name.eq_ignore_ascii_case(name) {
                return true;
            }
            if replaced {
                return false;
            }
            header.value = value.to_string();
            replaced = true;
            true
        });
        if !replaced {
            self.add(name, value);
        }
    }

    /// Appends a value, keeping existing values of the same name.
    pub fn add(&mut self, name: &str, value: &str) {
        self.headers.push(MimeHeader {
            name: name.to_string(),
            value: value.to_string(),
        });
    }

    pub fn remove_all(&mut self) {
        self.headers.clear();
    }

    /// All values of `name`, in insertion order.
    pub fn get(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|header| header.name.eq_ignore_ascii_case(name))
            .map(|header| header.value.as_str())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.headers
            .iter()
            .any(|header| header.name.eq_ignore_ascii_case(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &MimeHeader> {
        self.headers.iter()
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Renders the headers as `[name] = [value]` lines, without trailing newline.
    pub fn listing(&self) -> String {
        self.headers
            .iter()
            .map(|header| format!("[{}] = [{}]", header.name, header.value))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
