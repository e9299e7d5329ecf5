//! Fingerprint templates

use std::fmt;

use bytes::Bytes;

/// A fingerprint template stored for one finger of one user
#[derive(Debug, Clone)]
pub struct Finger {
    pub uid: u16,
    /// Finger index, 0..=9
    pub fid: u8,
    pub valid: u8,
    pub template: Bytes,
    mark: String,
}

impl Finger {
    pub fn new(uid: u16, fid: u8, valid: u8, template: impl Into<Bytes>) -> Self {
        let template = template.into();
        let mark = mark_of(&template);
        Self {
            uid,
            fid,
            valid,
            template,
            mark,
        }
    }

    /// Template length in bytes
    pub fn size(&self) -> usize {
        self.template.len()
    }

    /// Short hex digest of the template head and tail
    pub fn mark(&self) -> &str {
        &self.mark
    }
}

fn mark_of(template: &[u8]) -> String {
    let head = &template[..template.len().min(8)];
    let tail = &template[template.len().saturating_sub(8)..];
    format!("{}...{}", hex::encode(head), hex::encode(tail))
}

impl PartialEq for Finger {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
            && self.fid == other.fid
            && self.valid == other.valid
            && self.template == other.template
    }
}

impl Eq for Finger {}

impl fmt::Display for Finger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Finger> [uid:{:>3}, fid:{}, size:{:>4} v:{} t:{}]",
            self.uid,
            self.fid,
            self.size(),
            self.valid,
            self.mark
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_mark() {
        let template: Vec<u8> = (0u8..20).collect();
        let finger = Finger::new(3, 6, 1, template);
        assert_eq!(finger.mark(), "0001020304050607...0c0d0e0f10111213");
        assert_eq!(finger.size(), 20);
    }

    #[test]
    fn test_mark_short_template() {
        let finger = Finger::new(1, 0, 1, vec![0xAB, 0xCD]);
        assert_eq!(finger.mark(), "abcd...abcd");
    }
}
