/// Index of a word header in the dictionary arena. Headers are appended in
/// definition order, so the id doubles as the word's generation stamp for
/// forget-style rollback.
pub type WordId = usize;

/// Index of a wordlist within the dictionary.
pub type Wid = usize;

pub const NAME_MAX: usize = 255;

/// 16-bit rolling PJW-style hash over the case-folded bytes. Empty names
/// hash to zero.
pub fn name_hash(name: &str) -> u16 {
    let mut code: u16 = 0;
    for b in name.bytes() {
        code = (code << 4).wrapping_add(b.to_ascii_lowercase() as u16);
        let shift = code & 0xf000;
        if shift != 0 {
            code ^= shift >> 8;
            code &= !shift;
        }
    }
    code
}

/// Length check first, then case-insensitive content compare.
pub fn names_equal(a: &str, b: &str) -> bool {
    a.len() == b.len() && a.eq_ignore_ascii_case(b)
}

/// One hash-bucketed scope of words. Buckets hold the most recently defined
/// word; older words hang off its `link` in the header. A single-bucket
/// wordlist degenerates to a flat list.
#[derive(Clone, Debug)]
pub struct Wordlist {
    buckets: Vec<Option<WordId>>,
    pub parent: Option<Wid>,
}

impl Wordlist {
    pub fn new(bucket_count: usize, parent: Option<Wid>) -> Wordlist {
        let n = bucket_count.max(1);
        Wordlist {
            buckets: vec![None; n],
            parent,
        }
    }

    pub fn bucket_index(&self, hash: u16) -> usize {
        if self.buckets.len() == 1 {
            0
        } else {
            hash as usize % self.buckets.len()
        }
    }

    pub fn head(&self, hash: u16) -> Option<WordId> {
        self.buckets[self.bucket_index(hash)]
    }

    pub fn set_head(&mut self, hash: u16, id: Option<WordId>) {
        let at = self.bucket_index(hash);
        self.buckets[at] = id;
    }

    pub fn heads_mut(&mut self) -> std::slice::IterMut<Option<WordId>> {
        self.buckets.iter_mut()
    }

    pub fn heads(&self) -> std::slice::Iter<Option<WordId>> {
        self.buckets.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_fold() {
        assert_eq!(0, name_hash(""));
        assert_eq!(name_hash("DUP"), name_hash("dup"));
        assert_eq!(name_hash("SwAp"), name_hash("swap"));
        assert_ne!(name_hash("dup"), name_hash("drop"));
        // stable across calls
        assert_eq!(name_hash("over"), name_hash("over"));
    }

    #[test]
    fn test_names_equal() {
        assert!(names_equal("Words", "words"));
        assert!(!names_equal("word", "words"));
        assert!(!names_equal("a", "b"));
    }

    #[test]
    fn test_buckets() {
        let mut wl = Wordlist::new(7, None);
        let h = name_hash("dup");
        assert_eq!(None, wl.head(h));
        wl.set_head(h, Some(3));
        assert_eq!(Some(3), wl.head(h));
        // single bucket always lands at zero
        let mut flat = Wordlist::new(1, None);
        flat.set_head(name_hash("a"), Some(1));
        assert_eq!(Some(1), flat.head(name_hash("zzz")));
    }
}
