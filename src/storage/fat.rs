//! FAT short-name mapping
//!
//! The card driver only handles 8.3 names, while the phone uploads long
//! names such as `book.txt.sy`. Each path component is mapped onto a short
//! name: names that already fit map to themselves (upper-cased), anything
//! longer or containing characters FAT cannot store is shortened to three
//! characters, `~` and a four-digit hash of the original name.

use core::fmt::Write;

use crate::storage::traits::StorageError;

pub type ShortName = heapless::String<12>;

const STEM_LEN: usize = 8;
const EXT_LEN: usize = 3;

/// Path components, ignoring empty segments
pub fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|c| !c.is_empty())
}

fn fat_char(c: char) -> Option<char> {
    if c.is_ascii_alphanumeric() || "!#$%&'()-@^_`{}~".contains(c) {
        Some(c.to_ascii_uppercase())
    } else {
        None
    }
}

fn fnv1a(text: &str) -> u32 {
    text.bytes().fold(0x811c_9dc5u32, |hash, b| {
        (hash ^ b.to_ascii_uppercase() as u32).wrapping_mul(0x0100_0193)
    })
}

/// Map one path component onto an 8.3 name.
///
/// A name is shortened when its stem or its extension does not fit. The
/// hash covers the whole upper-cased name, so `x.json` and `x.jsonl` stay
/// distinct even though both keep only `JSO` as extension.
pub fn short_name(name: &str) -> Result<ShortName, StorageError> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(StorageError::InvalidName);
    }

    let (stem, ext) = match name.rfind('.') {
        Some(dot) if dot > 0 => (&name[..dot], &name[dot + 1..]),
        _ => (name, ""),
    };

    let fits = |part: &str, max: usize| part.chars().count() <= max && part.chars().all(|c| fat_char(c).is_some());

    let mut out = ShortName::new();
    if fits(stem, STEM_LEN) && fits(ext, EXT_LEN) {
        for c in stem.chars().filter_map(fat_char) {
            let _ = out.push(c);
        }
    } else {
        for c in stem.chars().filter_map(fat_char).take(3) {
            let _ = out.push(c);
        }
        let _ = write!(out, "~{:04X}", fnv1a(name) & 0xFFFF);
    }

    let ext: heapless::String<EXT_LEN> = ext.chars().filter_map(fat_char).take(EXT_LEN).collect();
    if !ext.is_empty() {
        let _ = out.push('.');
        let _ = out.push_str(&ext);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn test_short_names_pass_through() {
        assert_eq!(short_name("book.txt").unwrap().as_str(), "BOOK.TXT");
        assert_eq!(short_name("IMG_0001.jpg").unwrap().as_str(), "IMG_0001.JPG");
        assert_eq!(short_name("update.bin").unwrap().as_str(), "UPDATE.BIN");
        assert_eq!(short_name("json").unwrap().as_str(), "JSON");
    }

    #[test]
    fn test_long_names_are_hashed() {
        let index = short_name("book.txt.sy").unwrap();
        let text = short_name("book.txt").unwrap();
        assert!(index.starts_with("BOO~"));
        assert!(index.ends_with(".SY"));
        assert_ne!(index, text);

        let json = short_name("1.json").unwrap();
        assert!(json.starts_with("1~"));
        assert!(json.ends_with(".JSO"));
        let extracted = short_name("1.json.txt").unwrap();
        assert!(extracted.starts_with("1JS~"));
        assert!(extracted.ends_with(".TXT"));
        assert_eq!(extracted.len(), 12);
    }

    #[test]
    fn test_mapping_is_stable() {
        for name in ["a_very_long_document_name.txt", "笔记.txt", "x.json.sy", "README"] {
            let once = short_name(name).unwrap();
            assert_eq!(short_name(name).unwrap(), once);
            assert_eq!(short_name(&once).unwrap(), once);
            assert!(once.len() <= 12);
        }
    }

    #[test]
    fn test_distinct_long_names_differ() {
        let a = short_name("chapter_one.txt").unwrap();
        let b = short_name("chapter_two.txt").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_long_extensions_stay_distinct() {
        let json = short_name("x.json").unwrap();
        let jsonl = short_name("x.jsonl").unwrap();
        assert_ne!(json, jsonl);
        assert!(json.ends_with(".JSO") && jsonl.ends_with(".JSO"));
        assert_eq!(short_name("X.JSON").unwrap(), json);
        assert_eq!(short_name(&jsonl).unwrap(), jsonl);
    }

    #[test]
    fn test_invalid_names() {
        assert_eq!(short_name(""), Err(StorageError::InvalidName));
        assert_eq!(short_name(".."), Err(StorageError::InvalidName));
    }

    #[test]
    fn test_components() {
        let parts: Vec<&str> = components("/json//a.json").collect();
        assert_eq!(parts, ["json", "a.json"]);
        assert_eq!(components("/").count(), 0);
    }
}
