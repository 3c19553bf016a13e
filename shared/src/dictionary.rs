/*
 * Copyright © 2024 ladroid
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::collections::HashMap;

// Dictionary for encoding and decoding strings
//
// The engine keeps two of these: one for entity names and one for pattern
// variable names, so that id equality and name equality coincide.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Dictionary {
    string_to_id: HashMap<String, u32>,
    id_to_string: HashMap<u32, String>,
    next_id: u32,
}

impl Dictionary {
    pub fn new() -> Self {
        Dictionary {
            string_to_id: HashMap::new(),
            id_to_string: HashMap::new(),
            next_id: 0,
        }
    }

    pub fn encode(&mut self, value: &str) -> u32 {
        if let Some(&id) = self.string_to_id.get(value) {
            id
        } else {
            let id = self.next_id;
            self.string_to_id.insert(value.to_string(), id);
            self.id_to_string.insert(id, value.to_string());
            self.next_id += 1;
            id
        }
    }

    /// Lookup without inserting.
    pub fn resolve(&self, value: &str) -> Option<u32> {
        self.string_to_id.get(value).copied()
    }

    pub fn decode(&self, id: u32) -> Option<&str> {
        self.id_to_string.get(&id).map(|s| s.as_str())
    }

    pub fn merge(&mut self, other: &Dictionary) {
        for (key, value) in other.string_to_id.iter() {
            self.string_to_id.entry(key.clone()).or_insert(*value);
        }
        for (key, value) in other.id_to_string.iter() {
            self.id_to_string.entry(*key).or_insert(value.clone());
        }
        self.next_id = self.next_id.max(other.next_id);
    }

    pub fn len(&self) -> usize {
        self.string_to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.string_to_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_is_stable() {
        let mut dict = Dictionary::new();
        let a = dict.encode("father");
        let b = dict.encode("mother");
        assert_ne!(a, b);
        assert_eq!(dict.encode("father"), a);
        assert_eq!(dict.decode(a), Some("father"));
        assert_eq!(dict.resolve("mother"), Some(b));
        assert_eq!(dict.resolve("uncle"), None);
    }

    #[test]
    fn test_merge_keeps_existing_ids() {
        let mut left = Dictionary::new();
        left.encode("a");
        let mut right = Dictionary::new();
        right.encode("b");
        left.merge(&right);
        assert_eq!(left.resolve("b"), Some(0));
        assert_eq!(left.resolve("a"), Some(0));
        assert!(left.next_id >= 1);
    }
}
