//! The assembler's label table: forward-declarable names with an {undeclared →
//! declared → defined} lifecycle.

use std::collections::HashMap;

use coil::constants::{MAX_LABELS, MAX_NAME_LEN};

struct Entry {
    id: u16,
    defined: bool,
}

#[derive(Default)]
pub struct LabelTable {
    entries: HashMap<String, Entry>,
    next_id: u16,
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub enum LabelError {
    Redefined(String),
    TableFull,
    Undefined(Vec<String>),
    NameTooLong(String),
}

impl std::fmt::Display for LabelError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            LabelError::Redefined(name) => write!(f, "label \"{}\" is already defined", name),
            LabelError::TableFull => write!(f, "label table is full"),
            LabelError::Undefined(names) => {
                write!(f, "undefined label(s) at end of input: {}", names.join(", "))
            }
            LabelError::NameTooLong(name) => {
                write!(f, "label name \"{}\" exceeds {} characters", name, MAX_NAME_LEN)
            }
        }
    }
}

impl std::error::Error for LabelError {}

impl LabelTable {
    pub fn new() -> LabelTable {
        LabelTable { entries: HashMap::new(), next_id: 1 }
    }

    /// Looks up `name`, forward-declaring it (as not-yet-defined) on first mention.
    /// Used by `JMP`/`JCOND`/`CALL`.
    pub fn resolve_or_declare(&mut self, name: &str) -> Result<u16, LabelError> {
        if let Some(entry) = self.entries.get(name) {
            return Ok(entry.id);
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(LabelError::NameTooLong(name.to_owned()));
        }
        if self.entries.len() >= MAX_LABELS {
            return Err(LabelError::TableFull);
        }
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(name.to_owned(), Entry { id, defined: false });
        Ok(id)
    }

    /// Transitions `name` to defined, via `LABEL`. Creates the entry if this is the
    /// first mention; fatal if it was already defined.
    pub fn define(&mut self, name: &str) -> Result<u16, LabelError> {
        if let Some(entry) = self.entries.get_mut(name) {
            if entry.defined {
                return Err(LabelError::Redefined(name.to_owned()));
            }
            entry.defined = true;
            return Ok(entry.id);
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(LabelError::NameTooLong(name.to_owned()));
        }
        if self.entries.len() >= MAX_LABELS {
            return Err(LabelError::TableFull);
        }
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(name.to_owned(), Entry { id, defined: true });
        Ok(id)
    }

    /// Fatal if any label was referenced but never defined.
    pub fn finish(self) -> Result<(), LabelError> {
        let mut undefined: Vec<String> = self
            .entries
            .into_iter()
            .filter(|(_, entry)| !entry.defined)
            .map(|(name, _)| name)
            .collect();
        if undefined.is_empty() {
            Ok(())
        } else {
            undefined.sort();
            Err(LabelError::Undefined(undefined))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn forward_reference_then_definition_share_an_id() {
        let mut table = LabelTable::new();
        let referenced = table.resolve_or_declare("loop").unwrap();
        let defined = table.define("loop").unwrap();
        assert_eq!(referenced, defined);
    }

    #[test]
    fn defining_twice_is_an_error() {
        let mut table = LabelTable::new();
        table.define("done").unwrap();
        assert_eq!(table.define("done"), Err(LabelError::Redefined("done".to_owned())));
    }

    #[test]
    fn overlong_name_is_an_error() {
        let mut table = LabelTable::new();
        let name = "a".repeat(MAX_NAME_LEN + 1);
        assert_eq!(table.resolve_or_declare(&name), Err(LabelError::NameTooLong(name)));
    }

    #[test]
    fn undefined_label_at_end_of_input_is_an_error() {
        let mut table = LabelTable::new();
        table.resolve_or_declare("nowhere").unwrap();
        assert_eq!(table.finish(), Err(LabelError::Undefined(vec!["nowhere".to_owned()])));
    }

    #[test]
    fn fully_defined_table_finishes_cleanly() {
        let mut table = LabelTable::new();
        table.resolve_or_declare("loop").unwrap();
        table.define("loop").unwrap();
        assert_eq!(table.finish(), Ok(()));
    }
}
