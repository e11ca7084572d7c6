//! Pass 1: label collection.
//!
//! A file-seeking VM would remember the byte offset immediately after each
//! `LABEL` record and restore its original position afterwards. This VM works
//! over an in-memory record array instead, so "the file position right after the
//! label record" becomes "the index of the record right after it" and there is
//! nothing to restore.

use std::collections::HashMap;

use crate::error::LoadError;
use crate::record::{Opcode, Record};

/// Maps a label id to the instruction index execution resumes at when a jump,
/// conditional branch or call targets it.
pub type LabelTable = HashMap<u16, usize>;

/// Scans `records` once, registering every `LABEL` definition's position.
///
/// Duplicate label ids are a fatal load-time error.
pub fn collect_labels(records: &[Record]) -> Result<LabelTable, LoadError> {
    let mut labels = LabelTable::new();
    for (index, record) in records.iter().enumerate() {
        if Opcode::from_u16(record.opcode) == Some(Opcode::Label) {
            let label_id = record.var;
            if labels.insert(label_id, index + 1).is_some() {
                return Err(LoadError::DuplicateLabel(label_id));
            }
        }
    }
    Ok(labels)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::record::Record;

    #[test]
    fn records_position_after_the_label_record() {
        let records = vec![
            Record::new(Opcode::Jmp.value(), 0, 0, 1),
            Record::new(Opcode::Label.value(), 0, 1, 0),
            Record::new(Opcode::Exit.value(), 0, 0, 0),
        ];
        let labels = collect_labels(&records).unwrap();
        assert_eq!(labels.get(&1), Some(&2));
    }

    #[test]
    fn duplicate_label_id_is_an_error() {
        let records = vec![
            Record::new(Opcode::Label.value(), 0, 1, 0),
            Record::new(Opcode::Label.value(), 0, 1, 0),
        ];
        match collect_labels(&records) {
            Err(LoadError::DuplicateLabel(1)) => {}
            other => panic!("expected duplicate label error, got {:?}", other),
        }
    }

    #[test]
    fn finding_a_label_is_idempotent() {
        let records = vec![
            Record::new(Opcode::Label.value(), 0, 5, 0),
            Record::new(Opcode::Exit.value(), 0, 0, 0),
        ];
        let labels = collect_labels(&records).unwrap();
        for _ in 0..3 {
            assert_eq!(labels.get(&5), Some(&1));
        }
    }
}
