//! Command serialization helpers.

use crate::types::{Flag, Mailbox};

use super::types::{FetchAttribute, FetchItems, SearchCriteria, StoreAction};

/// Writes an astring, quoting it when it is not a plain atom.
pub fn write_astring(buf: &mut Vec<u8>, s: &str) {
    if s.is_empty() || s.bytes().any(needs_quoting) {
        buf.push(b'"');
        for b in s.bytes() {
            if b == b'"' || b == b'\\' {
                buf.push(b'\\');
            }
            buf.push(b);
        }
        buf.push(b'"');
    } else {
        buf.extend_from_slice(s.as_bytes());
    }
}

/// Writes a mailbox name in modified UTF-7.
pub fn write_mailbox(buf: &mut Vec<u8>, mailbox: &Mailbox) {
    write_astring(buf, &mailbox.to_wire());
}

const fn needs_quoting(b: u8) -> bool {
    matches!(
        b,
        b' ' | b'"' | b'\\' | b'(' | b')' | b'{' | b'%' | b'*' | b'[' | b']'
    ) || b < 0x20
        || b >= 0x7F
}

/// Writes a parenthesized flag list.
pub fn write_flag_list(buf: &mut Vec<u8>, flags: &[Flag]) {
    buf.push(b'(');
    for (i, flag) in flags.iter().enumerate() {
        if i > 0 {
            buf.push(b' ');
        }
        buf.extend_from_slice(flag.as_str().as_bytes());
    }
    buf.push(b')');
}

/// Writes FETCH items. A single item is written bare.
pub fn write_fetch_items(buf: &mut Vec<u8>, items: &FetchItems) {
    if let [single] = items.0.as_slice() {
        write_fetch_attribute(buf, single);
        return;
    }
    buf.push(b'(');
    for (i, attr) in items.0.iter().enumerate() {
        if i > 0 {
            buf.push(b' ');
        }
        write_fetch_attribute(buf, attr);
    }
    buf.push(b')');
}

fn write_fetch_attribute(buf: &mut Vec<u8>, attr: &FetchAttribute) {
    match attr {
        FetchAttribute::Uid => buf.extend_from_slice(b"UID"),
        FetchAttribute::Flags => buf.extend_from_slice(b"FLAGS"),
        FetchAttribute::InternalDate => buf.extend_from_slice(b"INTERNALDATE"),
        FetchAttribute::Rfc822Size => buf.extend_from_slice(b"RFC822.SIZE"),
        FetchAttribute::BodyPeek { section } => {
            buf.extend_from_slice(b"BODY.PEEK[");
            if let Some(s) = section {
                buf.extend_from_slice(s.as_bytes());
            }
            buf.push(b']');
        }
    }
}

/// Writes a STORE data item and its flag list.
pub fn write_store_action(buf: &mut Vec<u8>, action: &StoreAction, silent: bool) {
    buf.extend_from_slice(action.keyword().as_bytes());
    if silent {
        buf.extend_from_slice(b".SILENT");
    }
    buf.push(b' ');
    write_flag_list(buf, action.flags());
}

/// Writes SEARCH criteria.
pub fn write_search_criteria(buf: &mut Vec<u8>, criteria: &SearchCriteria) {
    match criteria {
        SearchCriteria::All => buf.extend_from_slice(b"ALL"),
        SearchCriteria::Seen => buf.extend_from_slice(b"SEEN"),
        SearchCriteria::Unseen => buf.extend_from_slice(b"UNSEEN"),
        SearchCriteria::Deleted => buf.extend_from_slice(b"DELETED"),
        SearchCriteria::Undeleted => buf.extend_from_slice(b"UNDELETED"),
        SearchCriteria::Uid(set) => {
            buf.extend_from_slice(b"UID ");
            buf.extend_from_slice(set.to_string().as_bytes());
        }
        SearchCriteria::And(criteria) => {
            for (i, c) in criteria.iter().enumerate() {
                if i > 0 {
                    buf.push(b' ');
                }
                write_search_criteria(buf, c);
            }
        }
    }
}
