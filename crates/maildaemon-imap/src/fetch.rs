//! Re-pairing of FETCH responses.
//!
//! A server may answer one UID FETCH with several untagged FETCH responses
//! for the same message (for instance FLAGS first and the body later, or an
//! unsolicited flag update in between). Responses are grouped by sequence
//! number and merged into one record per message.

use crate::parser::FetchItem;
use crate::types::{Flags, Uid};

/// Everything fetched for one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedMessage {
    /// Message sequence number at the time of the fetch.
    pub seq: u32,
    /// UID.
    pub uid: Option<Uid>,
    /// Flags, if requested.
    pub flags: Option<Flags>,
    /// INTERNALDATE, as sent by the server.
    pub internal_date: Option<String>,
    /// RFC822.SIZE.
    pub size: Option<u32>,
    /// `BODY[HEADER]`
    pub header: Option<Vec<u8>>,
    /// `BODY[]`
    pub body: Option<Vec<u8>>,
}

impl FetchedMessage {
    fn merge(&mut self, items: Vec<FetchItem>) {
        for item in items {
            match item {
                FetchItem::Uid(uid) => self.uid = Some(uid),
                FetchItem::Flags(flags) => self.flags = Some(flags),
                FetchItem::InternalDate(date) => self.internal_date = Some(date),
                FetchItem::Rfc822Size(size) => self.size = Some(size),
                FetchItem::Body {
                    section, data, ..
                } => match section.as_deref() {
                    None | Some("") => self.body = data,
                    Some(s) if s.eq_ignore_ascii_case("HEADER") => self.header = data,
                    Some(other) => {
                        tracing::debug!(section = other, "Ignoring unrequested body section");
                    }
                },
            }
        }
    }
}

/// Merges raw `(seq, items)` FETCH data into one record per message.
///
/// Records keep the order in which their first segment arrived. Records
/// that never received a UID cannot be addressed safely and are dropped.
#[must_use]
pub fn merge_fetch_responses(
    responses: impl IntoIterator<Item = (u32, Vec<FetchItem>)>,
) -> Vec<FetchedMessage> {
    let mut records: Vec<FetchedMessage> = Vec::new();

    for (seq, items) in responses {
        if let Some(existing) = records.iter_mut().find(|r| r.seq == seq) {
            existing.merge(items);
        } else {
            let mut record = FetchedMessage {
                seq,
                ..FetchedMessage::default()
            };
            record.merge(items);
            records.push(record);
        }
    }

    records.retain(|record| {
        if record.uid.is_none() {
            tracing::warn!(seq = record.seq, "Dropping FETCH data without a UID");
        }
        record.uid.is_some()
    });
    records
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::types::Flag;

    fn uid(n: u32) -> Uid {
        Uid::new(n).unwrap()
    }

    #[test]
    fn test_split_segments_are_merged() {
        let merged = merge_fetch_responses(vec![
            (3, vec![FetchItem::Uid(uid(30)), FetchItem::Rfc822Size(120)]),
            (
                3,
                vec![FetchItem::Body {
                    section: Some("HEADER".to_string()),
                    origin: None,
                    data: Some(b"Subject: hi\r\n\r\n".to_vec()),
                }],
            ),
            (3, vec![FetchItem::Flags([Flag::Seen].into_iter().collect())]),
        ]);

        assert_eq!(merged.len(), 1);
        let record = &merged[0];
        assert_eq!(record.uid, Some(uid(30)));
        assert_eq!(record.size, Some(120));
        assert_eq!(record.header.as_deref(), Some(&b"Subject: hi\r\n\r\n"[..]));
        assert!(record.flags.as_ref().unwrap().is_seen());
    }

    #[test]
    fn test_arrival_order_is_kept() {
        let merged = merge_fetch_responses(vec![
            (5, vec![FetchItem::Uid(uid(50))]),
            (2, vec![FetchItem::Uid(uid(20))]),
            (5, vec![FetchItem::Rfc822Size(1)]),
        ]);
        let uids: Vec<u32> = merged.iter().map(|r| r.uid.unwrap().get()).collect();
        assert_eq!(uids, vec![50, 20]);
    }

    #[test]
    fn test_records_without_uid_are_dropped() {
        let merged = merge_fetch_responses(vec![
            (1, vec![FetchItem::Flags(Flags::new())]),
            (2, vec![FetchItem::Uid(uid(9))]),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].seq, 2);
    }

    #[test]
    fn test_full_body_goes_to_body() {
        let merged = merge_fetch_responses(vec![(
            1,
            vec![
                FetchItem::Uid(uid(1)),
                FetchItem::Body {
                    section: None,
                    origin: None,
                    data: Some(b"raw".to_vec()),
                },
            ],
        )]);
        assert_eq!(merged[0].body.as_deref(), Some(&b"raw"[..]));
        assert!(merged[0].header.is_none());
    }

    proptest! {
        #[test]
        fn prop_one_record_per_sequence_number(
            segments in prop::collection::vec((1u32..20, 1u32..1000), 0..60)
        ) {
            let responses: Vec<(u32, Vec<FetchItem>)> = segments
                .iter()
                .map(|&(seq, n)| (seq, vec![FetchItem::Uid(uid(seq)), FetchItem::Rfc822Size(n)]))
                .collect();
            let merged = merge_fetch_responses(responses);

            let mut distinct: Vec<u32> = segments.iter().map(|&(seq, _)| seq).collect();
            distinct.sort_unstable();
            distinct.dedup();
            prop_assert_eq!(merged.len(), distinct.len());

            for record in &merged {
                let last = segments.iter().rev().find(|&&(seq, _)| seq == record.seq).unwrap();
                prop_assert_eq!(record.size, Some(last.1));
            }
        }
    }
}
