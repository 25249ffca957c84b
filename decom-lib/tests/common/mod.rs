use std::path::PathBuf;

use chrono::{TimeDelta, TimeZone, Utc};
use decom::Frame;

#[allow(dead_code)]
pub fn fixture_path(name: &str) -> PathBuf {
    let mut path =
        PathBuf::from(std::env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR not set"));
    path.push("tests/fixtures");
    path.push(name);
    path
}

/// Frames with the given sequence numbers, each starting with `sync` followed by the
/// sequence as a big-endian u16 and padded with zeros to `size` bytes.
#[allow(dead_code)]
pub fn frames(seqs: &[u32], sync: &[u8], size: usize) -> Vec<Frame> {
    let start = Utc.with_ymd_and_hms(2010, 1, 1, 0, 0, 0).unwrap();
    seqs.iter()
        .map(|&seq| {
            let mut data = sync.to_vec();
            data.extend_from_slice(&(seq as u16).to_be_bytes());
            data.resize(size.max(data.len()), 0);
            let c_time = start + TimeDelta::seconds(i64::from(seq));
            Frame::new(seq, c_time, start, data)
        })
        .collect()
}
