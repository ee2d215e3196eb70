use alloc::vec::Vec;

/// Split `payload` into approximately equal-sized chunks. Boundaries may fall
/// inside multi-byte sequences.
///
/// # Panics
///
/// Panics if `parts` is zero.
#[must_use]
pub fn produce_chunks(payload: &[u8], parts: usize) -> Vec<&[u8]> {
    assert!(parts > 0);
    let chunk_size = payload.len().div_ceil(parts).max(1);
    payload.chunks(chunk_size).collect()
}

/// Split `payload` at the given offsets. Offsets are taken modulo
/// `payload.len() + 1` and sorted, so any list of numbers is a valid
/// partition; empty chunks are kept.
#[must_use]
pub fn split_at_offsets<'a>(payload: &'a [u8], offsets: &[usize]) -> Vec<&'a [u8]> {
    let mut cuts: Vec<usize> = offsets.iter().map(|o| o % (payload.len() + 1)).collect();
    cuts.sort_unstable();
    let mut chunks = Vec::with_capacity(cuts.len() + 1);
    let mut start = 0;
    for cut in cuts {
        chunks.push(&payload[start..cut]);
        start = cut;
    }
    chunks.push(&payload[start..]);
    chunks
}

#[cfg(test)]
mod tests {
    use quickcheck_macros::quickcheck;

    use super::*;

    #[test]
    fn chunks_cover_payload() {
        let payload = "a€b".as_bytes();
        let chunks = produce_chunks(payload, 3);
        assert_eq!(chunks, [&b"a\xE2"[..], &b"\x82\xAC"[..], &b"b"[..]]);
        assert_eq!(chunks.concat(), payload);
    }

    #[test]
    fn empty_payload_has_no_chunks() {
        assert!(produce_chunks(b"", 4).is_empty());
    }

    #[test]
    fn offsets_wrap_and_sort() {
        let chunks = split_at_offsets(b"abcd", &[3, 6, 1]);
        // 6 % 5 == 1
        assert_eq!(chunks, [&b"a"[..], &b""[..], &b"bc"[..], &b"d"[..]]);
    }

    #[quickcheck]
    fn offsets_partition_payload(payload: Vec<u8>, offsets: Vec<usize>) -> bool {
        let chunks = split_at_offsets(&payload, &offsets);
        chunks.len() == offsets.len() + 1 && chunks.concat() == payload
    }
}
