use crate::header::EdfHeader;

/// Decode one little-endian sample of `width` bytes (2 or 3), sign-extended.
#[inline]
pub fn decode_sample(bytes: &[u8]) -> i32 {
    match bytes {
        [lo, hi] => i32::from(i16::from_le_bytes([*lo, *hi])),
        [b0, b1, b2] => {
            let sign = if b2 & 0x80 != 0 { 0xFF } else { 0x00 };
            i32::from_le_bytes([*b0, *b1, *b2, sign])
        }
        _ => 0,
    }
}

/// Encode a sample as `width` little-endian bytes.
#[inline]
pub fn encode_sample(value: i32, width: usize, out: &mut Vec<u8>) {
    out.extend_from_slice(&value.to_le_bytes()[..width]);
}

/// Raw bytes of signal `index` in data record `record`.
pub fn signal_bytes<'a>(raw: &'a [u8], header: &EdfHeader, record: u64, index: usize) -> &'a [u8] {
    let width = header.variant.sample_bytes();
    let start = header.header_bytes
        + record as usize * header.record_bytes()
        + header.signal_offset(index);
    let len = header.signals[index].samples_per_record * width;
    &raw[start..start + len]
}

/// All digital samples of signal `index`, in time order.
///
/// `header` must come from [`EdfHeader::parse`] on the same bytes, which
/// guarantees every record is present.
pub fn read_digital(raw: &[u8], header: &EdfHeader, index: usize) -> Vec<i32> {
    let width = header.variant.sample_bytes();
    let spr = header.signals[index].samples_per_record;
    let capacity = usize::try_from(header.num_records)
        .ok()
        .and_then(|records| spr.checked_mul(records))
        .unwrap_or_default();
    let mut out = Vec::with_capacity(capacity);
    for record in 0..header.num_records {
        out.extend(
            signal_bytes(raw, header, record, index)
                .chunks_exact(width)
                .map(decode_sample),
        );
    }
    out
}

/// All samples of signal `index` converted to physical units.
pub fn read_physical(raw: &[u8], header: &EdfHeader, index: usize) -> Vec<f64> {
    let signal = &header.signals[index];
    read_digital(raw, header, index)
        .into_iter()
        .map(|d| signal.to_physical(d))
        .collect()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::variant::EdfVariant;
    use crate::writer::{EdfWriter, SignalSpec};

    #[test]
    fn decodes_16_and_24_bit() {
        assert_eq!(decode_sample(&[0xFF, 0x7F]), 32767);
        assert_eq!(decode_sample(&[0x00, 0x80]), -32768);
        assert_eq!(decode_sample(&[0xFF, 0xFF, 0x7F]), 8_388_607);
        assert_eq!(decode_sample(&[0x00, 0x00, 0x80]), -8_388_608);
        assert_eq!(decode_sample(&[0xFE, 0xFF, 0xFF]), -2);
    }

    #[test]
    fn reads_interleaved_records() {
        let mut writer = EdfWriter::new(EdfVariant::Bdf);
        writer.add_signal(SignalSpec::new("A", 2).digital_range(-8_388_608, 8_388_607));
        writer.add_signal(SignalSpec::new("B", 1).digital_range(-8_388_608, 8_388_607));
        writer.push_record(&[vec![1, -1], vec![100_000]]).unwrap();
        writer.push_record(&[vec![2, -2], vec![-100_000]]).unwrap();
        let raw = writer.finish().unwrap();
        let header = EdfHeader::parse(&raw).unwrap();

        assert_eq!(read_digital(&raw, &header, 0), vec![1, -1, 2, -2]);
        assert_eq!(read_digital(&raw, &header, 1), vec![100_000, -100_000]);
    }

    #[test]
    fn physical_values_follow_ranges() {
        let mut writer = EdfWriter::new(EdfVariant::Edf);
        writer.add_signal(
            SignalSpec::new("T", 2)
                .physical_range(0.0, 100.0)
                .digital_range(0, 100),
        );
        writer.push_record(&[vec![0, 50]]).unwrap();
        let raw = writer.finish().unwrap();
        let header = EdfHeader::parse(&raw).unwrap();
        assert_eq!(read_physical(&raw, &header, 0), vec![0.0, 50.0]);
    }

    proptest! {
        #[test]
        fn sample_codec_roundtrips(value in -8_388_608i32..=8_388_607) {
            let mut buf = Vec::new();
            encode_sample(value, 3, &mut buf);
            prop_assert_eq!(decode_sample(&buf), value);
        }
    }
}
