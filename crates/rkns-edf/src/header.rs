use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tracing::debug;

use crate::error::{EdfError, EdfResult};
use crate::variant::{EdfVariant, RESERVED_LEN, RESERVED_OFFSET};

/// Size of the fixed main header and of each per-signal header block.
pub const HEADER_BLOCK: usize = 256;

// Main header field widths, in file order.
const VERSION: usize = 8;
const PATIENT: usize = 80;
const RECORDING: usize = 80;
const START_DATE: usize = 8;
const START_TIME: usize = 8;
const HEADER_BYTES: usize = 8;
const NUM_RECORDS: usize = 8;
const RECORD_DURATION: usize = 8;
const NUM_SIGNALS: usize = 4;

// Per-signal field widths. Each field is stored for all signals before the
// next field starts.
const LABEL: usize = 16;
const TRANSDUCER: usize = 80;
const DIMENSION: usize = 8;
const PHYSICAL_MIN: usize = 8;
const PHYSICAL_MAX: usize = 8;
const DIGITAL_MIN: usize = 8;
const DIGITAL_MAX: usize = 8;
const PREFILTER: usize = 80;
const SAMPLES_PER_RECORD: usize = 8;
const SIGNAL_RESERVED: usize = 32;

const NUM_SIGNALS_OFFSET: usize = HEADER_BLOCK - NUM_SIGNALS;

/// Header of one signal.
#[derive(Clone, Debug, PartialEq)]
pub struct SignalHeader {
    pub label: String,
    pub transducer: String,
    pub physical_dimension: String,
    pub physical_min: f64,
    pub physical_max: f64,
    pub digital_min: i32,
    pub digital_max: i32,
    pub prefilter: String,
    pub samples_per_record: usize,
    pub reserved: String,
}

impl SignalHeader {
    /// Samples per second given the record duration.
    pub fn sample_rate(&self, record_duration: f64) -> f64 {
        self.samples_per_record as f64 / record_duration
    }

    /// Linear digital to physical conversion.
    pub fn to_physical(&self, digital: i32) -> f64 {
        physical_value(
            digital,
            self.physical_min,
            self.physical_max,
            self.digital_min,
            self.digital_max,
        )
    }

    pub fn is_annotation(&self, variant: EdfVariant) -> bool {
        variant.is_plus() && self.label == variant.annotation_label()
    }
}

/// `(d - dmin) * (pmax - pmin) / (dmax - dmin) + pmin`
pub fn physical_value(digital: i32, pmin: f64, pmax: f64, dmin: i32, dmax: i32) -> f64 {
    let dmin = f64::from(dmin);
    let dmax = f64::from(dmax);
    (f64::from(digital) - dmin) * (pmax - pmin) / (dmax - dmin) + pmin
}

/// Parsed main header plus all signal headers.
#[derive(Clone, Debug, PartialEq)]
pub struct EdfHeader {
    pub variant: EdfVariant,
    pub patient: String,
    pub recording: String,
    pub start_date: String,
    pub start_time: String,
    pub header_bytes: usize,
    pub reserved: String,
    /// Data records present. A declared `-1` is replaced by the count
    /// inferred from the data length.
    pub num_records: u64,
    pub record_duration: f64,
    pub signals: Vec<SignalHeader>,
}

/// Sequential fixed-width field reader over the header bytes.
struct Fields<'a> {
    raw: &'a [u8],
    offset: usize,
}

impl<'a> Fields<'a> {
    fn new(raw: &'a [u8], offset: usize) -> Self {
        Self { raw, offset }
    }

    fn take(&mut self, width: usize) -> EdfResult<&'a [u8]> {
        let end = self.offset + width;
        let field = self.raw.get(self.offset..end).ok_or(EdfError::Truncated {
            needed: end,
            actual: self.raw.len(),
        })?;
        self.offset = end;
        Ok(field)
    }

    fn text(&mut self, width: usize) -> EdfResult<String> {
        Ok(field_text(self.take(width)?))
    }

    fn texts(&mut self, width: usize, count: usize) -> EdfResult<Vec<String>> {
        (0..count).map(|_| self.text(width)).collect()
    }
}

fn field_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

fn parse_field<T: std::str::FromStr>(field: &'static str, value: &str) -> EdfResult<T> {
    value.parse().map_err(|_| EdfError::InvalidField {
        field,
        value: value.to_string(),
    })
}

impl EdfHeader {
    /// Strictly parse the header of a complete file.
    ///
    /// Checks field syntax, the declared header size, digital and physical
    /// ranges, and that the data section holds every declared record.
    pub fn parse(raw: &[u8]) -> EdfResult<Self> {
        let mut fields = Fields::new(raw, 0);
        let magic = fields.take(VERSION)?;
        let reserved_bytes = raw
            .get(RESERVED_OFFSET..RESERVED_OFFSET + RESERVED_LEN)
            .ok_or(EdfError::Truncated {
                needed: HEADER_BLOCK,
                actual: raw.len(),
            })?;
        let variant = EdfVariant::classify(magic, reserved_bytes)
            .ok_or_else(|| EdfError::InvalidMagic(String::from_utf8_lossy(magic).into_owned()))?;

        let patient = fields.text(PATIENT)?;
        let recording = fields.text(RECORDING)?;
        let start_date = fields.text(START_DATE)?;
        let start_time = fields.text(START_TIME)?;
        let header_bytes: usize = parse_field("header_bytes", &fields.text(HEADER_BYTES)?)?;
        let reserved = fields.text(RESERVED_LEN)?;
        let declared_records: i64 = parse_field("num_records", &fields.text(NUM_RECORDS)?)?;
        let record_duration: f64 =
            parse_field("record_duration", &fields.text(RECORD_DURATION)?)?;
        let ns: usize = parse_field("num_signals", &fields.text(NUM_SIGNALS)?)?;

        let expected = ns
            .checked_add(1)
            .and_then(|blocks| blocks.checked_mul(HEADER_BLOCK))
            .ok_or_else(|| EdfError::InvalidField {
                field: "num_signals",
                value: ns.to_string(),
            })?;
        if header_bytes != expected {
            return Err(EdfError::HeaderSize {
                declared: header_bytes,
                signals: ns,
                expected,
            });
        }
        if raw.len() < header_bytes {
            return Err(EdfError::Truncated {
                needed: header_bytes,
                actual: raw.len(),
            });
        }

        let signals = parse_signal_headers(&mut fields, ns, variant)?;

        let has_data_signals = signals.iter().any(|s| !s.is_annotation(variant));
        if !record_duration.is_finite()
            || record_duration < 0.0
            || (has_data_signals && record_duration == 0.0)
        {
            return Err(EdfError::InvalidField {
                field: "record_duration",
                value: record_duration.to_string(),
            });
        }

        let record_bytes = signals
            .iter()
            .try_fold(0usize, |total, s| {
                s.samples_per_record
                    .checked_mul(variant.sample_bytes())
                    .and_then(|bytes| total.checked_add(bytes))
            })
            .ok_or_else(|| EdfError::InvalidField {
                field: "samples_per_record",
                value: "data record size overflows".into(),
            })?;
        let data_len = raw.len() - header_bytes;
        let num_records = match declared_records {
            -1 if record_bytes > 0 => (data_len / record_bytes) as u64,
            -1 => 0,
            n if n >= 0 => n as u64,
            n => {
                return Err(EdfError::InvalidField {
                    field: "num_records",
                    value: n.to_string(),
                })
            }
        };
        // Every later `samples_per_record * num_records` product is bounded
        // by `needed`, which never exceeds the input length past this check.
        let needed = usize::try_from(num_records)
            .ok()
            .and_then(|n| n.checked_mul(record_bytes))
            .and_then(|bytes| bytes.checked_add(header_bytes))
            .ok_or(EdfError::Truncated {
                needed: usize::MAX,
                actual: raw.len(),
            })?;
        if raw.len() < needed {
            return Err(EdfError::Truncated {
                needed,
                actual: raw.len(),
            });
        }
        if raw.len() > needed {
            debug!(trailing = raw.len() - needed, "ignoring bytes after last data record");
        }

        Ok(Self {
            variant,
            patient,
            recording,
            start_date,
            start_time,
            header_bytes,
            reserved,
            num_records,
            record_duration,
            signals,
        })
    }

    /// Channel labels of the data signals, read leniently.
    ///
    /// Never fails: reads as many labels as the bytes allow and ignores any
    /// field it cannot interpret. Annotation signals are skipped.
    pub fn read_labels(raw: &[u8]) -> Vec<String> {
        let Some(ns) = raw
            .get(NUM_SIGNALS_OFFSET..HEADER_BLOCK)
            .and_then(|f| field_text(f).parse::<usize>().ok())
        else {
            return Vec::new();
        };
        let plus_label = crate::variant::sniff_variant(raw)
            .filter(EdfVariant::is_plus)
            .map(|v| v.annotation_label());

        (0..ns)
            .map_while(|i| {
                let start = HEADER_BLOCK + i * LABEL;
                raw.get(start..start + LABEL).map(field_text)
            })
            .filter(|label| Some(label.as_str()) != plus_label)
            .collect()
    }

    /// Bytes in one data record.
    pub fn record_bytes(&self) -> usize {
        self.signals
            .iter()
            .map(|s| s.samples_per_record * self.variant.sample_bytes())
            .sum()
    }

    /// Byte offset of signal `index` within a data record.
    pub fn signal_offset(&self, index: usize) -> usize {
        self.signals[..index]
            .iter()
            .map(|s| s.samples_per_record * self.variant.sample_bytes())
            .sum()
    }

    /// Indices of signals carrying samples (not annotations).
    pub fn data_signal_indices(&self) -> Vec<usize> {
        (0..self.signals.len())
            .filter(|&i| !self.signals[i].is_annotation(self.variant))
            .collect()
    }

    /// Indices of annotation signals.
    pub fn annotation_signal_indices(&self) -> Vec<usize> {
        (0..self.signals.len())
            .filter(|&i| self.signals[i].is_annotation(self.variant))
            .collect()
    }

    /// Recording length in seconds.
    pub fn duration(&self) -> f64 {
        self.num_records as f64 * self.record_duration
    }

    /// Start of the recording from `dd.mm.yy` and `hh.mm.ss`.
    ///
    /// Two-digit years 85..=99 are 1985..=1999, the rest are 20xx.
    pub fn start_datetime(&self) -> Option<NaiveDateTime> {
        let date: Vec<u32> = self
            .start_date
            .split('.')
            .map(|p| p.parse().ok())
            .collect::<Option<_>>()?;
        let time: Vec<u32> = self
            .start_time
            .split('.')
            .map(|p| p.parse().ok())
            .collect::<Option<_>>()?;
        let (&[day, month, yy], &[hour, minute, second]) = (date.as_slice(), time.as_slice())
        else {
            return None;
        };
        let year = if yy >= 85 { 1900 + yy } else { 2000 + yy };
        let date = NaiveDate::from_ymd_opt(year as i32, month, day)?;
        let time = NaiveTime::from_hms_opt(hour, minute, second)?;
        Some(NaiveDateTime::new(date, time))
    }
}

fn parse_signal_headers(
    fields: &mut Fields<'_>,
    ns: usize,
    variant: EdfVariant,
) -> EdfResult<Vec<SignalHeader>> {
    let labels = fields.texts(LABEL, ns)?;
    let transducers = fields.texts(TRANSDUCER, ns)?;
    let dimensions = fields.texts(DIMENSION, ns)?;
    let pmins = fields.texts(PHYSICAL_MIN, ns)?;
    let pmaxs = fields.texts(PHYSICAL_MAX, ns)?;
    let dmins = fields.texts(DIGITAL_MIN, ns)?;
    let dmaxs = fields.texts(DIGITAL_MAX, ns)?;
    let prefilters = fields.texts(PREFILTER, ns)?;
    let sprs = fields.texts(SAMPLES_PER_RECORD, ns)?;
    let reserved = fields.texts(SIGNAL_RESERVED, ns)?;
    let (limit_min, limit_max) = variant.digital_limits();

    let mut signals = Vec::with_capacity(ns);
    for i in 0..ns {
        let label = labels[i].clone();
        let invalid = |reason: String| EdfError::InvalidSignal {
            index: i,
            label: label.clone(),
            reason,
        };
        let number = |name: &str, value: &str| -> EdfResult<f64> {
            value
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| invalid(format!("{name} {value:?} is not a number")))
        };
        let integer = |name: &str, value: &str| -> EdfResult<i64> {
            value
                .parse::<i64>()
                .map_err(|_| invalid(format!("{name} {value:?} is not an integer")))
        };

        let physical_min = number("physical minimum", &pmins[i])?;
        let physical_max = number("physical maximum", &pmaxs[i])?;
        let digital_min = integer("digital minimum", &dmins[i])?;
        let digital_max = integer("digital maximum", &dmaxs[i])?;
        let samples_per_record = integer("samples per record", &sprs[i])?;

        if digital_min >= digital_max {
            return Err(invalid(format!(
                "digital minimum {digital_min} is not below maximum {digital_max}"
            )));
        }
        if digital_min < i64::from(limit_min) || digital_max > i64::from(limit_max) {
            return Err(invalid(format!(
                "digital range {digital_min}..{digital_max} exceeds {variant} sample width"
            )));
        }
        if physical_min == physical_max {
            return Err(invalid(format!("physical range is empty at {physical_min}")));
        }
        if samples_per_record < 1 {
            return Err(invalid(format!(
                "samples per record must be positive, got {samples_per_record}"
            )));
        }

        signals.push(SignalHeader {
            label,
            transducer: transducers[i].clone(),
            physical_dimension: dimensions[i].clone(),
            physical_min,
            physical_max,
            digital_min: digital_min as i32,
            digital_max: digital_max as i32,
            prefilter: prefilters[i].clone(),
            samples_per_record: samples_per_record as usize,
            reserved: reserved[i].clone(),
        });
    }
    Ok(signals)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::writer::{EdfWriter, SignalSpec};

    fn two_channel_edf(records: usize) -> Vec<u8> {
        let mut writer = EdfWriter::new(EdfVariant::Edf);
        writer.add_signal(SignalSpec::new("EEG Fp1", 4));
        writer.add_signal(SignalSpec::new("EEG Fp2", 4));
        for r in 0..records {
            let base = r as i32 * 10;
            writer
                .push_record(&[vec![base, base + 1, base + 2, base + 3], vec![-1, -2, -3, -4]])
                .unwrap();
        }
        writer.finish().unwrap()
    }

    #[test]
    fn parses_written_header() {
        let raw = two_channel_edf(3);
        let header = EdfHeader::parse(&raw).unwrap();
        assert_eq!(header.variant, EdfVariant::Edf);
        assert_eq!(header.header_bytes, 768);
        assert_eq!(header.num_records, 3);
        assert_eq!(header.signals.len(), 2);
        assert_eq!(header.signals[1].label, "EEG Fp2");
        assert_eq!(header.record_bytes(), 16);
        assert_eq!(header.signal_offset(1), 8);
        assert_eq!(header.duration(), 3.0);
    }

    #[test]
    fn infers_record_count_when_unknown() {
        let mut raw = two_channel_edf(2);
        raw[236..244].copy_from_slice(b"-1      ");
        assert_eq!(EdfHeader::parse(&raw).unwrap().num_records, 2);
    }

    #[test]
    fn truncated_data_is_rejected() {
        let raw = two_channel_edf(2);
        let err = EdfHeader::parse(&raw[..raw.len() - 1]).unwrap_err();
        assert!(matches!(err, EdfError::Truncated { .. }));
    }

    #[test]
    fn header_size_must_match_signal_count() {
        let mut raw = two_channel_edf(1);
        raw[184..192].copy_from_slice(b"512     ");
        assert!(matches!(
            EdfHeader::parse(&raw).unwrap_err(),
            EdfError::HeaderSize { declared: 512, expected: 768, .. }
        ));
    }

    /// A header with `signals` identical signals and no data records behind it.
    pub(crate) fn oversized_header(signals: usize, samples_per_record: &str, records: &str) -> Vec<u8> {
        fn field(out: &mut Vec<u8>, value: &str, width: usize) {
            let start = out.len();
            out.extend_from_slice(value.as_bytes());
            out.resize(start + width, b' ');
        }
        let mut raw = Vec::new();
        field(&mut raw, "0", VERSION);
        field(&mut raw, "X X X X", PATIENT);
        field(&mut raw, "Startdate X X X X", RECORDING);
        field(&mut raw, "01.01.24", START_DATE);
        field(&mut raw, "00.00.00", START_TIME);
        field(&mut raw, &(HEADER_BLOCK * (signals + 1)).to_string(), HEADER_BYTES);
        field(&mut raw, "", RESERVED_LEN);
        field(&mut raw, records, NUM_RECORDS);
        field(&mut raw, "1", RECORD_DURATION);
        field(&mut raw, &signals.to_string(), NUM_SIGNALS);
        let blocks: [(&str, usize); 10] = [
            ("EEG", LABEL),
            ("", TRANSDUCER),
            ("uV", DIMENSION),
            ("-100", PHYSICAL_MIN),
            ("100", PHYSICAL_MAX),
            ("-32768", DIGITAL_MIN),
            ("32767", DIGITAL_MAX),
            ("", PREFILTER),
            (samples_per_record, SAMPLES_PER_RECORD),
            ("", SIGNAL_RESERVED),
        ];
        for (value, width) in blocks {
            for _ in 0..signals {
                field(&mut raw, value, width);
            }
        }
        assert_eq!(raw.len(), HEADER_BLOCK * (signals + 1));
        raw
    }

    #[test]
    fn overflowing_data_size_is_rejected() {
        let raw = oversized_header(2048, "67108864", "67108864");
        assert!(matches!(
            EdfHeader::parse(&raw).unwrap_err(),
            EdfError::Truncated { needed: usize::MAX, .. }
        ));
    }

    #[test]
    fn huge_declared_data_without_overflow_is_truncated() {
        let raw = oversized_header(1, "67108864", "67108864");
        assert!(matches!(
            EdfHeader::parse(&raw).unwrap_err(),
            EdfError::Truncated { actual: 512, .. }
        ));
    }

    #[test]
    fn inverted_digital_range_is_rejected() {
        let mut raw = two_channel_edf(1);
        // digital_min block starts after labels, transducers, dimensions,
        // physical min and max: 256 + 2 * (16 + 80 + 8 + 8 + 8).
        let dmin = 256 + 2 * 120;
        raw[dmin..dmin + 8].copy_from_slice(b"40000   ");
        assert!(matches!(
            EdfHeader::parse(&raw).unwrap_err(),
            EdfError::InvalidSignal { index: 0, .. }
        ));
    }

    #[test]
    fn bad_magic() {
        let mut raw = two_channel_edf(1);
        raw[0] = b'9';
        assert!(matches!(EdfHeader::parse(&raw).unwrap_err(), EdfError::InvalidMagic(_)));
    }

    #[test]
    fn lenient_labels_never_fail() {
        let raw = two_channel_edf(1);
        assert_eq!(EdfHeader::read_labels(&raw), vec!["EEG Fp1", "EEG Fp2"]);
        // Cut inside the second label: only the first is readable.
        assert_eq!(EdfHeader::read_labels(&raw[..256 + 20]), vec!["EEG Fp1"]);
        assert!(EdfHeader::read_labels(b"0       garbage").is_empty());
        assert!(EdfHeader::read_labels(&[]).is_empty());
    }

    #[test]
    fn start_datetime_uses_edf_century_rule() {
        let mut header = EdfHeader::parse(&two_channel_edf(1)).unwrap();
        header.start_date = "17.03.99".into();
        header.start_time = "08.30.00".into();
        assert_eq!(
            header.start_datetime().unwrap().to_string(),
            "1999-03-17 08:30:00"
        );
        header.start_date = "01.01.24".into();
        assert_eq!(header.start_datetime().unwrap().format("%Y").to_string(), "2024");
        header.start_date = "xx".into();
        assert!(header.start_datetime().is_none());
    }

    #[test]
    fn physical_conversion_is_linear() {
        assert_eq!(physical_value(-32768, -100.0, 100.0, -32768, 32767), -100.0);
        assert_eq!(physical_value(32767, -100.0, 100.0, -32768, 32767), 100.0);
        let mid = physical_value(0, 0.0, 10.0, -10, 10);
        assert!((mid - 5.0).abs() < 1e-12);
    }
}
