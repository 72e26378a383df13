use std::fs;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};

use crate::annotation::{encode_tals, Annotation};
use crate::error::{EdfError, EdfResult};
use crate::header::HEADER_BLOCK;
use crate::samples::encode_sample;
use crate::variant::EdfVariant;

/// Parameters of one signal to write.
#[derive(Clone, Debug, PartialEq)]
pub struct SignalSpec {
    pub label: String,
    pub transducer: String,
    pub physical_dimension: String,
    pub physical_min: f64,
    pub physical_max: f64,
    pub digital_min: i32,
    pub digital_max: i32,
    pub prefilter: String,
    pub samples_per_record: usize,
}

impl SignalSpec {
    /// A signal with 16-bit digital range and a symmetric 100 uV physical range.
    pub fn new(label: impl Into<String>, samples_per_record: usize) -> Self {
        Self {
            label: label.into(),
            transducer: String::new(),
            physical_dimension: "uV".into(),
            physical_min: -100.0,
            physical_max: 100.0,
            digital_min: i32::from(i16::MIN),
            digital_max: i32::from(i16::MAX),
            prefilter: String::new(),
            samples_per_record,
        }
    }

    pub fn physical_range(mut self, min: f64, max: f64) -> Self {
        self.physical_min = min;
        self.physical_max = max;
        self
    }

    pub fn digital_range(mut self, min: i32, max: i32) -> Self {
        self.digital_min = min;
        self.digital_max = max;
        self
    }

    pub fn dimension(mut self, unit: impl Into<String>) -> Self {
        self.physical_dimension = unit.into();
        self
    }

    pub fn transducer(mut self, transducer: impl Into<String>) -> Self {
        self.transducer = transducer.into();
        self
    }

    pub fn prefilter(mut self, prefilter: impl Into<String>) -> Self {
        self.prefilter = prefilter.into();
        self
    }
}

/// Builds a complete EDF-family file in memory.
///
/// Records are pushed as digital samples, one vector per signal. For the
/// "+" variants an annotation signal is appended automatically and every
/// annotation is stored in the record covering its onset (annotations past
/// the end go into the last record).
#[derive(Clone, Debug)]
pub struct EdfWriter {
    variant: EdfVariant,
    patient: String,
    recording: String,
    start: NaiveDateTime,
    record_duration: f64,
    signals: Vec<SignalSpec>,
    records: Vec<Vec<Vec<i32>>>,
    annotations: Vec<Annotation>,
}

impl EdfWriter {
    pub fn new(variant: EdfVariant) -> Self {
        let start = NaiveDate::from_ymd_opt(2000, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap_or_default();
        Self {
            variant,
            patient: "X X X X".into(),
            recording: "Startdate X X X X".into(),
            start,
            record_duration: 1.0,
            signals: Vec::new(),
            records: Vec::new(),
            annotations: Vec::new(),
        }
    }

    pub fn patient(&mut self, patient: impl Into<String>) -> &mut Self {
        self.patient = patient.into();
        self
    }

    pub fn recording(&mut self, recording: impl Into<String>) -> &mut Self {
        self.recording = recording.into();
        self
    }

    pub fn start(&mut self, start: NaiveDateTime) -> &mut Self {
        self.start = start;
        self
    }

    pub fn record_duration(&mut self, seconds: f64) -> &mut Self {
        self.record_duration = seconds;
        self
    }

    pub fn add_signal(&mut self, signal: SignalSpec) -> &mut Self {
        self.signals.push(signal);
        self
    }

    /// Queue an annotation. Ignored by the plain variants.
    pub fn add_annotation(
        &mut self,
        onset: f64,
        duration: f64,
        description: impl Into<String>,
    ) -> &mut Self {
        self.annotations.push(Annotation {
            onset,
            duration,
            description: description.into(),
        });
        self
    }

    /// Append one data record of digital samples.
    pub fn push_record(&mut self, samples: &[Vec<i32>]) -> EdfResult<()> {
        if samples.len() != self.signals.len() {
            return Err(EdfError::Writer(format!(
                "record has {} signals, header declares {}",
                samples.len(),
                self.signals.len()
            )));
        }
        for (signal, values) in self.signals.iter().zip(samples) {
            if values.len() != signal.samples_per_record {
                return Err(EdfError::Writer(format!(
                    "signal {:?} needs {} samples per record, got {}",
                    signal.label,
                    signal.samples_per_record,
                    values.len()
                )));
            }
            if let Some(v) = values
                .iter()
                .find(|&&v| v < signal.digital_min || v > signal.digital_max)
            {
                return Err(EdfError::Writer(format!(
                    "sample {v} outside digital range of {:?}",
                    signal.label
                )));
            }
        }
        self.records.push(samples.to_vec());
        Ok(())
    }

    /// Serialize header and records.
    pub fn finish(&self) -> EdfResult<Vec<u8>> {
        let width = self.variant.sample_bytes();
        let (limit_min, limit_max) = self.variant.digital_limits();
        for signal in &self.signals {
            if signal.digital_min < limit_min || signal.digital_max > limit_max {
                return Err(EdfError::Writer(format!(
                    "digital range of {:?} exceeds {} sample width",
                    signal.label, self.variant
                )));
            }
        }

        let tals = self.record_tals();
        let annotation_spr = tals
            .iter()
            .map(|t| t.len().div_ceil(width))
            .max()
            .unwrap_or(0)
            .max(1);
        let mut signals = self.signals.clone();
        if self.variant.is_plus() {
            signals.push(
                SignalSpec::new(self.variant.annotation_label(), annotation_spr)
                    .dimension("")
                    .physical_range(-1.0, 1.0)
                    .digital_range(limit_min, limit_max),
            );
        }

        let mut out = self.encode_header(&signals);
        for (r, record) in self.records.iter().enumerate() {
            for values in record {
                for &v in values {
                    encode_sample(v, width, &mut out);
                }
            }
            if self.variant.is_plus() {
                let mut tal = tals[r].clone();
                tal.resize(annotation_spr * width, 0);
                out.extend_from_slice(&tal);
            }
        }
        Ok(out)
    }

    /// Serialize and write to `path`.
    pub fn write_to(&self, path: impl AsRef<Path>) -> EdfResult<()> {
        fs::write(path, self.finish()?)?;
        Ok(())
    }

    fn record_tals(&self) -> Vec<Vec<u8>> {
        if !self.variant.is_plus() {
            return Vec::new();
        }
        let count = self.records.len();
        (0..count)
            .map(|r| {
                let onset = r as f64 * self.record_duration;
                let last = r + 1 == count;
                let here: Vec<&Annotation> = self
                    .annotations
                    .iter()
                    .filter(|a| {
                        let slot = (a.onset / self.record_duration).floor().max(0.0) as usize;
                        slot == r || (last && slot >= count)
                    })
                    .collect();
                encode_tals(onset, &here)
            })
            .collect()
    }

    fn encode_header(&self, signals: &[SignalSpec]) -> Vec<u8> {
        let ns = signals.len();
        let mut out = Vec::with_capacity(HEADER_BLOCK * (ns + 1));
        out.extend_from_slice(self.variant.magic());
        put(&mut out, &self.patient, 80);
        put(&mut out, &self.recording, 80);
        put(&mut out, &self.start.format("%d.%m.%y").to_string(), 8);
        put(&mut out, &self.start.format("%H.%M.%S").to_string(), 8);
        put(&mut out, &(HEADER_BLOCK * (ns + 1)).to_string(), 8);
        put(&mut out, self.variant.reserved_tag(), 44);
        put(&mut out, &self.records.len().to_string(), 8);
        put(&mut out, &number(self.record_duration), 8);
        put(&mut out, &ns.to_string(), 4);

        for s in signals {
            put(&mut out, &s.label, 16);
        }
        for s in signals {
            put(&mut out, &s.transducer, 80);
        }
        for s in signals {
            put(&mut out, &s.physical_dimension, 8);
        }
        for s in signals {
            put(&mut out, &number(s.physical_min), 8);
        }
        for s in signals {
            put(&mut out, &number(s.physical_max), 8);
        }
        for s in signals {
            put(&mut out, &s.digital_min.to_string(), 8);
        }
        for s in signals {
            put(&mut out, &s.digital_max.to_string(), 8);
        }
        for s in signals {
            put(&mut out, &s.prefilter, 80);
        }
        for s in signals {
            put(&mut out, &s.samples_per_record.to_string(), 8);
        }
        for _ in signals {
            put(&mut out, "", 32);
        }
        out
    }
}

/// Write `value` left-aligned and space-padded to `width` ASCII bytes.
fn put(out: &mut Vec<u8>, value: &str, width: usize) {
    let bytes: Vec<u8> = value
        .bytes()
        .map(|b| if b.is_ascii() && !b.is_ascii_control() { b } else { b'_' })
        .take(width)
        .collect();
    out.extend_from_slice(&bytes);
    out.resize(out.len() + width - bytes.len(), b' ');
}

/// Shortest decimal form of `value`, cut to the 8-byte field.
fn number(value: f64) -> String {
    let mut text = value.to_string();
    text.truncate(8);
    text.trim_end_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::read_annotations;
    use crate::header::EdfHeader;

    #[test]
    fn plain_edf_has_no_annotation_signal() {
        let mut writer = EdfWriter::new(EdfVariant::Edf);
        writer.add_signal(SignalSpec::new("EEG Fp1", 2));
        writer.add_annotation(0.5, 0.0, "dropped");
        writer.push_record(&[vec![1, 2]]).unwrap();
        let raw = writer.finish().unwrap();
        assert_eq!(raw.len(), 512 + 4);
        assert_eq!(&raw[..8], b"0       ");
        let header = EdfHeader::parse(&raw).unwrap();
        assert!(header.annotation_signal_indices().is_empty());
    }

    #[test]
    fn plus_variant_stores_annotations_by_record() {
        let mut writer = EdfWriter::new(EdfVariant::EdfPlus);
        writer.record_duration(2.0);
        writer.add_signal(SignalSpec::new("EEG C3", 4));
        writer.add_annotation(0.5, 0.0, "Lights off");
        writer.add_annotation(3.0, 30.0, "N1");
        writer.add_annotation(99.0, 0.0, "After end");
        writer.push_record(&[vec![0; 4]]).unwrap();
        writer.push_record(&[vec![0; 4]]).unwrap();
        let raw = writer.finish().unwrap();

        let header = EdfHeader::parse(&raw).unwrap();
        assert_eq!(header.variant, EdfVariant::EdfPlus);
        assert_eq!(header.annotation_signal_indices(), vec![1]);
        let texts: Vec<String> = read_annotations(&raw, &header)
            .unwrap()
            .into_iter()
            .map(|a| a.description)
            .collect();
        assert_eq!(texts, vec!["Lights off", "N1", "After end"]);
    }

    #[test]
    fn record_shape_is_validated() {
        let mut writer = EdfWriter::new(EdfVariant::Edf);
        writer.add_signal(SignalSpec::new("A", 2));
        assert!(writer.push_record(&[vec![1]]).is_err());
        assert!(writer.push_record(&[vec![1, 2], vec![3, 4]]).is_err());
        assert!(writer.push_record(&[vec![1, 40_000]]).is_err());
    }

    #[test]
    fn bdf_range_must_fit_24_bits() {
        let mut writer = EdfWriter::new(EdfVariant::Bdf);
        writer.add_signal(SignalSpec::new("A", 1).digital_range(-9_000_000, 9_000_000));
        assert!(matches!(writer.finish(), Err(EdfError::Writer(_))));
    }

    #[test]
    fn write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.bdf");
        let mut writer = EdfWriter::new(EdfVariant::BdfPlus);
        writer.add_signal(SignalSpec::new("A", 1));
        writer.push_record(&[vec![7]]).unwrap();
        writer.write_to(&path).unwrap();
        let raw = std::fs::read(&path).unwrap();
        assert_eq!(EdfHeader::parse(&raw).unwrap().variant, EdfVariant::BdfPlus);
    }

    #[test]
    fn numbers_fit_fields() {
        assert_eq!(number(-100.0), "-100");
        assert_eq!(number(0.5), "0.5");
        assert_eq!(number(1.0 / 3.0), "0.333333");
    }
}
