use crate::error::{EdfError, EdfResult};
use crate::header::EdfHeader;
use crate::samples::signal_bytes;

const ONSET_DURATION_SEP: u8 = 0x15;
const FIELD_SEP: u8 = 0x14;
const TAL_END: u8 = 0x00;

/// One event from an EDF+/BDF+ annotation signal.
#[derive(Clone, Debug, PartialEq)]
pub struct Annotation {
    /// Seconds since the start of the recording.
    pub onset: f64,
    /// Seconds; 0.0 when the TAL gives no duration.
    pub duration: f64,
    pub description: String,
}

/// Parse the time-stamped annotation lists of one record's annotation
/// signal. The record's time-keeping TAL (no description) is skipped.
pub fn parse_tals(bytes: &[u8], record: u64) -> EdfResult<Vec<Annotation>> {
    let invalid = |reason: String| EdfError::Annotation { record, reason };
    let mut annotations = Vec::new();

    for tal in bytes.split(|&b| b == TAL_END).filter(|t| !t.is_empty()) {
        let mut parts = tal.split(|&b| b == FIELD_SEP);
        let timing = parts.next().unwrap_or_default();
        let (onset, duration) = match timing.iter().position(|&b| b == ONSET_DURATION_SEP) {
            Some(at) => (&timing[..at], Some(&timing[at + 1..])),
            None => (timing, None),
        };
        let onset = parse_seconds(onset)
            .filter(|_| matches!(onset.first(), Some(b'+' | b'-')))
            .ok_or_else(|| invalid(format!("bad onset {:?}", String::from_utf8_lossy(onset))))?;
        let duration = match duration {
            Some(d) => parse_seconds(d)
                .ok_or_else(|| invalid(format!("bad duration {:?}", String::from_utf8_lossy(d))))?,
            None => 0.0,
        };

        for text in parts.filter(|p| !p.is_empty()) {
            annotations.push(Annotation {
                onset,
                duration,
                description: String::from_utf8_lossy(text).into_owned(),
            });
        }
    }
    Ok(annotations)
}

fn parse_seconds(bytes: &[u8]) -> Option<f64> {
    std::str::from_utf8(bytes)
        .ok()?
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Every annotation in the file, in record order.
pub fn read_annotations(raw: &[u8], header: &EdfHeader) -> EdfResult<Vec<Annotation>> {
    let indices = header.annotation_signal_indices();
    let mut annotations = Vec::new();
    for record in 0..header.num_records {
        for &index in &indices {
            annotations.extend(parse_tals(signal_bytes(raw, header, record, index), record)?);
        }
    }
    Ok(annotations)
}

/// Encode the TALs of one record: the time-keeping TAL first, then one TAL
/// per annotation.
pub fn encode_tals(record_onset: f64, annotations: &[&Annotation]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(format!("{}", Signed(record_onset)).as_bytes());
    out.extend_from_slice(&[FIELD_SEP, FIELD_SEP, TAL_END]);
    for annotation in annotations {
        out.extend_from_slice(format!("{}", Signed(annotation.onset)).as_bytes());
        if annotation.duration > 0.0 {
            out.push(ONSET_DURATION_SEP);
            out.extend_from_slice(annotation.duration.to_string().as_bytes());
        }
        out.push(FIELD_SEP);
        out.extend_from_slice(annotation.description.as_bytes());
        out.extend_from_slice(&[FIELD_SEP, TAL_END]);
    }
    out
}

/// Onset with the mandatory sign.
struct Signed(f64);

impl std::fmt::Display for Signed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 < 0.0 {
            write!(f, "{}", self.0)
        } else {
            write!(f, "+{}", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_onset_duration_and_multiple_texts() {
        let tals = b"+0\x14\x14\x00+12.5\x151.5\x14Arousal\x14Snore\x14\x00\x00\x00";
        let parsed = parse_tals(tals, 0).unwrap();
        assert_eq!(
            parsed,
            vec![
                Annotation { onset: 12.5, duration: 1.5, description: "Arousal".into() },
                Annotation { onset: 12.5, duration: 1.5, description: "Snore".into() },
            ]
        );
    }

    #[test]
    fn missing_duration_is_zero() {
        let parsed = parse_tals(b"+3\x14Lights off\x14\x00", 0).unwrap();
        assert_eq!(parsed[0].duration, 0.0);
        assert_eq!(parsed[0].description, "Lights off");
    }

    #[test]
    fn unsigned_onset_is_rejected() {
        let err = parse_tals(b"3\x14x\x14\x00", 7).unwrap_err();
        assert!(matches!(err, EdfError::Annotation { record: 7, .. }));
    }

    #[test]
    fn encode_then_parse() {
        let a = Annotation { onset: 1.25, duration: 0.0, description: "Start".into() };
        let b = Annotation { onset: 2.0, duration: 30.0, description: "N2".into() };
        let bytes = encode_tals(0.0, &[&a, &b]);
        assert_eq!(parse_tals(&bytes, 0).unwrap(), vec![a, b]);
    }
}
