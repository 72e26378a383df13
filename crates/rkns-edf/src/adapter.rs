use std::collections::BTreeMap;
use std::sync::Arc;

use rkns_adapter::{
    AdapterError, AdapterResult, FormatAdapter, RecordArray, SourceMetadata, StandardizedRecord,
};
use rkns_store::ArrayData;
use rkns_types::layout::{self, attrs};
use rkns_types::{standardize_label, ChannelMapping};
use serde_json::Value;
use tracing::debug;

use crate::annotation::read_annotations;
use crate::header::EdfHeader;
use crate::samples::read_digital;
use crate::variant::{sniff_variant, EdfVariant};

/// Adapter for one EDF-family variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EdfAdapter {
    variant: EdfVariant,
}

impl EdfAdapter {
    pub fn new(variant: EdfVariant) -> Self {
        Self { variant }
    }

    pub fn variant(&self) -> EdfVariant {
        self.variant
    }

    /// One adapter per variant, ready to register.
    pub fn all() -> Vec<Arc<dyn FormatAdapter>> {
        EdfVariant::ALL
            .into_iter()
            .map(|v| Arc::new(Self::new(v)) as Arc<dyn FormatAdapter>)
            .collect()
    }
}

impl FormatAdapter for EdfAdapter {
    fn name(&self) -> &str {
        match self.variant {
            EdfVariant::Edf => "edf",
            EdfVariant::EdfPlus => "edf+",
            EdfVariant::Bdf => "bdf",
            EdfVariant::BdfPlus => "bdf+",
        }
    }

    fn format(&self) -> rkns_types::FormatId {
        self.variant.format_id()
    }

    fn detect(&self, prefix: &[u8]) -> bool {
        sniff_variant(prefix) == Some(self.variant)
    }

    fn extract_channel_mapping(&self, raw: &[u8]) -> ChannelMapping {
        ChannelMapping::from_labels(EdfHeader::read_labels(raw))
    }

    fn transform(&self, raw: &[u8], source: &SourceMetadata) -> AdapterResult<StandardizedRecord> {
        let header = EdfHeader::parse(raw)?;
        if header.variant != self.variant {
            return Err(AdapterError::corrupt(format!(
                "header declares {}, adapter handles {}",
                header.variant, self.variant
            )));
        }
        build_record(raw, &header, &source.channel_mapping)
    }
}

fn standardized_id(mapping: &ChannelMapping, label: &str) -> String {
    mapping
        .get(label)
        .map(str::to_string)
        .unwrap_or_else(|| standardize_label(label))
}

fn build_record(
    raw: &[u8],
    header: &EdfHeader,
    mapping: &ChannelMapping,
) -> AdapterResult<StandardizedRecord> {
    let data = header.data_signal_indices();
    let labels: Vec<&str> = data.iter().map(|&i| header.signals[i].label.as_str()).collect();
    let ids: Vec<String> = labels.iter().map(|l| standardized_id(mapping, l)).collect();

    let mut record = StandardizedRecord::new();
    let root = record.root_mut();
    root.set_attr(attrs::SOURCE_FORMAT, header.variant.format_id().tag());
    root.set_attr("patient", header.patient.as_str());
    root.set_attr("recording", header.recording.as_str());
    root.set_attr(
        "start_datetime",
        header
            .start_datetime()
            .map(|t| Value::from(t.format("%Y-%m-%dT%H:%M:%S").to_string()))
            .unwrap_or(Value::Null),
    );
    root.set_attr("num_records", header.num_records);
    root.set_attr("record_duration", header.record_duration);
    root.set_attr("duration", header.duration());
    root.set_attr(attrs::CHANNELS, ids.clone());
    root.set_attr(attrs::CHANNEL_LABELS, labels.clone());

    // Channels sharing a sampling rate share a frequency group.
    let mut by_spr: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (position, &index) in data.iter().enumerate() {
        by_spr
            .entry(header.signals[index].samples_per_record)
            .or_default()
            .push(position);
    }

    let signals = root.group_mut(layout::SIGNALS);
    for (spr, positions) in by_spr {
        let rate = spr as f64 / header.record_duration;
        let columns = positions.len();
        let (rows, cells) = usize::try_from(header.num_records)
            .ok()
            .and_then(|records| spr.checked_mul(records))
            .and_then(|rows| Some((rows, rows.checked_mul(columns)?)))
            .ok_or_else(|| {
                AdapterError::corrupt(format!(
                    "{} records of {spr} samples overflow the address space",
                    header.num_records
                ))
            })?;

        let mut matrix = vec![0i32; cells];
        for (column, &position) in positions.iter().enumerate() {
            for (row, value) in read_digital(raw, header, data[position])
                .into_iter()
                .enumerate()
            {
                matrix[row * columns + column] = value;
            }
        }
        let samples = if header.variant.is_bdf() {
            ArrayData::I32(matrix)
        } else {
            ArrayData::I16(matrix.into_iter().map(|v| v as i16).collect())
        };

        let members: Vec<_> = positions
            .iter()
            .map(|&p| &header.signals[data[p]])
            .collect();
        let minmaxs: Vec<f64> = members
            .iter()
            .map(|s| s.physical_min)
            .chain(members.iter().map(|s| s.physical_max))
            .chain(members.iter().map(|s| f64::from(s.digital_min)))
            .chain(members.iter().map(|s| f64::from(s.digital_max)))
            .collect();

        let group = signals.group_mut(&layout::frequency_group_name(rate));
        group.set_attr(attrs::SAMPLE_RATE, rate);
        group.set_attr("samples_per_record", spr);
        group.set_attr(
            attrs::CHANNELS,
            positions.iter().map(|&p| ids[p].clone()).collect::<Vec<_>>(),
        );
        group.set_attr(
            "original_labels",
            positions.iter().map(|&p| labels[p]).collect::<Vec<_>>(),
        );
        group.set_attr(
            attrs::UNITS,
            members.iter().map(|s| s.physical_dimension.as_str()).collect::<Vec<_>>(),
        );
        group.set_attr(
            "prefilters",
            members.iter().map(|s| s.prefilter.as_str()).collect::<Vec<_>>(),
        );
        group.set_attr(
            "transducers",
            members.iter().map(|s| s.transducer.as_str()).collect::<Vec<_>>(),
        );
        group.insert_array(
            layout::SIGNAL,
            RecordArray::new(samples, vec![rows as u64, columns as u64]),
        );
        group.insert_array(
            layout::SIGNAL_MINMAXS,
            RecordArray::new(minmaxs, vec![4, columns as u64]),
        );
        debug!(rate, channels = columns, rows, "frequency group built");
    }

    let annotations = read_annotations(raw, header)?;
    let group = record.root_mut().group_mut(layout::ANNOTATIONS);
    group.set_attr(
        attrs::DESCRIPTIONS,
        annotations.iter().map(|a| a.description.as_str()).collect::<Vec<_>>(),
    );
    group.insert_array(
        "onset",
        RecordArray::vector(annotations.iter().map(|a| a.onset).collect::<Vec<f64>>()),
    );
    group.insert_array(
        "duration",
        RecordArray::vector(annotations.iter().map(|a| a.duration).collect::<Vec<f64>>()),
    );

    Ok(record)
}

#[cfg(test)]
mod tests {
    use rkns_types::FormatId;

    use super::*;
    use crate::writer::{EdfWriter, SignalSpec};

    fn source(raw: &[u8], format: FormatId) -> SourceMetadata {
        SourceMetadata::for_bytes("test.edf", format, raw)
    }

    fn two_channel_edf() -> Vec<u8> {
        let mut writer = EdfWriter::new(EdfVariant::Edf);
        writer.add_signal(SignalSpec::new("EEG Fp1", 4));
        writer.add_signal(SignalSpec::new("EEG Fp2", 4));
        for r in 0..3 {
            writer
                .push_record(&[vec![r, r + 1, r + 2, r + 3], vec![-r; 4]])
                .unwrap();
        }
        writer.finish().unwrap()
    }

    // ---- Detection / mapping ----

    #[test]
    fn each_adapter_detects_only_its_variant() {
        let raw = two_channel_edf();
        let hits: Vec<FormatId> = EdfAdapter::all()
            .iter()
            .filter(|a| a.detect(&raw[..256]))
            .map(|a| a.format())
            .collect();
        assert_eq!(hits, vec![FormatId::Edf]);
    }

    #[test]
    fn channel_mapping_preserves_labels() {
        let mapping = EdfAdapter::new(EdfVariant::Edf).extract_channel_mapping(&two_channel_edf());
        assert_eq!(mapping.len(), 2);
        assert!(mapping.contains("EEG Fp1"));
        assert!(mapping.contains("EEG Fp2"));
        assert_eq!(
            EdfAdapter::new(EdfVariant::Edf).extract_channel_mapping(b"0       "),
            ChannelMapping::new()
        );
    }

    // ---- Transform ----

    #[test]
    fn two_channel_edf_yields_two_channels() {
        let raw = two_channel_edf();
        let record = EdfAdapter::new(EdfVariant::Edf)
            .transform(&raw, &source(&raw, FormatId::Edf))
            .unwrap();

        assert_eq!(record.channel_labels(), vec!["EEG Fp1", "EEG Fp2"]);
        let signal = record.array("signals/fg_4/signal").unwrap();
        // 3 records x 4 samples per record, 2 channels.
        assert_eq!(signal.shape, vec![12, 2]);
        let ArrayData::I16(values) = &signal.data else {
            panic!("EDF samples must be i16");
        };
        assert_eq!(&values[..4], &[0, 0, 1, 0]);
        assert_eq!(values[2 * 4 * 2 + 1], -2);

        let minmaxs = record.array("signals/fg_4/signal_minmaxs").unwrap();
        assert_eq!(minmaxs.shape, vec![4, 2]);
        assert_eq!(
            minmaxs.data,
            ArrayData::F64(vec![-100.0, -100.0, 100.0, 100.0, -32768.0, -32768.0, 32767.0, 32767.0])
        );
        assert_eq!(record.root().attrs["num_records"], 3);
    }

    #[test]
    fn mixed_rates_split_into_groups() {
        let mut writer = EdfWriter::new(EdfVariant::Bdf);
        writer.record_duration(0.5);
        writer.add_signal(SignalSpec::new("EEG C3", 128));
        writer.add_signal(SignalSpec::new("SaO2", 1));
        writer.push_record(&[vec![5; 128], vec![97]]).unwrap();
        let raw = writer.finish().unwrap();

        let record = EdfAdapter::new(EdfVariant::Bdf)
            .transform(&raw, &source(&raw, FormatId::Bdf))
            .unwrap();
        let signals = record.root().group(layout::SIGNALS).unwrap();
        let names: Vec<&String> = signals.groups.keys().collect();
        assert_eq!(names, vec!["fg_2", "fg_256"]);
        let slow = record.array("signals/fg_2/signal").unwrap();
        assert_eq!(slow.data, ArrayData::I32(vec![97]));
        assert_eq!(
            signals.group("fg_2").unwrap().attrs[attrs::CHANNELS],
            serde_json::json!(["SpO2"])
        );
    }

    #[test]
    fn plus_variant_annotations() {
        let mut writer = EdfWriter::new(EdfVariant::EdfPlus);
        writer.add_signal(SignalSpec::new("EEG Fp1", 2));
        writer.add_annotation(0.25, 0.0, "Lights off");
        writer.add_annotation(1.5, 30.0, "N1");
        writer.push_record(&[vec![0, 0]]).unwrap();
        writer.push_record(&[vec![0, 0]]).unwrap();
        let raw = writer.finish().unwrap();

        let record = EdfAdapter::new(EdfVariant::EdfPlus)
            .transform(&raw, &source(&raw, FormatId::EdfPlus))
            .unwrap();
        assert_eq!(record.channel_count(), 1);
        assert_eq!(
            record.array("annotations/onset").unwrap().data,
            ArrayData::F64(vec![0.25, 1.5])
        );
        assert_eq!(
            record.array("annotations/duration").unwrap().data,
            ArrayData::F64(vec![0.0, 30.0])
        );
    }

    #[test]
    fn popis_mapping_overrides_default_ids() {
        let raw = two_channel_edf();
        let mut meta = source(&raw, FormatId::Edf);
        meta.channel_mapping.insert("EEG Fp1", "LEFT");
        let record = EdfAdapter::new(EdfVariant::Edf).transform(&raw, &meta).unwrap();
        let channels = &record.root().attrs[attrs::CHANNELS];
        assert_eq!(channels[0], "LEFT");
        assert_eq!(channels[1], standardize_label("EEG Fp2"));
    }

    #[test]
    fn transform_is_deterministic() {
        let raw = two_channel_edf();
        let adapter = EdfAdapter::new(EdfVariant::Edf);
        let meta = source(&raw, FormatId::Edf);
        assert_eq!(adapter.transform(&raw, &meta).unwrap(), adapter.transform(&raw, &meta).unwrap());
    }

    #[test]
    fn detected_but_truncated_is_corrupt() {
        let raw = two_channel_edf();
        let adapter = EdfAdapter::new(EdfVariant::Edf);
        let cut = &raw[..raw.len() - 3];
        assert!(adapter.detect(cut));
        assert!(matches!(
            adapter.transform(cut, &source(cut, FormatId::Edf)),
            Err(AdapterError::CorruptSource { .. })
        ));
    }

    #[test]
    fn overflowing_header_sizes_are_corrupt() {
        let raw = crate::header::tests::oversized_header(2048, "67108864", "67108864");
        let adapter = EdfAdapter::new(EdfVariant::Edf);
        assert!(adapter.detect(&raw[..256]));
        assert!(matches!(
            adapter.transform(&raw, &source(&raw, FormatId::Edf)),
            Err(AdapterError::CorruptSource { .. })
        ));
    }

    #[test]
    fn variant_mismatch_is_corrupt() {
        let raw = two_channel_edf();
        let err = EdfAdapter::new(EdfVariant::EdfPlus)
            .transform(&raw, &source(&raw, FormatId::EdfPlus))
            .unwrap_err();
        assert!(err.to_string().contains("adapter handles EDF+"));
    }
}
